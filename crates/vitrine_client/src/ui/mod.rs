pub mod text_overlay;
