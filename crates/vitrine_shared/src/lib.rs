pub mod camera;
pub mod enclosure;
pub mod geometry;
pub mod interaction;
pub mod projection;
pub mod rapier_solver;
pub mod scene;
pub mod settings;
pub mod stroke;
