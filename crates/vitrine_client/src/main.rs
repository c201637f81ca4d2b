mod app;
mod input;
mod renderer;
mod ui;

fn main() {
    app::run();
}
