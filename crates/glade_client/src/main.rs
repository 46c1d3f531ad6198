mod app;
mod assets;
mod controls;
mod input;
mod renderer;
mod settings;

fn main() {
    app::run();
}
