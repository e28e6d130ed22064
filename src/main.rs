mod analysis;
mod app;
mod commands;
mod config;
mod logging;
mod playback;
mod ui;
mod visualizations;

fn main() {
    if let Err(e) = app::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
