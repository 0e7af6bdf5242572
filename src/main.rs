mod app;
mod chart;
mod color;
mod data;
mod settings;
mod state;
mod ui;

use app::RustyAtlasApp;
use eframe::egui;
use settings::Settings;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Atlas – Data Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(RustyAtlasApp::new(settings)))),
    )
}
