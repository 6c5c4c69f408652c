//! Fundus Viewer - interactive eye model with diagnostic overlay compositing
//!
//! Main entry point for the application.

use std::path::Path;

use fundus_viewer::{Compositor, FundusViewerApp, ViewerConfig};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Starting Fundus Viewer v{}", env!("CARGO_PKG_VERSION"));

    let config = ViewerConfig::load(Path::new("fundus-viewer.json"))?;
    let compositor = Compositor::new(&config.target_material)?;

    // Configure native options
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Fundus Viewer"),
        vsync: true,
        multisampling: 0,
        ..Default::default()
    };

    // Run the app
    eframe::run_native(
        "Fundus Viewer",
        native_options,
        Box::new(move |cc| Box::new(FundusViewerApp::new(cc, config, compositor))),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {e}"))
}
