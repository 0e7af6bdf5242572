use eframe::egui;

use crate::settings::Settings;
use crate::state::Session;
use crate::ui::{panels, plot, table};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

/// What the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CentralView {
    #[default]
    Chart,
    Table,
}

pub struct RustyAtlasApp {
    pub session: Session,
    pub central: CentralView,
}

impl RustyAtlasApp {
    pub fn new(settings: Settings) -> Self {
        Self {
            session: Session::new(settings),
            central: CentralView::default(),
        }
    }

    /// Load the first file dropped onto the window this frame.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        let Some(file) = dropped.into_iter().next() else {
            return;
        };
        // Native builds hand over a path, web builds the bytes.
        let result = match (&file.path, &file.bytes) {
            (Some(path), _) => self.session.load_path(path),
            (None, Some(bytes)) => self.session.load_bytes(&file.name, bytes),
            (None, None) => return,
        };
        if result.is_ok() {
            log::info!("Loaded dropped file '{}'", file.name);
        }
    }
}

impl eframe::App for RustyAtlasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.session, &mut self.central);
        });

        // ---- Left side panel: columns and filters ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.session);
            });

        // ---- Central panel: chart or table ----
        egui::CentralPanel::default().show(ctx, |ui| match self.central {
            CentralView::Chart => plot::chart_panel(ui, &mut self.session),
            CentralView::Table => table::preview_table(ui, &self.session),
        });
    }
}
