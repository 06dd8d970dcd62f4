//! GUI client for the face-detection service.
//!
//! Run with: cargo run --features gui --bin facedetect-gui

use eframe::egui;
use facedetect_client::{
    mime_from_path, ApiStatus, Config, Detection, DetectionClient, HttpTransport, Level, Preset,
    Readout, RetainedView, Result, Samples, SelectedFile, Session, Size, TableRow, ViewState,
    MIN_NEIGHBORS_RANGE, MIN_SIZE_RANGE, SAMPLES, SCALE_FACTOR_RANGE,
};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

type AppSession = Session<HttpTransport, Samples, RetainedView>;

fn main() -> eframe::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    let session = match Session::connect(&config, RetainedView::new()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "facedetect - Face Detection",
        options,
        Box::new(move |cc| Ok(Box::new(DetectApp::new(cc, session)))),
    )
}

/// Results coming back from background threads.
enum WorkerMessage {
    Detection { ticket: u64, outcome: Result<Detection> },
    Health(ApiStatus),
}

struct DetectApp {
    session: AppSession,

    // Worker plumbing
    job_tx: Sender<WorkerMessage>,
    job_rx: Receiver<WorkerMessage>,

    // Textures, rebuilt only when their source changes
    image_texture: Option<(Arc<RgbaImage>, egui::TextureHandle)>,
    overlay_texture: Option<(u64, egui::TextureHandle)>,
}

impl DetectApp {
    fn new(_cc: &eframe::CreationContext<'_>, session: AppSession) -> Self {
        let (job_tx, job_rx) = mpsc::channel();
        let app = Self {
            session,
            job_tx,
            job_rx,
            image_texture: None,
            overlay_texture: None,
        };
        app.spawn_health_check();
        app
    }

    fn spawn_health_check(&self) {
        let client = self.session.client().clone();
        let tx = self.job_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(WorkerMessage::Health(client.health()));
        });
    }

    fn start_detection(&mut self) {
        let Some(job) = self.session.begin_detection() else {
            return;
        };
        let client: DetectionClient<HttpTransport> = self.session.client().clone();
        let tx = self.job_tx.clone();
        thread::spawn(move || {
            let outcome = client.run(&job.form);
            let _ = tx.send(WorkerMessage::Detection {
                ticket: job.ticket,
                outcome,
            });
        });
    }

    /// Polls the worker threads for finished jobs.
    fn poll_worker(&mut self, ctx: &egui::Context) {
        let mut updated = false;
        while let Ok(message) = self.job_rx.try_recv() {
            match message {
                WorkerMessage::Detection { ticket, outcome } => {
                    // Failures are already on screen as a toast.
                    let _ = self.session.complete_detection(ticket, outcome);
                }
                WorkerMessage::Health(status) => self.session.set_api_status(status),
            }
            updated = true;
        }

        if updated {
            ctx.request_repaint();
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        let _ = self.session.select_path(&path);
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<egui::DroppedFile> = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if let Some(path) = file.path {
                self.open_path(path);
            } else if let Some(bytes) = file.bytes {
                let mime_type = if file.mime.is_empty() {
                    mime_from_path(Path::new(&file.name)).to_string()
                } else {
                    file.mime
                };
                let _ = self
                    .session
                    .select(SelectedFile::new(file.name, mime_type, bytes.to_vec()));
            }
        }
    }

    fn image_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureHandle> {
        let image = Arc::clone(self.session.view().image()?);
        match &self.image_texture {
            Some((cached, texture)) if Arc::ptr_eq(cached, &image) => Some(texture.clone()),
            _ => {
                let texture = ctx.load_texture("image", to_color_image(&image), Default::default());
                self.image_texture = Some((image, texture.clone()));
                Some(texture)
            }
        }
    }

    fn overlay_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureHandle> {
        let canvas = self.session.view().overlay();
        if canvas.size().is_empty() {
            return None;
        }
        let revision = canvas.revision();
        match &self.overlay_texture {
            Some((cached, texture)) if *cached == revision => Some(texture.clone()),
            _ => {
                let texture =
                    ctx.load_texture("overlay", to_color_image(canvas.image()), Default::default());
                self.overlay_texture = Some((revision, texture.clone()));
                Some(texture)
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Image");
        ui.separator();
        if ui.button("Open Image...").clicked() {
            if let Some(path) = pick_image() {
                self.open_path(path);
            }
        }
        ui.horizontal(|ui| {
            for (name, _) in SAMPLES {
                if ui.button(name).clicked() {
                    let _ = self.session.load_sample(name);
                }
            }
        });
        ui.add_space(16.0);

        ui.heading("Parameters");
        ui.separator();
        let params = self.session.params();

        let mut min_size = params.min_size;
        ui.horizontal(|ui| {
            if ui
                .add(egui::Slider::new(&mut min_size, MIN_SIZE_RANGE).show_value(false))
                .changed()
            {
                self.session.set_min_size(min_size);
            }
            ui.label(format!("Min size: {}", self.readout(Readout::MinSize)));
        });

        let mut scale_factor = params.scale_factor;
        ui.horizontal(|ui| {
            if ui
                .add(
                    egui::Slider::new(&mut scale_factor, SCALE_FACTOR_RANGE)
                        .step_by(0.05)
                        .show_value(false),
                )
                .changed()
            {
                self.session.set_scale_factor(scale_factor);
            }
            ui.label(format!("Scale factor: {}", self.readout(Readout::ScaleFactor)));
        });

        let mut min_neighbors = params.min_neighbors;
        ui.horizontal(|ui| {
            if ui
                .add(egui::Slider::new(&mut min_neighbors, MIN_NEIGHBORS_RANGE).show_value(false))
                .changed()
            {
                self.session.set_min_neighbors(min_neighbors);
            }
            ui.label(format!("Min neighbors: {}", self.readout(Readout::MinNeighbors)));
        });

        ui.horizontal(|ui| {
            for preset in Preset::ALL {
                if ui.button(preset.label()).clicked() {
                    self.session.apply_preset(preset);
                }
            }
        });
        ui.add_space(16.0);

        let view = self.session.view();
        let label = if view.busy() { "Detecting..." } else { "Detect Faces" };
        if ui
            .add_enabled(view.detect_enabled(), egui::Button::new(label))
            .clicked()
        {
            self.start_detection();
        }
        ui.add_space(16.0);

        ui.heading("Status");
        ui.separator();
        let status = self.session.view().api_status();
        let color = match status {
            ApiStatus::Online => egui::Color32::from_rgb(46, 160, 67),
            ApiStatus::Unknown => egui::Color32::GRAY,
            ApiStatus::Offline(_) | ApiStatus::Error(_) => egui::Color32::from_rgb(255, 71, 87),
        };
        ui.colored_label(color, status.label());
        if ui.small_button("Check again").clicked() {
            self.spawn_health_check();
        }
    }

    fn results(&self, ui: &mut egui::Ui) {
        let view = self.session.view();
        ui.heading("Results");
        ui.separator();

        for readout in [
            Readout::FaceCount,
            Readout::ProcessingTime,
            Readout::ImageSize,
            Readout::FileSize,
        ] {
            ui.label(format!("{}: {}", readout.label(), self.readout(readout)));
        }
        ui.add_space(8.0);

        if view.rows().is_empty() {
            return;
        }
        egui::Grid::new("faces").striped(true).show(ui, |ui| {
            for header in TableRow::HEADERS {
                ui.strong(header);
            }
            ui.end_row();
            for row in view.rows() {
                for cell in row.cells() {
                    ui.label(cell);
                }
                ui.end_row();
            }
        });
    }

    fn preview(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let Some(texture) = self.image_texture(ctx) else {
            ui.centered_and_justified(|ui| {
                ui.heading("Drag and drop an image, use File > Open or pick a sample");
            });
            return;
        };

        let available_size = ui.available_size();
        let texture_size = texture.size_vec2();

        // Scale to fit
        let scale = (available_size.x / texture_size.x)
            .min(available_size.y / texture_size.y)
            .min(1.0);
        let display_size = texture_size * scale;
        let display = Size::new(
            display_size.x.round().max(1.0) as u32,
            display_size.y.round().max(1.0) as u32,
        );
        if self.session.view().display_size() != Some(display) {
            self.session.set_display_size(display);
        }

        let overlay = self.overlay_texture(ctx);
        ui.vertical_centered(|ui| {
            let response = ui.image((texture.id(), display_size));
            if let Some(overlay) = overlay {
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                ui.painter()
                    .image(overlay.id(), response.rect, uv, egui::Color32::WHITE);
            }
            if self.session.view().state() == ViewState::Loading {
                ui.spinner();
            }
        });
    }

    fn toasts(&mut self, ctx: &egui::Context) {
        self.session.expire_notifications(Instant::now());
        let mut dismissed = Vec::new();

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_TOP, [-12.0, 36.0])
            .show(ctx, |ui| {
                for toast in self.session.notifications() {
                    let fill = match toast.level {
                        Level::Info => egui::Color32::from_rgb(52, 152, 219),
                        Level::Success => egui::Color32::from_rgb(46, 160, 67),
                        Level::Error => egui::Color32::from_rgb(255, 71, 87),
                    };
                    egui::Frame::popup(ui.style()).fill(fill).show(ui, |ui| {
                        ui.set_max_width(320.0);
                        ui.horizontal(|ui| {
                            ui.colored_label(egui::Color32::WHITE, &toast.message);
                            if ui.small_button("x").clicked() {
                                dismissed.push(toast.id);
                            }
                        });
                    });
                }
            });

        for id in dismissed {
            self.session.dismiss_notification(id);
        }
        if self.session.notifications().next().is_some() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }

    fn readout(&self, readout: Readout) -> &str {
        self.session.view().readout(readout).unwrap_or("-")
    }
}

impl eframe::App for DetectApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker(ctx);

        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Image...").clicked() {
                        if let Some(path) = pick_image() {
                            self.open_path(path);
                        }
                        ui.close_menu();
                    }
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("controls")
            .min_width(280.0)
            .show(ctx, |ui| self.controls(ui));

        egui::SidePanel::right("results")
            .min_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.results(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.preview(ui, ctx));

        self.toasts(ctx);
        self.handle_dropped_files(ctx);

        if self.session.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn pick_image() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "gif", "webp"])
        .pick_file()
}

fn to_color_image(image: &RgbaImage) -> egui::ColorImage {
    let (width, height) = image.dimensions();
    egui::ColorImage::from_rgba_unmultiplied([width as usize, height as usize], image.as_raw())
}
