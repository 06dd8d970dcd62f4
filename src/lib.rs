//! # facedetect-client
//!
//! Client for a remote face-detection HTTP service.
//!
//! This crate provides:
//! - **Uploads**: type and size validation, preview decoding, bundled samples
//! - **Detection**: multipart requests to `{base}/detect` with one relaxed
//!   retry, response normalization, health checks
//! - **Overlay**: face boxes mapped from natural to display coordinates and
//!   painted onto a [`Canvas`]
//! - **Session**: the results panel state machine, parameters, presets and
//!   toast notifications behind a [`View`] seam
//!
//! ## Flow
//!
//! 1. An image is selected (picker, drop or sample) and validated
//! 2. The preview is shown; results and overlay are cleared
//! 3. Detection sends the image plus `minSize`, `scaleFactor` and
//!    `minNeighbors` to the service
//! 4. Faces are listed in the results table and drawn over the preview
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use facedetect_client::{Config, RetainedView, Session, Size};
//!
//! let config = Config::from_env();
//! let mut session = Session::connect(&config, RetainedView::new())?;
//!
//! session.load_sample("group")?;
//! if let Some(asset) = session.asset() {
//!     let natural = asset.natural_size();
//!     session.set_display_size(natural);
//! }
//! session.detect()?;
//!
//! for row in session.view().rows() {
//!     println!("{}", row.cells().join("\t"));
//! }
//! # Ok::<(), facedetect_client::Error>(())
//! ```
//!
//! ## Custom Transports
//!
//! Implement the [`Transport`] trait to route requests elsewhere:
//!
//! ```rust
//! use facedetect_client::{DetectionForm, HttpResponse, RequestMode, Result, Transport};
//!
//! struct Canned;
//!
//! impl Transport for Canned {
//!     fn post_form(&self, _url: &str, _form: &DetectionForm, _mode: RequestMode) -> Result<HttpResponse> {
//!         Ok(HttpResponse::new(200, r#"{"success":true,"data":{"face_count":0,"faces":[]}}"#))
//!     }
//!     fn get(&self, _url: &str) -> Result<HttpResponse> {
//!         Ok(HttpResponse::new(200, "ok"))
//!     }
//! }
//! ```

mod client;
mod config;
mod error;
mod http;
mod notifier;
pub mod overlay;
mod params;
mod presenter;
pub mod raster;
mod session;
mod types;
mod uploader;
mod view;

pub use client::{
    decode_response, ApiStatus, DetectionClient, DetectionForm, HttpResponse, RequestMode,
    Transport, IMAGE_FIELD,
};
pub use config::{Config, SampleLocation, DEFAULT_API_BASE_URL};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpTransport, RemoteSamples, Samples};
pub use notifier::{Level, Notification, Notifier, TOAST_LIFETIME};
pub use overlay::{Canvas, ImageGeometry, Overlay, RenderOutcome};
pub use params::{
    Parameter, ParameterPanel, MIN_NEIGHBORS_RANGE, MIN_SIZE_RANGE, SCALE_FACTOR_RANGE,
};
pub use presenter::{format_area, Presenter, Readout, TableRow, ViewState, NO_FACES};
pub use raster::RasterCanvas;
pub use session::{DetectionJob, Session};
pub use types::{
    Detection, DetectionParameters, DetectionResult, Face, ImageAsset, Preset, SelectedFile, Size,
};
pub use uploader::{
    format_file_size, mime_from_path, read_file, SampleDir, SampleSource, Uploader,
    MAX_IMAGE_BYTES, SAMPLES,
};
pub use view::{RetainedView, View, NOTIFICATION_HISTORY};
