//! One user session: the selected image, the parameters, the results and the
//! overlay, wired to a [`Transport`], a [`SampleSource`] and a [`View`].

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use crate::client::{ApiStatus, DetectionClient, DetectionForm, Transport};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{HttpTransport, Samples};
use crate::notifier::{Level, Notification, Notifier};
use crate::overlay::{Overlay, RenderOutcome};
use crate::params::{Parameter, ParameterPanel};
use crate::presenter::{Frame, Presenter, Readout, ViewState};
use crate::types::{Detection, DetectionParameters, ImageAsset, Preset, SelectedFile, Size};
use crate::uploader::{format_file_size, read_file, SampleSource, Uploader};
use crate::view::View;

/// A detection request handed out by [`Session::begin_detection`].
///
/// Run `form` through a [`DetectionClient`] anywhere (a worker thread, say) and
/// give the outcome back to [`Session::complete_detection`] with `ticket`.
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub ticket: u64,
    pub form: DetectionForm,
}

pub struct Session<T, S, V> {
    client: DetectionClient<T>,
    uploader: Uploader<S>,
    view: V,
    panel: ParameterPanel,
    presenter: Presenter,
    overlay: Overlay,
    notifier: Notifier,
    asset: Option<ImageAsset>,
    detection: Option<Detection>,
    /// Bumped on every accepted asset; responses for older ones are dropped.
    generation: u64,
    in_flight: Option<u64>,
}

impl<V: View> Session<HttpTransport, Samples, V> {
    /// A session talking HTTP to the service named in `config`.
    pub fn connect(config: &Config, view: V) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        let samples = Samples::from_config(config)?;
        Ok(Self::new(
            DetectionClient::new(transport, config.api_base_url.clone()),
            Uploader::new(samples),
            view,
        ))
    }
}

impl<T: Transport, S: SampleSource, V: View> Session<T, S, V> {
    pub fn new(client: DetectionClient<T>, uploader: Uploader<S>, view: V) -> Self {
        let mut session = Self {
            client,
            uploader,
            view,
            panel: ParameterPanel::default(),
            presenter: Presenter::new(),
            overlay: Overlay::new(),
            notifier: Notifier::default(),
            asset: None,
            detection: None,
            generation: 0,
            in_flight: None,
        };
        session.view.show_state(ViewState::Empty);
        session.view.set_readout(Readout::FaceCount, "0".to_string());
        session.view.set_readout(Readout::ProcessingTime, "-".to_string());
        session.sync_parameters();
        session.sync_detect_button();
        session
    }

    pub fn client(&self) -> &DetectionClient<T> {
        &self.client
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn params(&self) -> DetectionParameters {
        self.panel.params()
    }

    pub fn state(&self) -> ViewState {
        self.presenter.state()
    }

    pub fn asset(&self) -> Option<&ImageAsset> {
        self.asset.as_ref()
    }

    /// The last successful detection for the current asset.
    pub fn detection(&self) -> Option<&Detection> {
        self.detection.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifier.active()
    }

    pub fn dismiss_notification(&mut self, id: u64) -> bool {
        self.notifier.dismiss(id)
    }

    /// Drop toasts older than their lifetime.
    pub fn expire_notifications(&mut self, now: Instant) -> usize {
        self.notifier.expire(now)
    }

    /// Validate and show `file`. Failures are reported as a toast and leave
    /// the session untouched.
    pub fn select(&mut self, file: SelectedFile) -> Result<()> {
        match self.uploader.select(file) {
            Ok(asset) => {
                self.accept(asset);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn select_path(&mut self, path: &Path) -> Result<()> {
        match read_file(path) {
            Ok(file) => self.select(file),
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn load_sample(&mut self, name: &str) -> Result<()> {
        match self.uploader.load_sample(name) {
            Ok(asset) => {
                self.accept(asset);
                self.notify(Level::Success, format!("Loaded sample: {name}"));
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    pub fn set_min_size(&mut self, value: u32) {
        self.panel.set_min_size(value);
        self.sync_parameters();
    }

    pub fn set_scale_factor(&mut self, value: f64) {
        self.panel.set_scale_factor(value);
        self.sync_parameters();
    }

    pub fn set_min_neighbors(&mut self, value: u32) {
        self.panel.set_min_neighbors(value);
        self.sync_parameters();
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.panel.apply_preset(preset);
        self.sync_parameters();
        self.notify(Level::Success, format!("Preset applied: {}", preset.label()));
    }

    /// Switch to the loading state and hand out the request to run.
    ///
    /// `None` if there is no image or a request is already in flight; the
    /// click is dropped rather than queued.
    pub fn begin_detection(&mut self) -> Option<DetectionJob> {
        if let Some(ticket) = self.in_flight {
            debug!(ticket, "detection already in flight, ignoring");
            return None;
        }
        let Some(asset) = self.asset.as_ref() else {
            debug!("no image selected, ignoring detection request");
            return None;
        };
        let form = DetectionForm::new(asset, self.panel.params());
        let state = self.presenter.detection_started()?;

        let ticket = self.generation;
        self.in_flight = Some(ticket);
        self.view.show_state(state);
        self.sync_detect_button();
        debug!(ticket, file = %form.file_name, "detection started");
        Some(DetectionJob { ticket, form })
    }

    /// Apply the outcome of a job.
    ///
    /// `Ok(false)` if the job belonged to an image that has since been
    /// replaced and was discarded. Failures are shown as a toast and returned.
    pub fn complete_detection(&mut self, ticket: u64, outcome: Result<Detection>) -> Result<bool> {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
        if ticket != self.generation {
            debug!(ticket, current = self.generation, "discarding stale detection response");
            self.sync_detect_button();
            return Ok(false);
        }

        let applied = match outcome {
            Ok(detection) => {
                if let Some(frame) = self.presenter.succeeded(&detection.result, detection.elapsed) {
                    self.apply_frame(frame);
                    self.overlay.render(&detection.result.faces, &mut self.view);
                    self.notify(
                        Level::Success,
                        format!(
                            "Detected {} face(s) in {}ms",
                            detection.result.face_count,
                            detection.elapsed.as_millis()
                        ),
                    );
                    self.detection = Some(detection);
                }
                Ok(true)
            }
            Err(e) => {
                if let Some(frame) = self.presenter.failed() {
                    self.apply_frame(frame);
                }
                self.overlay.clear(&mut self.view);
                self.detection = None;
                let message = self.failure_message(&e);
                self.notify(Level::Error, message);
                Err(e)
            }
        };
        self.sync_detect_button();
        applied
    }

    /// Run a detection on the calling thread.
    pub fn detect(&mut self) -> Result<bool> {
        let Some(job) = self.begin_detection() else {
            return Ok(false);
        };
        let outcome = self.client.run(&job.form);
        self.complete_detection(job.ticket, outcome)
    }

    /// The host knows the display size of the image, for the first time or
    /// after a resize. Runs a deferred render or redraws the shown faces.
    pub fn set_display_size(&mut self, size: Size) -> Option<RenderOutcome> {
        if self.asset.is_none() {
            return None;
        }
        self.view.set_display_size(size);
        self.overlay.refresh(&mut self.view)
    }

    /// Probe the service and show the result as the status badge.
    pub fn check_api_status(&mut self) -> ApiStatus {
        let status = self.client.health();
        self.set_api_status(status.clone());
        status
    }

    /// Show a status checked elsewhere.
    pub fn set_api_status(&mut self, status: ApiStatus) {
        info!(status = %status.label(), "API status");
        self.view.set_api_status(&status);
    }

    fn accept(&mut self, asset: ImageAsset) {
        self.generation += 1;
        self.detection = None;
        self.overlay.clear(&mut self.view);
        self.view.show_image(&asset);

        let frame = self.presenter.asset_loaded();
        self.apply_frame(frame);
        self.view
            .set_readout(Readout::ImageSize, asset.natural_size().to_string());
        self.view
            .set_readout(Readout::FileSize, format_file_size(asset.byte_size));
        info!(name = %asset.name, size = %asset.natural_size(), "image selected");

        self.asset = Some(asset);
        self.sync_detect_button();
    }

    fn reject(&mut self, error: Error) -> Error {
        self.notify(Level::Error, error.to_string());
        error
    }

    fn failure_message(&self, error: &Error) -> String {
        match error {
            Error::Transport { reason, .. } => format!(
                "Cannot connect to the detection API at {}: {reason}",
                self.client.base_url()
            ),
            Error::ServiceError { status, body } => format!("Server error: HTTP {status}: {body}"),
            Error::DetectionRejected { message } => format!("Error: {message}"),
            other => other.to_string(),
        }
    }

    fn notify(&mut self, level: Level, message: String) {
        let notification = self.notifier.notify(level, message);
        self.view.notify(&notification);
    }

    fn apply_frame(&mut self, frame: Frame) {
        self.view.show_state(frame.state);
        self.view.set_readout(Readout::FaceCount, frame.face_count);
        self.view
            .set_readout(Readout::ProcessingTime, frame.processing_time);
        self.view.clear_table();
        for row in frame.rows {
            self.view.append_row(row);
        }
    }

    fn sync_parameters(&mut self) {
        for (parameter, readout) in [
            (Parameter::MinSize, Readout::MinSize),
            (Parameter::ScaleFactor, Readout::ScaleFactor),
            (Parameter::MinNeighbors, Readout::MinNeighbors),
        ] {
            self.view
                .set_readout(readout, self.panel.display_text(parameter));
        }
    }

    /// A request still in flight for a replaced image keeps the button busy
    /// until it comes back, so there is never more than one.
    fn sync_detect_button(&mut self) {
        let busy = self.in_flight.is_some();
        self.view
            .set_detect_enabled(self.asset.is_some() && !busy, busy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{HttpResponse, RequestMode};
    use crate::view::RetainedView;

    struct Unreachable;

    fn refused(url: &str) -> Error {
        Error::Transport {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        }
    }

    impl Transport for Unreachable {
        fn post_form(&self, url: &str, _form: &DetectionForm, _mode: RequestMode) -> Result<HttpResponse> {
            Err(refused(url))
        }

        fn get(&self, url: &str) -> Result<HttpResponse> {
            Err(refused(url))
        }
    }

    struct NoSamples;

    impl SampleSource for NoSamples {
        fn fetch(&self, file_name: &str) -> Result<SelectedFile> {
            Err(Error::FetchFailed {
                name: file_name.to_string(),
                reason: "not found".to_string(),
            })
        }
    }

    fn session() -> Session<Unreachable, NoSamples, RetainedView> {
        Session::new(
            DetectionClient::new(Unreachable, "http://svc/api"),
            Uploader::new(NoSamples),
            RetainedView::new(),
        )
    }

    #[test]
    fn starts_empty_with_balanced_readouts() {
        let session = session();
        let view = session.view();
        assert_eq!(view.state(), ViewState::Empty);
        assert!(!view.detect_enabled());
        assert_eq!(view.readout(Readout::MinSize), Some("20"));
        assert_eq!(view.readout(Readout::ScaleFactor), Some("1.10"));
        assert_eq!(view.readout(Readout::MinNeighbors), Some("4"));
    }

    #[test]
    fn detect_without_image_is_a_no_op() {
        let mut session = session();
        assert!(session.begin_detection().is_none());
        assert!(!session.detect().unwrap());
        assert_eq!(session.state(), ViewState::Empty);
    }

    #[test]
    fn preset_updates_readouts_and_toasts() {
        let mut session = session();
        session.apply_preset(Preset::Accuracy);

        assert_eq!(session.params(), Preset::Accuracy.parameters());
        assert_eq!(session.view().readout(Readout::ScaleFactor), Some("1.05"));
        let last = session.notifications().last().unwrap();
        assert_eq!(last.level, Level::Success);
        assert_eq!(last.message, "Preset applied: Accuracy");
    }

    #[test]
    fn failed_sample_load_only_toasts() {
        let mut session = session();
        assert!(matches!(
            session.load_sample("portrait"),
            Err(Error::FetchFailed { .. })
        ));
        assert!(matches!(
            session.load_sample("selfie"),
            Err(Error::UnknownSample(_))
        ));
        assert_eq!(session.state(), ViewState::Empty);
        assert!(session.asset().is_none());
        assert_eq!(session.view().notifications().len(), 2);
    }

    #[test]
    fn offline_status_badge() {
        let mut session = session();
        assert!(matches!(session.check_api_status(), ApiStatus::Offline(_)));
        assert_eq!(session.view().api_status().label(), "API Offline");
    }
}
