//! End-to-end session behaviour with a scripted transport and the retained view.

use std::cell::RefCell;
use std::io::Cursor;

use facedetect_client::{
    DetectionClient, DetectionForm, Error, ErrorKind, HttpResponse, Level, Readout, RenderOutcome,
    RequestMode, Result, RetainedView, SampleDir, SelectedFile, Session, Size, TableRow,
    Transport, Uploader, ViewState, MAX_IMAGE_BYTES, NO_FACES,
};
use image::{DynamicImage, ImageFormat, RgbImage};

const BASE_URL: &str = "http://localhost:8080/api/face-detection";

const TWO_FACES: &str = r#"{"success":true,"message":"Face detection completed successfully","data":{"face_count":2,"faces":[{"x":10,"y":10,"width":50,"height":50},{"x":200,"y":80,"width":40,"height":60}]}}"#;
const TWO_FACES_CAMEL: &str = r#"{"success":true,"data":{"faceCount":2,"faces":[{"x":10,"y":10,"width":50,"height":50},{"x":200,"y":80,"width":40,"height":60}]}}"#;
const NO_FACES_BODY: &str = r#"{"success":true,"data":{"face_count":0,"faces":[]}}"#;

/// Replays canned outcomes in order and records every request.
#[derive(Default)]
struct Scripted {
    outcomes: RefCell<Vec<Result<HttpResponse>>>,
    sent: RefCell<Vec<(String, DetectionForm, RequestMode)>>,
}

impl Scripted {
    fn new(mut outcomes: Vec<Result<HttpResponse>>) -> Self {
        outcomes.reverse();
        Self {
            outcomes: RefCell::new(outcomes),
            sent: RefCell::new(Vec::new()),
        }
    }

    fn ok(body: &str) -> Self {
        Self::new(vec![Ok(HttpResponse::new(200, body))])
    }
}

impl Transport for Scripted {
    fn post_form(&self, url: &str, form: &DetectionForm, mode: RequestMode) -> Result<HttpResponse> {
        self.sent
            .borrow_mut()
            .push((url.to_string(), form.clone(), mode));
        self.outcomes
            .borrow_mut()
            .pop()
            .expect("no scripted outcome left")
    }

    fn get(&self, _url: &str) -> Result<HttpResponse> {
        self.outcomes
            .borrow_mut()
            .pop()
            .expect("no scripted outcome left")
    }
}

fn refused() -> Error {
    Error::Transport {
        url: format!("{BASE_URL}/detect"),
        reason: "connection refused".to_string(),
    }
}

fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([90, 120, 150])));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

fn png(name: &str, width: u32, height: u32) -> SelectedFile {
    SelectedFile::new(name, "image/png", encoded(width, height, ImageFormat::Png))
}

fn session_with(
    transport: Scripted,
    samples: SampleDir,
) -> Session<Scripted, SampleDir, RetainedView> {
    Session::new(
        DetectionClient::new(transport, BASE_URL),
        Uploader::new(samples),
        RetainedView::new(),
    )
}

fn session(transport: Scripted) -> Session<Scripted, SampleDir, RetainedView> {
    session_with(transport, SampleDir::new("does-not-exist"))
}

fn face_areas(view: &RetainedView) -> Vec<String> {
    view.rows().iter().map(|row| row.cells()[5].clone()).collect()
}

#[test]
fn two_faces_fill_table_and_overlay() {
    let mut session = session(Scripted::ok(TWO_FACES));
    session.select(png("group.png", 320, 240)).unwrap();
    assert_eq!(session.state(), ViewState::Preview);
    assert!(session.view().detect_enabled());
    assert_eq!(session.view().readout(Readout::ImageSize), Some("320×240"));

    session.set_display_size(Size::new(160, 120));
    assert!(session.detect().unwrap());

    let view = session.view();
    assert_eq!(view.state(), ViewState::Results);
    assert_eq!(view.readout(Readout::FaceCount), Some("2"));
    assert!(view.readout(Readout::ProcessingTime).unwrap().ends_with("ms"));
    assert_eq!(face_areas(view), vec!["2,500 px²", "2,400 px²"]);
    assert_eq!(
        view.rows()[1],
        TableRow::Face {
            index: 2,
            x: 200,
            y: 80,
            width: 40,
            height: 60,
            area: 2400,
        }
    );

    assert_eq!(view.overlay().size(), Size::new(160, 120));
    assert!(!view.overlay().is_blank());
    assert!(view.detect_enabled());
    assert_eq!(view.notifications().last().unwrap().level, Level::Success);

    let sent = session.client().transport().sent.borrow();
    assert_eq!(sent.len(), 1);
    let (url, form, mode) = &sent[0];
    assert_eq!(url, &format!("{BASE_URL}/detect"));
    assert_eq!(*mode, RequestMode::Cors);
    assert_eq!(form.file_name, "group.png");
    assert_eq!(form.mime_type, "image/png");
    assert_eq!(form.text_field("minSize"), Some("20"));
    assert_eq!(form.text_field("scaleFactor"), Some("1.1"));
    assert_eq!(form.text_field("minNeighbors"), Some("4"));
}

#[test]
fn camel_case_count_is_equivalent() {
    let mut snake = session(Scripted::ok(TWO_FACES));
    let mut camel = session(Scripted::ok(TWO_FACES_CAMEL));
    for session in [&mut snake, &mut camel] {
        session.select(png("a.png", 320, 240)).unwrap();
        session.set_display_size(Size::new(320, 240));
        session.detect().unwrap();
    }

    assert_eq!(
        snake.view().readout(Readout::FaceCount),
        camel.view().readout(Readout::FaceCount)
    );
    assert_eq!(snake.view().rows(), camel.view().rows());
    assert_eq!(snake.view().overlay().image(), camel.view().overlay().image());
}

#[test]
fn zero_faces_show_placeholder_and_blank_overlay() {
    let mut session = session(Scripted::ok(NO_FACES_BODY));
    session.select(png("empty.png", 64, 64)).unwrap();
    session.set_display_size(Size::new(64, 64));
    session.detect().unwrap();

    let view = session.view();
    assert_eq!(view.state(), ViewState::Results);
    assert_eq!(view.readout(Readout::FaceCount), Some("0"));
    assert_eq!(view.rows(), &[TableRow::Placeholder]);
    assert_eq!(view.rows()[0].cells(), vec![NO_FACES]);
    assert!(view.overlay().is_blank());
}

#[test]
fn server_error_returns_to_preview() {
    let mut session = session(Scripted::new(vec![Ok(HttpResponse::new(500, "boom"))]));
    session.select(png("a.png", 32, 32)).unwrap();
    session.set_display_size(Size::new(32, 32));

    let err = session.detect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceFailure);

    let view = session.view();
    assert_eq!(view.state(), ViewState::Preview);
    assert!(view.rows().is_empty());
    assert_eq!(view.readout(Readout::FaceCount), Some("0"));
    assert_eq!(view.readout(Readout::ProcessingTime), Some("-"));
    assert!(view.overlay().is_blank());
    assert!(view.detect_enabled());

    let toast = view.notifications().last().unwrap();
    assert_eq!(toast.level, Level::Error);
    assert_eq!(toast.message, "Server error: HTTP 500: boom");
}

#[test]
fn rejection_and_connectivity_messages() {
    let mut session = session(Scripted::new(vec![
        Ok(HttpResponse::new(
            200,
            r#"{"success":false,"message":"Invalid input: empty file"}"#,
        )),
        Err(refused()),
        Err(refused()),
    ]));
    session.select(png("a.png", 32, 32)).unwrap();

    session.detect().unwrap_err();
    assert_eq!(
        session.view().notifications().last().unwrap().message,
        "Error: Invalid input: empty file"
    );

    let err = session.detect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    let message = &session.view().notifications().last().unwrap().message;
    assert!(message.contains(BASE_URL), "{message}");

    let modes: Vec<RequestMode> = session
        .client()
        .transport()
        .sent
        .borrow()
        .iter()
        .map(|(_, _, mode)| *mode)
        .collect();
    assert_eq!(
        modes,
        vec![RequestMode::Cors, RequestMode::Cors, RequestMode::Relaxed]
    );
}

#[test]
fn relaxed_retry_recovers() {
    let mut session = session(Scripted::new(vec![
        Err(refused()),
        Ok(HttpResponse::new(200, TWO_FACES)),
    ]));
    session.select(png("a.png", 320, 240)).unwrap();
    session.set_display_size(Size::new(320, 240));

    assert!(session.detect().unwrap());
    assert_eq!(session.view().readout(Readout::FaceCount), Some("2"));
    assert_eq!(session.client().transport().sent.borrow().len(), 2);
}

#[test]
fn invalid_input_keeps_detection_disabled() {
    let mut session = session(Scripted::default());

    let err = session
        .select(SelectedFile::new("notes.txt", "text/plain", b"hello".to_vec()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidType { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let too_big = vec![0u8; MAX_IMAGE_BYTES as usize + 1];
    let err = session
        .select(SelectedFile::new("huge.png", "image/png", too_big))
        .unwrap_err();
    assert!(matches!(err, Error::TooLarge { .. }));

    let err = session
        .select(SelectedFile::new("broken.png", "image/png", vec![1, 2, 3]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let view = session.view();
    assert_eq!(view.state(), ViewState::Empty);
    assert!(!view.detect_enabled());
    assert!(view.image().is_none());
    assert_eq!(view.notifications().len(), 3);
    assert!(view.notifications().iter().all(|n| n.level == Level::Error));
}

#[test]
fn invalid_input_keeps_previous_image() {
    let mut session = session(Scripted::default());
    session.select(png("a.png", 32, 32)).unwrap();
    session
        .select(SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec()))
        .unwrap_err();

    assert_eq!(session.asset().unwrap().name, "a.png");
    assert_eq!(session.state(), ViewState::Preview);
    assert!(session.view().detect_enabled());
}

#[test]
fn second_detect_while_busy_is_ignored() {
    let mut session = session(Scripted::default());
    session.select(png("a.png", 32, 32)).unwrap();

    let job = session.begin_detection().unwrap();
    assert_eq!(session.state(), ViewState::Loading);
    assert!(session.view().busy());
    assert!(!session.view().detect_enabled());

    assert!(session.begin_detection().is_none());
    assert!(!session.detect().unwrap());
    assert!(session.client().transport().sent.borrow().is_empty());

    let applied = session.complete_detection(job.ticket, Err(refused()));
    assert!(applied.is_err());
    assert_eq!(session.state(), ViewState::Preview);
    assert!(session.begin_detection().is_some());
}

#[test]
fn render_waits_for_display_size() {
    let transport = Scripted::ok(TWO_FACES);
    let mut session = session(transport);
    session.select(png("a.png", 320, 240)).unwrap();

    let job = session.begin_detection().unwrap();
    let outcome = session.client().run(&job.form);
    assert!(session.complete_detection(job.ticket, outcome).unwrap());
    assert_eq!(session.state(), ViewState::Results);
    assert!(session.view().overlay().size().is_empty());

    assert_eq!(
        session.set_display_size(Size::new(640, 480)),
        Some(RenderOutcome::Drawn(2))
    );
    assert_eq!(session.view().overlay().size(), Size::new(640, 480));
    assert!(!session.view().overlay().is_blank());
}

#[test]
fn resize_redraws_at_new_scale() {
    let mut session = session(Scripted::ok(TWO_FACES));
    session.select(png("a.png", 320, 240)).unwrap();
    session.set_display_size(Size::new(320, 240));
    session.detect().unwrap();
    let before = session.view().overlay().image().clone();

    assert_eq!(
        session.set_display_size(Size::new(160, 120)),
        Some(RenderOutcome::Drawn(2))
    );
    assert_eq!(session.view().overlay().size(), Size::new(160, 120));
    assert_ne!(session.view().overlay().image(), &before);

    // Same size again draws the same pixels.
    let after = session.view().overlay().image().clone();
    session.set_display_size(Size::new(160, 120));
    assert_eq!(session.view().overlay().image(), &after);
}

#[test]
fn response_for_replaced_image_is_discarded() {
    let mut session = session(Scripted::ok(TWO_FACES));
    session.select(png("first.png", 320, 240)).unwrap();
    let job = session.begin_detection().unwrap();

    session.select(png("second.png", 100, 100)).unwrap();
    session.set_display_size(Size::new(100, 100));
    assert_eq!(session.state(), ViewState::Preview);
    assert!(!session.view().detect_enabled());

    let outcome = session.client().run(&job.form);
    assert!(!session.complete_detection(job.ticket, outcome).unwrap());

    let view = session.view();
    assert_eq!(view.state(), ViewState::Preview);
    assert!(view.rows().is_empty());
    assert!(view.overlay().is_blank());
    assert!(view.detect_enabled());
    assert!(!view.busy());
    assert!(session.detection().is_none());
}

#[test]
fn new_image_clears_previous_results() {
    let mut session = session(Scripted::ok(TWO_FACES));
    session.select(png("a.png", 320, 240)).unwrap();
    session.set_display_size(Size::new(320, 240));
    session.detect().unwrap();

    session.select(png("b.png", 50, 40)).unwrap();
    let view = session.view();
    assert_eq!(view.state(), ViewState::Preview);
    assert!(view.rows().is_empty());
    assert_eq!(view.readout(Readout::FaceCount), Some("0"));
    assert_eq!(view.readout(Readout::ImageSize), Some("50×40"));
    assert!(view.overlay().is_blank());
    assert!(session.detection().is_none());
}

#[test]
fn samples_load_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("portrait.jpg"),
        encoded(48, 64, ImageFormat::Jpeg),
    )
    .unwrap();

    let mut session = session_with(Scripted::default(), SampleDir::new(dir.path()));
    session.load_sample("portrait").unwrap();

    let asset = session.asset().unwrap();
    assert_eq!(asset.name, "portrait.jpg");
    assert_eq!(asset.mime_type, "image/jpeg");
    assert_eq!(asset.natural_size(), Size::new(48, 64));
    assert_eq!(
        session.view().notifications().last().unwrap().message,
        "Loaded sample: portrait"
    );

    let err = session.load_sample("group").unwrap_err();
    assert!(matches!(err, Error::FetchFailed { .. }));
    assert_eq!(session.asset().unwrap().name, "portrait.jpg");
}

#[test]
fn select_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, encoded(20, 10, ImageFormat::Png)).unwrap();

    let mut session = session(Scripted::default());
    session.select_path(&path).unwrap();
    assert_eq!(session.asset().unwrap().mime_type, "image/png");

    let err = session.select_path(&dir.path().join("missing.png")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Local);
}
