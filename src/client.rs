//! The detection client: builds the multipart request, calls the service and
//! normalizes what comes back.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::params::{form_value, Parameter};
use crate::types::{Detection, DetectionParameters, DetectionResult, Face, ImageAsset};

pub const IMAGE_FIELD: &str = "image";

/// How a request presents itself to cross-origin gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Announce an origin and ask for CORS handling.
    Cors,
    /// Plain request with no origin headers; used for the single retry.
    Relaxed,
}

/// Status line and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything the multipart body carries, kept as plain data so a retry can
/// rebuild the request.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionForm {
    pub file_name: String,
    pub mime_type: String,
    pub image: Vec<u8>,
    pub text_fields: Vec<(&'static str, String)>,
}

impl DetectionForm {
    pub fn new(asset: &ImageAsset, params: DetectionParameters) -> Self {
        let text_fields = Parameter::ALL
            .iter()
            .map(|p| (p.field_name(), form_value(&params, *p)))
            .collect();
        Self {
            file_name: asset.name.clone(),
            mime_type: asset.mime_type.clone(),
            image: asset.raw_bytes.to_vec(),
            text_fields,
        }
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.text_fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value.as_str())
    }
}

/// The HTTP seam. Implementations report "could not reach the server" as
/// [`Error::Transport`]; any received response, whatever its status, is `Ok`.
/// A response whose body cannot be read is [`Error::ResponseBody`], which is
/// never retried since the server already saw the request.
pub trait Transport {
    fn post_form(&self, url: &str, form: &DetectionForm, mode: RequestMode) -> Result<HttpResponse>;

    fn get(&self, url: &str) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post_form(&self, url: &str, form: &DetectionForm, mode: RequestMode) -> Result<HttpResponse> {
        (**self).post_form(url, form, mode)
    }

    fn get(&self, url: &str) -> Result<HttpResponse> {
        (**self).get(url)
    }
}

/// Reachability of the service, shown as a status badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    Unknown,
    Online,
    Offline(String),
    Error(u16),
}

impl ApiStatus {
    pub fn label(&self) -> String {
        match self {
            ApiStatus::Unknown => "Checking API...".to_string(),
            ApiStatus::Online => "API Ready".to_string(),
            ApiStatus::Offline(_) => "API Offline".to_string(),
            ApiStatus::Error(status) => format!("API Error ({status})"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectionClient<T> {
    transport: T,
    base_url: String,
}

impl<T: Transport> DetectionClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn detect_url(&self) -> String {
        format!("{}/detect", self.base_url)
    }

    /// Detect faces in `asset` with `params`.
    pub fn detect(&self, asset: &ImageAsset, params: DetectionParameters) -> Result<Detection> {
        self.run(&DetectionForm::new(asset, params))
    }

    /// Send a prepared form. One strict attempt, then one relaxed retry if the
    /// first never reached the server.
    pub fn run(&self, form: &DetectionForm) -> Result<Detection> {
        let url = self.detect_url();
        let started = Instant::now();
        debug!(
            %url,
            file = %form.file_name,
            bytes = form.image.len(),
            fields = ?form.text_fields,
            "sending detection request"
        );

        let response = match self.transport.post_form(&url, form, RequestMode::Cors) {
            Err(Error::Transport { reason, .. }) => {
                warn!(%url, %reason, "request failed, retrying in relaxed mode");
                self.transport.post_form(&url, form, RequestMode::Relaxed)?
            }
            other => other?,
        };
        debug!(status = response.status, "detection response received");

        let result = decode_response(&response)?;
        let elapsed = started.elapsed();
        info!(
            faces = result.face_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "detection finished"
        );
        Ok(Detection { result, elapsed })
    }

    /// Probe `{base}/health`.
    pub fn health(&self) -> ApiStatus {
        let url = format!("{}/health", self.base_url);
        match self.transport.get(&url) {
            Ok(response) if response.is_success() => ApiStatus::Online,
            Ok(response) => ApiStatus::Error(response.status),
            Err(e) => ApiStatus::Offline(e.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    face_count: Option<u32>,
    #[serde(default, rename = "faceCount")]
    face_count_camel: Option<u32>,
    faces: Vec<Face>,
}

/// Turn a raw response into a [`DetectionResult`].
///
/// Accepts `face_count` or `faceCount` for the count. Missing or conflicting
/// counts and missing `faces` are rejected rather than read as zero.
pub fn decode_response(response: &HttpResponse) -> Result<DetectionResult> {
    if !response.is_success() {
        return Err(Error::ServiceError {
            status: response.status,
            body: response.body.clone(),
        });
    }

    let envelope: Envelope = serde_json::from_str(&response.body)
        .map_err(|e| Error::MalformedResponse(e.to_string()))?;
    if !envelope.success {
        return Err(Error::DetectionRejected {
            message: envelope.message.unwrap_or_default(),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| Error::MalformedResponse("missing `data`".to_string()))?;
    let face_count = match (data.face_count, data.face_count_camel) {
        (Some(snake), Some(camel)) if snake != camel => {
            return Err(Error::MalformedResponse(format!(
                "conflicting face counts: face_count={snake}, faceCount={camel}"
            )));
        }
        (Some(count), _) | (None, Some(count)) => count,
        (None, None) => {
            return Err(Error::MalformedResponse(
                "missing `face_count`/`faceCount`".to_string(),
            ));
        }
    };
    if face_count as usize != data.faces.len() {
        warn!(
            face_count,
            faces = data.faces.len(),
            "face count does not match number of faces"
        );
    }

    Ok(DetectionResult {
        face_count,
        faces: data.faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Arc;

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    #[test]
    fn decodes_snake_and_camel_counts_identically() {
        let snake = decode_response(&ok(
            r#"{"success":true,"data":{"face_count":2,"faces":[{"x":10,"y":10,"width":50,"height":50},{"x":200,"y":80,"width":40,"height":60}]}}"#,
        ))
        .unwrap();
        let camel = decode_response(&ok(
            r#"{"success":true,"data":{"faceCount":2,"faces":[{"x":10,"y":10,"width":50,"height":50},{"x":200,"y":80,"width":40,"height":60}]}}"#,
        ))
        .unwrap();

        assert_eq!(snake, camel);
        assert_eq!(snake.face_count, 2);
        assert_eq!(snake.faces[1], Face::new(200, 80, 40, 60));
    }

    #[test]
    fn non_success_status_is_service_error() {
        let err = decode_response(&HttpResponse::new(500, "boom")).unwrap_err();
        assert!(matches!(err, Error::ServiceError { status: 500, ref body } if body == "boom"));
    }

    #[test]
    fn success_false_is_rejection() {
        let err = decode_response(&ok(r#"{"success":false,"message":"Invalid input: empty file"}"#))
            .unwrap_err();
        assert!(
            matches!(err, Error::DetectionRejected { ref message } if message == "Invalid input: empty file")
        );
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        for body in [
            "not json",
            r#"{"success":true}"#,
            r#"{"success":true,"data":{"faces":[]}}"#,
            r#"{"success":true,"data":{"face_count":0}}"#,
            r#"{"success":true,"data":{"face_count":1,"faceCount":2,"faces":[]}}"#,
        ] {
            let err = decode_response(&ok(body)).unwrap_err();
            assert!(matches!(err, Error::MalformedResponse(_)), "{body}: {err}");
        }
    }

    #[test]
    fn agreeing_duplicate_counts_are_fine() {
        let result = decode_response(&ok(
            r#"{"success":true,"message":"ok","timestamp":"2025-06-04T10:30:00","data":{"face_count":0,"faceCount":0,"faces":[]}}"#,
        ))
        .unwrap();
        assert_eq!(result.face_count, 0);
        assert!(result.faces.is_empty());
    }

    /// Replays canned outcomes and records the modes it was called with.
    struct Scripted {
        outcomes: RefCell<Vec<Result<HttpResponse>>>,
        modes: RefCell<Vec<RequestMode>>,
    }

    impl Scripted {
        fn new(mut outcomes: Vec<Result<HttpResponse>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: RefCell::new(outcomes),
                modes: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn post_form(&self, _url: &str, _form: &DetectionForm, mode: RequestMode) -> Result<HttpResponse> {
            self.modes.borrow_mut().push(mode);
            self.outcomes.borrow_mut().pop().expect("no scripted outcome left")
        }

        fn get(&self, _url: &str) -> Result<HttpResponse> {
            self.outcomes.borrow_mut().pop().expect("no scripted outcome left")
        }
    }

    fn unreachable() -> Error {
        Error::Transport {
            url: "http://localhost:8080/api/face-detection/detect".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    fn form() -> DetectionForm {
        DetectionForm {
            file_name: "a.png".to_string(),
            mime_type: "image/png".to_string(),
            image: vec![1, 2, 3],
            text_fields: vec![("minSize", "20".to_string())],
        }
    }

    const EMPTY_OK: &str = r#"{"success":true,"data":{"face_count":0,"faces":[]}}"#;

    #[test]
    fn transport_failure_retries_once_relaxed() {
        let transport = Scripted::new(vec![Err(unreachable()), Ok(ok(EMPTY_OK))]);
        let client = DetectionClient::new(&transport, "http://svc/api/");

        let detection = client.run(&form()).unwrap();
        assert_eq!(detection.result.face_count, 0);
        assert_eq!(
            *transport.modes.borrow(),
            vec![RequestMode::Cors, RequestMode::Relaxed]
        );
    }

    #[test]
    fn second_transport_failure_is_surfaced() {
        let transport = Scripted::new(vec![Err(unreachable()), Err(unreachable())]);
        let client = DetectionClient::new(&transport, "http://svc/api");

        let err = client.run(&form()).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(transport.modes.borrow().len(), 2);
    }

    #[test]
    fn http_errors_are_not_retried() {
        let transport = Scripted::new(vec![Ok(HttpResponse::new(503, "down"))]);
        let client = DetectionClient::new(&transport, "http://svc/api");

        assert!(matches!(
            client.run(&form()).unwrap_err(),
            Error::ServiceError { status: 503, .. }
        ));
        assert_eq!(*transport.modes.borrow(), vec![RequestMode::Cors]);
    }

    #[test]
    fn unreadable_body_is_not_retried() {
        let transport = Scripted::new(vec![
            Err(Error::ResponseBody {
                url: "http://svc/api/detect".to_string(),
                reason: "connection reset".to_string(),
            }),
            Ok(ok(EMPTY_OK)),
        ]);
        let client = DetectionClient::new(&transport, "http://svc/api");

        let err = client.run(&form()).unwrap_err();
        assert!(matches!(err, Error::ResponseBody { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::ServiceFailure);
        assert_eq!(*transport.modes.borrow(), vec![RequestMode::Cors]);
    }

    #[test]
    fn health_maps_to_status() {
        let transport = Scripted::new(vec![
            Ok(ok("Face Detection API is running!")),
            Ok(HttpResponse::new(502, "")),
            Err(unreachable()),
        ]);
        let client = DetectionClient::new(&transport, "http://svc/api");

        assert_eq!(client.health(), ApiStatus::Online);
        assert_eq!(client.health(), ApiStatus::Error(502));
        assert!(matches!(client.health(), ApiStatus::Offline(_)));
    }

    #[test]
    fn form_carries_parameters_as_text() {
        let preview = Arc::new(image::RgbaImage::new(1, 1));
        let asset = ImageAsset {
            name: "photo.jpg".to_string(),
            raw_bytes: Arc::from(vec![9u8, 9, 9]),
            mime_type: "image/jpeg".to_string(),
            natural_width: 1,
            natural_height: 1,
            byte_size: 3,
            preview,
        };
        let form = DetectionForm::new(
            &asset,
            DetectionParameters {
                min_size: 30,
                scale_factor: 1.15,
                min_neighbors: 3,
            },
        );

        assert_eq!(form.image, vec![9, 9, 9]);
        assert_eq!(form.text_field("minSize"), Some("30"));
        assert_eq!(form.text_field("scaleFactor"), Some("1.15"));
        assert_eq!(form.text_field("minNeighbors"), Some("3"));
    }
}
