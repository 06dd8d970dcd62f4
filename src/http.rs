//! `reqwest`-backed implementations of the HTTP seams.

use std::path::Path;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, ORIGIN};
use tracing::debug;

use crate::client::{DetectionForm, HttpResponse, RequestMode, Transport, IMAGE_FIELD};
use crate::config::{Config, SampleLocation};
use crate::error::{Error, Result};
use crate::types::SelectedFile;
use crate::uploader::{mime_from_path, SampleDir, SampleSource};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// No request timeout: a slow detection on a large image is waited out.
fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(None)
        .build()
        .map_err(|e| Error::Transport {
            url: String::new(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

fn transport_error(url: &str, e: reqwest::Error) -> Error {
    Error::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn read_response(url: &str, response: Response) -> Result<HttpResponse> {
    let status = response.status().as_u16();
    let body = response.text().map_err(|e| Error::ResponseBody {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    Ok(HttpResponse { status, body })
}

/// Blocking HTTP transport. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    origin: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            origin: config.origin.clone(),
        })
    }

    fn multipart(form: &DetectionForm) -> Form {
        let image = Part::bytes(form.image.clone()).file_name(form.file_name.clone());
        let image = match image.mime_str(&form.mime_type) {
            Ok(part) => part,
            Err(e) => {
                debug!(mime = %form.mime_type, error = %e, "unusable MIME type, sending untyped part");
                Part::bytes(form.image.clone()).file_name(form.file_name.clone())
            }
        };

        form.text_fields
            .iter()
            .fold(Form::new().part(IMAGE_FIELD, image), |multipart, (name, value)| {
                multipart.text(*name, value.clone())
            })
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, url: &str, form: &DetectionForm, mode: RequestMode) -> Result<HttpResponse> {
        let mut request = self.client.post(url).multipart(Self::multipart(form));
        if mode == RequestMode::Cors {
            request = request
                .header(ORIGIN, self.origin.as_str())
                .header("Sec-Fetch-Mode", "cors");
        }
        debug!(%url, ?mode, "POST");

        let response = request.send().map_err(|e| transport_error(url, e))?;
        read_response(url, response)
    }

    fn get(&self, url: &str) -> Result<HttpResponse> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| transport_error(url, e))?;
        read_response(url, response)
    }
}

/// Samples served over HTTP from `{base_url}/{file_name}`.
#[derive(Debug, Clone)]
pub struct RemoteSamples {
    client: Client,
    base_url: String,
}

impl RemoteSamples {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl SampleSource for RemoteSamples {
    fn fetch(&self, file_name: &str) -> Result<SelectedFile> {
        let url = format!("{}/{}", self.base_url, file_name);
        let failed = |reason: String| Error::FetchFailed {
            name: file_name.to_string(),
            reason,
        };

        let response = self.client.get(&url).send().map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status} from {url}")));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .unwrap_or_else(|| mime_from_path(Path::new(file_name)).to_string());
        let bytes = response.bytes().map_err(|e| failed(e.to_string()))?;

        Ok(SelectedFile::new(file_name, mime_type, bytes.to_vec()))
    }
}

/// Either kind of sample source, picked from configuration.
#[derive(Debug, Clone)]
pub enum Samples {
    Dir(SampleDir),
    Remote(RemoteSamples),
}

impl Samples {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(match &config.samples {
            SampleLocation::Dir(path) => Samples::Dir(SampleDir::new(path.clone())),
            SampleLocation::Url(url) => Samples::Remote(RemoteSamples::new(url.clone())?),
        })
    }
}

impl SampleSource for Samples {
    fn fetch(&self, file_name: &str) -> Result<SelectedFile> {
        match self {
            Samples::Dir(dir) => dir.fetch(file_name),
            Samples::Remote(remote) => remote.fetch(file_name),
        }
    }
}
