use thiserror::Error;

/// Where a failure belongs in the user-facing taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad file type or size, unknown sample, undecodable image.
    InvalidInput,
    /// The service could not be reached at all.
    TransportFailure,
    /// The service answered, but not with a usable result.
    ServiceFailure,
    /// Local I/O.
    Local,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported file type `{mime_type}`: please choose an image")]
    InvalidType { mime_type: String },

    #[error("image is too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("unknown sample image: {0}")]
    UnknownSample(String),

    #[error("failed to fetch sample `{name}`: {reason}")]
    FetchFailed { name: String, reason: String },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("cannot reach detection service at {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The status line arrived but the body could not be read.
    #[error("failed to read response from {url}: {reason}")]
    ResponseBody { url: String, reason: String },

    #[error("HTTP {status}: {body}")]
    ServiceError { status: u16, body: String },

    #[error("detection rejected: {message}")]
    DetectionRejected { message: String },

    #[error("malformed detection response: {0}")]
    MalformedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidType { .. }
            | Error::TooLarge { .. }
            | Error::UnknownSample(_)
            | Error::FetchFailed { .. }
            | Error::Decode(_) => ErrorKind::InvalidInput,
            Error::Transport { .. } => ErrorKind::TransportFailure,
            Error::ServiceError { .. }
            | Error::ResponseBody { .. }
            | Error::DetectionRejected { .. }
            | Error::MalformedResponse(_) => ErrorKind::ServiceFailure,
            Error::Io(_) => ErrorKind::Local,
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(value: image::ImageError) -> Self {
        Error::Decode(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
