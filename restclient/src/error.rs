use serde::Deserialize;
use snafu::Snafu;

/// The `Result` type returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The public error type returned by this crate.
#[derive(Debug, Snafu)]
pub struct Error(InnerError);

/// How the controller should react to an `Error`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The API description could not be read or parsed.
    Load,
    /// The API description refers to things it does not declare.
    Validation,
    /// The resource descriptor and the API description do not agree. Retrying will not help.
    Configuration,
    /// The backend says the object does not exist.
    NotFound,
    /// The request failed on the way or the backend rejected it.
    Transport,
}

/// The error body some APIs return with a failed request.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    #[serde(default)]
    pub type_key: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub event_id: Option<i64>,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            InnerError::ReadFile { .. }
            | InnerError::Fetch { .. }
            | InnerError::ParseJson { .. }
            | InnerError::ParseYaml { .. } => ErrorKind::Load,
            InnerError::UnresolvedReference { .. } | InnerError::NoServers {} => {
                ErrorKind::Validation
            }
            InnerError::OperationNotFound { .. }
            | InnerError::NoSuccessCode { .. }
            | InnerError::MissingParameter { .. }
            | InnerError::UnresolvedAction { .. }
            | InnerError::UnsupportedMethod { .. }
            | InnerError::InvalidUrl { .. } => ErrorKind::Configuration,
            InnerError::NotFound { .. } | InnerError::NoMatch { .. } => ErrorKind::NotFound,
            InnerError::Request { .. }
            | InnerError::Api { .. }
            | InnerError::UnexpectedStatus { .. }
            | InnerError::Decode { .. } => ErrorKind::Transport,
        }
    }

    /// The backend reported that the object does not exist, or a find-by scan found no match.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The structured error body returned by the backend, if there was one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match &self.0 {
            InnerError::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The HTTP status code the backend answered with, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match &self.0 {
            InnerError::NotFound { .. } => Some(404),
            InnerError::Api { status, .. } | InnerError::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// The private error type returned by this crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum InnerError {
    #[snafu(display("Unable to read API description '{}': {}", origin, source))]
    ReadFile {
        origin: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to fetch API description '{}': {}", origin, source))]
    Fetch {
        origin: String,
        source: reqwest::Error,
    },

    #[snafu(display("Unable to parse API description '{}' as JSON: {}", origin, source))]
    ParseJson {
        origin: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to parse API description '{}' as YAML: {}", origin, source))]
    ParseYaml {
        origin: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to resolve reference '{}'", reference))]
    UnresolvedReference { reference: String },

    #[snafu(display("The API description does not declare a server"))]
    NoServers {},

    #[snafu(display("Operation '{} {}' is not declared in the API description", method, path))]
    OperationNotFound { method: String, path: String },

    #[snafu(display("Operation '{} {}' declares no 2xx response", method, path))]
    NoSuccessCode { method: String, path: String },

    #[snafu(display("Required {} parameter '{}' is missing", placement, name))]
    MissingParameter { name: String, placement: String },

    #[snafu(display("No verb description for action '{}'", action))]
    UnresolvedAction { action: String },

    #[snafu(display("Unsupported HTTP method '{}'", method))]
    UnsupportedMethod { method: String },

    #[snafu(display("Invalid URL '{}': {}", url, source))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[snafu(display("Request '{} {}' failed: {}", method, url, source))]
    Request {
        method: String,
        url: String,
        source: reqwest::Error,
    },

    #[snafu(display("'{}' not found", url))]
    NotFound { url: String },

    #[snafu(display("No element of '{}' matches the request", url))]
    NoMatch { url: String },

    #[snafu(display("'{}' answered {}: {}", url, status, error.message))]
    Api {
        url: String,
        status: u16,
        error: ApiError,
    },

    #[snafu(display("'{}' answered {}: {}", url, status, body))]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[snafu(display("Unable to decode the response of '{}': {}", url, source))]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}
