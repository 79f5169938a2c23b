use crate::clients::{HttpStatusCode, StatusCode};
use crate::Error as DocumentError;
use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// An error talking to the cluster. Use [`HttpStatusCode`] to tell absence from other failures.
#[derive(Debug, Snafu)]
pub struct Error(ClientError);

impl Error {
    /// Absence of `what`, reported the way the API server would report it. Stores that are not
    /// backed by the API server use this so callers can treat both alike.
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Error(ClientError::Missing { what: what.into() })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub(crate) enum ClientError {
    #[snafu(display("{}", source))]
    Document { source: DocumentError },

    #[snafu(display("Unable to convert {} to an API object: {}", what, source))]
    Convert {
        what: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to create a Kubernetes client: {}", source))]
    Initialization { source: kube::Error },

    #[snafu(display("Discovery of '{}' failed: {}", what, source))]
    Discovery { what: String, source: kube::Error },

    #[snafu(display("No resource in the cluster matches '{}'", what))]
    UnknownResource { what: String },

    #[snafu(display("{} of {} failed: {}", operation, what, source))]
    Request {
        operation: String,
        what: String,
        source: kube::Error,
    },

    #[snafu(display("{} not found", what))]
    Missing { what: String },

    #[snafu(display("{} already carries the finalizer '{}'", what, finalizer))]
    DuplicateFinalizer { what: String, finalizer: String },
}

impl From<DocumentError> for Error {
    fn from(e: DocumentError) -> Self {
        Error(ClientError::Document { source: e })
    }
}

impl HttpStatusCode for Error {
    fn status_code(&self) -> Option<StatusCode> {
        match &self.0 {
            ClientError::Request { source, .. } => source.status_code(),
            ClientError::Missing { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }
}

#[test]
fn missing_objects_read_as_not_found() {
    let e = Error::not_found("composer.dev/v1alpha1.Repo as demo@default");
    assert!(e.is_not_found());
    assert_eq!(
        e.to_string(),
        "composer.dev/v1alpha1.Repo as demo@default not found"
    );
}
