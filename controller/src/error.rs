use crate::backend::BackendError;
use model::clients::HttpStatusCode;
use snafu::Snafu;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Unable to {} '{}': {}", event, object, source))]
    Backend {
        event: String,
        object: String,
        source: BackendError,
    },

    #[snafu(display("Unable to create the Kubernetes client: {}", source))]
    Client { source: model::clients::Error },

    #[snafu(display("Unable to read descriptor '{}': {}", path, source))]
    DescriptorRead {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse descriptor '{}': {}", path, source))]
    DescriptorParse {
        path: String,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to discover resource '{}': {}", resource, source))]
    Discovery {
        resource: String,
        source: model::clients::Error,
    },

    #[snafu(display("Invalid duration '{}'", input))]
    Duration { input: String },

    #[snafu(display("Invalid duration '{}': {}", input, source))]
    DurationNumber {
        input: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("Unable to fetch '{}': {}", object, source))]
    Fetch {
        object: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to add finalizer '{}' to '{}': {}", finalizer, object, source))]
    AddFinalizer {
        object: String,
        finalizer: String,
        source: model::clients::Error,
    },

    #[snafu(display("Unable to record the failure of '{}': {}", object, source))]
    MarkFailed {
        object: String,
        source: model::Error,
    },

    #[snafu(display("Unable to update the status of '{}': {}", object, source))]
    UpdateStatus {
        object: String,
        source: model::clients::Error,
    },

    #[snafu(display("Interval '{}' must be longer than zero", input))]
    ZeroInterval { input: String },

    #[snafu(display("Unable to build the HTTP client: {}", source))]
    HttpClient { source: reqwest::Error },
}

impl Error {
    /// The object the event was about no longer exists.
    pub(crate) fn is_gone(&self) -> bool {
        match self {
            Error::Fetch { source, .. } | Error::AddFinalizer { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    /// A short diagnostic suitable for a condition message.
    pub(crate) fn diagnostic(&self) -> String {
        match self {
            Error::Backend { source, .. } => source.to_string(),
            _ => self.to_string(),
        }
    }
}
