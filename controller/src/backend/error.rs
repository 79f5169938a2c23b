use snafu::Snafu;

pub(crate) type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum BackendError {
    #[snafu(display("No definition for kind '{}' in group '{}'", kind, group))]
    DefinitionNotFound { group: String, kind: String },

    #[snafu(display(
        "Found {} definitions for kind '{}' in group '{}', expected exactly one",
        count,
        kind,
        group
    ))]
    AmbiguousDefinition {
        count: usize,
        group: String,
        kind: String,
    },

    #[snafu(display("Unable to parse definition '{}': {}", name, source))]
    DefinitionParse {
        name: String,
        source: serde_json::Error,
    },

    #[snafu(display("Missing field '{}' in {}", field, what))]
    MissingField { field: String, what: String },

    #[snafu(display("Unknown authentication type '{}'", auth_type))]
    UnknownAuthType { auth_type: String },

    #[snafu(display("No '{}' matches the value of field '{}'", kind, field))]
    NoReferenceFound { field: String, kind: String },

    #[snafu(display("Invalid owner references: {}", source))]
    OwnerReferences { source: serde_json::Error },

    #[snafu(display("Unable to {}: {}", operation, source))]
    Store {
        operation: String,
        source: model::clients::Error,
    },

    #[snafu(display("{}", source))]
    Document { source: model::Error },

    #[snafu(display("Unable to {}: {}", operation, source))]
    RestClient {
        operation: String,
        source: restclient::Error,
    },

    #[snafu(display("Field '{}' differs from the external resource", field))]
    Drift { field: String },

    #[snafu(display("Compared field '{}' is missing from the response", field))]
    ComparisonField { field: String },

    #[snafu(display("Unable to run helm {}: {}", command, source))]
    ChartCommand {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("helm {} failed: {}", command, stderr))]
    ChartFailed { command: String, stderr: String },

    #[snafu(display("Unable to write chart values: {}", source))]
    ChartValues { source: std::io::Error },

    #[snafu(display("Unable to serialize chart values: {}", source))]
    ChartValuesSerialize { source: serde_yaml::Error },

    #[snafu(display("Unable to parse helm {} output: {}", command, source))]
    ChartOutput {
        command: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to parse rendered manifest: {}", source))]
    Manifest { source: serde_yaml::Error },

    #[snafu(display(
        "No chart definition labelled for '{}' in namespace '{}'",
        resource,
        namespace
    ))]
    ChartDefinitionNotFound { resource: String, namespace: String },

    #[snafu(display(
        "Found {} chart definitions labelled for '{}' in namespace '{}', expected exactly one",
        count,
        resource,
        namespace
    ))]
    AmbiguousChartDefinition {
        count: usize,
        resource: String,
        namespace: String,
    },
}

impl BackendError {
    /// The external resource is missing, or does not match the desired state. Both are answered
    /// with an update.
    pub(crate) fn is_not_found(&self) -> bool {
        match self {
            BackendError::RestClient { source, .. } => source.is_not_found(),
            BackendError::Drift { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn is_drift(&self) -> bool {
        matches!(self, BackendError::Drift { .. })
    }
}

impl From<model::Error> for BackendError {
    fn from(source: model::Error) -> Self {
        BackendError::Document { source }
    }
}

#[test]
fn drift_reads_as_not_found() {
    let drift = BackendError::Drift {
        field: "size".to_string(),
    };
    assert!(drift.is_not_found());
    assert!(drift.is_drift());
    let missing = BackendError::MissingField {
        field: "token".to_string(),
        what: "bearer credentials".to_string(),
    };
    assert!(!missing.is_not_found());
}
