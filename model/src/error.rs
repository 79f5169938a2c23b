use snafu::Snafu;

#[derive(Debug, Snafu)]
pub struct Error(OpaqueError);
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The requested field does not exist in the document.
    pub fn is_field_not_found(&self) -> bool {
        matches!(self.0, OpaqueError::FieldNotFound { .. })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum OpaqueError {
    #[snafu(display("Field '{}' not found", path))]
    FieldNotFound { path: String },

    #[snafu(display("Field '{}' is not of type {}", path, expected))]
    FieldType { path: String, expected: &'static str },

    #[snafu(display("Unable to set field '{}': '{}' is not an object", path, parent))]
    NotAnObject { path: String, parent: String },

    #[snafu(display("The document root must be an object"))]
    RootNotObject {},

    #[snafu(display("Invalid apiVersion '{}'", api_version))]
    InvalidApiVersion { api_version: String },

    #[snafu(display("Error serializing {}: {}", what, source))]
    Serde {
        what: String,
        source: serde_json::Error,
    },
}
