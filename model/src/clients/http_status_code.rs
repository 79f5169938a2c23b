pub use http::StatusCode;

/// Classifies an error by the HTTP status the API server answered with, if it answered at all.
pub trait HttpStatusCode {
    fn status_code(&self) -> Option<StatusCode>;

    /// The object the request was about does not exist.
    fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND)
    }
}

impl HttpStatusCode for kube::Error {
    fn status_code(&self) -> Option<StatusCode> {
        match self {
            kube::Error::Api(response) => StatusCode::from_u16(response.code).ok(),
            _ => None,
        }
    }
}

#[test]
fn api_errors_carry_their_status() {
    let missing = kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: "repos.composer.dev \"demo\" not found".to_string(),
        reason: "NotFound".to_string(),
        code: 404,
    });
    assert!(missing.is_not_found());

    let conflict = kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: "the object has been modified".to_string(),
        reason: "Conflict".to_string(),
        code: 409,
    });
    assert_eq!(conflict.status_code(), Some(StatusCode::CONFLICT));
    assert!(!conflict.is_not_found());
}
