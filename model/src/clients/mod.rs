mod discovery;
mod error;
mod http_status_code;
mod store;

pub use discovery::{Discovery, KubeDiscovery};
pub use error::{Error, Result};
pub use http_status_code::{HttpStatusCode, StatusCode};
pub use store::{KubeStore, ResourceStore};

/// Creates a Kubernetes client from in-cluster variables or `KUBECONFIG`.
pub async fn new_k8s_client() -> Result<kube::Client> {
    use snafu::ResultExt;
    kube::Client::try_default()
        .await
        .context(error::InitializationSnafu)
        .map_err(Into::into)
}
