/*!

The things a worker can do to the external side of a managed object. Two implementations exist:
`rest` drives an HTTP API described by an OpenAPI document, `chart` installs a Helm chart.

!*/

pub(crate) mod chart;
mod error;
pub(crate) mod rest;

pub(crate) use error::{BackendError, BackendResult};

use async_trait::async_trait;
use model::ResourceDocument;

#[async_trait]
pub(crate) trait ExternalResourceBackend: Send + Sync {
    /// Reads the external resource and records what was found in the object's status. Returns
    /// `false` when the external resource does not exist. A drift error means it exists but
    /// differs from the desired state.
    async fn observe(&self, document: &ResourceDocument) -> BackendResult<bool>;

    async fn create(&self, document: &ResourceDocument) -> BackendResult<()>;

    async fn update(&self, document: &ResourceDocument) -> BackendResult<()>;

    /// Removes the external resource and releases the object for deletion.
    async fn delete(&self, document: &ResourceDocument) -> BackendResult<()>;
}
