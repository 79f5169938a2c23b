use crate::clients::error::{self, Result};
use crate::{Gvk, Gvr};
use kube::core::ApiResource;
use kube::discovery::{pinned_group, pinned_kind};
use kube::Client;
use log::trace;
use snafu::{OptionExt, ResultExt};

/// Resolves the API resource serving a kind or a plural resource name.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    async fn resolve_kind(&self, gvk: &Gvk) -> Result<ApiResource>;

    async fn resolve_resource(&self, gvr: &Gvr) -> Result<ApiResource>;
}

/// Asks the API server on every call. Nothing is cached since installing a CRD can change the
/// answer.
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Discovery for KubeDiscovery {
    async fn resolve_kind(&self, gvk: &Gvk) -> Result<ApiResource> {
        trace!("discovering resource for kind {}", gvk);
        let (api_resource, _) = pinned_kind(&self.client, &gvk.to_kube())
            .await
            .context(error::DiscoverySnafu {
                what: gvk.to_string(),
            })?;
        Ok(api_resource)
    }

    async fn resolve_resource(&self, gvr: &Gvr) -> Result<ApiResource> {
        trace!("discovering resource {}", gvr);
        let group = pinned_group(&self.client, &gvr.group_version())
            .await
            .context(error::DiscoverySnafu {
                what: gvr.to_string(),
            })?;
        Ok(group
            .versioned_resources(&gvr.version)
            .into_iter()
            .map(|(api_resource, _)| api_resource)
            .find(|api_resource| api_resource.plural == gvr.resource)
            .context(error::UnknownResourceSnafu {
                what: gvr.to_string(),
            })?)
    }
}
