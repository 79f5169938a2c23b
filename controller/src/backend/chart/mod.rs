/*!

Reconciles objects by installing a Helm chart, one release per object. The object's spec is the
release's values. An object is available when every object the chart renders to reports ready
conditions. The chart is either fixed or read from a labelled `Definition`.

!*/

mod helm;
mod source;

pub(crate) use helm::HelmCli;
pub(crate) use source::ChartSource;

use crate::backend::error::{self, BackendResult};
use crate::backend::ExternalResourceBackend;
use async_trait::async_trait;
use log::{debug, info, warn};
use model::clients::{HttpStatusCode, ResourceStore};
use model::condition::{available, creating, deleting, unavailable};
use model::constants::ANNOTATION_HELM_HOOK;
use model::{ObjectRef, ResourceDocument};
use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::sync::Arc;

/// Where to find a chart.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub(crate) struct ChartSpec {
    /// A chart reference as `helm` understands it: `repo/name`, a path or an OCI URL.
    pub(crate) url: String,
    pub(crate) version: Option<String>,
    pub(crate) repo: Option<String>,
}

/// One installation of a chart.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ReleaseSpec {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) chart: ChartSpec,
}

/// An installed release as `helm list` reports it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Deserialize)]
pub(crate) struct Release {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) chart: String,
}

#[async_trait]
pub(crate) trait ChartClient: Send + Sync {
    async fn find_release(&self, name: &str, namespace: &str) -> BackendResult<Option<Release>>;

    async fn install_or_upgrade(
        &self,
        release: &ReleaseSpec,
        values: &Map<String, Value>,
    ) -> BackendResult<()>;

    /// Renders the chart's manifests without installing anything.
    async fn template_render(
        &self,
        release: &ReleaseSpec,
        values: &Map<String, Value>,
    ) -> BackendResult<Vec<u8>>;

    async fn uninstall(&self, release: &ReleaseSpec) -> BackendResult<()>;
}

pub(crate) struct ChartBackend<S, C> {
    store: Arc<S>,
    charts: C,
    source: ChartSource,
}

impl<S, C> ChartBackend<S, C>
where
    S: ResourceStore,
    C: ChartClient,
{
    pub(crate) fn new(store: Arc<S>, charts: C, source: ChartSource) -> Self {
        Self {
            store,
            charts,
            source,
        }
    }

    async fn release(&self, document: &ResourceDocument) -> BackendResult<ReleaseSpec> {
        let chart = self.source.resolve(self.store.as_ref(), document).await?;
        release_of(document, chart)
    }

    /// Installs or upgrades the release and marks the object as being created.
    async fn install(&self, document: &ResourceDocument, verb: &str) -> BackendResult<()> {
        let release = self.release(document).await?;
        self.charts
            .install_or_upgrade(&release, &document.spec_fields())
            .await?;
        info!("{} release '{}' of '{}'", verb, release.name, release.chart.url);
        let mut document = document.clone();
        let status = document.status_fields();
        document.set_condition(creating())?;
        self.persist_status(&status, &document).await
    }

    /// The first rendered object that is missing or not ready.
    async fn first_unavailable(
        &self,
        children: &[ObjectRef],
    ) -> BackendResult<Option<ObjectRef>> {
        for child in children {
            match self.store.get(child).await {
                Ok(document) if document.is_available() => continue,
                Ok(_) => return Ok(Some(child.clone())),
                Err(e) if e.is_not_found() => return Ok(Some(child.clone())),
                Err(e) => {
                    return Err(e).context(error::StoreSnafu {
                        operation: format!("read '{}'", child),
                    })
                }
            }
        }
        Ok(None)
    }

    async fn persist_status(
        &self,
        before: &Map<String, Value>,
        document: &ResourceDocument,
    ) -> BackendResult<()> {
        if document.status_fields() == *before {
            return Ok(());
        }
        self.store
            .update_status(document)
            .await
            .context(error::StoreSnafu {
                operation: "update status",
            })?;
        Ok(())
    }
}

fn release_of(document: &ResourceDocument, chart: ChartSpec) -> BackendResult<ReleaseSpec> {
    Ok(ReleaseSpec {
        name: document.name()?.to_string(),
        namespace: document.namespace().unwrap_or("default").to_string(),
        chart,
    })
}

/// References to the objects in a multi-document manifest. Hooks are skipped, and objects without
/// a namespace are placed in `namespace`.
pub(crate) fn rendered_objects(
    manifest: &[u8],
    namespace: &str,
) -> BackendResult<Vec<ObjectRef>> {
    let mut objects = Vec::new();
    for doc in serde_yaml::Deserializer::from_slice(manifest) {
        let value = Value::deserialize(doc).context(error::ManifestSnafu)?;
        let object = match value.as_object() {
            Some(object) => object,
            None => continue,
        };
        let metadata = &object.get("metadata").cloned().unwrap_or_default();
        if metadata["annotations"].get(ANNOTATION_HELM_HOOK).is_some() {
            continue;
        }
        let field = |value: &Value| value.as_str().unwrap_or_default().to_string();
        let item_namespace = match field(&metadata["namespace"]) {
            ns if ns.is_empty() => namespace.to_string(),
            ns => ns,
        };
        objects.push(ObjectRef::new(
            field(&object["apiVersion"]),
            field(&object["kind"]),
            field(&metadata["name"]),
            item_namespace,
        ));
    }
    Ok(objects)
}

#[async_trait]
impl<S, C> ExternalResourceBackend for ChartBackend<S, C>
where
    S: ResourceStore,
    C: ChartClient,
{
    async fn observe(&self, document: &ResourceDocument) -> BackendResult<bool> {
        let release = self.release(document).await?;
        match self
            .charts
            .find_release(&release.name, &release.namespace)
            .await?
        {
            Some(installed) => debug!(
                "release '{}' of chart '{}' is {}",
                installed.name, installed.chart, installed.status
            ),
            None => {
                debug!("release '{}' is not installed", release.name);
                return Ok(false);
            }
        }

        let spec = document.spec_fields();
        let manifest = self.charts.template_render(&release, &spec).await?;
        let children = rendered_objects(&manifest, &release.namespace)?;

        let mut document = document.clone();
        let status = document.status_fields();
        match self.first_unavailable(&children).await? {
            Some(object_ref) => {
                debug!("{} is waiting for {}", release.name, object_ref);
                document.set_failed_object_ref(&object_ref)?;
                document.set_condition(unavailable())?;
            }
            None => {
                document.unset_failed_object_ref();
                document.set_condition(available())?;
            }
        }
        // Readiness is checked again on the next resync.
        self.persist_status(&status, &document).await?;
        Ok(true)
    }

    async fn create(&self, document: &ResourceDocument) -> BackendResult<()> {
        self.install(document, "installed").await
    }

    async fn update(&self, document: &ResourceDocument) -> BackendResult<()> {
        self.install(document, "upgraded").await
    }

    async fn delete(&self, document: &ResourceDocument) -> BackendResult<()> {
        // Uninstalling needs only the release name, so a chart that cannot be resolved any more
        // does not keep the object around.
        let release = match self.release(document).await {
            Ok(release) => release,
            Err(e) => {
                warn!("unable to resolve the chart of {}: {}", document.name()?, e);
                release_of(document, ChartSpec::default())?
            }
        };
        let mut document = document.clone();
        document.set_condition(deleting())?;
        match self.store.update_status(&document).await {
            Ok(updated) => document = updated,
            Err(e) => warn!("unable to record deletion of '{}': {}", release.name, e),
        }

        if let Err(e) = self.charts.uninstall(&release).await {
            warn!("unable to uninstall release '{}': {}", release.name, e);
        }

        document.clear_finalizers()?;
        match self.store.update(&document).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e).context(error::StoreSnafu {
                operation: "remove finalizers",
            }),
        }
    }
}
