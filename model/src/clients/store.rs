use crate::clients::discovery::Discovery;
use crate::clients::error::{self, Result};
use crate::{CrdExt, Gvk, ObjectRef, ResourceDocument};
use json_patch::{AddOperation, PatchOperation, TestOperation};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::{Api, Client};
use log::trace;
use serde_json::json;
use snafu::{ensure, ResultExt};

/// Reads and writes the managed objects. Every call goes to the source of truth, documents are
/// never cached.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetches the live object. Fails with a not-found error when it no longer exists.
    async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceDocument>;

    /// Lists every object of `gvk`, limited to `namespace` if one is given.
    async fn list(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Vec<ResourceDocument>>;

    /// Replaces everything but `status`.
    async fn update(&self, document: &ResourceDocument) -> Result<ResourceDocument>;

    /// Replaces `status`.
    async fn update_status(&self, document: &ResourceDocument) -> Result<ResourceDocument>;

    /// Adds `finalizer`, failing if `document` already carries it.
    async fn add_finalizer(
        &self,
        finalizer: &str,
        document: &ResourceDocument,
    ) -> Result<ResourceDocument>;
}

/// A `ResourceStore` backed by the Kubernetes API server.
pub struct KubeStore<D> {
    client: Client,
    discovery: D,
}

impl<D> KubeStore<D>
where
    D: Discovery,
{
    pub fn new(client: Client, discovery: D) -> Self {
        Self { client, discovery }
    }

    async fn api(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Api<DynamicObject>> {
        let api_resource = self.discovery.resolve_kind(gvk).await?;
        Ok(match namespace.filter(|ns| !ns.is_empty()) {
            Some(namespace) => {
                Api::namespaced_with(self.client.clone(), namespace, &api_resource)
            }
            None => Api::all_with(self.client.clone(), &api_resource),
        })
    }

    async fn api_for(&self, document: &ResourceDocument) -> Result<Api<DynamicObject>> {
        self.api(&document.gvk()?, document.namespace()).await
    }

    async fn patch(
        &self,
        document: &ResourceDocument,
        operations: Vec<PatchOperation>,
        description: &str,
    ) -> Result<ResourceDocument> {
        let name = document.name()?;
        let patch = json_patch::Patch(operations);
        let object = self
            .api_for(document)
            .await?
            .patch(
                name,
                &PatchParams::default(),
                &Patch::<DynamicObject>::Json(patch),
            )
            .await
            .context(error::RequestSnafu {
                operation: description,
                what: name,
            })?;
        Ok(ResourceDocument::from_dynamic(&object)?)
    }
}

#[async_trait::async_trait]
impl<D> ResourceStore for KubeStore<D>
where
    D: Discovery,
{
    async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceDocument> {
        trace!("getting {}", object_ref);
        let namespace = Some(object_ref.namespace.as_str());
        let object = self
            .api(&object_ref.gvk()?, namespace)
            .await?
            .get(&object_ref.name)
            .await
            .context(error::RequestSnafu {
                operation: "Get",
                what: object_ref.to_string(),
            })?;
        Ok(ResourceDocument::from_dynamic(&object)?)
    }

    async fn list(&self, gvk: &Gvk, namespace: Option<&str>) -> Result<Vec<ResourceDocument>> {
        trace!("listing {}", gvk);
        let objects = self
            .api(gvk, namespace)
            .await?
            .list(&ListParams::default())
            .await
            .context(error::RequestSnafu {
                operation: "List",
                what: gvk.to_string(),
            })?;
        let mut documents = Vec::with_capacity(objects.items.len());
        for object in &objects.items {
            let mut document = ResourceDocument::from_dynamic(object)?;
            // List items may omit their type.
            if document.api_version().is_err() || document.kind().is_err() {
                document.set_field(&["apiVersion"], gvk.api_version())?;
                document.set_field(&["kind"], gvk.kind.as_str())?;
            }
            documents.push(document);
        }
        Ok(documents)
    }

    async fn update(&self, document: &ResourceDocument) -> Result<ResourceDocument> {
        let name = document.name()?;
        trace!("updating {}", name);
        let object = self
            .api_for(document)
            .await?
            .replace(name, &PostParams::default(), &document.to_dynamic()?)
            .await
            .context(error::RequestSnafu {
                operation: "Update",
                what: name,
            })?;
        Ok(ResourceDocument::from_dynamic(&object)?)
    }

    async fn update_status(&self, document: &ResourceDocument) -> Result<ResourceDocument> {
        let name = document.name()?;
        trace!("updating status of {}", name);
        let data = serde_json::to_vec(document).context(error::ConvertSnafu { what: name })?;
        let object = self
            .api_for(document)
            .await?
            .replace_status(name, &PostParams::default(), data)
            .await
            .context(error::RequestSnafu {
                operation: "Status update",
                what: name,
            })?;
        Ok(ResourceDocument::from_dynamic(&object)?)
    }

    /// Appends `finalizer` with a JSON patch. When the object already has finalizers the patch
    /// first tests that the list is unchanged.
    async fn add_finalizer(
        &self,
        finalizer: &str,
        document: &ResourceDocument,
    ) -> Result<ResourceDocument> {
        let object = document.to_dynamic()?;
        let current = object.finalizer_list();
        trace!("adding finalizer {} to {}", finalizer, object.name_or_empty());
        ensure!(
            !current.iter().any(|f| f == finalizer),
            error::DuplicateFinalizerSnafu {
                what: object.name_or_empty(),
                finalizer,
            }
        );

        let operations = if current.is_empty() {
            vec![PatchOperation::Add(AddOperation {
                path: "/metadata/finalizers".to_string(),
                value: json!([finalizer]),
            })]
        } else {
            vec![
                PatchOperation::Test(TestOperation {
                    path: "/metadata/finalizers".to_string(),
                    value: json!(current),
                }),
                PatchOperation::Add(AddOperation {
                    path: "/metadata/finalizers/-".to_string(),
                    value: json!(finalizer),
                }),
            ]
        };
        self.patch(document, operations, "Finalizer patch").await
    }
}
