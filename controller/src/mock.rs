//! In-memory stand-ins for the Kubernetes store and the backends, used by tests.

use crate::backend::{BackendError, BackendResult, ExternalResourceBackend};
use async_trait::async_trait;
use model::clients::{self, ResourceStore};
use model::{Gvk, ObjectRef, ResourceDocument};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Builds a namespaced document in the `default` namespace.
pub(crate) fn document(api_version: &str, kind: &str, name: &str, spec: Value) -> ResourceDocument {
    ResourceDocument::from_value(json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": { "name": name, "namespace": "default", "uid": format!("uid-{}", name) },
        "spec": spec,
    }))
    .unwrap()
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<ObjectRef, ResourceDocument>>,
    status_updates: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn with(documents: Vec<ResourceDocument>) -> Self {
        let store = Self::default();
        for document in documents {
            store.insert(document);
        }
        store
    }

    pub(crate) fn insert(&self, document: ResourceDocument) {
        let key = document.object_ref().unwrap();
        self.objects.lock().unwrap().insert(key, document);
    }

    pub(crate) fn remove(&self, object_ref: &ObjectRef) {
        self.objects.lock().unwrap().remove(object_ref);
    }

    pub(crate) fn document(&self, object_ref: &ObjectRef) -> ResourceDocument {
        self.objects.lock().unwrap()[object_ref].clone()
    }

    pub(crate) fn status_updates(&self) -> usize {
        self.status_updates.load(Ordering::SeqCst)
    }

    fn replace<F>(&self, document: &ResourceDocument, merge: F) -> clients::Result<ResourceDocument>
    where
        F: FnOnce(&ResourceDocument, &ResourceDocument) -> ResourceDocument,
    {
        let key = document.object_ref()?;
        let mut objects = self.objects.lock().unwrap();
        let existing = objects
            .get(&key)
            .ok_or_else(|| clients::Error::not_found(key.to_string()))?;
        let merged = merge(existing, document);
        objects.insert(key, merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, object_ref: &ObjectRef) -> clients::Result<ResourceDocument> {
        self.objects
            .lock()
            .unwrap()
            .get(object_ref)
            .cloned()
            .ok_or_else(|| clients::Error::not_found(object_ref.to_string()))
    }

    async fn list(
        &self,
        gvk: &Gvk,
        namespace: Option<&str>,
    ) -> clients::Result<Vec<ResourceDocument>> {
        let api_version = gvk.api_version();
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.api_version == api_version && key.kind == gvk.kind)
            .filter(|(key, _)| namespace.map_or(true, |ns| key.namespace == ns))
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn update(&self, document: &ResourceDocument) -> clients::Result<ResourceDocument> {
        self.replace(document, |existing, new| {
            let mut merged = new.clone();
            merged.remove_field(&["status"]);
            if let Ok(status) = existing.get_field(&["status"]) {
                merged.set_field(&["status"], status.clone()).unwrap();
            }
            merged
        })
    }

    async fn update_status(
        &self,
        document: &ResourceDocument,
    ) -> clients::Result<ResourceDocument> {
        self.status_updates.fetch_add(1, Ordering::SeqCst);
        self.replace(document, |existing, new| {
            let mut merged = existing.clone();
            merged.set_field(&["status"], new.status_fields()).unwrap();
            merged
        })
    }

    async fn add_finalizer(
        &self,
        finalizer: &str,
        document: &ResourceDocument,
    ) -> clients::Result<ResourceDocument> {
        self.replace(document, |existing, _| {
            let mut merged = existing.clone();
            let mut finalizers = merged.finalizers();
            finalizers.push(finalizer.to_string());
            merged.set_field(&["metadata", "finalizers"], finalizers).unwrap();
            merged
        })
    }
}

/// A backend that records calls and answers from a script. Unscripted calls succeed and
/// `observe` reports the resource as present.
#[derive(Default)]
pub(crate) struct MockBackend {
    pub(crate) observe_results: Mutex<VecDeque<BackendResult<bool>>>,
    pub(crate) create_results: Mutex<VecDeque<BackendResult<()>>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockBackend {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

/// An error that is neither absence nor drift, like a `503` from the API.
pub(crate) fn unavailable_error() -> BackendError {
    BackendError::ChartFailed {
        command: "upgrade".to_string(),
        stderr: "503 Service Unavailable".to_string(),
    }
}

#[async_trait]
impl ExternalResourceBackend for MockBackend {
    async fn observe(&self, _: &ResourceDocument) -> BackendResult<bool> {
        self.record("observe");
        self.observe_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(true))
    }

    async fn create(&self, _: &ResourceDocument) -> BackendResult<()> {
        self.record("create");
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn update(&self, _: &ResourceDocument) -> BackendResult<()> {
        self.record("update");
        Ok(())
    }

    async fn delete(&self, _: &ResourceDocument) -> BackendResult<()> {
        self.record("delete");
        Ok(())
    }
}
