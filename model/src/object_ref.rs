use crate::error::Result;
use crate::Gvk;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifies a single Kubernetes object. This is the key the controller's work queue uses, and
/// the value recorded as `status.failedObjectRef`.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl ObjectRef {
    pub fn new<S1, S2, S3, S4>(api_version: S1, kind: S2, name: S3, namespace: S4) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn gvk(&self) -> Result<Gvk> {
        Gvk::from_api_version(&self.api_version, &self.kind)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} as {}@{}",
            self.api_version, self.kind, self.name, self.namespace
        )
    }
}

#[test]
fn object_ref_display() {
    let r = ObjectRef::new("composer.dev/v1alpha1", "Repo", "demo", "default");
    assert_eq!(r.to_string(), "composer.dev/v1alpha1.Repo as demo@default");
}

#[test]
fn object_ref_serde() {
    let r: ObjectRef = serde_json::from_value(serde_json::json!({
        "apiVersion": "v1",
        "kind": "Service",
        "name": "web",
    }))
    .unwrap();
    assert_eq!(r, ObjectRef::new("v1", "Service", "web", ""));
    assert_eq!(r.gvk().unwrap().kind, "Service");
}
