use crate::ObjectRef;
use kube::core::{ApiResource, DynamicObject};
use serde_json::Value;

/// Accessors for the untyped objects that watches and dynamic API calls hand out.
pub trait CrdExt {
    /// `metadata.name`, or `""` when the server left it out.
    fn name_or_empty(&self) -> &str;

    fn namespace_or_empty(&self) -> &str;

    /// The reference of this object as an instance of `resource`. Items in list responses do not
    /// always carry `apiVersion` and `kind`, so those come from `resource`.
    fn object_ref_for(&self, resource: &ApiResource) -> ObjectRef {
        ObjectRef::new(
            &resource.api_version,
            &resource.kind,
            self.name_or_empty(),
            self.namespace_or_empty(),
        )
    }

    /// The `spec` subtree, `Null` when absent.
    fn spec(&self) -> Value;

    fn finalizer_list(&self) -> &[String];

    /// Has someone requested that the object be deleted.
    fn is_delete_requested(&self) -> bool;
}

impl CrdExt for DynamicObject {
    fn name_or_empty(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn namespace_or_empty(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    fn spec(&self) -> Value {
        self.data.get("spec").cloned().unwrap_or(Value::Null)
    }

    fn finalizer_list(&self) -> &[String] {
        self.metadata.finalizers.as_deref().unwrap_or_default()
    }

    fn is_delete_requested(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[test]
fn list_items_take_their_type_from_the_resource() {
    let resource = ApiResource {
        group: "composer.dev".to_string(),
        version: "v1alpha1".to_string(),
        api_version: "composer.dev/v1alpha1".to_string(),
        kind: "Repo".to_string(),
        plural: "repos".to_string(),
    };
    let object: DynamicObject = serde_json::from_value(serde_json::json!({
        "metadata": { "name": "demo", "namespace": "team", "finalizers": ["a"] },
        "spec": { "size": 1 },
    }))
    .unwrap();
    assert_eq!(
        object.object_ref_for(&resource),
        ObjectRef::new("composer.dev/v1alpha1", "Repo", "demo", "team")
    );
    assert_eq!(object.spec(), serde_json::json!({ "size": 1 }));
    assert_eq!(object.finalizer_list(), ["a".to_string()]);
    assert!(!object.is_delete_requested());
}
