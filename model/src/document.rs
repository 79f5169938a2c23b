use crate::constants::{ANNOTATION_LAST_APPLIED, ANNOTATION_VERBOSE};
use crate::error::{self, Result};
use crate::{Gvk, ObjectRef};
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt};

/// An untyped Kubernetes object: `apiVersion`, `kind`, `metadata`, `spec` and `status` held as a
/// JSON tree. Reads fail with a field-not-found error instead of returning an empty value, so
/// callers have to decide what absence means.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceDocument(Map<String, Value>);

impl ResourceDocument {
    pub fn new(object: Map<String, Value>) -> Self {
        Self(object)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self(object)),
            _ => error::RootNotObjectSnafu.fail().map_err(Into::into),
        }
    }

    pub fn from_dynamic(object: &DynamicObject) -> Result<Self> {
        let value = serde_json::to_value(object).context(error::SerdeSnafu {
            what: "dynamic object",
        })?;
        Self::from_value(value)
    }

    pub fn to_dynamic(&self) -> Result<DynamicObject> {
        Ok(
            serde_json::from_value(Value::Object(self.0.clone())).context(error::SerdeSnafu {
                what: "resource document",
            })?,
        )
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the value at `path`, e.g. `&["spec", "name"]`.
    pub fn get_field(&self, path: &[&str]) -> Result<&Value> {
        let mut current = &self.0;
        let (last, parents) = path.split_last().context(error::FieldNotFoundSnafu {
            path: String::new(),
        })?;
        for (i, segment) in parents.iter().enumerate() {
            current = current
                .get(*segment)
                .context(error::FieldNotFoundSnafu {
                    path: join(&path[..=i]),
                })?
                .as_object()
                .context(error::FieldTypeSnafu {
                    path: join(&path[..=i]),
                    expected: "object",
                })?;
        }
        Ok(current
            .get(*last)
            .context(error::FieldNotFoundSnafu { path: join(path) })?)
    }

    pub fn get_string(&self, path: &[&str]) -> Result<&str> {
        Ok(self
            .get_field(path)?
            .as_str()
            .context(error::FieldTypeSnafu {
                path: join(path),
                expected: "string",
            })?)
    }

    pub fn get_map(&self, path: &[&str]) -> Result<&Map<String, Value>> {
        Ok(self
            .get_field(path)?
            .as_object()
            .context(error::FieldTypeSnafu {
                path: join(path),
                expected: "object",
            })?)
    }

    /// Sets the value at `path`, creating intermediate objects. Fails when an intermediate value
    /// exists but is not an object.
    pub fn set_field<V>(&mut self, path: &[&str], value: V) -> Result<()>
    where
        V: Into<Value>,
    {
        let (last, parents) = path.split_last().context(error::FieldNotFoundSnafu {
            path: String::new(),
        })?;
        let mut current = &mut self.0;
        for (i, segment) in parents.iter().enumerate() {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if entry.is_null() {
                *entry = Value::Object(Map::new());
            }
            current = entry.as_object_mut().context(error::NotAnObjectSnafu {
                path: join(path),
                parent: join(&path[..=i]),
            })?;
        }
        current.insert(last.to_string(), value.into());
        Ok(())
    }

    /// Removes the value at `path` and returns it, if it existed.
    pub fn remove_field(&mut self, path: &[&str]) -> Option<Value> {
        let (last, parents) = path.split_last()?;
        let mut current = &mut self.0;
        for segment in parents {
            current = current.get_mut(*segment)?.as_object_mut()?;
        }
        current.remove(*last)
    }

    /// The desired state. An absent `spec` reads as empty.
    pub fn spec_fields(&self) -> Map<String, Value> {
        self.get_map(&["spec"]).cloned().unwrap_or_default()
    }

    /// The observed state. An absent `status` reads as empty.
    pub fn status_fields(&self) -> Map<String, Value> {
        self.get_map(&["status"]).cloned().unwrap_or_default()
    }

    pub fn api_version(&self) -> Result<&str> {
        self.get_string(&["apiVersion"])
    }

    pub fn kind(&self) -> Result<&str> {
        self.get_string(&["kind"])
    }

    pub fn name(&self) -> Result<&str> {
        self.get_string(&["metadata", "name"])
    }

    /// Cluster-scoped objects have no namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.get_string(&["metadata", "namespace"]).ok()
    }

    pub fn gvk(&self) -> Result<Gvk> {
        Gvk::from_api_version(self.api_version()?, self.kind()?)
    }

    pub fn object_ref(&self) -> Result<ObjectRef> {
        Ok(ObjectRef::new(
            self.api_version()?,
            self.kind()?,
            self.name()?,
            self.namespace().unwrap_or_default(),
        ))
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.get_string(&["metadata", "annotations", key]).ok()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.get_string(&["metadata", "labels", key]).ok()
    }

    /// Whether the object asks for request and response bodies to be logged.
    pub fn is_verbose(&self) -> bool {
        self.annotation(ANNOTATION_VERBOSE)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn finalizers(&self) -> Vec<String> {
        self.get_field(&["metadata", "finalizers"])
            .ok()
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    pub fn clear_finalizers(&mut self) -> Result<()> {
        self.set_field(&["metadata", "finalizers"], Value::Array(Vec::new()))
    }

    pub fn is_delete_requested(&self) -> bool {
        self.get_field(&["metadata", "deletionTimestamp"])
            .map(|v| !v.is_null())
            .unwrap_or(false)
    }

    /// Drops server-managed bookkeeping that must not flow into backend requests.
    pub fn strip_transient_metadata(&mut self) {
        self.remove_field(&["metadata", "annotations", ANNOTATION_LAST_APPLIED]);
        self.remove_field(&["metadata", "creationTimestamp"]);
        self.remove_field(&["metadata", "generation"]);
        self.remove_field(&["metadata", "uid"]);
    }
}

fn join(path: &[&str]) -> String {
    path.join(".")
}
