use crate::Gvk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the controller wants to do with the external resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Get,
    List,
    FindBy,
}

serde_plain::derive_display_from_serialize!(Action);
serde_plain::derive_fromstr_from_deserialize!(Action);

/// Maps one `Action` to an HTTP method and a path of the API description.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbsDescription {
    pub action: String,
    pub method: String,
    pub path: String,
    /// Renames resource fields to the names the API expects.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub alt_field_mapping: BTreeMap<String, String>,
}

impl VerbsDescription {
    pub fn matches(&self, action: Action) -> bool {
        self.action.eq_ignore_ascii_case(&action.to_string())
    }
}

/// Describes how a resource kind is managed through an API.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub kind: String,
    /// Status fields whose presence means the external resource is known.
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub verbs_description: Vec<VerbsDescription>,
    /// Fields compared between spec and the API response to detect drift.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare_list: Vec<String>,
}

impl ResourceDescriptor {
    pub fn verb(&self, action: Action) -> Option<&VerbsDescription> {
        self.verbs_description.iter().find(|v| v.matches(action))
    }
}

/// Points at the kind that owns a resource, and the spec field holding the owner's identifier.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceInfo {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub group_version_kind: Gvk,
}

/// Credentials sent with every API request.
#[derive(Clone, Eq, PartialEq)]
pub enum AuthMethod {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            AuthMethod::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
        }
    }
}

/// The `resource` block of a definition.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionResource {
    #[serde(flatten)]
    pub descriptor: ResourceDescriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_refs: Vec<ReferenceInfo>,
}

/// The `spec` of a `Definition` object.
#[derive(Debug, Default, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSpec {
    pub resource_group: String,
    pub resource: DefinitionResource,
    /// Location of the OpenAPI document.
    pub swagger_path: String,
}

/// Everything needed to reconcile one resource through a REST API.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct RestDefinition {
    pub location: String,
    pub resource: ResourceDescriptor,
    pub owner_references: Vec<ReferenceInfo>,
}

impl From<DefinitionSpec> for RestDefinition {
    fn from(spec: DefinitionSpec) -> Self {
        Self {
            location: spec.swagger_path,
            resource: spec.resource.descriptor,
            owner_references: spec.resource.owner_refs,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn action_strings() {
        assert_eq!(Action::FindBy.to_string(), "findby");
        assert_eq!(Action::from_str("create").unwrap(), Action::Create);
        assert!(Action::from_str("patch").is_err());
    }

    #[test]
    fn verb_matching_ignores_case() {
        let descriptor = ResourceDescriptor {
            kind: "Repo".to_string(),
            verbs_description: vec![
                VerbsDescription {
                    action: "Create".to_string(),
                    method: "POST".to_string(),
                    path: "/repos".to_string(),
                    ..Default::default()
                },
                VerbsDescription {
                    action: "create".to_string(),
                    method: "PUT".to_string(),
                    path: "/other".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(descriptor.verb(Action::Create).unwrap().path, "/repos");
        assert!(descriptor.verb(Action::Delete).is_none());
    }

    #[test]
    fn definition_spec_from_json() {
        let spec: DefinitionSpec = serde_json::from_value(json!({
            "resourceGroup": "composer.dev",
            "swaggerPath": "https://example.com/openapi.yaml",
            "resource": {
                "kind": "Repo",
                "identifiers": ["id"],
                "verbsDescription": [
                    { "action": "get", "method": "GET", "path": "/repos/{id}",
                      "altFieldMapping": { "repoName": "name" } }
                ],
                "ownerRefs": [
                    { "field": "project", "groupVersionKind":
                        { "group": "composer.dev", "version": "v1alpha1", "kind": "Project" } }
                ]
            }
        }))
        .unwrap();
        let definition = RestDefinition::from(spec);
        assert_eq!(definition.location, "https://example.com/openapi.yaml");
        assert_eq!(definition.resource.identifiers, vec!["id"]);
        assert_eq!(
            definition.resource.verbs_description[0].alt_field_mapping["repoName"],
            "name"
        );
        assert_eq!(definition.owner_references[0].group_version_kind.kind, "Project");
    }

    #[test]
    fn auth_debug_hides_secrets() {
        let auth = AuthMethod::Basic {
            username: "me".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", auth).contains("hunter2"));
    }
}
