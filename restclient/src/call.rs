use crate::error::{self, Result};
use crate::openapi::{ApiDescription, Method};
use model::text::generic_to_string;
use model::{Action, ResourceDescriptor};
use serde::Serialize;
use serde_json::{Map, Value};
use snafu::OptionExt;
use std::collections::{BTreeMap, BTreeSet};

/// The kind of call a resolved verb description is executed as.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ApiCall {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    List,
    /// A `List` followed by a scan of the listed elements for one matching the request.
    FindBy,
}

impl ApiCall {
    fn for_verb(action: Action, method: Method) -> Self {
        match (action, method) {
            (Action::FindBy, _) => ApiCall::FindBy,
            (Action::List, _) => ApiCall::List,
            (_, Method::Post) => ApiCall::Post,
            (_, Method::Put) => ApiCall::Put,
            (_, Method::Patch) => ApiCall::Patch,
            (_, Method::Delete) => ApiCall::Delete,
            (_, Method::Get | Method::Head | Method::Options) => ApiCall::Get,
        }
    }
}

/// What the API description says about the operation a verb description points at.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CallInfo {
    pub path: String,
    pub method: Method,
    pub path_params: BTreeSet<String>,
    pub query_params: BTreeSet<String>,
    pub body_fields: BTreeSet<String>,
    pub identifier_fields: Vec<String>,
    pub alt_field_mapping: BTreeMap<String, String>,
}

/// The concrete values of one request. Maps are ordered so equal inputs serialize identically.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfiguration {
    pub path_params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: BTreeMap<String, Value>,
}

impl RequestConfiguration {
    /// Path parameters first, then query parameters.
    pub fn parameters(&self) -> impl Iterator<Item = (&String, &String)> {
        self.path_params.iter().chain(self.query.iter())
    }
}

/// Finds the first verb description for `action` and resolves it against `description`.
pub fn resolve_call(
    descriptor: &ResourceDescriptor,
    action: Action,
    description: &ApiDescription,
) -> Result<(CallInfo, ApiCall)> {
    let verb = descriptor
        .verb(action)
        .context(error::UnresolvedActionSnafu {
            action: action.to_string(),
        })?;
    let method = Method::from_verb(&verb.method)?;
    let (path_params, query_params) = description.required_parameters(method, &verb.path)?;
    let body_fields = if method.has_body() {
        description.required_body_fields(method, &verb.path)?
    } else {
        BTreeSet::new()
    };
    let info = CallInfo {
        path: verb.path.clone(),
        method,
        path_params,
        query_params,
        body_fields,
        identifier_fields: descriptor.identifiers.clone(),
        alt_field_mapping: verb.alt_field_mapping.clone(),
    };
    Ok((info, ApiCall::for_verb(action, method)))
}

/// Sorts resource fields into path parameters, query parameters and body fields. Spec fields are
/// applied before status fields, so status wins when both carry a key. A field that the operation
/// does not declare is dropped.
pub fn build_request(
    info: &CallInfo,
    status: Option<&Map<String, Value>>,
    spec: Option<&Map<String, Value>>,
) -> RequestConfiguration {
    let mut request = RequestConfiguration::default();
    let fields = spec
        .into_iter()
        .flat_map(|m| m.iter())
        .chain(status.into_iter().flat_map(|m| m.iter()));
    for (key, value) in fields {
        let key = info
            .alt_field_mapping
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.clone());
        if info.path_params.contains(&key) {
            request.path_params.insert(key, generic_to_string(value));
        } else if info.query_params.contains(&key) {
            request.query.insert(key, generic_to_string(value));
        } else if info.body_fields.contains(&key) {
            request.body.insert(key, value.clone());
        }
    }
    request
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::btreemap;
    use model::VerbsDescription;
    use serde_json::json;

    const DESCRIPTION: &str = r#"{
        "servers": [{ "url": "http://localhost" }],
        "paths": {
            "/items": {
                "get": {
                    "parameters": [{ "name": "name", "in": "query" }],
                    "responses": { "200": {} }
                },
                "post": {
                    "requestBody": { "content": { "application/json": { "schema": {
                        "properties": { "id": {}, "size": {} }
                    }}}},
                    "responses": { "201": {} }
                }
            },
            "/items/{id}": {
                "get": {
                    "parameters": [{ "name": "id", "in": "path", "required": true }],
                    "responses": { "200": {} }
                },
                "delete": {
                    "parameters": [
                        { "name": "id", "in": "path", "required": true },
                        { "name": "api-version", "in": "query" }
                    ],
                    "requestBody": { "content": { "application/json": { "schema": {
                        "properties": { "force": {} }
                    }}}},
                    "responses": { "204": {} }
                }
            }
        }
    }"#;

    fn description() -> ApiDescription {
        ApiDescription::from_slice("test", DESCRIPTION.as_bytes()).unwrap()
    }

    fn verb(action: &str, method: &str, path: &str) -> VerbsDescription {
        VerbsDescription {
            action: action.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor {
            kind: "Item".to_string(),
            identifiers: vec!["id".to_string()],
            verbs_description: vec![
                verb("create", "POST", "/items"),
                verb("get", "GET", "/items/{id}"),
                verb("FindBy", "GET", "/items"),
                verb("delete", "DELETE", "/items/{id}"),
                verb("list", "GET", "/items"),
                verb("update", "PUT", "/items/{id}"),
            ],
            compare_list: vec![],
        }
    }

    #[test]
    fn resolves_declared_verbs() {
        let d = description();
        let (info, call) = resolve_call(&descriptor(), Action::Create, &d).unwrap();
        assert_eq!(call, ApiCall::Post);
        assert_eq!(info.path, "/items");
        assert_eq!(info.method, Method::Post);
        assert_eq!(info.body_fields.len(), 2);

        let (info, call) = resolve_call(&descriptor(), Action::FindBy, &d).unwrap();
        assert_eq!(call, ApiCall::FindBy);
        assert!(info.query_params.contains("name"));

        let (_, call) = resolve_call(&descriptor(), Action::List, &d).unwrap();
        assert_eq!(call, ApiCall::List);
        let (_, call) = resolve_call(&descriptor(), Action::Get, &d).unwrap();
        assert_eq!(call, ApiCall::Get);
    }

    #[test]
    fn body_only_for_methods_with_a_body() {
        let (info, call) = resolve_call(&descriptor(), Action::Delete, &description()).unwrap();
        assert_eq!(call, ApiCall::Delete);
        assert!(info.body_fields.is_empty());
    }

    #[test]
    fn undeclared_operation_is_a_configuration_error() {
        let err = resolve_call(&descriptor(), Action::Update, &description()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(!err.is_not_found());
    }

    #[test]
    fn missing_action() {
        let mut descriptor = descriptor();
        descriptor.verbs_description.retain(|v| v.action != "create");
        let err = resolve_call(&descriptor, Action::Create, &description()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(err.to_string().contains("create"));
    }

    #[test]
    fn create_request_from_spec() {
        let (info, _) = resolve_call(&descriptor(), Action::Create, &description()).unwrap();
        let spec = json!({ "id": "x" });
        let request = build_request(&info, None, spec.as_object());
        assert_eq!(request.body, btreemap! { "id".to_string() => json!("x") });
        assert!(request.path_params.is_empty());
        assert!(request.query.is_empty());
    }

    #[test]
    fn classification_and_precedence() {
        let (mut info, _) = resolve_call(&descriptor(), Action::Delete, &description()).unwrap();
        info.alt_field_mapping =
            btreemap! { "apiVersion".to_string() => "api-version".to_string() };
        let spec = json!({ "id": 7.9, "apiVersion": "7.1", "force": true, "ignored": "x" });
        let status = json!({ "id": "abc" });
        let request = build_request(&info, status.as_object(), spec.as_object());
        assert_eq!(
            request.path_params,
            btreemap! { "id".to_string() => "abc".to_string() }
        );
        assert_eq!(
            request.query,
            btreemap! { "api-version".to_string() => "7.1".to_string() }
        );
        assert!(request.body.is_empty());
    }

    #[test]
    fn stringified_parameters() {
        let (info, _) = resolve_call(&descriptor(), Action::Get, &description()).unwrap();
        let spec = json!({ "id": 7.9 });
        let request = build_request(&info, None, spec.as_object());
        assert_eq!(request.path_params["id"], "7");
    }

    #[test]
    fn build_is_deterministic() {
        let (info, _) = resolve_call(&descriptor(), Action::Create, &description()).unwrap();
        let spec = json!({ "size": 3, "id": "x", "other": [1, 2] });
        let status = json!({ "id": "y" });
        let first = build_request(&info, status.as_object(), spec.as_object());
        let second = build_request(&info, status.as_object(), spec.as_object());
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.body.len(), 2);
        assert_eq!(first.body["id"], json!("y"));
    }
}
