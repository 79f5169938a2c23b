/*!

A resolved view of an OpenAPI 3.0 document. Only the parts needed to build requests are kept:
servers, parameters, request body properties and declared response codes. Every `$ref` is resolved
at load time, so a loaded `ApiDescription` is immutable and self-contained.

!*/

use crate::error::{self, Result};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

const JSON_CONTENT: &str = "application/json";
const MAX_REF_DEPTH: usize = 32;

/// An HTTP method an operation can be declared under.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

impl Method {
    /// Parses the method of a verb description. The pseudo methods `list` and `findby` are
    /// issued as `GET`.
    pub fn from_verb(method: &str) -> Result<Self> {
        Ok(match method.to_ascii_lowercase().as_str() {
            "get" | "list" | "findby" => Method::Get,
            "put" => Method::Put,
            "post" => Method::Post,
            "delete" => Method::Delete,
            "options" => Method::Options,
            "head" => Method::Head,
            "patch" => Method::Patch,
            _ => return error::UnsupportedMethodSnafu { method }.fail().map_err(Into::into),
        })
    }

    /// Only these methods send the body fields of a request.
    pub fn has_body(self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }

    pub(crate) fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Head => reqwest::Method::HEAD,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Head => "HEAD",
            Method::Patch => "PATCH",
        };
        f.write_str(s)
    }
}

/// Where a parameter goes in the request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl Display for ParameterLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
}

/// One declared `(method, path)` operation with its references resolved.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Operation {
    pub parameters: Vec<Parameter>,
    pub body_fields: BTreeSet<String>,
    /// Declared 2xx codes, in declaration order.
    pub success_codes: Vec<u16>,
}

impl Operation {
    fn names_in(&self, location: ParameterLocation) -> BTreeSet<String> {
        self.parameters
            .iter()
            .filter(|p| p.location == location)
            .map(|p| p.name.clone())
            .collect()
    }
}

/// A loaded and validated API description.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ApiDescription {
    servers: Vec<String>,
    operations: BTreeMap<(Method, String), Operation>,
}

impl ApiDescription {
    /// Loads a description from a file path, a `file://` URL or an `http(s)://` URL.
    pub async fn load(location: &str, http: &reqwest::Client) -> Result<Self> {
        debug!("loading API description '{}'", location);
        let bytes = if location.starts_with("http://") || location.starts_with("https://") {
            http.get(location)
                .send()
                .await
                .and_then(|response| response.error_for_status())
                .context(error::FetchSnafu { origin: location })?
                .bytes()
                .await
                .context(error::FetchSnafu { origin: location })?
                .to_vec()
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            tokio::fs::read(path)
                .await
                .context(error::ReadFileSnafu { origin: location })?
        };
        Self::from_slice(location, &bytes)
    }

    /// Parses a JSON or YAML document. `location` is only used in error messages.
    pub fn from_slice(location: &str, bytes: &[u8]) -> Result<Self> {
        let is_json = bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .map(|b| *b == b'{')
            .unwrap_or(false);
        let document: raw::Document = if is_json {
            serde_json::from_slice(bytes).context(error::ParseJsonSnafu { origin: location })?
        } else {
            serde_yaml::from_slice(bytes).context(error::ParseYamlSnafu { origin: location })?
        };
        Self::resolve(document)
    }

    fn resolve(document: raw::Document) -> Result<Self> {
        let servers: Vec<String> = document.servers.into_iter().map(|s| s.url).collect();
        ensure!(!servers.is_empty(), error::NoServersSnafu);
        let mut operations = BTreeMap::new();
        for (path, item) in &document.paths {
            let shared = item
                .parameters
                .iter()
                .map(|p| document.components.parameter(p))
                .collect::<Result<Vec<_>>>()?;
            for (method, operation) in item.operations() {
                let mut parameters = shared.clone();
                for parameter in &operation.parameters {
                    let parameter = document.components.parameter(parameter)?;
                    parameters.retain(|p| {
                        p.name != parameter.name || p.location != parameter.location
                    });
                    parameters.push(parameter);
                }
                let body_fields = match &operation.request_body {
                    Some(body) => document.components.body_fields(body)?,
                    None => BTreeSet::new(),
                };
                let success_codes = operation
                    .responses
                    .keys()
                    .filter_map(|code| code.parse::<u16>().ok())
                    .filter(|code| (200..300).contains(code))
                    .collect();
                operations.insert(
                    (method, path.clone()),
                    Operation {
                        parameters,
                        body_fields,
                        success_codes,
                    },
                );
            }
        }
        Ok(Self {
            servers,
            operations,
        })
    }

    /// The first declared server, which requests are sent to.
    pub fn server_url(&self) -> &str {
        self.servers.first().map(String::as_str).unwrap_or_default()
    }

    pub fn operation_exists(&self, method: Method, path: &str) -> bool {
        self.operations.contains_key(&(method, path.to_string()))
    }

    pub fn operation(&self, method: Method, path: &str) -> Result<&Operation> {
        Ok(self
            .operations
            .get(&(method, path.to_string()))
            .context(error::OperationNotFoundSnafu {
                method: method.to_string(),
                path,
            })?)
    }

    /// The names of the declared path and query parameters.
    pub fn required_parameters(
        &self,
        method: Method,
        path: &str,
    ) -> Result<(BTreeSet<String>, BTreeSet<String>)> {
        let operation = self.operation(method, path)?;
        Ok((
            operation.names_in(ParameterLocation::Path),
            operation.names_in(ParameterLocation::Query),
        ))
    }

    /// The property names of the `application/json` request body schema.
    pub fn required_body_fields(&self, method: Method, path: &str) -> Result<BTreeSet<String>> {
        Ok(self.operation(method, path)?.body_fields.clone())
    }

    /// The first declared 2xx response code.
    pub fn success_status_code(&self, method: Method, path: &str) -> Result<u16> {
        Ok(*self
            .success_status_codes(method, path)?
            .first()
            .context(error::NoSuccessCodeSnafu {
                method: method.to_string(),
                path,
            })?)
    }

    pub fn success_status_codes(&self, method: Method, path: &str) -> Result<&[u16]> {
        let operation = self.operation(method, path)?;
        ensure!(
            !operation.success_codes.is_empty(),
            error::NoSuccessCodeSnafu {
                method: method.to_string(),
                path,
            }
        );
        Ok(&operation.success_codes)
    }

    /// Checks that every parameter declared as required has a value.
    pub fn validate_request(
        &self,
        method: Method,
        path: &str,
        path_params: &BTreeMap<String, String>,
        query: &BTreeMap<String, String>,
    ) -> Result<()> {
        for parameter in &self.operation(method, path)?.parameters {
            let values = match parameter.location {
                ParameterLocation::Path => path_params,
                ParameterLocation::Query => query,
                ParameterLocation::Header | ParameterLocation::Cookie => continue,
            };
            ensure!(
                !parameter.required || values.contains_key(&parameter.name),
                error::MissingParameterSnafu {
                    name: &parameter.name,
                    placement: parameter.location.to_string(),
                }
            );
        }
        Ok(())
    }
}

/// The document as written, before references are resolved.
mod raw {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub(super) struct Document {
        #[serde(default)]
        pub(super) servers: Vec<Server>,
        #[serde(default)]
        pub(super) paths: BTreeMap<String, PathItem>,
        #[serde(default)]
        pub(super) components: Components,
    }

    #[derive(Debug, Deserialize)]
    pub(super) struct Server {
        pub(super) url: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(untagged)]
    pub(super) enum RefOr<T> {
        Ref {
            #[serde(rename = "$ref")]
            reference: String,
        },
        Item(T),
    }

    #[derive(Debug, Default, Deserialize)]
    pub(super) struct PathItem {
        #[serde(default)]
        pub(super) parameters: Vec<RefOr<Parameter>>,
        get: Option<Operation>,
        put: Option<Operation>,
        post: Option<Operation>,
        delete: Option<Operation>,
        options: Option<Operation>,
        head: Option<Operation>,
        patch: Option<Operation>,
    }

    impl PathItem {
        pub(super) fn operations(&self) -> impl Iterator<Item = (Method, &Operation)> {
            [
                (Method::Get, &self.get),
                (Method::Put, &self.put),
                (Method::Post, &self.post),
                (Method::Delete, &self.delete),
                (Method::Options, &self.options),
                (Method::Head, &self.head),
                (Method::Patch, &self.patch),
            ]
            .into_iter()
            .filter_map(|(method, operation)| operation.as_ref().map(|o| (method, o)))
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Operation {
        #[serde(default)]
        pub(super) parameters: Vec<RefOr<Parameter>>,
        #[serde(default)]
        pub(super) request_body: Option<RefOr<RequestBody>>,
        /// Kept as a map so declaration order survives.
        #[serde(default)]
        pub(super) responses: Map<String, Value>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    pub(super) struct RequestBody {
        #[serde(default)]
        content: BTreeMap<String, MediaType>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    struct MediaType {
        schema: Option<RefOr<Schema>>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Schema {
        #[serde(default)]
        properties: Map<String, Value>,
        #[serde(default)]
        all_of: Vec<RefOr<Schema>>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub(super) struct Components {
        #[serde(default)]
        parameters: BTreeMap<String, Parameter>,
        #[serde(default)]
        request_bodies: BTreeMap<String, RequestBody>,
        #[serde(default)]
        schemas: BTreeMap<String, Schema>,
    }

    impl<T: Clone> RefOr<T> {
        /// Resolves a local reference of the form `#/components/<section>/<name>`.
        fn resolve<'a>(
            &'a self,
            section: &str,
            table: &'a BTreeMap<String, T>,
        ) -> Result<&'a T> {
            match self {
                RefOr::Item(item) => Ok(item),
                RefOr::Ref { reference } => Ok(reference
                    .strip_prefix("#/components/")
                    .and_then(|rest| rest.strip_prefix(section))
                    .and_then(|rest| rest.strip_prefix('/'))
                    .and_then(|name| table.get(name))
                    .context(error::UnresolvedReferenceSnafu { reference })?),
            }
        }
    }

    impl Components {
        pub(super) fn parameter(&self, parameter: &RefOr<Parameter>) -> Result<Parameter> {
            parameter
                .resolve("parameters", &self.parameters)
                .map(Clone::clone)
        }

        pub(super) fn body_fields(&self, body: &RefOr<RequestBody>) -> Result<BTreeSet<String>> {
            let body = body.resolve("requestBodies", &self.request_bodies)?;
            let mut fields = BTreeSet::new();
            if let Some(schema) = body
                .content
                .get(JSON_CONTENT)
                .and_then(|media| media.schema.as_ref())
            {
                self.collect_properties(schema, 0, &mut fields)?;
            }
            Ok(fields)
        }

        fn collect_properties(
            &self,
            schema: &RefOr<Schema>,
            depth: usize,
            fields: &mut BTreeSet<String>,
        ) -> Result<()> {
            let schema = schema.resolve("schemas", &self.schemas)?;
            if depth > MAX_REF_DEPTH {
                return Ok(());
            }
            fields.extend(schema.properties.keys().cloned());
            for member in &schema.all_of {
                self.collect_properties(member, depth + 1, fields)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DESCRIPTION: &str = r##"
openapi: 3.0.0
servers:
  - url: https://api.example.com/v1
  - url: https://backup.example.com/v1
paths:
  /repos:
    get:
      parameters:
        - name: name
          in: query
      responses:
        "200":
          description: ok
    post:
      requestBody:
        $ref: "#/components/requestBodies/Repo"
      responses:
        default:
          description: error
        "202":
          description: accepted
        "201":
          description: created
  /repos/{id}:
    parameters:
      - $ref: "#/components/parameters/id"
    get:
      parameters:
        - name: expand
          in: query
        - name: X-Trace
          in: header
      responses:
        "200":
          description: ok
    delete:
      responses:
        "404":
          description: gone
components:
  parameters:
    id:
      name: id
      in: path
      required: true
  requestBodies:
    Repo:
      content:
        application/json:
          schema:
            allOf:
              - $ref: "#/components/schemas/Named"
              - properties:
                  size: { type: integer }
  schemas:
    Named:
      properties:
        name: { type: string }
"##;

    fn description() -> ApiDescription {
        ApiDescription::from_slice("test", DESCRIPTION.as_bytes()).unwrap()
    }

    #[test]
    fn operations() {
        let d = description();
        assert_eq!(d.server_url(), "https://api.example.com/v1");
        assert!(d.operation_exists(Method::Get, "/repos/{id}"));
        assert!(!d.operation_exists(Method::Put, "/repos/{id}"));
        let err = d.required_parameters(Method::Put, "/repos").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn parameters_merge_path_level() {
        let (path, query) = description()
            .required_parameters(Method::Get, "/repos/{id}")
            .unwrap();
        assert_eq!(path, BTreeSet::from(["id".to_string()]));
        assert_eq!(query, BTreeSet::from(["expand".to_string()]));
    }

    #[test]
    fn body_fields_from_all_of() {
        let d = description();
        let fields = d.required_body_fields(Method::Post, "/repos").unwrap();
        assert_eq!(
            fields,
            BTreeSet::from(["name".to_string(), "size".to_string()])
        );
        assert!(d
            .required_body_fields(Method::Get, "/repos")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn success_codes_keep_declaration_order() {
        let d = description();
        assert_eq!(d.success_status_code(Method::Post, "/repos").unwrap(), 202);
        assert_eq!(
            d.success_status_codes(Method::Post, "/repos").unwrap(),
            &[202, 201]
        );
        let err = d
            .success_status_code(Method::Delete, "/repos/{id}")
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
    }

    #[test]
    fn required_parameters_are_validated() {
        let d = description();
        let mut path = BTreeMap::new();
        let query = BTreeMap::new();
        let err = d
            .validate_request(Method::Get, "/repos/{id}", &path, &query)
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Required path parameter 'id' is missing");
        path.insert("id".to_string(), "1".to_string());
        assert!(d
            .validate_request(Method::Get, "/repos/{id}", &path, &query)
            .is_ok());
    }

    #[test]
    fn dangling_reference() {
        let doc = r##"{
            "servers": [{ "url": "http://localhost" }],
            "paths": { "/x": { "get": {
                "parameters": [{ "$ref": "#/components/parameters/missing" }],
                "responses": { "200": {} }
            }}}
        }"##;
        let err = ApiDescription::from_slice("test", doc.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn no_servers() {
        let doc = r#"{ "paths": {} }"#;
        let err = ApiDescription::from_slice("test", doc.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[test]
    fn unparseable() {
        let err = ApiDescription::from_slice("api.json", b"{ not json").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Load);
        assert!(err.to_string().contains("'api.json' as JSON"));
        let err = ApiDescription::from_slice("api.yaml", b"paths: [").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Load);
        assert!(err.to_string().contains("'api.yaml' as YAML"));
    }

    #[test]
    fn verb_methods() {
        assert_eq!(Method::from_verb("POST").unwrap(), Method::Post);
        assert_eq!(Method::from_verb("findby").unwrap(), Method::Get);
        assert_eq!(Method::from_verb("list").unwrap(), Method::Get);
        assert!(Method::from_verb("fetch").is_err());
        assert!(Method::Patch.has_body());
        assert!(!Method::Delete.has_body());
    }
}
