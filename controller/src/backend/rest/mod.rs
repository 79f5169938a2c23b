/*!

Reconciles objects against an HTTP API. For every call the backend resolves the object's
definition, loads the API description it points at, reads the credentials named in the object's
spec and then runs the verb the definition maps the action to.

!*/

mod auth;
mod definition;
mod drift;
mod owner;

pub(crate) use definition::DefinitionSource;

use crate::backend::error::{self, BackendError, BackendResult};
use crate::backend::ExternalResourceBackend;
use async_trait::async_trait;
use auth::resolve_auth;
use drift::check_drift;
use log::{debug, info, warn};
use model::clients::{HttpStatusCode, ResourceStore};
use model::condition::{available, creating, deleting, reconcile_failed};
use model::text::generic_to_string;
use model::{Action, ResourceDocument, RestDefinition};
use owner::resolve_owner_references;
use restclient::{build_request, resolve_call, ApiDescription, RestClient};
use serde_json::{Map, Value};
use snafu::ResultExt;
use std::sync::Arc;

pub(crate) struct RestBackend<S> {
    store: Arc<S>,
    definitions: DefinitionSource,
    http: reqwest::Client,
}

/// The definition and a client for the API it describes, resolved for one object.
struct Session {
    definition: RestDefinition,
    client: RestClient,
}

impl<S> RestBackend<S>
where
    S: ResourceStore,
{
    pub(crate) fn new(store: Arc<S>, definitions: DefinitionSource, http: reqwest::Client) -> Self {
        Self {
            store,
            definitions,
            http,
        }
    }

    async fn session(&self, document: &ResourceDocument) -> BackendResult<Session> {
        let definition = self
            .definitions
            .resolve(self.store.as_ref(), document)
            .await?;
        let description = ApiDescription::load(&definition.location, &self.http)
            .await
            .context(error::RestClientSnafu {
                operation: format!("load API description '{}'", definition.location),
            })?;
        let auth = resolve_auth(self.store.as_ref(), document).await?;
        let client = RestClient::new(self.http.clone(), Arc::new(description))
            .with_auth(auth)
            .with_verbose(document.is_verbose());
        Ok(Session { definition, client })
    }

    /// Writes the status if it differs from `before`.
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

impl Session {
    async fn execute(
        &self,
        action: Action,
        status: Option<&Map<String, Value>>,
        spec: Option<&Map<String, Value>>,
    ) -> BackendResult<Value> {
        let (info, call) = resolve_call(
            &self.definition.resource,
            action,
            self.client.description(),
        )
        .context(error::RestClientSnafu {
            operation: format!("resolve action '{}'", action),
        })?;
        let request = build_request(&info, status, spec);
        debug!("{} resolved to {:?} {} {}", action, call, info.method, info.path);
        Ok(self
            .client
            .call(call, &info, &request)
            .await
            .context(error::RestClientSnafu {
                operation: format!("{} {}", info.method, info.path),
            })?
            .unwrap_or(Value::Null))
    }

    fn identifiers(&self) -> &[String] {
        &self.definition.resource.identifiers
    }
}

/// Whether any identifier already has a value in `status`.
fn has_identifier(identifiers: &[String], status: &Map<String, Value>) -> bool {
    identifiers.iter().any(|id| match status.get(id) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}

/// Copies the identifier fields of an API response into `status`. Scalars are stored as strings.
fn write_identifiers(
    document: &mut ResourceDocument,
    identifiers: &[String],
    response: &Value,
) -> BackendResult<()> {
    for id in identifiers {
        let value = match response.get(id) {
            Some(Value::Null) | None => continue,
            Some(value) => value,
        };
        let text = generic_to_string(value);
        if text.is_empty() {
            document.set_field(&["status", id.as_str()], value.clone())?;
        } else {
            document.set_field(&["status", id.as_str()], text)?;
        }
    }
    Ok(())
}

#[async_trait]
impl<S> ExternalResourceBackend for RestBackend<S>
where
    S: ResourceStore,
{
    async fn observe(&self, document: &ResourceDocument) -> BackendResult<bool> {
        let session = self.session(document).await?;
        let mut document = document.clone();
        resolve_owner_references(
            self.store.as_ref(),
            &mut document,
            &session.definition.owner_references,
        )
        .await?;

        let status = document.status_fields();
        let spec = document.spec_fields();
        let action = if has_identifier(session.identifiers(), &status) {
            Action::Get
        } else {
            Action::FindBy
        };
        let response = match session.execute(action, Some(&status), Some(&spec)).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!("'{}' has no external resource: {}", document.name()?, e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        write_identifiers(&mut document, session.identifiers(), &response)?;
        let drift = check_drift(&session.definition.resource.compare_list, &spec, &response);
        if drift.is_ok() {
            document.set_condition(available())?;
            document.unset_failed_object_ref();
        }
        self.persist_status(&status, &document).await?;
        drift.map(|_| true)
    }

    async fn create(&self, document: &ResourceDocument) -> BackendResult<()> {
        let session = self.session(document).await?;
        let mut document = document.clone();
        let status = document.status_fields();
        let spec = document.spec_fields();
        match session.execute(Action::Create, None, Some(&spec)).await {
            Ok(response) => {
                info!("created external resource for '{}'", document.name()?);
                write_identifiers(&mut document, session.identifiers(), &response)?;
                document.set_condition(creating())?;
                self.persist_status(&status, &document).await
            }
            Err(e) => {
                document.set_condition(reconcile_failed(format!("Creating failed: {}", e)))?;
                if let Err(status_err) = self.persist_status(&status, &document).await {
                    warn!("unable to record failed create: {}", status_err);
                }
                Err(e)
            }
        }
    }

    async fn update(&self, document: &ResourceDocument) -> BackendResult<()> {
        let session = self.session(document).await?;
        let mut document = document.clone();
        let status = document.status_fields();
        let spec = document.spec_fields();
        let response = session
            .execute(Action::Update, Some(&status), Some(&spec))
            .await?;
        info!("updated external resource for '{}'", document.name()?);
        write_identifiers(&mut document, session.identifiers(), &response)?;
        self.persist_status(&status, &document).await
    }

    async fn delete(&self, document: &ResourceDocument) -> BackendResult<()> {
        let mut document = document.clone();
        let status = document.status_fields();
        let spec = document.spec_fields();

        document.set_condition(deleting())?;
        match self.store.update_status(&document).await {
            Ok(updated) => document = updated,
            Err(e) => warn!("unable to record deletion of '{}': {}", document.name()?, e),
        }

        let deleted = match self.session(&document).await {
            Ok(session) => {
                session
                    .execute(Action::Delete, Some(&status), Some(&spec))
                    .await
            }
            Err(e) => Err(e),
        };
        match deleted {
            Ok(_) => info!("deleted external resource for '{}'", document.name()?),
            Err(e) => warn!(
                "unable to delete external resource for '{}': {}",
                document.name()?,
                e
            ),
        }

        document.clear_finalizers()?;
        match self.store.update(&document).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(BackendError::Store {
                operation: "remove finalizers".to_string(),
                source: e,
            }),
        }
    }
}
