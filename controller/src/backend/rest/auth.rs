use crate::backend::error::{self, BackendResult};
use model::clients::ResourceStore;
use model::constants::{AUTHENTICATION_REFS, AUTH_KIND_SUFFIX, AUTH_REF_SUFFIX, AUTH_VERSION};
use model::text::capitalize;
use model::{AuthMethod, ObjectRef, ResourceDocument};
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

/// Reads the credentials named by the first populated entry of `spec.authenticationRefs`, e.g.
/// `bearerAuthRef: my-token` reads `spec.token` of the `BearerAuth` object `my-token`. Objects
/// without references are served unauthenticated.
pub(crate) async fn resolve_auth<S>(
    store: &S,
    document: &ResourceDocument,
) -> BackendResult<Option<AuthMethod>>
where
    S: ResourceStore,
{
    let refs = match document.get_map(&["spec", AUTHENTICATION_REFS]) {
        Ok(refs) => refs,
        Err(e) if e.is_field_not_found() => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let (key, name) = match refs.iter().find_map(|(key, value)| match value {
        Value::String(name) if !name.is_empty() => Some((key, name)),
        _ => None,
    }) {
        Some(found) => found,
        None => return Ok(None),
    };

    let auth_type = key.split(AUTH_REF_SUFFIX).next().unwrap_or_default();
    let gvk = document.gvk()?;
    let credentials = store
        .get(&ObjectRef::new(
            format!("{}/{}", gvk.group, AUTH_VERSION),
            format!("{}{}", capitalize(auth_type), AUTH_KIND_SUFFIX),
            name,
            document.namespace().unwrap_or_default(),
        ))
        .await
        .context(error::StoreSnafu {
            operation: format!("read credentials '{}'", name),
        })?;

    match auth_type {
        "basic" => Ok(Some(AuthMethod::Basic {
            username: credential(&credentials, "username")?,
            password: credential(&credentials, "password")?,
        })),
        "bearer" => Ok(Some(AuthMethod::Bearer {
            token: credential(&credentials, "token")?,
        })),
        _ => error::UnknownAuthTypeSnafu { auth_type }.fail(),
    }
}

fn credential(credentials: &ResourceDocument, field: &str) -> BackendResult<String> {
    credentials
        .get_string(&["spec", field])
        .ok()
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .context(error::MissingFieldSnafu {
            field,
            what: format!(
                "credentials '{}'",
                credentials.name().unwrap_or_default()
            ),
        })
}
