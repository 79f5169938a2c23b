use crate::backend::error::{self, BackendResult};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use log::debug;
use model::clients::ResourceStore;
use model::text::generic_to_string;
use model::{ReferenceInfo, ResourceDocument};
use serde_json::Value;
use snafu::{ensure, OptionExt, ResultExt};

/// Adopts an owner for every declared reference. The owner is the first object of the referenced
/// kind with a string field in `status`, or else in `spec`, equal to the value of the reference's
/// field in our `spec`. Every declared reference must be set and must resolve. `document` is
/// replaced by the persisted object when an owner was added.
pub(crate) async fn resolve_owner_references<S>(
    store: &S,
    document: &mut ResourceDocument,
    references: &[ReferenceInfo],
) -> BackendResult<()>
where
    S: ResourceStore,
{
    let mut owners = current_owners(document)?;
    let mut changed = false;

    for reference in references {
        let wanted = match document.get_field(&["spec", reference.field.as_str()]) {
            Ok(Value::Null) => String::new(),
            Ok(value) => generic_to_string(value),
            Err(e) if e.is_field_not_found() => String::new(),
            Err(e) => return Err(e.into()),
        };
        ensure!(
            !wanted.is_empty(),
            error::MissingFieldSnafu {
                field: format!("spec.{}", reference.field),
                what: format!("owner reference to '{}'", reference.group_version_kind),
            }
        );

        let gvk = &reference.group_version_kind;
        let candidates = store
            .list(gvk, document.namespace())
            .await
            .context(error::StoreSnafu {
                operation: format!("list '{}'", gvk),
            })?;
        let owner = candidates
            .iter()
            .find(|candidate| {
                has_string_value(&candidate.status_fields(), &wanted)
                    || has_string_value(&candidate.spec_fields(), &wanted)
            })
            .context(error::NoReferenceFoundSnafu {
                field: &reference.field,
                kind: gvk.to_string(),
            })?;

        let name = owner.name()?;
        let uid = owner
            .get_string(&["metadata", "uid"])
            .ok()
            .filter(|uid| !uid.is_empty())
            .context(error::MissingFieldSnafu {
                field: "metadata.uid",
                what: format!("owner '{}'", name),
            })?;
        let owner_reference = OwnerReference {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
            name: name.to_string(),
            uid: uid.to_string(),
            ..Default::default()
        };
        if !owners
            .iter()
            .any(|o| o.kind == owner_reference.kind && o.name == owner_reference.name)
        {
            debug!(
                "adopting '{}' as owner of '{}'",
                owner_reference.name,
                document.name()?
            );
            owners.push(owner_reference);
            changed = true;
        }
    }

    if changed {
        let value = serde_json::to_value(&owners).context(error::OwnerReferencesSnafu)?;
        document.set_field(&["metadata", "ownerReferences"], value)?;
        *document = store.update(document).await.context(error::StoreSnafu {
            operation: "persist owner references",
        })?;
    }
    Ok(())
}

fn current_owners(document: &ResourceDocument) -> BackendResult<Vec<OwnerReference>> {
    match document.get_field(&["metadata", "ownerReferences"]) {
        Ok(value) => serde_json::from_value(value.clone()).context(error::OwnerReferencesSnafu),
        Err(e) if e.is_field_not_found() => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn has_string_value(fields: &serde_json::Map<String, Value>, wanted: &str) -> bool {
    fields
        .values()
        .any(|value| matches!(value, Value::String(s) if s == wanted))
}
