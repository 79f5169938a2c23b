use crate::backend::error::{self, BackendResult};
use log::trace;
use model::clients::ResourceStore;
use model::constants::{DEFINITION_GROUP, DEFINITION_KIND, DEFINITION_VERSION};
use model::{DefinitionSpec, Gvk, ResourceDocument, RestDefinition};
use snafu::{ensure, OptionExt, ResultExt};

/// Where the REST backend learns how a resource kind maps onto an API.
#[derive(Debug, Clone)]
pub(crate) enum DefinitionSource {
    /// One definition for every object, given on the command line.
    Static(RestDefinition),
    /// `Definition` objects in the managed object's namespace.
    Cluster,
}

impl DefinitionSource {
    pub(crate) async fn resolve<S>(
        &self,
        store: &S,
        document: &ResourceDocument,
    ) -> BackendResult<RestDefinition>
    where
        S: ResourceStore,
    {
        match self {
            DefinitionSource::Static(definition) => Ok(definition.clone()),
            DefinitionSource::Cluster => lookup(store, document).await,
        }
    }
}

async fn lookup<S>(store: &S, document: &ResourceDocument) -> BackendResult<RestDefinition>
where
    S: ResourceStore,
{
    let gvk = document.gvk()?;
    let definitions = store
        .list(
            &Gvk::new(DEFINITION_GROUP, DEFINITION_VERSION, DEFINITION_KIND),
            document.namespace(),
        )
        .await
        .context(error::StoreSnafu {
            operation: "list definitions",
        })?;

    let mut matches = Vec::new();
    for definition in definitions {
        let name = definition.name().unwrap_or_default().to_string();
        let spec: DefinitionSpec = serde_json::from_value(definition.into_value()["spec"].clone())
            .context(error::DefinitionParseSnafu { name: &name })?;
        if spec.resource_group == gvk.group && spec.resource.descriptor.kind == gvk.kind {
            trace!("definition '{}' matches {}", name, gvk);
            matches.push(spec);
        }
    }

    ensure!(
        matches.len() <= 1,
        error::AmbiguousDefinitionSnafu {
            count: matches.len(),
            group: &gvk.group,
            kind: &gvk.kind,
        }
    );
    matches
        .pop()
        .map(RestDefinition::from)
        .context(error::DefinitionNotFoundSnafu {
            group: gvk.group,
            kind: gvk.kind,
        })
}
