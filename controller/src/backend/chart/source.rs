use crate::backend::chart::ChartSpec;
use crate::backend::error::{self, BackendResult};
use log::trace;
use model::clients::ResourceStore;
use model::constants::{
    DEFINITION_GROUP, DEFINITION_KIND, DEFINITION_VERSION, LABEL_CRD_GROUP, LABEL_CRD_RESOURCE,
    LABEL_CRD_VERSION,
};
use model::{Gvk, Gvr, ResourceDocument};
use snafu::{ensure, OptionExt, ResultExt};

/// Where the chart backend learns which chart to install.
#[derive(Debug, Clone)]
pub(crate) enum ChartSource {
    /// One chart for every object, given on the command line.
    Static(ChartSpec),
    /// The `Definition` in the managed object's namespace that is labelled with this resource.
    /// Its `status.packageUrl` names the chart.
    Cluster(Gvr),
}

impl ChartSource {
    pub(crate) async fn resolve<S>(
        &self,
        store: &S,
        document: &ResourceDocument,
    ) -> BackendResult<ChartSpec>
    where
        S: ResourceStore,
    {
        match self {
            ChartSource::Static(chart) => Ok(chart.clone()),
            ChartSource::Cluster(gvr) => lookup(store, gvr, document).await,
        }
    }
}

async fn lookup<S>(store: &S, gvr: &Gvr, document: &ResourceDocument) -> BackendResult<ChartSpec>
where
    S: ResourceStore,
{
    let namespace = document.namespace().unwrap_or_default();
    let definitions = store
        .list(
            &Gvk::new(DEFINITION_GROUP, DEFINITION_VERSION, DEFINITION_KIND),
            Some(namespace),
        )
        .await
        .context(error::StoreSnafu {
            operation: "list definitions",
        })?;

    let mut matches: Vec<ResourceDocument> = definitions
        .into_iter()
        .filter(|definition| {
            definition.label(LABEL_CRD_GROUP) == Some(gvr.group.as_str())
                && definition.label(LABEL_CRD_VERSION) == Some(gvr.version.as_str())
                && definition.label(LABEL_CRD_RESOURCE) == Some(gvr.resource.as_str())
        })
        .collect();
    ensure!(
        matches.len() <= 1,
        error::AmbiguousChartDefinitionSnafu {
            count: matches.len(),
            resource: gvr.to_string(),
            namespace,
        }
    );
    let definition = matches
        .pop()
        .context(error::ChartDefinitionNotFoundSnafu {
            resource: gvr.to_string(),
            namespace,
        })?;

    let name = definition.name().unwrap_or_default();
    trace!("chart of {} comes from definition '{}'", gvr, name);
    let url = definition
        .get_string(&["status", "packageUrl"])
        .ok()
        .filter(|url| !url.is_empty())
        .context(error::MissingFieldSnafu {
            field: "status.packageUrl",
            what: format!("definition '{}'", name),
        })?;
    let version = definition
        .get_string(&["spec", "chart", "version"])
        .ok()
        .filter(|version| !version.is_empty())
        .map(str::to_string);
    Ok(ChartSpec {
        url: url.to_string(),
        version,
        repo: None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{document, MemoryStore};
    use serde_json::json;

    fn gvr() -> Gvr {
        Gvr::new("composer.dev", "v1alpha1", "apps")
    }

    fn definition(name: &str, resource: &str, package_url: Option<&str>) -> ResourceDocument {
        let mut definition = document(
            "composer.dev/v1alpha1",
            "Definition",
            name,
            json!({ "chart": { "version": "1.2.0" } }),
        );
        definition
            .set_field(
                &["metadata", "labels"],
                json!({
                    "composer.dev/crd-group": "composer.dev",
                    "composer.dev/crd-version": "v1alpha1",
                    "composer.dev/crd-resource": resource,
                }),
            )
            .unwrap();
        if let Some(url) = package_url {
            definition
                .set_field(&["status", "packageUrl"], url)
                .unwrap();
        }
        definition
    }

    fn app() -> ResourceDocument {
        document("composer.dev/v1alpha1", "App", "web", json!({}))
    }

    #[tokio::test]
    async fn static_chart() {
        let chart = ChartSpec {
            url: "charts/web".to_string(),
            ..Default::default()
        };
        let store = MemoryStore::default();
        let resolved = ChartSource::Static(chart.clone())
            .resolve(&store, &app())
            .await
            .unwrap();
        assert_eq!(resolved, chart);
    }

    #[tokio::test]
    async fn chart_from_labelled_definition() {
        let store = MemoryStore::with(vec![
            definition("apps", "apps", Some("oci://registry.example.com/charts/web")),
            definition("dbs", "databases", Some("oci://registry.example.com/charts/db")),
        ]);
        let chart = ChartSource::Cluster(gvr())
            .resolve(&store, &app())
            .await
            .unwrap();
        assert_eq!(chart.url, "oci://registry.example.com/charts/web");
        assert_eq!(chart.version.as_deref(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn definition_lookup_failures() {
        let source = ChartSource::Cluster(gvr());

        let store = MemoryStore::with(vec![definition("dbs", "databases", Some("db"))]);
        let err = source.resolve(&store, &app()).await.unwrap_err();
        assert!(matches!(err, crate::backend::BackendError::ChartDefinitionNotFound { .. }));

        let store = MemoryStore::with(vec![definition("apps", "apps", None)]);
        let err = source.resolve(&store, &app()).await.unwrap_err();
        assert!(matches!(err, crate::backend::BackendError::MissingField { .. }));

        let store = MemoryStore::with(vec![
            definition("apps", "apps", Some("web")),
            definition("apps-copy", "apps", Some("web")),
        ]);
        let err = source.resolve(&store, &app()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::backend::BackendError::AmbiguousChartDefinition { count: 2, .. }
        ));
    }
}
