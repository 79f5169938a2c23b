use crate::backend::chart::{ChartSource, ChartSpec};
use crate::backend::rest::DefinitionSource;
use crate::constants::parse_duration;
use crate::error::{self, Result};
use clap::{Parser, ValueEnum};
use model::{DefinitionResource, Gvr, RestDefinition};
use snafu::{ensure, ResultExt};
use std::path::PathBuf;
use std::time::Duration;

/// Reconciles custom resources of one kind with the external resources they describe.
#[derive(Debug, Parser)]
#[command(name = "controller")]
pub(crate) struct Args {
    /// API group of the managed resource.
    #[arg(long, env = "COMPOSER_GROUP")]
    pub(crate) group: String,

    /// API version of the managed resource. Underscores are read as dashes.
    #[arg(long, env = "COMPOSER_VERSION")]
    pub(crate) version: String,

    /// Plural name of the managed resource.
    #[arg(long, env = "COMPOSER_RESOURCE")]
    pub(crate) resource: String,

    /// Namespace to watch.
    #[arg(long, env = "COMPOSER_NAMESPACE", default_value = "default")]
    pub(crate) namespace: String,

    /// Number of events processed concurrently.
    #[arg(long, env = "COMPOSER_WORKERS", default_value_t = 1)]
    pub(crate) workers: usize,

    /// How often every known object is observed again, e.g. `3m` or `1h30m`.
    #[arg(
        long,
        env = "COMPOSER_RESYNC_INTERVAL",
        default_value = "3m",
        value_parser = parse_resync_interval
    )]
    pub(crate) resync_interval: Duration,

    /// How many times a failed event is retried before it is dropped.
    #[arg(long, env = "COMPOSER_MAX_RETRIES", default_value_t = 5)]
    pub(crate) max_retries: u32,

    /// Log everything this controller does.
    #[arg(long, env = "COMPOSER_DEBUG")]
    pub(crate) debug: bool,

    #[arg(long, env = "COMPOSER_BACKEND", value_enum, default_value_t = BackendKind::Rest)]
    pub(crate) backend: BackendKind,

    /// Chart installed for every object when the chart backend is used. Without it the chart is
    /// read from the `Definition` labelled with the managed resource.
    #[arg(long, env = "COMPOSER_CHART")]
    pub(crate) chart: Option<String>,

    #[arg(long, env = "COMPOSER_CHART_VERSION")]
    pub(crate) chart_version: Option<String>,

    /// Repository the chart is fetched from.
    #[arg(long, env = "COMPOSER_CHART_REPO")]
    pub(crate) chart_repo: Option<String>,

    /// Location of an OpenAPI document. Together with `--descriptor` this replaces the lookup of
    /// `Definition` objects.
    #[arg(long, env = "COMPOSER_OPENAPI", requires = "descriptor")]
    pub(crate) openapi: Option<String>,

    /// YAML file with the resource block of a definition.
    #[arg(long, env = "COMPOSER_DESCRIPTOR", requires = "openapi")]
    pub(crate) descriptor: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
pub(crate) enum BackendKind {
    /// Drive an HTTP API.
    Rest,
    /// Install a Helm chart.
    Chart,
}

impl Args {
    pub(crate) fn gvr(&self) -> Gvr {
        Gvr::new(
            &self.group,
            self.version.replace('_', "-"),
            &self.resource,
        )
    }

    pub(crate) fn chart_source(&self) -> ChartSource {
        match &self.chart {
            Some(url) => ChartSource::Static(ChartSpec {
                url: url.clone(),
                version: self.chart_version.clone(),
                repo: self.chart_repo.clone(),
            }),
            None => ChartSource::Cluster(self.gvr()),
        }
    }

    /// A static definition when one was given, otherwise a lookup in the cluster.
    pub(crate) async fn definition_source(&self) -> Result<DefinitionSource> {
        let (location, path) = match (&self.openapi, &self.descriptor) {
            (Some(location), Some(path)) => (location, path),
            _ => return Ok(DefinitionSource::Cluster),
        };
        let yaml = tokio::fs::read_to_string(path)
            .await
            .context(error::DescriptorReadSnafu {
                path: path.display().to_string(),
            })?;
        let resource: DefinitionResource =
            serde_yaml::from_str(&yaml).context(error::DescriptorParseSnafu {
                path: path.display().to_string(),
            })?;
        Ok(DefinitionSource::Static(RestDefinition {
            location: location.clone(),
            resource: resource.descriptor,
            owner_references: resource.owner_refs,
        }))
    }
}

/// A resync interval must be positive.
fn parse_resync_interval(input: &str) -> Result<Duration> {
    let interval = parse_duration(input)?;
    ensure!(!interval.is_zero(), error::ZeroIntervalSnafu { input });
    Ok(interval)
}
