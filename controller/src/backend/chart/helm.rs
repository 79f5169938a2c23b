use super::{ChartClient, Release, ReleaseSpec};
use crate::backend::error::{self, BackendResult};
use async_trait::async_trait;
use log::{debug, trace};
use serde_json::{Map, Value};
use snafu::{ensure, ResultExt};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tokio::process::Command;

/// Runs the `helm` binary found on `PATH`, or the one given.
#[derive(Debug, Clone)]
pub(crate) struct HelmCli {
    binary: PathBuf,
}

impl Default for HelmCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("helm"),
        }
    }
}

impl HelmCli {
    async fn run(&self, command: &str, args: Vec<String>) -> BackendResult<Vec<u8>> {
        trace!("running helm {}", args.join(" "));
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .context(error::ChartCommandSnafu { command })?;
        ensure!(
            output.status.success(),
            error::ChartFailedSnafu {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );
        Ok(output.stdout)
    }
}

/// Writes `values` to a file that lives as long as the returned handle.
fn values_file(values: &Map<String, Value>) -> BackendResult<NamedTempFile> {
    let yaml = serde_yaml::to_string(values).context(error::ChartValuesSerializeSnafu)?;
    let mut file = NamedTempFile::new().context(error::ChartValuesSnafu)?;
    file.write_all(yaml.as_bytes())
        .context(error::ChartValuesSnafu)?;
    file.flush().context(error::ChartValuesSnafu)?;
    Ok(file)
}

/// Arguments shared by `upgrade` and `template`: release name, chart, where to find it and the
/// values to apply.
fn chart_args(release: &ReleaseSpec, values: &NamedTempFile) -> Vec<String> {
    let mut args = vec![
        release.name.clone(),
        release.chart.url.clone(),
        "--namespace".to_string(),
        release.namespace.clone(),
        "--values".to_string(),
        values.path().display().to_string(),
    ];
    if let Some(version) = &release.chart.version {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if let Some(repo) = &release.chart.repo {
        args.push("--repo".to_string());
        args.push(repo.clone());
    }
    args
}

#[async_trait]
impl ChartClient for HelmCli {
    async fn find_release(&self, name: &str, namespace: &str) -> BackendResult<Option<Release>> {
        let stdout = self
            .run(
                "list",
                vec![
                    "list".to_string(),
                    "--namespace".to_string(),
                    namespace.to_string(),
                    "--filter".to_string(),
                    format!("^{}$", name),
                    "--output".to_string(),
                    "json".to_string(),
                ],
            )
            .await?;
        let releases: Vec<Release> =
            serde_json::from_slice(&stdout).context(error::ChartOutputSnafu { command: "list" })?;
        Ok(releases.into_iter().find(|r| r.name == name))
    }

    async fn install_or_upgrade(
        &self,
        release: &ReleaseSpec,
        values: &Map<String, Value>,
    ) -> BackendResult<()> {
        let file = values_file(values)?;
        let mut args = vec!["upgrade".to_string(), "--install".to_string()];
        args.extend(chart_args(release, &file));
        self.run("upgrade", args).await?;
        debug!("installed release '{}'", release.name);
        Ok(())
    }

    async fn template_render(
        &self,
        release: &ReleaseSpec,
        values: &Map<String, Value>,
    ) -> BackendResult<Vec<u8>> {
        let file = values_file(values)?;
        let mut args = vec!["template".to_string()];
        args.extend(chart_args(release, &file));
        self.run("template", args).await
    }

    async fn uninstall(&self, release: &ReleaseSpec) -> BackendResult<()> {
        self.run(
            "uninstall",
            vec![
                "uninstall".to_string(),
                release.name.clone(),
                "--namespace".to_string(),
                release.namespace.clone(),
            ],
        )
        .await?;
        debug!("uninstalled release '{}'", release.name);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::chart::ChartSpec;
    use serde_json::json;

    #[test]
    fn chart_arguments() {
        let release = ReleaseSpec {
            name: "demo".to_string(),
            namespace: "apps".to_string(),
            chart: ChartSpec {
                url: "bitnami/nginx".to_string(),
                version: Some("1.2.3".to_string()),
                repo: None,
            },
        };
        let values = json!({ "replicas": 2 });
        let file = values_file(values.as_object().unwrap()).unwrap();
        let args = chart_args(&release, &file);
        assert_eq!(&args[..4], &["demo", "bitnami/nginx", "--namespace", "apps"]);
        assert_eq!(&args[6..], &["--version", "1.2.3"]);
        let written = std::fs::read_to_string(file.path()).unwrap();
        assert!(written.contains("replicas: 2"));
    }

    #[tokio::test]
    async fn missing_binary() {
        let helm = HelmCli {
            binary: PathBuf::from("/nonexistent/helm"),
        };
        let err = helm.find_release("demo", "default").await.unwrap_err();
        assert!(err.to_string().contains("helm list"));
    }
}
