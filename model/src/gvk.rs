use crate::error::{self, Result};
use kube::core::{ApiResource, GroupVersion, GroupVersionKind};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::fmt::{Display, Formatter};

/// The group, version and kind of a Kubernetes object.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Gvk {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// The group, version and plural resource name of a Kubernetes object.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl Gvk {
    pub fn new<S1, S2, S3>(group: S1, version: S2, kind: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Splits an `apiVersion` such as `apps/v1` and pairs it with `kind`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self> {
        let (group, version) = parse_api_version(api_version)?;
        Ok(Self::new(group, version, kind))
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Derives the resource name with the same pluralization rules the API server applies to
    /// custom resources. Prefer discovery when a cluster is reachable.
    pub fn to_gvr(&self) -> Gvr {
        let api_resource = self.to_api_resource();
        Gvr {
            group: self.group.clone(),
            version: self.version.clone(),
            resource: api_resource.plural,
        }
    }

    pub fn to_api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&self.to_kube())
    }

    pub fn to_kube(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl Display for Gvk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.api_version(), self.kind)
    }
}

impl Gvr {
    pub fn new<S1, S2, S3>(group: S1, version: S2, resource: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::gv(&self.group, &self.version)
    }
}

impl Display for Gvr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Returns the `(group, version)` of an `apiVersion` string. The core group is empty.
pub fn parse_api_version(api_version: &str) -> Result<(String, String)> {
    let mut parts = api_version.split('/');
    let (group, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(version), None, None) => ("", version),
        (Some(group), Some(version), None) => (group, version),
        _ => ("", ""),
    };
    ensure!(
        !version.is_empty(),
        error::InvalidApiVersionSnafu { api_version }
    );
    Ok((group.to_string(), version.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn api_version_with_group() {
        let gvk = Gvk::from_api_version("composer.dev/v1alpha1", "Repo").unwrap();
        assert_eq!(gvk.group, "composer.dev");
        assert_eq!(gvk.version, "v1alpha1");
        assert_eq!(gvk.api_version(), "composer.dev/v1alpha1");
    }

    #[test]
    fn core_api_version() {
        let gvk = Gvk::from_api_version("v1", "ConfigMap").unwrap();
        assert!(gvk.group.is_empty());
        assert_eq!(gvk.api_version(), "v1");
    }

    #[test]
    fn bad_api_versions() {
        assert!(parse_api_version("").is_err());
        assert!(parse_api_version("a/b/c").is_err());
        assert!(parse_api_version("group/").is_err());
    }

    #[test]
    fn plural_resource_names() {
        let gvr = Gvk::new("composer.dev", "v1alpha1", "BasicAuth").to_gvr();
        assert_eq!(gvr.resource, "basicauths");
        let gvr = Gvk::new("composer.dev", "v1alpha1", "Policy").to_gvr();
        assert_eq!(gvr.resource, "policies");
        assert_eq!(gvr.to_string(), "composer.dev/v1alpha1/policies");
    }
}
