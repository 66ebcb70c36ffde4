// envsync/src/environment/mod.rs
pub mod remote;

use std::collections::BTreeMap;
use url::Url;

use crate::config::RawEnvironment;
use crate::detect::EnvironmentDraft;
use crate::errors::{Result, SyncError};
use remote::{DEFAULT_SSH_PORT, RemoteAddress};

pub const DEVELOPMENT: &str = "development";
pub const STAGING: &str = "staging";
pub const PRODUCTION: &str = "production";

/// A named deployment target.
///
/// Built once from configuration and only handed out by shared reference, so
/// a record cannot change while a sync is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub url: String,
    pub uploads_path: String,
    pub cli_alias: Option<String>,
    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub remote_path: Option<String>,
}

impl Environment {
    /// Validates a raw configuration entry and fills in the SSH fields that
    /// can be derived from `uploads_path`.
    pub fn from_raw(name: &str, raw: &RawEnvironment) -> Result<Self> {
        let url = raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SyncError::Config(format!("environment '{}' has no url", name)))?;
        Url::parse(url).map_err(|e| {
            SyncError::Config(format!("environment '{}' has an invalid url '{}': {}", name, url, e))
        })?;

        let uploads_path = raw
            .uploads_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SyncError::Config(format!("environment '{}' has no uploads_path", name)))?;

        let explicit_port = match raw.ssh_port.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(port) => Some(port.parse::<u16>().map_err(|_| {
                SyncError::Config(format!("environment '{}' has an invalid ssh_port '{}'", name, port))
            })?),
        };

        let cli_alias = raw.cli_alias.clone().filter(|a| !a.trim().is_empty());
        let address = RemoteAddress::parse(uploads_path);
        let ssh_port = explicit_port.or(address.port).unwrap_or(DEFAULT_SSH_PORT);

        let (ssh_host, remote_path) = match &address.host {
            Some(parsed_host) => {
                let ssh_host = match raw.ssh_host.as_deref().filter(|h| !h.is_empty()) {
                    Some(explicit) if explicit != parsed_host => {
                        return Err(SyncError::Config(format!(
                            "environment '{}': ssh_host '{}' does not match the host '{}' in uploads_path",
                            name, explicit, parsed_host
                        )));
                    }
                    _ => parsed_host.clone(),
                };
                let remote_path = raw
                    .remote_path
                    .clone()
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| address.base_path());
                (Some(ssh_host), Some(remote_path))
            }
            None => (
                raw.ssh_host.clone().filter(|h| !h.is_empty()),
                raw.remote_path.clone().filter(|p| !p.is_empty()),
            ),
        };

        Ok(Environment {
            name: name.to_string(),
            url: url.to_string(),
            uploads_path: uploads_path.to_string(),
            cli_alias,
            ssh_host,
            ssh_port,
            remote_path,
        })
    }

    pub fn to_raw(&self) -> RawEnvironment {
        RawEnvironment {
            url: Some(self.url.clone()),
            uploads_path: Some(self.uploads_path.clone()),
            cli_alias: self.cli_alias.clone(),
            ssh_host: self.ssh_host.clone(),
            ssh_port: Some(self.ssh_port.to_string()),
            remote_path: self.remote_path.clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.uploads_address().is_remote()
    }

    pub fn uploads_address(&self) -> RemoteAddress {
        RemoteAddress::parse(&self.uploads_path)
    }

    pub fn has_custom_port(&self) -> bool {
        self.ssh_port != DEFAULT_SSH_PORT
    }
}

/// Configured environments keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentRegistry {
    environments: BTreeMap<String, Environment>,
}

impl EnvironmentRegistry {
    /// Builds a registry from raw entries. Either every entry is valid and the
    /// registry is returned, or nothing is.
    pub fn from_raw(raw: &BTreeMap<String, RawEnvironment>) -> Result<Self> {
        let environments = raw
            .iter()
            .map(|(name, entry)| Ok((name.clone(), Environment::from_raw(name, entry)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { environments })
    }

    /// Commits the drafts collected by `init`, with the same all-or-nothing
    /// validation as [`EnvironmentRegistry::from_raw`].
    pub fn from_drafts(drafts: &[EnvironmentDraft]) -> Result<Self> {
        let raw: BTreeMap<String, RawEnvironment> = drafts
            .iter()
            .map(|draft| (draft.name.clone(), draft.to_raw()))
            .collect();
        Self::from_raw(&raw)
    }

    pub fn from_environments(environments: impl IntoIterator<Item = Environment>) -> Self {
        Self {
            environments: environments
                .into_iter()
                .map(|env| (env.name.clone(), env))
                .collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Result<&Environment> {
        self.environments.get(name).ok_or_else(|| SyncError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Environment> {
        self.environments.values()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }

    pub fn to_raw(&self) -> BTreeMap<String, RawEnvironment> {
        self.environments
            .iter()
            .map(|(name, env)| (name.clone(), env.to_raw()))
            .collect()
    }
}
