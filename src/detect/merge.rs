// envsync/src/detect/merge.rs
use super::DetectedSources;
use super::project::ProjectStructure;
use super::wp_cli::WpCliAlias;
use crate::config::RawEnvironment;
use crate::environment::remote::{DEFAULT_SSH_PORT, RemoteAddress, SshField, extract_remote_details};
use crate::environment::DEVELOPMENT;

pub const DEFAULT_DEVELOPMENT_URL: &str = "https://example.test";

/// What the operator typed during init. Anything set here beats every
/// detected value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    pub url: Option<String>,
    pub uploads_path: Option<String>,
    pub ssh_port: Option<u16>,
}

/// An environment as assembled during init, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDraft {
    pub name: String,
    pub url: String,
    pub uploads_path: String,
    pub cli_alias: Option<String>,
    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub remote_path: Option<String>,
}

impl EnvironmentDraft {
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
}

/// Connection details read off a wp-cli alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDetails {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub remote_path: Option<String>,
    pub uploads_path: Option<String>,
}

/// Turns an alias `{ssh, path}` into host, port, project root and uploads
/// location. When `path:` is the core directory and `ssh:` carries an
/// rsync-style path ending in it, the project root is what precedes the core
/// directory.
pub fn alias_details(alias: &WpCliAlias, fallback: ProjectStructure) -> Option<AliasDetails> {
    let ssh = alias.ssh.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let field = SshField::parse(ssh);
    let path_line = alias.path.clone().filter(|p| !p.is_empty());
    let structure = path_line
        .as_deref()
        .and_then(ProjectStructure::from_path_hint)
        .unwrap_or(fallback);
    let core = structure.core_path();

    let remote_path = match (field.path, path_line) {
        (Some(ssh_path), Some(line)) if line == core => {
            let suffix = format!("/{}", core);
            Some(ssh_path.strip_suffix(suffix.as_str()).unwrap_or(ssh_path.as_str()).to_string())
        }
        (Some(ssh_path), None) => Some(ssh_path),
        (_, line) => line,
    };

    let uploads_path = remote_path
        .as_deref()
        .map(|root| format!("{}:{}/{}", field.host, root.trim_end_matches('/'), structure.uploads_path()));

    Some(AliasDetails {
        ssh_host: field.host,
        ssh_port: field.port.unwrap_or(DEFAULT_SSH_PORT),
        remote_path,
        uploads_path,
    })
}

fn answered(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// The local environment. URL: answer, sync.sh, `WP_HOME`, then the
/// `.test` placeholder. Uploads: answer, sync.sh, then the structure default.
pub fn draft_development(sources: &DetectedSources, answers: &Answers, wp_home: Option<String>) -> EnvironmentDraft {
    let script = sources.sync_sh.as_ref().and_then(|s| s.entry(DEVELOPMENT));

    let url = answered(&answers.url)
        .or_else(|| script.and_then(|e| e.url.clone()))
        .or_else(|| wp_home.filter(|h| !h.is_empty()))
        .unwrap_or_else(|| DEFAULT_DEVELOPMENT_URL.to_string());
    let uploads_path = answered(&answers.uploads_path)
        .or_else(|| script.and_then(|e| e.uploads_path.clone()))
        .unwrap_or_else(|| sources.structure.uploads_path().to_string());

    EnvironmentDraft {
        name: DEVELOPMENT.to_string(),
        url,
        uploads_path,
        cli_alias: None,
        ssh_host: None,
        ssh_port: DEFAULT_SSH_PORT,
        remote_path: None,
    }
}

/// A remote environment reachable through the `@<name>` wp-cli alias.
///
/// Field precedence is answer, then sync.sh, then wp-cli.yml. Returns `None`
/// when neither a URL nor an uploads path can be settled, which means the
/// environment is skipped.
pub fn draft_remote(name: &str, sources: &DetectedSources, answers: &Answers) -> Option<EnvironmentDraft> {
    let script = sources.sync_sh.as_ref().and_then(|s| s.entry(name));
    let alias = sources
        .wp_cli
        .as_ref()
        .and_then(|c| c.alias(name))
        .and_then(|a| alias_details(a, sources.structure));

    let url = answered(&answers.url)
        .or_else(|| script.and_then(|e| e.url.clone()))
        .or_else(|| alias.as_ref().map(|_| format!("https://{}.example.com", name)))?;
    let uploads_path = answered(&answers.uploads_path)
        .or_else(|| script.and_then(|e| e.uploads_path.clone()))
        .or_else(|| alias.as_ref().and_then(|a| a.uploads_path.clone()))?;

    let uploads_host = RemoteAddress::parse(&uploads_path).host;
    let (ssh_host, ssh_port, remote_path) = match alias {
        Some(details) if uploads_host.as_deref() == Some(details.ssh_host.as_str()) => {
            let remote_path = details
                .remote_path
                .or_else(|| extract_remote_details(&uploads_path, Some(details.ssh_port)).remote_path);
            (
                Some(details.ssh_host),
                answers.ssh_port.unwrap_or(details.ssh_port),
                remote_path,
            )
        }
        _ => {
            let derived = extract_remote_details(&uploads_path, answers.ssh_port);
            (derived.ssh_host, derived.ssh_port, derived.remote_path)
        }
    };

    Some(EnvironmentDraft {
        name: name.to_string(),
        url,
        uploads_path,
        cli_alias: Some(format!("@{}", name)),
        ssh_host,
        ssh_port,
        remote_path,
    })
}
