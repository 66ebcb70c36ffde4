// envsync/src/environment/remote.rs
//! Parsing of `host:path` style remote locations.

pub const DEFAULT_SSH_PORT: u16 = 22;

/// A location that is either local (`host == None`) or reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    pub host: Option<String>,
    /// Port embedded in a `host:port:/path` location.
    pub port: Option<u16>,
    pub path: String,
}

impl RemoteAddress {
    /// Splits `host[:port]:path` at the first colon.
    ///
    /// Strings without a colon, with an empty side, or whose suffix is only a
    /// port number are local paths. A digits-only segment followed by `:/` is
    /// the SSH port.
    pub fn parse(input: &str) -> Self {
        let local = || RemoteAddress {
            host: None,
            port: None,
            path: input.to_string(),
        };

        let Some((host, rest)) = input.split_once(':') else {
            return local();
        };
        if host.is_empty() || rest.is_empty() || is_port(rest) {
            return local();
        }

        let (port, path) = match rest.split_once(':') {
            Some((port, path)) if is_port(port) && path.starts_with('/') => match port.parse::<u16>() {
                Ok(port) => (Some(port), path),
                Err(_) => return local(),
            },
            _ => (None, rest),
        };

        RemoteAddress {
            host: Some(host.to_string()),
            port,
            path: path.to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.host.is_some()
    }

    /// The location as rsync expects it: `host:path`, or the bare local path.
    /// The port is passed to rsync separately.
    pub fn rsync_target(&self) -> String {
        match &self.host {
            Some(host) => format!("{}:{}", host, self.path),
            None => self.path.clone(),
        }
    }

    /// Project deploy root for an uploads path, see [`base_path`].
    pub fn base_path(&self) -> String {
        base_path(&self.path)
    }
}

fn is_port(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn parent_dir(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => ".".to_string(),
    }
}

/// Parent of the uploads directory, with a trailing `/shared` release
/// directory swapped for its sibling `/current`.
pub fn base_path(uploads_path: &str) -> String {
    let parent = parent_dir(uploads_path);
    if parent.ends_with("/shared") {
        format!("{}/current", parent_dir(&parent).trim_end_matches('/'))
    } else {
        parent
    }
}

/// SSH connection details derived from an uploads path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDetails {
    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub remote_path: Option<String>,
}

/// An explicit `ssh_port` wins over one embedded in the uploads path.
pub fn extract_remote_details(uploads_path: &str, ssh_port: Option<u16>) -> RemoteDetails {
    let address = RemoteAddress::parse(uploads_path);
    match address.host.clone() {
        Some(host) => RemoteDetails {
            ssh_host: Some(host),
            ssh_port: ssh_port.or(address.port).unwrap_or(DEFAULT_SSH_PORT),
            remote_path: Some(address.base_path()),
        },
        None => RemoteDetails {
            ssh_host: None,
            ssh_port: DEFAULT_SSH_PORT,
            remote_path: None,
        },
    }
}

/// The `ssh:` value of a wp-cli alias: `user@host`, `user@host:2222` or
/// `user@host:/remote/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshField {
    pub host: String,
    pub port: Option<u16>,
    pub path: Option<String>,
}

impl SshField {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Some((host, rest)) = input.split_once(':') {
            if !host.is_empty() {
                if rest.starts_with('/') {
                    return SshField {
                        host: host.to_string(),
                        port: None,
                        path: Some(rest.to_string()),
                    };
                }
                if is_port(rest) {
                    if let Ok(port) = rest.parse::<u16>() {
                        return SshField {
                            host: host.to_string(),
                            port: Some(port),
                            path: None,
                        };
                    }
                }
            }
        }
        SshField {
            host: input.to_string(),
            port: None,
            path: None,
        }
    }
}
