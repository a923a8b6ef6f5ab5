//! Daemon endpoint parsing

use crate::{ProviderError, Result};
use std::path::PathBuf;

/// Where the container daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEndpoint {
    /// Local unix socket
    Unix(PathBuf),
    /// Plain HTTP over TCP, `http://host:port`
    Http(String),
    /// HTTP over TLS, `https://host:port`
    Https(String),
}

impl DaemonEndpoint {
    /// Parse a daemon host string.
    ///
    /// `tcp://` endpoints become `https://` when `tls` is set, `http://`
    /// otherwise. A bare absolute path is taken as a unix socket.
    pub fn parse(host: &str, tls: bool) -> Result<Self> {
        let host = host.trim();
        if let Some(path) = host.strip_prefix("unix://") {
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if host.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(host)));
        }
        if let Some(rest) = host.strip_prefix("tcp://") {
            return Ok(if tls {
                Self::Https(format!("https://{}", rest))
            } else {
                Self::Http(format!("http://{}", rest))
            });
        }
        if host.starts_with("https://") {
            return Ok(Self::Https(host.to_string()));
        }
        if host.starts_with("http://") {
            return Ok(if tls {
                Self::Https(host.replacen("http://", "https://", 1))
            } else {
                Self::Http(host.to_string())
            });
        }
        Err(ProviderError::ConfigError(format!(
            "Unsupported daemon endpoint: {}",
            host
        )))
    }

    /// Canonical URL for this endpoint
    pub fn url(&self) -> String {
        match self {
            Self::Unix(path) => format!("unix://{}", path.display()),
            Self::Http(url) | Self::Https(url) => url.clone(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    /// Host component of a TCP endpoint, without port or brackets
    pub fn hostname(&self) -> Option<String> {
        let url = match self {
            Self::Unix(_) => return None,
            Self::Http(url) | Self::Https(url) => url,
        };
        let authority = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(url)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let authority = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);

        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next().unwrap_or_default()
        } else {
            authority.split(':').next().unwrap_or_default()
        };

        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_socket() {
        let ep = DaemonEndpoint::parse("unix:///var/run/docker.sock", false).unwrap();
        assert_eq!(ep, DaemonEndpoint::Unix(PathBuf::from("/var/run/docker.sock")));
        assert!(ep.is_local());
        assert_eq!(ep.url(), "unix:///var/run/docker.sock");
        assert_eq!(ep.hostname(), None);

        let bare = DaemonEndpoint::parse("/run/podman/podman.sock", false).unwrap();
        assert!(bare.is_local());
    }

    #[test]
    fn test_parse_tcp() {
        let plain = DaemonEndpoint::parse("tcp://10.1.2.3:2375", false).unwrap();
        assert_eq!(plain, DaemonEndpoint::Http("http://10.1.2.3:2375".to_string()));

        let tls = DaemonEndpoint::parse("tcp://docker.internal:2376", true).unwrap();
        assert_eq!(tls, DaemonEndpoint::Https("https://docker.internal:2376".to_string()));
        assert!(!tls.is_local());
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = DaemonEndpoint::parse("ssh://user@host", false).unwrap_err();
        assert!(matches!(err, ProviderError::ConfigError(_)));
    }

    #[test]
    fn test_hostname() {
        let cases = [
            ("http://docker.internal:2375", "docker.internal"),
            ("https://10.0.0.7:2376/v1.41", "10.0.0.7"),
            ("https://[::1]:2376", "::1"),
            ("http://admin@build-host", "build-host"),
        ];
        for (url, expected) in cases {
            let ep = DaemonEndpoint::parse(url, false).unwrap();
            assert_eq!(ep.hostname().as_deref(), Some(expected), "{}", url);
        }
    }
}
