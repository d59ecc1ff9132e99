use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::str::FromStr;

/// The address the exposition server binds to
///
/// Accepts a full socket address (`"127.0.0.1:9100"`, `"[::1]:9100"`), a host name with port
/// (`"localhost:9100"`), or the `":port"` shorthand, which binds to all IPv4 interfaces.
/// Host names are resolved when the server binds, see [`ListenAddress::resolve`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize)]
#[serde(try_from = "String")]
pub enum ListenAddress {
    Socket(SocketAddr),
    Host { host: String, port: u16 },
}

#[derive(Debug, miette::Diagnostic, thiserror::Error)]
pub enum ListenAddressError {
    #[error("Listen address must not be empty")]
    Empty,

    #[error("Invalid listen address '{address}'")]
    #[diagnostic(help("Use 'host:port' with an IP address or host name as host, or ':port'"))]
    Invalid {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Invalid port in listen address '{address}'")]
    InvalidPort {
        address: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Failed to resolve listen address '{address}'")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Listen address '{address}' did not resolve to any address")]
    Unresolved { address: String },
}

fn is_valid_host_name(host: &str) -> bool {
    !host.is_empty()
        && host
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
}

fn parse_port(address: &str, port: &str) -> Result<u16, ListenAddressError> {
    port.parse::<u16>()
        .map_err(|source| ListenAddressError::InvalidPort {
            address: address.to_string(),
            source,
        })
}

impl ListenAddress {
    /// The socket address to bind to, looking up host names
    ///
    /// The first address a host name resolves to is used.
    pub async fn resolve(&self) -> Result<SocketAddr, ListenAddressError> {
        match self {
            ListenAddress::Socket(addr) => Ok(*addr),
            ListenAddress::Host { host, port } => tokio::net::lookup_host((host.as_str(), *port))
                .await
                .map_err(|source| ListenAddressError::Resolve {
                    address: self.to_string(),
                    source,
                })?
                .next()
                .ok_or_else(|| ListenAddressError::Unresolved {
                    address: self.to_string(),
                }),
        }
    }
}

impl FromStr for ListenAddress {
    type Err = ListenAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ListenAddressError::Empty);
        }

        if let Some(port) = s.strip_prefix(':') {
            let port = parse_port(s, port)?;
            return Ok(ListenAddress::Socket(SocketAddr::from((
                Ipv4Addr::UNSPECIFIED,
                port,
            ))));
        }

        let parse_error = match s.parse::<SocketAddr>() {
            Ok(addr) => return Ok(ListenAddress::Socket(addr)),
            Err(e) => e,
        };

        match s.rsplit_once(':') {
            Some((host, port)) if is_valid_host_name(host) => Ok(ListenAddress::Host {
                host: host.to_string(),
                port: parse_port(s, port)?,
            }),
            _ => Err(ListenAddressError::Invalid {
                address: s.to_string(),
                source: parse_error,
            }),
        }
    }
}

impl TryFrom<String> for ListenAddress {
    type Error = ListenAddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SocketAddr> for ListenAddress {
    fn from(sa: SocketAddr) -> Self {
        ListenAddress::Socket(sa)
    }
}

impl std::fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenAddress::Socket(addr) => addr.fmt(f),
            ListenAddress::Host { host, port } => write!(f, "{}:{}", host, port),
        }
    }
}
