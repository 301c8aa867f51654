//! Connection-string parsing.
//!
//! Two forms are accepted:
//!
//! - the MySQL driver form
//!   `[user[:password]@][tcp[(host[:port])]|unix(socket)]/dbname[?params][#entity]`
//! - a URL `mysql://[user[:password]@]host[:port]/dbname[?params][#entity]`
//!
//! The optional `#entity` fragment restricts introspection to one table or
//! view. Query parameters are accepted and ignored.

use regex::Regex;
use sqlx::mysql::MySqlConnectOptions;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use url::{Host, Url};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Default for Address {
    fn default() -> Self {
        Address::Tcp {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') => write!(f, "tcp([{host}]:{port})"),
            Address::Tcp { host, port } => write!(f, "tcp({host}:{port})"),
            Address::Unix(path) => write!(f, "unix({})", path.display()),
        }
    }
}

/// A decoded connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub user: String,
    pub password: Option<String>,
    pub address: Address,
    /// Database whose entities are listed. May be empty; introspection
    /// rejects that.
    pub database: String,
    /// Single table or view to fetch instead of the whole database.
    pub entity: Option<String>,
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("address", &self.address)
            .field("database", &self.database)
            .field("entity", &self.entity)
            .finish()
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        write!(f, "{}/{}", self.address, self.database)?;
        if let Some(entity) = &self.entity {
            write!(f, "#{entity}")?;
        }
        Ok(())
    }
}

impl ConnectionTarget {
    /// Parse either connection-string form. Returns `None` when the text is
    /// not a connection string at all.
    pub fn parse(descriptor: &str) -> Option<Self> {
        if descriptor.starts_with("mysql://") {
            Self::parse_url(descriptor)
        } else {
            Self::parse_driver_dsn(descriptor)
        }
    }

    fn parse_driver_dsn(descriptor: &str) -> Option<Self> {
        static DSN: OnceLock<Option<Regex>> = OnceLock::new();
        let re = DSN
            .get_or_init(|| {
                Regex::new(
                    r"(?s)^(?:(?P<user>[^:@/()]*)(?::(?P<password>.*))?@)?(?:(?P<net>[A-Za-z0-9_]+)(?:\((?P<addr>[^)]*)\))?)?/(?P<db>[^/?#]*)(?:\?(?P<params>[^#]*))?(?:#(?P<entity>.*))?$",
                )
                .ok()
            })
            .as_ref()?;
        let caps = re.captures(descriptor)?;

        let address = match (caps.name("net").map(|m| m.as_str()), caps.name("addr")) {
            (None, _) => Address::default(),
            (Some("tcp"), None) => Address::default(),
            (Some("tcp"), Some(addr)) => parse_tcp_address(addr.as_str())?,
            (Some("unix"), Some(path)) if !path.as_str().is_empty() => {
                Address::Unix(PathBuf::from(path.as_str()))
            }
            _ => return None,
        };

        Some(Self {
            user: caps.name("user").map(|m| m.as_str().to_string()).unwrap_or_default(),
            password: caps.name("password").map(|m| m.as_str().to_string()),
            address,
            database: caps.name("db").map(|m| m.as_str().to_string()).unwrap_or_default(),
            entity: non_empty(caps.name("entity").map(|m| m.as_str())),
        })
    }

    fn parse_url(descriptor: &str) -> Option<Self> {
        let url = Url::parse(descriptor).ok()?;
        let host = match url.host()? {
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => addr.to_string(),
        };
        let database = url.path().trim_start_matches('/');
        if database.contains('/') {
            return None;
        }

        Some(Self {
            user: url.username().to_string(),
            password: url.password().map(str::to_string),
            address: Address::Tcp {
                host,
                port: url.port().unwrap_or(DEFAULT_PORT),
            },
            database: database.to_string(),
            entity: non_empty(url.fragment()),
        })
    }

    /// Options for opening connections to the server. No default database is
    /// selected; `database` is only used as a metadata filter.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new();
        if !self.user.is_empty() {
            options = options.username(&self.user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        match &self.address {
            Address::Tcp { host, port } => options.host(host).port(*port),
            Address::Unix(path) => options.socket(path),
        }
    }
}

fn parse_tcp_address(addr: &str) -> Option<Address> {
    if addr.is_empty() {
        return Some(Address::default());
    }
    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        match rest {
            "" => (host, None),
            _ => (host, Some(rest.strip_prefix(':')?)),
        }
    } else {
        match addr.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (addr, None),
        }
    };
    let port = match port {
        Some(port) => port.parse().ok()?,
        None => DEFAULT_PORT,
    };
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    Some(Address::Tcp {
        host: host.to_string(),
        port,
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
