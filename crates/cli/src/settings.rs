//! Settings file loader.
//!
//! The file is a list of whitespace-delimited directives, one per line:
//!
//! ```text
//! radoscms.config /etc/ceph/ceph.conf
//! radoscms.user   atlassfst
//! radoscms.pools  /data:poolA /:poolDefault
//! ```
//!
//! `#` starts a comment. Unknown directives are logged and ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use corelib::{Error, MatchPolicy, PrefixRoutingTable, Result, DEFAULT_SERVICE_PORT};
use refresh::{PublishMode, DEFAULT_DUMP_FILE, DEFAULT_INTERVAL};
use tracing::{debug, warn};

const PREFIX: &str = "radoscms.";

/// Fixed target answered in redirect-only mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
}

impl FromStr for RedirectTarget {
    type Err = Error;

    /// `host` or `host:port`; the port defaults to the service port.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid redirect target '{s}'"));
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
            None => (s, DEFAULT_SERVICE_PORT),
        };
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything the service reads from its settings file.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Cluster configuration file handed to the cluster client.
    pub ceph_conf: Option<PathBuf>,
    /// Cluster identity for the client and the topology dump.
    pub user: String,
    /// Raw `<prefix>:<pool>` tokens, in file order.
    pub pools: Vec<String>,
    /// Redirect-only mode when set.
    pub redirect: Option<RedirectTarget>,
    pub port: u16,
    pub dump_file: PathBuf,
    pub interval: Duration,
    pub publish: PublishMode,
    pub match_policy: MatchPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ceph_conf: None,
            user: "admin".to_string(),
            pools: Vec::new(),
            redirect: None,
            port: DEFAULT_SERVICE_PORT,
            dump_file: PathBuf::from(DEFAULT_DUMP_FILE),
            interval: DEFAULT_INTERVAL,
            publish: PublishMode::default(),
            match_policy: MatchPolicy::default(),
        }
    }
}

impl Settings {
    /// Read and parse a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        debug!(path = %path.display(), "loading settings");
        text.parse()
    }

    /// Routing table holding every well-formed pool binding. Malformed
    /// tokens are logged and skipped.
    pub fn routing_table(&self) -> PrefixRoutingTable {
        let mut routing = PrefixRoutingTable::with_policy(self.match_policy);
        for token in &self.pools {
            // Logged by the table.
            let _ = routing.add_binding(token);
        }
        routing
    }
}

impl FromStr for Settings {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut settings = Settings::default();
        let mut conf_seen = false;
        let mut user_seen = false;

        for (index, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let mut words = line.split_whitespace();
            let Some(directive) = words.next() else {
                continue;
            };
            let lineno = index + 1;
            let Some(name) = directive.strip_prefix(PREFIX) else {
                debug!(lineno, directive, "ignoring foreign directive");
                continue;
            };

            let first = words.next();
            let value = || {
                first.ok_or_else(|| {
                    Error::Config(format!("line {lineno}: {directive} needs a value"))
                })
            };

            match name {
                "config" if !conf_seen => {
                    settings.ceph_conf = Some(PathBuf::from(value()?));
                    conf_seen = true;
                }
                "user" if !user_seen => {
                    settings.user = value()?.to_string();
                    user_seen = true;
                }
                "config" | "user" => {
                    debug!(lineno, directive, "repeated directive, keeping the first");
                }
                "pools" => settings
                    .pools
                    .extend(first.into_iter().chain(words).map(String::from)),
                "redirect" => settings.redirect = Some(value()?.parse()?),
                "port" => settings.port = parse_number(lineno, directive, value()?)?,
                "dumpfile" => settings.dump_file = PathBuf::from(value()?),
                "interval" => {
                    let secs: u64 = parse_number(lineno, directive, value()?)?;
                    if secs == 0 {
                        return Err(Error::Config(format!(
                            "line {lineno}: {directive} must be positive"
                        )));
                    }
                    settings.interval = Duration::from_secs(secs);
                }
                "publish" => settings.publish = value()?.parse()?,
                "match" => settings.match_policy = value()?.parse()?,
                _ => warn!(lineno, directive, "unknown directive ignored"),
            }
        }

        Ok(settings)
    }
}

fn parse_number<T: FromStr>(lineno: usize, directive: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::Config(format!(
            "line {lineno}: {directive} expects a number, got '{value}'"
        ))
    })
}
