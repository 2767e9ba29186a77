use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::ext::UrlExt;
use crate::request::Request;
use crate::Error;

use super::basic::basic_header;

/// Parsed `.netrc` file.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NetRc {
    machines: Vec<Machine>,
    default: Option<Machine>,
}

#[derive(Clone, Default, PartialEq, Eq)]
struct Machine {
    host: String,
    login: String,
    password: String,
}

impl NetRc {
    /// Parse the contents of a netrc file.
    ///
    /// Knows `machine`, `default`, `login`, `password`, `account` and `macdef`.
    /// Macro definitions are skipped up to the next empty line.
    pub fn parse(input: &str) -> Result<NetRc, Error> {
        let mut netrc = NetRc::default();

        // (is_default, machine) under construction
        let mut current: Option<(bool, Machine)> = None;

        let mut lines = input.lines();

        while let Some(line) = lines.next() {
            let mut tokens = line.split_whitespace();

            while let Some(token) = tokens.next() {
                match token {
                    "machine" => {
                        netrc.push(current.take());
                        let host = tokens.next().ok_or_else(|| {
                            Error::NetRc("machine without host name".into())
                        })?;
                        current = Some((
                            false,
                            Machine {
                                host: host.to_string(),
                                ..Default::default()
                            },
                        ));
                    }
                    "default" => {
                        netrc.push(current.take());
                        current = Some((true, Machine::default()));
                    }
                    "login" | "password" | "account" => {
                        let value = tokens
                            .next()
                            .ok_or_else(|| Error::NetRc(format!("{} without value", token)))?;
                        let Some((_, m)) = current.as_mut() else {
                            return Err(Error::NetRc(format!(
                                "{} outside machine entry",
                                token
                            )));
                        };
                        match token {
                            "login" => m.login = value.to_string(),
                            "password" => m.password = value.to_string(),
                            _ => {}
                        }
                    }
                    "macdef" => {
                        for l in lines.by_ref() {
                            if l.trim().is_empty() {
                                break;
                            }
                        }
                        break;
                    }
                    _ if token.starts_with('#') => break,
                    _ => {
                        return Err(Error::NetRc(format!("unexpected token: {}", token)));
                    }
                }
            }
        }

        netrc.push(current.take());

        Ok(netrc)
    }

    fn push(&mut self, entry: Option<(bool, Machine)>) {
        match entry {
            Some((true, m)) => self.default = Some(m),
            Some((false, m)) => self.machines.push(m),
            None => {}
        }
    }

    /// `(login, password)` for `host`, falling back on the `default` entry.
    pub fn credentials(&self, host: &str) -> Option<(&str, &str)> {
        self.machines
            .iter()
            .find(|m| m.host.eq_ignore_ascii_case(host))
            .or(self.default.as_ref())
            .map(|m| (m.login.as_str(), m.password.as_str()))
    }
}

impl fmt::Debug for NetRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hosts: Vec<&str> = self.machines.iter().map(|m| m.host.as_str()).collect();
        f.debug_struct("NetRc")
            .field("machines", &hosts)
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// Basic auth with credentials looked up per host in a netrc file.
///
/// The file is read once, on construction.
#[derive(Clone, Debug)]
pub struct NetRcAuth {
    netrc: Arc<NetRc>,
}

impl NetRcAuth {
    /// Read `$HOME/.netrc`.
    pub fn from_home() -> Result<Self, Error> {
        let home = home::home_dir()
            .ok_or_else(|| Error::NetRc("home directory not found".into()))?;
        Self::from_file(home.join(".netrc"))
    }

    /// Read the netrc file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let input = fs::read_to_string(path)
            .map_err(|e| Error::NetRc(format!("{}: {}", path.display(), e)))?;
        debug!("Read netrc: {}", path.display());
        Ok(Self::from_netrc(NetRc::parse(&input)?))
    }

    /// Use an already parsed file.
    pub fn from_netrc(netrc: NetRc) -> Self {
        NetRcAuth {
            netrc: Arc::new(netrc),
        }
    }

    pub(crate) fn apply(&self, request: &mut Request) -> Result<(), Error> {
        let host = request.url().host_str().unwrap_or_default().to_string();

        let Some((login, password)) = self.netrc.credentials(&host) else {
            trace!("No netrc entry for {}", request.url().authority_str());
            return Ok(());
        };

        request.set_header(http::header::AUTHORIZATION, basic_header(login, password))
    }
}
