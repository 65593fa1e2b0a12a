//! Monitored target identity and per-target runtime state.

use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt;
use std::net::SocketAddr;

/// Address family a target is probed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Tag used in alerts, log lines and trace file names.
    pub fn label(self) -> &'static str {
        match self {
            AddressFamily::V4 => "IPv4",
            AddressFamily::V6 => "IPv6",
        }
    }

    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One (address, port, family) tuple under independent monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: Option<String>,
    pub address: String,
    pub family: AddressFamily,
    pub port: u16,
}

impl Target {
    pub fn new(name: Option<String>, address: &str, family: AddressFamily, port: u16) -> Self {
        Self {
            name: name.filter(|n| !n.is_empty()),
            address: address.to_string(),
            family,
            port,
        }
    }

    /// Name shown in alerts; `-` when unnamed.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("-")
    }

    /// `address:port`, bracketing IPv6 literals.
    pub fn endpoint(&self) -> String {
        if self.address.contains(':') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.family, self.display_name(), self.endpoint())
    }
}

/// Reachability status of a target.
///
/// The start of a down episode only exists while the target is down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    #[default]
    Up,
    Down { since: DateTime<Tz> },
}

#[cfg(test)]
impl TargetState {
    pub fn is_down(&self) -> bool {
        matches!(self, TargetState::Down { .. })
    }

    pub fn down_since(&self) -> Option<DateTime<Tz>> {
        match self {
            TargetState::Up => None,
            TargetState::Down { since } => Some(*since),
        }
    }
}
