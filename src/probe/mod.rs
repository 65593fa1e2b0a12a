//! Reachability probes.
//!
//! A probe is a single bounded-time TCP connect; the connection is closed as
//! soon as it is established.

mod tcp;

pub use tcp::*;

use crate::monitor::Target;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Probe failure, classified by the prober itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
}

impl ProbeError {
    /// Timeouts suggest a path-level problem and are worth a trace;
    /// refusals and resolution errors are not.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

/// Performs one reachability check against a target.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target, timeout: Duration) -> Result<(), ProbeError>;
}

/// Plain TCP connect prober.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &Target, timeout: Duration) -> Result<(), ProbeError> {
        run_tcp_probe(&target.address, target.port, target.family, timeout).await
    }
}
