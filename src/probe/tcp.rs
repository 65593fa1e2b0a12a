//! TCP connect probe implementation.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpSocket;

use super::ProbeError;
use crate::monitor::AddressFamily;

/// Open and immediately close a TCP connection to `address:port` over `family`.
///
/// Resolution and connect together are bounded by `timeout`.
pub async fn run_tcp_probe(
    address: &str,
    port: u16,
    family: AddressFamily,
    timeout: Duration,
) -> Result<(), ProbeError> {
    bounded(timeout, connect(address, port, family, timeout)).await
}

/// Run `fut`, mapping an elapsed deadline to [`ProbeError::Timeout`].
async fn bounded<F>(timeout: Duration, fut: F) -> Result<(), ProbeError>
where
    F: Future<Output = Result<(), ProbeError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

async fn connect(
    address: &str,
    port: u16,
    family: AddressFamily,
    timeout: Duration,
) -> Result<(), ProbeError> {
    let addr = resolve_address(address, port, family).await?;

    let socket = match family {
        AddressFamily::V4 => TcpSocket::new_v4(),
        AddressFamily::V6 => TcpSocket::new_v6(),
    }
    .map_err(|e| ProbeError::Connect(format!("failed to create socket: {}", e)))?;

    let stream = socket.connect(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            ProbeError::Timeout(timeout)
        } else {
            ProbeError::Connect(format!("dial {} {}: {}", family, addr, e))
        }
    })?;

    drop(stream);
    Ok(())
}

/// Resolve to the first socket address of the requested family.
async fn resolve_address(
    address: &str,
    port: u16,
    family: AddressFamily,
) -> Result<SocketAddr, ProbeError> {
    // Try direct parse first
    if let Ok(ip) = address.parse::<IpAddr>() {
        let addr = SocketAddr::new(ip, port);
        if !family.matches(&addr) {
            return Err(ProbeError::Connect(format!(
                "{} is not an {} address",
                address, family
            )));
        }
        return Ok(addr);
    }

    let addrs: Vec<_> = tokio::net::lookup_host((address, port))
        .await
        .map_err(|e| ProbeError::Connect(format!("DNS resolution failed: {}", e)))?
        .collect();

    addrs
        .into_iter()
        .find(|a| family.matches(a))
        .ok_or_else(|| ProbeError::Connect(format!("no {} address found for {}", family, address)))
}
