use std::net::IpAddr;
use tokio::net::lookup_host;
use tracing::{debug, error, warn};

use super::events::{EventSender, NetEvent};

/// Immediate outcome of a resolve request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Address known right away, no completion event will follow
    Cached(IpAddr),
    /// Lookup running, a [`NetEvent::Resolved`] will be queued when done
    Pending,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Broker host name is empty")]
    EmptyHost,

    #[error("Invalid broker host name: {0}")]
    InvalidHost(String),

    #[error("No runtime to run the lookup on: {0}")]
    NoRuntime(String),
}

/// Asynchronous hostname lookup with completion through the event queue.
pub trait NameResolver {
    fn resolve(&mut self, host: &str) -> Result<Resolution, ResolveError>;
}

/// Resolver backed by the system resolver via `tokio::net::lookup_host`.
///
/// IP literals resolve synchronously, anything else spawns a lookup task.
pub struct DnsResolver {
    events: EventSender,
}

impl DnsResolver {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl NameResolver for DnsResolver {
    fn resolve(&mut self, host: &str) -> Result<Resolution, ResolveError> {
        if host.is_empty() {
            return Err(ResolveError::EmptyHost);
        }
        if let Ok(address) = host.parse::<IpAddr>() {
            return Ok(Resolution::Cached(address));
        }
        if !is_valid_hostname(host) {
            return Err(ResolveError::InvalidHost(host.to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ResolveError::NoRuntime(e.to_string()))?;

        let events = self.events.clone();
        let host = host.to_string();
        runtime.spawn(async move {
            let address = match lookup_host((host.as_str(), 0)).await {
                Ok(addrs) => {
                    let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                    debug!("Lookup for {} returned {:?}", host, addrs);
                    // Prefer IPv4, the broker is usually only reachable there
                    addrs
                        .iter()
                        .find(|a| a.is_ipv4())
                        .or_else(|| addrs.first())
                        .copied()
                }
                Err(e) => {
                    warn!("Lookup for {} failed: {}", host, e);
                    None
                }
            };

            if events.send(NetEvent::Resolved { host, address }).is_err() {
                error!("Network event queue closed before lookup completed");
            }
        });

        Ok(Resolution::Pending)
    }
}

fn is_valid_hostname(host: &str) -> bool {
    let host = host.strip_suffix('.').unwrap_or(host);
    if host.is_empty() || host.len() > 253 {
        return false;
    }

    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
