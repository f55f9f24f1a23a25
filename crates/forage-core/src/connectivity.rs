//! Network reachability.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

/// Default time allowed for the reachability probe to connect.
const PROBE_TIMEOUT_SECS: u64 = 3;

/// Reports whether network access is currently available.
///
/// Called synchronously at the start of every fetch; must not have side effects.
pub trait ConnectivityChecker: Send + Sync {
    fn has_connectivity(&self) -> bool;
}

/// Checks connectivity by opening (and immediately closing) a TCP connection
/// to a known host.
///
/// `has_connectivity` blocks the calling thread: name resolution plus up to
/// `timeout` (3 s by default) per resolved address. Keep the address list
/// short, and arm any interrupt handling before starting a fetch.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// `addr` is a `host:port` pair, e.g. `www.opencaching.us:443`.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ConnectivityChecker for TcpProbe {
    fn has_connectivity(&self) -> bool {
        let addrs = match self.addr.to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "Probe address did not resolve");
                return false;
            }
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return true,
                Err(e) => debug!(%addr, error = %e, "Probe connect failed"),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_probe_reaches_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let probe = TcpProbe::new(addr.to_string()).with_timeout(Duration::from_secs(1));
        assert!(probe.has_connectivity());
    }

    #[test]
    fn test_probe_fails_on_closed_port() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let probe = TcpProbe::new(addr.to_string()).with_timeout(Duration::from_secs(1));
        assert!(!probe.has_connectivity());
    }

    #[test]
    fn test_probe_fails_on_unparseable_address() {
        assert!(!TcpProbe::new("not an address").has_connectivity());
    }
}
