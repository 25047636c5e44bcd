use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{ApiFailure, SpinupResult};

/// One-shot reachability check against a freshly booted instance.
pub trait Probe: Send + Sync {
    /// `true` when `ip:port` answered with a success status. Every
    /// failure (refused, timed out, non-2xx) is just `false`.
    fn reachable(&self, ip: &str, port: u16) -> bool;
}

/// Plain `GET http://{ip}:{port}` with a short timeout; the body is
/// ignored.
pub struct HttpProbe {
    http: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> SpinupResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiFailure::transport(e.to_string()))?;
        Ok(Self { http })
    }
}

impl Probe for HttpProbe {
    fn reachable(&self, ip: &str, port: u16) -> bool {
        match self.http.get(format!("http://{ip}:{port}")).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(ip, port, error = %e, "probe failed");
                false
            }
        }
    }
}
