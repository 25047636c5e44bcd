//! Instance deletion, now or after a delay.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::dns::DnsProvider;
use crate::error::{SpinupError, SpinupResult};
use crate::model::Subdomain;
use crate::poll::CancelToken;
use crate::provision::CloudApi;
use crate::resolve::{self, LogMode};

/// How a teardown ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum TeardownOutcome {
    Deleted { instance_id: u64 },
    Cancelled { instance_id: u64 },
}

/// Delete the `A` record for `label`, if there is one.
pub fn remove_subdomain(dns: &dyn DnsProvider, label: &str) -> SpinupResult<Option<Subdomain>> {
    let Some(sub) = resolve::find_subdomain(dns, label, LogMode::Report)? else {
        return Ok(None);
    };
    dns.delete_record(sub.id)?;
    info!(domain = %sub.fqdn(), record_id = sub.id, "subdomain removed");
    Ok(Some(sub))
}

/// Delete the instance, then the subdomain record when one is named.
/// A subdomain that no longer exists is not an error.
pub fn teardown(
    cloud: &dyn CloudApi,
    dns: Option<&dyn DnsProvider>,
    instance_id: u64,
    subdomain: Option<&str>,
) -> SpinupResult<()> {
    cloud.delete_instance(instance_id)?;
    info!(instance_id, "droplet deleted");

    match (dns, subdomain) {
        (Some(dns), Some(label)) => {
            if remove_subdomain(dns, label)?.is_none() {
                warn!(subdomain = label, "no DNS record to remove");
            }
        }
        (None, Some(label)) => {
            warn!(subdomain = label, "no root domain configured, DNS record left in place");
        }
        _ => {}
    }
    Ok(())
}

/// A teardown scheduled to run after a delay ("burn" mode).
///
/// Dropping the handle detaches the task; it still runs as long as
/// the process does.
pub struct DeferredTeardown {
    instance_id: u64,
    due: Instant,
    cancel: CancelToken,
    handle: JoinHandle<SpinupResult<TeardownOutcome>>,
}

impl DeferredTeardown {
    /// Start the countdown. The delay is measured from this call.
    pub fn schedule(
        cloud: Arc<dyn CloudApi>,
        dns: Option<Arc<dyn DnsProvider>>,
        instance_id: u64,
        subdomain: Option<String>,
        delay: Duration,
    ) -> SpinupResult<Self> {
        Self::schedule_with(cloud, dns, instance_id, subdomain, delay, CancelToken::new())
    }

    /// Like [`Self::schedule`], with the countdown tied to `cancel`.
    pub fn schedule_with(
        cloud: Arc<dyn CloudApi>,
        dns: Option<Arc<dyn DnsProvider>>,
        instance_id: u64,
        subdomain: Option<String>,
        delay: Duration,
        cancel: CancelToken,
    ) -> SpinupResult<Self> {
        let due = Instant::now() + delay;
        let token = cancel.clone();

        info!(instance_id, delay = ?delay, "teardown scheduled");
        let handle = thread::Builder::new()
            .name(format!("burn-{instance_id}"))
            .spawn(move || {
                if token.sleep(delay) {
                    info!(instance_id, "scheduled teardown cancelled");
                    return Ok(TeardownOutcome::Cancelled { instance_id });
                }
                teardown(
                    cloud.as_ref(),
                    dns.as_deref(),
                    instance_id,
                    subdomain.as_deref(),
                )?;
                Ok(TeardownOutcome::Deleted { instance_id })
            })?;

        Ok(Self {
            instance_id,
            due,
            cancel,
            handle,
        })
    }

    #[must_use]
    pub const fn instance_id(&self) -> u64 {
        self.instance_id
    }

    /// Time left before the delete call fires. Zero once due.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.due.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the countdown. Has no effect once the delete call started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the task ends and return its result.
    pub fn wait(self) -> SpinupResult<TeardownOutcome> {
        let instance_id = self.instance_id;
        self.handle.join().map_err(|_| {
            SpinupError::TaskFailed(format!("teardown of instance {instance_id} panicked"))
        })?
    }
}
