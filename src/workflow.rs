//! The provisioning workflow.
//!
//! ```text
//! Idle → Resolving → Creating → AwaitingActive → AttachingFirewall
//!      → AwaitingNetwork → ResolvingAddress → RegisteringDomain
//!      → AwaitingDomainPropagation → ConfiguringRemote → Done
//! ```
//!
//! Every wait is bounded by [`Timeouts`] and interrupted by the
//! run's [`CancelToken`]. Any failure after the create call deletes
//! the new instance (and the DNS record, if this run created it)
//! before the error is returned; a failed run never yields a
//! partial outcome.
//!
//! Two runs for the same name must not overlap: the existence check
//! and the create call are not atomic. Callers serialize per name.

use std::fmt;

use tracing::{error, info, warn};

use crate::config::{Config, Timeouts};
use crate::dns::{self, DnsProvider};
use crate::error::{SpinupError, SpinupResult};
use crate::model::{
    DomainRecord, Instance, NewRecord, ProvisioningOutcome, SizeTier, Snapshot, Subdomain,
};
use crate::poll::{CancelToken, PollPolicy, poll_until};
use crate::probe::Probe;
use crate::provision::{self, CloudApi};
use crate::remote::{self, Connector, ProxySettings, SshTarget};
use crate::resolve::{self, LogMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Creating,
    AwaitingActive,
    AttachingFirewall,
    AwaitingNetwork,
    ResolvingAddress,
    RegisteringDomain,
    AwaitingDomainPropagation,
    ConfiguringRemote,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Creating => "creating",
            Self::AwaitingActive => "awaiting active",
            Self::AttachingFirewall => "attaching firewall",
            Self::AwaitingNetwork => "awaiting network",
            Self::ResolvingAddress => "resolving address",
            Self::RegisteringDomain => "registering domain",
            Self::AwaitingDomainPropagation => "awaiting domain propagation",
            Self::ConfiguringRemote => "configuring remote",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    pub name: String,
    pub create: bool,
    pub subdomain: Option<String>,
    pub size: SizeTier,
    pub tags: Vec<String>,
}

impl ProvisionRequest {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            create: false,
            subdomain: None,
            size: SizeTier::default(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    #[must_use]
    pub fn subdomain(mut self, label: &str) -> Self {
        self.subdomain = Some(label.to_string());
        self
    }

    #[must_use]
    pub const fn size(mut self, size: SizeTier) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }
}

/// Undoes a half-finished run when dropped while still armed.
struct Rollback<'a> {
    cloud: &'a dyn CloudApi,
    dns: Option<&'a dyn DnsProvider>,
    instance_id: u64,
    record_id: Option<u64>,
    armed: bool,
}

impl Rollback<'_> {
    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(instance_id = self.instance_id, "provisioning failed, rolling back");

        if let (Some(dns), Some(record_id)) = (self.dns, self.record_id) {
            match dns.delete_record(record_id) {
                Ok(()) => info!(record_id, "DNS record removed"),
                Err(e) => error!(record_id, error = %e, "could not remove DNS record"),
            }
        }
        match self.cloud.delete_instance(self.instance_id) {
            Ok(()) => info!(instance_id = self.instance_id, "droplet deleted"),
            Err(e) => error!(
                instance_id = self.instance_id,
                error = %e,
                "could not delete droplet, remove it by hand"
            ),
        }
    }
}

/// One provisioning run's collaborators.
pub struct Workflow<'a> {
    pub config: &'a Config,
    pub cloud: &'a dyn CloudApi,
    pub dns: Option<&'a dyn DnsProvider>,
    pub connector: &'a dyn Connector,
    pub probe: &'a dyn Probe,
    pub cancel: &'a CancelToken,
    pub upstream_port: u16,
}

impl Workflow<'_> {
    /// Drive one request to completion.
    ///
    /// `Ok(None)` means no instance with that name exists and
    /// creation was not requested.
    pub fn run(&self, req: &ProvisionRequest) -> SpinupResult<Option<ProvisioningOutcome>> {
        info!(name = %req.name, stage = %Stage::Idle, "provisioning requested");

        let resolved = step(Stage::Resolving, || {
            validate_request(req)?;

            if let Some(existing) =
                resolve::find_instance_by_name(self.cloud, &req.name, LogMode::Report)?
            {
                info!(instance_id = existing.id, "droplet exists, skipping creation");
                return Ok(Resolved::Existing(Box::new(existing)));
            }
            if !req.create {
                return Ok(Resolved::Absent);
            }
            self.resolve_snapshot().map(Resolved::Create)
        })?;

        let snapshot = match resolved {
            Resolved::Existing(instance) => {
                return Ok(Some(ProvisioningOutcome {
                    instance: *instance,
                    subdomain: None,
                    domain: None,
                    created: false,
                }));
            }
            Resolved::Absent => return Ok(None),
            Resolved::Create(snapshot) => snapshot,
        };

        let created = step(Stage::Creating, || {
            let profile = provision::build_profile(
                self.config,
                &req.name,
                req.size,
                snapshot.as_ref(),
                &req.tags,
            );
            self.cloud.create_instance(&profile)
        })?;

        let mut rollback = Rollback {
            cloud: self.cloud,
            dns: self.dns,
            instance_id: created.id,
            record_id: None,
            armed: true,
        };
        let outcome = self.finish(req, &created, &mut rollback)?;
        rollback.disarm();

        info!(
            instance_id = outcome.instance.id,
            domain = outcome.domain.as_deref().unwrap_or("-"),
            stage = %Stage::Done,
            "provisioning complete"
        );
        Ok(Some(outcome))
    }

    fn resolve_snapshot(&self) -> SpinupResult<Option<Snapshot>> {
        let Some(name) = &self.config.snapshot else {
            return Ok(None);
        };
        resolve::find_snapshot_by_name(self.cloud, name)?
            .map(Some)
            .ok_or_else(|| SpinupError::SnapshotNotFound(name.clone()))
    }

    /// Everything after the create call.
    fn finish(
        &self,
        req: &ProvisionRequest,
        created: &Instance,
        rollback: &mut Rollback<'_>,
    ) -> SpinupResult<ProvisioningOutcome> {
        let id = created.id;
        let timeouts = &self.config.timeouts;

        let active = step(Stage::AwaitingActive, || {
            await_active(self.cloud, id, timeouts, self.cancel)
        })?;

        let firewall_attached = match &self.config.firewall {
            Some(name) => {
                step(Stage::AttachingFirewall, || {
                    let firewall = resolve::find_firewall_by_name(self.cloud, name)?
                        .ok_or_else(|| SpinupError::FirewallNotFound(name.clone()))?;
                    self.cloud.attach_firewall(&firewall.id, id)?;
                    info!(firewall = %firewall.name, instance_id = id, "firewall attached");
                    Ok(())
                })?;
                true
            }
            None => false,
        };

        let domain_target = match (&req.subdomain, self.dns) {
            (Some(label), Some(dns)) => Some((label.as_str(), dns)),
            (Some(label), None) => {
                warn!(subdomain = %label, "no root domain configured, skipping DNS");
                None
            }
            _ => None,
        };
        let configure_remote = domain_target.is_some() && self.config.ssl.is_some();

        if firewall_attached || configure_remote {
            step(Stage::AwaitingNetwork, || {
                let ip = active.public_ipv4().ok_or(SpinupError::NoPublicAddress(id))?;
                if wait_for_network(self.probe, ip, timeouts, self.cancel)? {
                    Ok(())
                } else {
                    Err(SpinupError::NetworkTimeout {
                        ip: ip.to_string(),
                        port: timeouts.network_port,
                        attempts: timeouts.network_attempts,
                    })
                }
            })?;
        }

        let instance = step(Stage::ResolvingAddress, || {
            let fresh = self.cloud.get_instance(id)?;
            let ip = fresh.public_ipv4().ok_or(SpinupError::NoPublicAddress(id))?;
            info!(instance_id = id, ip, "public address resolved");
            Ok(fresh)
        })?;
        let ip = instance
            .public_ipv4()
            .ok_or(SpinupError::NoPublicAddress(id))?
            .to_string();

        let Some((label, dns)) = domain_target else {
            return Ok(ProvisioningOutcome {
                instance,
                subdomain: None,
                domain: None,
                created: true,
            });
        };

        let record = step(Stage::RegisteringDomain, || register_subdomain(dns, label, &ip))?;
        rollback.record_id = record.as_ref().map(|r| r.id);

        step(Stage::AwaitingDomainPropagation, || {
            await_subdomain(dns, label, timeouts, self.cancel).map(|_| ())
        })?;

        let fqdn = dns::fqdn(label, dns.domain());
        info!(name = %req.name, domain = %fqdn, "droplet reachable by name");

        match &self.config.ssl {
            Some(ssl) => step(Stage::ConfiguringRemote, || {
                let target = SshTarget {
                    host: ip.clone(),
                    user: ssl.user.clone(),
                    private_key: ssl.private_key.clone(),
                    passphrase: ssl.passphrase.clone(),
                };
                let settings = ProxySettings {
                    email: ssl.email.clone(),
                    upstream_port: self.upstream_port,
                };
                remote::configure(self.connector, &target, &fqdn, &settings)
            })?,
            None => info!("no SSL identity configured, skipping remote configuration"),
        }

        Ok(ProvisioningOutcome {
            instance,
            subdomain: Some(label.to_string()),
            domain: Some(fqdn),
            created: true,
        })
    }
}

enum Resolved {
    Existing(Box<Instance>),
    Absent,
    Create(Option<Snapshot>),
}

/// Enter `stage`, run `f`, and tag any error with the stage.
fn step<T, F>(stage: Stage, f: F) -> SpinupResult<T>
where
    F: FnOnce() -> SpinupResult<T>,
{
    info!(stage = %stage, "entering stage");
    f().map_err(|e| {
        error!(stage = %stage, error = %e, "stage failed");
        e.at(stage)
    })
}

fn validate_request(req: &ProvisionRequest) -> SpinupResult<()> {
    if req.name.trim().is_empty() {
        return Err(SpinupError::InvalidInput("droplet name is empty".into()));
    }
    if let Some(label) = &req.subdomain {
        if !is_valid_label(label) {
            return Err(SpinupError::InvalidInput(format!(
                "'{label}' is not a valid DNS label"
            )));
        }
    }
    Ok(())
}

/// Lowercase letters, digits and inner hyphens, 1 to 63 characters.
#[must_use]
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 63
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Poll the instance until the provider reports it active.
pub fn await_active(
    cloud: &dyn CloudApi,
    id: u64,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> SpinupResult<Instance> {
    let policy = PollPolicy::within(timeouts.active_interval, timeouts.active_deadline);
    poll_until(&policy, cancel, "droplet to become active", |attempt| {
        let instance = cloud.get_instance(id)?;
        if instance.is_active() {
            info!(instance_id = id, "droplet is active");
            return Ok(Some(instance));
        }
        if attempt == 1 {
            info!(instance_id = id, status = %instance.status, "droplet still deploying");
        }
        Ok(None)
    })
}

/// Probe `ip` until it answers or the attempt budget is spent.
///
/// Individual probe failures are not reported. Exhausting the budget
/// gives `Ok(false)`; only cancellation is an error.
pub fn wait_for_network(
    probe: &dyn Probe,
    ip: &str,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> SpinupResult<bool> {
    let port = timeouts.network_port;
    info!(ip, port, "checking network access");

    let policy = PollPolicy::attempts(timeouts.network_interval, timeouts.network_attempts);
    match poll_until(&policy, cancel, "network access", |_| {
        Ok(probe.reachable(ip, port).then_some(()))
    }) {
        Ok(()) => {
            info!(ip, port, "network access confirmed");
            Ok(true)
        }
        Err(SpinupError::Timeout { .. }) => {
            error!(ip, port, "timed out waiting for network access");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Create the `A` record for `label` unless one already exists.
/// Returns the new record, or `None` if an existing one was kept.
pub fn register_subdomain(
    dns: &dyn DnsProvider,
    label: &str,
    ip: &str,
) -> SpinupResult<Option<DomainRecord>> {
    if let Some(existing) = resolve::find_subdomain(dns, label, LogMode::Report)? {
        info!(
            subdomain = label,
            ip = %existing.ip,
            "subdomain already registered, keeping it"
        );
        return Ok(None);
    }

    info!(subdomain = label, domain = dns.domain(), ip, "creating A record");
    dns.create_record(&NewRecord::a(label, ip)).map(Some)
}

/// Poll the record listing until `label` shows up.
pub fn await_subdomain(
    dns: &dyn DnsProvider,
    label: &str,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> SpinupResult<Subdomain> {
    let policy = PollPolicy::within(timeouts.dns_interval, timeouts.dns_deadline);
    let fqdn = dns::fqdn(label, dns.domain());
    poll_until(&policy, cancel, "DNS record to appear", |_| {
        let found = resolve::find_subdomain(dns, label, LogMode::Quiet)?;
        if found.is_some() {
            info!(domain = %fqdn, "subdomain is ready");
        } else {
            info!(domain = %fqdn, "subdomain not visible yet, checking again");
        }
        Ok(found)
    })
}

/// Register `label` and wait until it is visible.
pub fn add_subdomain(
    dns: &dyn DnsProvider,
    label: &str,
    ip: &str,
    timeouts: &Timeouts,
    cancel: &CancelToken,
) -> SpinupResult<Subdomain> {
    register_subdomain(dns, label, ip)?;
    await_subdomain(dns, label, timeouts, cancel)
}
