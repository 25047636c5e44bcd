//! Existence checks: list the whole collection, then match exactly.
//!
//! Names are assumed unique within the account. When they are not,
//! the first match in listing order wins and the ambiguity goes
//! unreported; keeping names unique is the operator's job.

use tracing::{debug, info};

use crate::dns::{self, DnsProvider};
use crate::error::SpinupResult;
use crate::model::{Firewall, Instance, Snapshot, Subdomain, Target};
use crate::provision::CloudApi;

/// Whether a lookup reports its outcome at `info` or only at
/// `debug`. Poll loops use `Quiet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Report,
    Quiet,
}

fn note(mode: LogMode, outcome: &str, message: &str) {
    match mode {
        LogMode::Report => info!(outcome, "{message}"),
        LogMode::Quiet => debug!(outcome, "{message}"),
    }
}

pub fn find_instance_by_name(
    cloud: &dyn CloudApi,
    name: &str,
    mode: LogMode,
) -> SpinupResult<Option<Instance>> {
    find_instance_where(cloud, mode, &format!("name '{name}'"), |i| i.name == name)
}

pub fn find_instance_by_id(
    cloud: &dyn CloudApi,
    id: u64,
    mode: LogMode,
) -> SpinupResult<Option<Instance>> {
    find_instance_where(cloud, mode, &format!("id {id}"), |i| i.id == id)
}

pub fn find_instance(
    cloud: &dyn CloudApi,
    target: &Target,
    mode: LogMode,
) -> SpinupResult<Option<Instance>> {
    match target {
        Target::Id(id) => find_instance_by_id(cloud, *id, mode),
        Target::Name(name) => find_instance_by_name(cloud, name, mode),
    }
}

fn find_instance_where<P>(
    cloud: &dyn CloudApi,
    mode: LogMode,
    what: &str,
    pred: P,
) -> SpinupResult<Option<Instance>>
where
    P: Fn(&Instance) -> bool,
{
    let instances = cloud.list_instances()?;
    if instances.is_empty() {
        note(mode, "empty-account", "no droplets in account");
        return Ok(None);
    }

    let found = instances.into_iter().find(pred);
    match &found {
        Some(instance) => {
            let ip = instance.public_ipv4().unwrap_or("none");
            note(
                mode,
                "found",
                &format!(
                    "droplet with {what} exists (id {}, name {}, ip {ip})",
                    instance.id, instance.name
                ),
            );
        }
        None => note(mode, "not-found", &format!("no droplet with {what}")),
    }
    Ok(found)
}

pub fn find_firewall_by_name(cloud: &dyn CloudApi, name: &str) -> SpinupResult<Option<Firewall>> {
    let firewalls = cloud.list_firewalls()?;
    let found = first_named(firewalls, name, |f| f.name.as_str());
    log_named("firewall", name, found.is_some());
    Ok(found)
}

pub fn find_snapshot_by_name(cloud: &dyn CloudApi, name: &str) -> SpinupResult<Option<Snapshot>> {
    let snapshots = cloud.list_snapshots()?;
    let found = first_named(snapshots, name, |s| s.name.as_str());
    log_named("snapshot", name, found.is_some());
    Ok(found)
}

fn first_named<T, F>(items: Vec<T>, name: &str, name_of: F) -> Option<T>
where
    F: Fn(&T) -> &str,
{
    let wanted = name.trim();
    items.into_iter().find(|item| name_of(item).trim() == wanted)
}

fn log_named(kind: &str, name: &str, found: bool) {
    if found {
        info!(outcome = "found", kind, name, "{kind} found");
    } else {
        info!(outcome = "not-found", kind, name, "no {kind} with that name");
    }
}

/// Every subdomain `A` record under the provider's root domain.
pub fn list_subdomains(dns: &dyn DnsProvider, mode: LogMode) -> SpinupResult<Vec<Subdomain>> {
    let records = dns.list_records()?;
    let subs = dns::subdomains(dns.domain(), &records);

    if subs.is_empty() {
        note(
            mode,
            "not-found",
            &format!("no subdomain records for {}", dns.domain()),
        );
    } else {
        let labels: Vec<&str> = subs.iter().map(|s| s.subdomain.as_str()).collect();
        note(
            mode,
            "found",
            &format!(
                "{} subdomains for {}: [{}]",
                subs.len(),
                dns.domain(),
                labels.join(", ")
            ),
        );
    }
    Ok(subs)
}

pub fn find_subdomain(
    dns: &dyn DnsProvider,
    label: &str,
    mode: LogMode,
) -> SpinupResult<Option<Subdomain>> {
    let found = list_subdomains(dns, mode)?
        .into_iter()
        .find(|s| s.subdomain == label);
    if found.is_some() {
        note(
            mode,
            "found",
            &format!("subdomain {}", dns::fqdn(label, dns.domain())),
        );
    }
    Ok(found)
}
