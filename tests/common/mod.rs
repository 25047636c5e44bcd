#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spinup::cmd::CommandOutput;
use spinup::config::{Config, SslIdentity, Timeouts};
use spinup::dns::DnsProvider;
use spinup::error::{ApiFailure, SpinupError, SpinupResult};
use spinup::model::{
    DomainRecord, Firewall, Instance, InstanceProfile, InstanceStatus, NetworkAddress, Networks,
    NewRecord, Snapshot, SshKey,
};
use spinup::probe::Probe;
use spinup::provision::CloudApi;
use spinup::remote::{Connector, RemoteSession, SshTarget};

pub const PUBLIC_IP: &str = "203.0.113.10";
pub const DOMAIN: &str = "example.com";

pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        active_interval: Duration::from_millis(1),
        active_deadline: Duration::from_secs(2),
        network_interval: Duration::from_millis(1),
        network_attempts: 5,
        network_port: 80,
        probe_timeout: Duration::from_millis(100),
        dns_interval: Duration::from_millis(1),
        dns_deadline: Duration::from_secs(2),
    }
}

pub fn config() -> Config {
    let mut config = Config::new("test-token");
    config.timeouts = fast_timeouts();
    config
}

pub fn ssl_identity() -> SslIdentity {
    SslIdentity {
        email: "ops@example.com".into(),
        user: "root".into(),
        private_key: PathBuf::from("/nonexistent/id_ed25519"),
        passphrase: None,
    }
}

pub fn instance(id: u64, name: &str, status: InstanceStatus, ip: Option<&str>) -> Instance {
    let v4 = ip
        .map(|ip| {
            vec![
                NetworkAddress {
                    ip_address: "10.0.0.2".into(),
                    netmask: None,
                    gateway: None,
                    kind: "private".into(),
                },
                NetworkAddress {
                    ip_address: ip.into(),
                    netmask: None,
                    gateway: None,
                    kind: "public".into(),
                },
            ]
        })
        .unwrap_or_default();

    Instance {
        id,
        name: name.into(),
        status,
        networks: Networks { v4, v6: Vec::new() },
        region: Default::default(),
        size_slug: "c-8-intel".into(),
        image: Default::default(),
        tags: Vec::new(),
        created_at: None,
    }
}

pub fn api_error(status: u16, message: &str) -> SpinupError {
    ApiFailure {
        status: Some(status),
        message: message.into(),
        body: None,
    }
    .into()
}

// ---- cloud ----

#[derive(Default)]
pub struct CloudState {
    pub instances: Vec<Instance>,
    pub firewalls: Vec<Firewall>,
    pub snapshots: Vec<Snapshot>,
    pub keys: Vec<SshKey>,
    pub created: Vec<InstanceProfile>,
    pub deleted: Vec<u64>,
    pub attached: Vec<(String, u64)>,
    pub gets: u32,
    /// `get_instance` calls before a new instance turns active.
    pub active_after: u32,
    pub fail_list: bool,
    pub fail_attach: bool,
    pub withhold_ip: bool,
}

/// In-memory account. Clones share state.
#[derive(Clone, Default)]
pub struct FakeCloud {
    pub state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instances(instances: Vec<Instance>) -> Self {
        let cloud = Self::default();
        cloud.state.lock().unwrap().instances = instances;
        cloud
    }

    pub fn with<F: FnOnce(&mut CloudState)>(self, f: F) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn created(&self) -> Vec<InstanceProfile> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn attached(&self) -> Vec<(String, u64)> {
        self.state.lock().unwrap().attached.clone()
    }
}

impl CloudApi for FakeCloud {
    fn list_instances(&self) -> SpinupResult<Vec<Instance>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(api_error(500, "Server Error"));
        }
        Ok(state.instances.clone())
    }

    fn get_instance(&self, id: u64) -> SpinupResult<Instance> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        let gets = state.gets;
        let ready = gets >= state.active_after;
        let withhold_ip = state.withhold_ip;

        let found = state
            .instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| api_error(404, "The resource you were accessing could not be found."))?;

        if found.status == InstanceStatus::New && ready {
            let name = found.name.clone();
            let ip = (!withhold_ip).then_some(PUBLIC_IP);
            *found = instance(id, &name, InstanceStatus::Active, ip);
        }
        Ok(found.clone())
    }

    fn create_instance(&self, profile: &InstanceProfile) -> SpinupResult<Instance> {
        let mut state = self.state.lock().unwrap();
        state.created.push(profile.clone());
        let id = 1000 + state.created.len() as u64;
        let created = instance(id, &profile.name, InstanceStatus::New, None);
        state.instances.push(created.clone());
        Ok(created)
    }

    fn delete_instance(&self, id: u64) -> SpinupResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(id);
        let before = state.instances.len();
        state.instances.retain(|i| i.id != id);
        if state.instances.len() == before {
            return Err(api_error(404, "not found"));
        }
        Ok(())
    }

    fn list_firewalls(&self) -> SpinupResult<Vec<Firewall>> {
        Ok(self.state.lock().unwrap().firewalls.clone())
    }

    fn attach_firewall(&self, firewall_id: &str, instance_id: u64) -> SpinupResult<()> {
        let mut state = self.state.lock().unwrap();
        state.attached.push((firewall_id.to_string(), instance_id));
        if state.fail_attach {
            return Err(SpinupError::FirewallAttach {
                firewall: firewall_id.to_string(),
                instance_id,
                reason: "HTTP 422: droplet is locked".into(),
            });
        }
        Ok(())
    }

    fn list_snapshots(&self) -> SpinupResult<Vec<Snapshot>> {
        Ok(self.state.lock().unwrap().snapshots.clone())
    }

    fn list_ssh_keys(&self) -> SpinupResult<Vec<SshKey>> {
        Ok(self.state.lock().unwrap().keys.clone())
    }
}

pub fn firewall(id: &str, name: &str) -> Firewall {
    Firewall {
        id: id.into(),
        name: name.into(),
        status: Some("succeeded".into()),
        droplet_ids: Vec::new(),
    }
}

pub fn snapshot(id: &str, name: &str) -> Snapshot {
    Snapshot {
        id: id.into(),
        name: name.into(),
        regions: vec!["nyc1".into()],
        min_disk_size: Some(25),
    }
}

// ---- dns ----

#[derive(Default)]
pub struct DnsState {
    pub records: Vec<DomainRecord>,
    /// Created records not yet returned by listings, with the number
    /// of listings left before they show up.
    pub pending: Vec<(DomainRecord, u32)>,
    pub created: Vec<NewRecord>,
    pub deleted: Vec<u64>,
    /// Listings a new record stays invisible for.
    pub visible_after: u32,
    pub lists: u32,
}

#[derive(Clone, Default)]
pub struct FakeDns {
    pub state: Arc<Mutex<DnsState>>,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<DomainRecord>) -> Self {
        let dns = Self::default();
        dns.state.lock().unwrap().records = records;
        dns
    }

    pub fn visible_after(self, lists: u32) -> Self {
        self.state.lock().unwrap().visible_after = lists;
        self
    }

    pub fn created(&self) -> Vec<NewRecord> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.state.lock().unwrap().deleted.clone()
    }
}

pub fn record(id: u64, kind: &str, name: &str, data: &str) -> DomainRecord {
    DomainRecord {
        id,
        kind: kind.into(),
        name: name.into(),
        data: data.into(),
        ttl: Some(1800),
    }
}

impl DnsProvider for FakeDns {
    fn domain(&self) -> &str {
        DOMAIN
    }

    fn list_records(&self) -> SpinupResult<Vec<DomainRecord>> {
        let mut state = self.state.lock().unwrap();
        state.lists += 1;

        let mut still_pending = Vec::new();
        for (rec, left) in std::mem::take(&mut state.pending) {
            if left == 0 {
                state.records.push(rec);
            } else {
                still_pending.push((rec, left - 1));
            }
        }
        state.pending = still_pending;
        Ok(state.records.clone())
    }

    fn create_record(&self, new: &NewRecord) -> SpinupResult<DomainRecord> {
        let mut state = self.state.lock().unwrap();
        state.created.push(new.clone());
        let id = 5000 + state.created.len() as u64;
        let rec = DomainRecord {
            id,
            kind: new.kind.clone(),
            name: new.name.clone(),
            data: new.data.clone(),
            ttl: Some(new.ttl),
        };
        let delay = state.visible_after;
        state.pending.push((rec.clone(), delay));
        Ok(rec)
    }

    fn delete_record(&self, id: u64) -> SpinupResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(id);
        state.records.retain(|r| r.id != id);
        state.pending.retain(|(r, _)| r.id != id);
        Ok(())
    }
}

// ---- remote ----

#[derive(Default)]
pub struct RemoteState {
    pub connects: u32,
    pub closes: u32,
    pub commands: Vec<String>,
    /// 1-based index of the command that exits non-zero.
    pub fail_at: Option<usize>,
    pub refuse: bool,
    pub targets: Vec<SshTarget>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub state: Arc<Mutex<RemoteState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(step: usize) -> Self {
        let connector = Self::default();
        connector.state.lock().unwrap().fail_at = Some(step);
        connector
    }

    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.state.lock().unwrap().refuse = true;
        connector
    }

    pub fn closes(&self) -> u32 {
        self.state.lock().unwrap().closes
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }
}

impl Connector for FakeConnector {
    fn connect(&self, target: &SshTarget) -> SpinupResult<Box<dyn RemoteSession>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse {
            return Err(SpinupError::SshFailed(format!(
                "{}@{}: connection refused",
                target.user, target.host
            )));
        }
        state.connects += 1;
        state.targets.push(target.clone());
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeSession {
    state: Arc<Mutex<RemoteState>>,
}

impl RemoteSession for FakeSession {
    fn exec(&mut self, command: &str) -> SpinupResult<CommandOutput> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        let failed = state.fail_at == Some(state.commands.len());
        Ok(CommandOutput {
            code: i32::from(failed),
            stdout: String::new(),
            stderr: if failed { "boom".into() } else { String::new() },
        })
    }

    fn close(&mut self) -> SpinupResult<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

// ---- probe ----

/// Answers after `answer_after` probes; `None` never answers.
#[derive(Clone, Default)]
pub struct FakeProbe {
    pub answer_after: Option<u32>,
    pub calls: Arc<Mutex<u32>>,
}

impl FakeProbe {
    pub fn always() -> Self {
        Self {
            answer_after: Some(1),
            calls: Arc::default(),
        }
    }

    pub fn never() -> Self {
        Self {
            answer_after: None,
            calls: Arc::default(),
        }
    }

    pub fn after(n: u32) -> Self {
        Self {
            answer_after: Some(n),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

impl Probe for FakeProbe {
    fn reachable(&self, _ip: &str, _port: u16) -> bool {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        self.answer_after.is_some_and(|n| *calls >= n)
    }
}
