//! Records exchanged with the provider and the values the workflow
//! hands back to its caller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    New,
    Active,
    Off,
    Archive,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Active => "active",
            Self::Off => "off",
            Self::Archive => "archive",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One address entry of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddress {
    pub ip_address: String,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    /// `public` or `private`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkAddress>,
    #[serde(default)]
    pub v6: Vec<NetworkAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// A compute node ("droplet").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
    pub name: String,
    pub status: InstanceStatus,
    #[serde(default)]
    pub networks: Networks,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub size_slug: String,
    #[serde(default)]
    pub image: Image,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Instance {
    /// First IPv4 entry tagged `public`.
    #[must_use]
    pub fn public_ipv4(&self) -> Option<&str> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == "public")
            .map(|n| n.ip_address.as_str())
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::Active
    }
}

/// A pre-existing packet-filtering policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Firewall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub droplet_ids: Vec<u64>,
}

/// A pre-existing bootable disk image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub min_disk_size: Option<u64>,
}

/// An SSH public key registered with the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    pub id: u64,
    pub name: String,
    pub fingerprint: String,
}

/// A raw DNS record under the root domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub ttl: Option<u32>,
}

/// An `A` record that names a subdomain, as surfaced by the
/// subdomain listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    pub id: u64,
    pub subdomain: String,
    pub domain: String,
    pub ip: String,
}

impl Subdomain {
    #[must_use]
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.subdomain, self.domain)
    }
}

/// Body of `POST /domains/{domain}/records`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub data: String,
    pub ttl: u32,
}

impl NewRecord {
    pub const DEFAULT_TTL: u32 = 1800;

    #[must_use]
    pub fn a(name: &str, ip: &str) -> Self {
        Self {
            kind: "A".to_string(),
            name: name.to_string(),
            data: ip.to_string(),
            ttl: Self::DEFAULT_TTL,
        }
    }
}

/// Coarse machine size requested by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeTier {
    #[default]
    Slow,
    Medium,
    Fast,
    Blazing,
}

impl SizeTier {
    /// Size used for every tier when running against a development
    /// account.
    pub const DEVELOPMENT_SLUG: &'static str = "c2-4vcpu-8gb-intel";

    /// Provider size code for this tier.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Slow => "c-8-intel",
            Self::Medium => "c-16-intel",
            Self::Fast => "c-32-intel",
            Self::Blazing => "c-60-intel",
        }
    }

    #[must_use]
    pub const fn slug_for(self, development: bool) -> &'static str {
        if development {
            Self::DEVELOPMENT_SLUG
        } else {
            self.slug()
        }
    }
}

/// Lenient: anything unrecognised is `Slow`.
impl From<&str> for SizeTier {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "fast" => Self::Fast,
            "blazing" => Self::Blazing,
            _ => Self::Slow,
        }
    }
}

/// An image or key reference: numeric ids go over the wire as
/// integers, slugs and fingerprints as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(u64),
    Slug(String),
}

impl ResourceRef {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<u64>()
            .map_or_else(|_| Self::Slug(raw.to_string()), Self::Id)
    }
}

/// Split a comma-separated key list, dropping blanks.
#[must_use]
pub fn parse_key_list(raw: &str) -> Vec<ResourceRef> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ResourceRef::parse)
        .collect()
}

/// Body of `POST /droplets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceProfile {
    pub name: String,
    pub region: String,
    pub size: String,
    pub image: ResourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keys: Option<Vec<ResourceRef>>,
    pub backups: bool,
    pub ipv6: bool,
    pub monitoring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// An instance named either by its numeric id or its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(u64),
    Name(String),
}

impl Target {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<u64>()
            .map_or_else(|_| Self::Name(raw.to_string()), Self::Id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Result of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningOutcome {
    pub instance: Instance,
    pub subdomain: Option<String>,
    pub domain: Option<String>,
    /// `false` when an instance with the requested name already
    /// existed and was returned as-is.
    pub created: bool,
}

/// Every instance in the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub instances: Vec<Instance>,
    pub count: usize,
}

impl From<Vec<Instance>> for Inventory {
    fn from(instances: Vec<Instance>) -> Self {
        let count = instances.len();
        Self { instances, count }
    }
}
