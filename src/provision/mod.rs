pub mod digitalocean;

use crate::config::{Config, DEFAULT_IMAGE};
use crate::error::SpinupResult;
use crate::model::{
    Firewall, Instance, InstanceProfile, ResourceRef, SizeTier, Snapshot, SshKey,
};

/// Compute, firewall and image operations of a cloud account.
///
/// Implementations surface transport faults and unexpected
/// statuses as [`SpinupError::Api`](crate::error::SpinupError::Api)
/// and never panic.
pub trait CloudApi: Send + Sync {
    /// Every instance in the account.
    fn list_instances(&self) -> SpinupResult<Vec<Instance>>;

    /// Fresh copy of one instance.
    fn get_instance(&self, id: u64) -> SpinupResult<Instance>;

    /// Issue the create call. The returned record is usually still
    /// in the `new` state.
    fn create_instance(&self, profile: &InstanceProfile) -> SpinupResult<Instance>;

    fn delete_instance(&self, id: u64) -> SpinupResult<()>;

    fn list_firewalls(&self) -> SpinupResult<Vec<Firewall>>;

    /// Attach an instance to a firewall. Only a `204 No Content`
    /// answer counts as success.
    fn attach_firewall(&self, firewall_id: &str, instance_id: u64) -> SpinupResult<()>;

    fn list_snapshots(&self) -> SpinupResult<Vec<Snapshot>>;

    /// SSH keys registered with the account.
    fn list_ssh_keys(&self) -> SpinupResult<Vec<SshKey>>;
}

/// Assemble the create-call body for `name`.
///
/// `image` is the resolved snapshot, or `None` for the default base
/// image.
#[must_use]
pub fn build_profile(
    config: &Config,
    name: &str,
    tier: SizeTier,
    image: Option<&Snapshot>,
    tags: &[String],
) -> InstanceProfile {
    let image = image.map_or_else(
        || ResourceRef::Slug(DEFAULT_IMAGE.to_string()),
        |snap| ResourceRef::parse(&snap.id),
    );

    InstanceProfile {
        name: name.to_string(),
        region: config.region.clone(),
        size: tier.slug_for(config.development).to_string(),
        image,
        ssh_keys: (!config.ssh_keys.is_empty()).then(|| config.ssh_keys.clone()),
        backups: false,
        ipv6: true,
        monitoring: true,
        tags: (!tags.is_empty()).then(|| tags.to_vec()),
    }
}
