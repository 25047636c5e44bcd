use serde_json::json;
use tracing::{error, info};

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::{SpinupError, SpinupResult};
use crate::model::{Firewall, Instance, InstanceProfile, Snapshot, SshKey};
use crate::provision::CloudApi;

/// `DigitalOcean` compute API over HTTPS.
pub struct DigitalOcean {
    api: ApiClient,
}

impl DigitalOcean {
    pub fn new(config: &Config) -> SpinupResult<Self> {
        Ok(Self {
            api: ApiClient::new(&config.api_url, &config.token)?,
        })
    }
}

impl CloudApi for DigitalOcean {
    fn list_instances(&self) -> SpinupResult<Vec<Instance>> {
        self.api.list("/droplets", "droplets")
    }

    fn get_instance(&self, id: u64) -> SpinupResult<Instance> {
        self.api.get(&format!("/droplets/{id}"), "droplet")
    }

    fn create_instance(&self, profile: &InstanceProfile) -> SpinupResult<Instance> {
        info!(
            name = %profile.name,
            region = %profile.region,
            size = %profile.size,
            "creating droplet"
        );
        let droplet: Instance = self.api.post("/droplets", profile, "droplet")?;
        info!(instance_id = droplet.id, name = %droplet.name, "droplet created");
        Ok(droplet)
    }

    fn delete_instance(&self, id: u64) -> SpinupResult<()> {
        self.api.delete(&format!("/droplets/{id}"))
    }

    fn list_firewalls(&self) -> SpinupResult<Vec<Firewall>> {
        self.api.list("/firewalls", "firewalls")
    }

    fn attach_firewall(&self, firewall_id: &str, instance_id: u64) -> SpinupResult<()> {
        let body = json!({ "droplet_ids": [instance_id] });
        let (status, text) = self
            .api
            .post_empty(&format!("/firewalls/{firewall_id}/droplets"), &body)?;

        if status == 204 {
            return Ok(());
        }

        let reason = if text.trim().is_empty() {
            format!("empty response with status {status}")
        } else {
            format!("unexpected status {status}: {text}")
        };
        error!(firewall_id, instance_id, %reason, "firewall attach rejected");
        Err(SpinupError::FirewallAttach {
            firewall: firewall_id.to_string(),
            instance_id,
            reason,
        })
    }

    fn list_snapshots(&self) -> SpinupResult<Vec<Snapshot>> {
        self.api
            .list("/snapshots?resource_type=droplet", "snapshots")
    }

    fn list_ssh_keys(&self) -> SpinupResult<Vec<SshKey>> {
        self.api.list("/account/keys", "ssh_keys")
    }
}
