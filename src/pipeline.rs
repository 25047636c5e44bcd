use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::dns::DnsProvider;
use crate::dns::digitalocean::DigitalOceanDns;
use crate::error::{SpinupError, SpinupResult};
use crate::model::{Instance, Inventory, ProvisioningOutcome, SizeTier, SshKey, Subdomain, Target};
use crate::poll::CancelToken;
use crate::probe::{HttpProbe, Probe};
use crate::provision::CloudApi;
use crate::provision::digitalocean::DigitalOcean;
use crate::remote::{Connector, ProxySettings};
use crate::resolve::{self, LogMode};
use crate::ssh::SshConnector;
use crate::teardown::{self, DeferredTeardown};
use crate::workflow::{ProvisionRequest, Workflow};

/// Entry points of the tool, wired to one account.
pub struct Pipeline {
    config: Config,
    cloud: Arc<dyn CloudApi>,
    dns: Option<Arc<dyn DnsProvider>>,
    connector: Box<dyn Connector>,
    probe: Box<dyn Probe>,
    cancel: CancelToken,
    upstream_port: u16,
}

impl Pipeline {
    /// Pipeline over `cloud` with the SSH connector and HTTP probe.
    pub fn new(config: Config, cloud: impl CloudApi + 'static) -> SpinupResult<Self> {
        let probe = HttpProbe::new(config.timeouts.probe_timeout)?;
        Ok(Self {
            config,
            cloud: Arc::new(cloud),
            dns: None,
            connector: Box::new(SshConnector),
            probe: Box::new(probe),
            cancel: CancelToken::new(),
            upstream_port: ProxySettings::DEFAULT_UPSTREAM_PORT,
        })
    }

    /// `DigitalOcean` compute, plus its DNS when a root domain is
    /// configured.
    pub fn from_config(config: Config) -> SpinupResult<Self> {
        let cloud = DigitalOcean::new(&config)?;
        let dns = match &config.domain {
            Some(_) => Some(DigitalOceanDns::new(&config)?),
            None => None,
        };
        let pipeline = Self::new(config, cloud)?;
        Ok(match dns {
            Some(dns) => pipeline.dns(dns),
            None => pipeline,
        })
    }

    #[must_use]
    pub fn dns(mut self, provider: impl DnsProvider + 'static) -> Self {
        self.dns = Some(Arc::new(provider));
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Box::new(connector);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Local port the reverse proxy forwards to.
    #[must_use]
    pub const fn upstream_port(mut self, port: u16) -> Self {
        self.upstream_port = port;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn list_all(&self) -> SpinupResult<Inventory> {
        let instances = self.cloud.list_instances()?;
        info!(count = instances.len(), "droplets listed");
        Ok(instances.into())
    }

    pub fn lookup(&self, target: &Target) -> SpinupResult<Option<Instance>> {
        resolve::find_instance(self.cloud.as_ref(), target, LogMode::Report)
    }

    pub fn provision(&self, req: &ProvisionRequest) -> SpinupResult<Option<ProvisioningOutcome>> {
        Workflow {
            config: &self.config,
            cloud: self.cloud.as_ref(),
            dns: self.dns.as_deref(),
            connector: self.connector.as_ref(),
            probe: self.probe.as_ref(),
            cancel: &self.cancel,
            upstream_port: self.upstream_port,
        }
        .run(req)
    }

    /// Delete the instance now. `subdomain`, when given, is removed
    /// after the instance.
    pub fn teardown(
        &self,
        target: &Target,
        subdomain: Option<&str>,
    ) -> SpinupResult<Option<Instance>> {
        let Some(instance) = self.lookup(target)? else {
            return Ok(None);
        };
        teardown::teardown(
            self.cloud.as_ref(),
            self.dns.as_deref(),
            instance.id,
            subdomain,
        )?;
        Ok(Some(instance))
    }

    /// Resolve the instance now and delete it once `delay` has passed.
    /// Cancelling the pipeline's token stops the countdown.
    pub fn schedule_teardown(
        &self,
        target: &Target,
        subdomain: Option<&str>,
        delay: Duration,
    ) -> SpinupResult<Option<DeferredTeardown>> {
        let Some(instance) = self.lookup(target)? else {
            return Ok(None);
        };
        DeferredTeardown::schedule_with(
            Arc::clone(&self.cloud),
            self.dns.clone(),
            instance.id,
            subdomain.map(String::from),
            delay,
            self.cancel.clone(),
        )
        .map(Some)
    }

    /// Attach the instance to the configured firewall.
    pub fn attach_firewall(&self, target: &Target) -> SpinupResult<Option<Instance>> {
        let name = self.config.require_firewall()?;
        let Some(instance) = self.lookup(target)? else {
            return Ok(None);
        };
        let firewall = resolve::find_firewall_by_name(self.cloud.as_ref(), name)?
            .ok_or_else(|| SpinupError::FirewallNotFound(name.to_string()))?;

        self.cloud.attach_firewall(&firewall.id, instance.id)?;
        info!(firewall = %firewall.name, instance_id = instance.id, "firewall attached");
        Ok(Some(instance))
    }

    pub fn list_ssh_keys(&self) -> SpinupResult<Vec<SshKey>> {
        self.cloud.list_ssh_keys()
    }

    pub fn list_subdomains(&self) -> SpinupResult<Vec<Subdomain>> {
        resolve::list_subdomains(self.require_dns()?, LogMode::Report)
    }

    pub fn remove_subdomain(&self, label: &str) -> SpinupResult<Option<Subdomain>> {
        teardown::remove_subdomain(self.require_dns()?, label)
    }

    fn require_dns(&self) -> SpinupResult<&dyn DnsProvider> {
        self.dns
            .as_deref()
            .ok_or_else(|| SpinupError::MissingConfig("DIGITAL_OCEAN_DOMAIN".into()))
    }

    /// Run one CLI command, printing its result as JSON on stdout.
    pub fn dispatch(&self, command: &Command) -> SpinupResult<()> {
        match command {
            Command::List => emit(&self.list_all()?),
            Command::Get { target } => {
                let target = Target::parse(target);
                let instance = self
                    .lookup(&target)?
                    .ok_or_else(|| SpinupError::InstanceNotFound(target.to_string()))?;
                emit(&instance)
            }
            Command::Create {
                name,
                subdomain,
                size,
                tags,
                burn_after,
            } => self.cmd_create(name, subdomain.as_deref(), size, tags, *burn_after),
            Command::Delete {
                target,
                subdomain,
                burn_after,
            } => self.cmd_delete(&Target::parse(target), subdomain.as_deref(), *burn_after),
            Command::Firewall { target } => {
                let target = Target::parse(target);
                let instance = self
                    .attach_firewall(&target)?
                    .ok_or_else(|| SpinupError::InstanceNotFound(target.to_string()))?;
                emit(&instance)
            }
            Command::Keys => emit(&self.list_ssh_keys()?),
            Command::Subdomains => emit(&self.list_subdomains()?),
            Command::RemoveSubdomain { label } => {
                let removed = self
                    .remove_subdomain(label)?
                    .ok_or_else(|| SpinupError::SubdomainNotFound(label.clone()))?;
                emit(&removed)
            }
        }
    }

    fn cmd_create(
        &self,
        name: &str,
        subdomain: Option<&str>,
        size: &str,
        tags: &[String],
        burn_after: Option<u64>,
    ) -> SpinupResult<()> {
        let mut req = ProvisionRequest::new(name)
            .create(true)
            .size(SizeTier::from(size));
        if let Some(label) = subdomain {
            req = req.subdomain(label);
        }
        for tag in tags {
            req = req.tag(tag);
        }

        let outcome = self
            .provision(&req)?
            .ok_or_else(|| SpinupError::InstanceNotFound(name.to_string()))?;
        emit(&outcome)?;

        let Some(secs) = burn_after else {
            return Ok(());
        };
        if !outcome.created {
            warn!(
                instance_id = outcome.instance.id,
                name,
                "droplet already existed, not scheduling burn"
            );
            return Ok(());
        }

        let dns_label = if self.config.delete_dns_on_teardown {
            outcome.subdomain.as_deref()
        } else {
            None
        };
        let handle = DeferredTeardown::schedule_with(
            Arc::clone(&self.cloud),
            self.dns.clone(),
            outcome.instance.id,
            dns_label.map(String::from),
            Duration::from_secs(secs),
            self.cancel.clone(),
        )?;
        emit(&handle.wait()?)
    }

    fn cmd_delete(
        &self,
        target: &Target,
        subdomain: Option<&str>,
        burn_after: Option<u64>,
    ) -> SpinupResult<()> {
        let missing = || SpinupError::InstanceNotFound(target.to_string());
        match burn_after {
            Some(secs) => {
                let handle = self
                    .schedule_teardown(target, subdomain, Duration::from_secs(secs))?
                    .ok_or_else(missing)?;
                info!(
                    instance_id = handle.instance_id(),
                    remaining = ?handle.remaining(),
                    "waiting for scheduled teardown"
                );
                emit(&handle.wait()?)
            }
            None => {
                let instance = self.teardown(target, subdomain)?.ok_or_else(missing)?;
                if subdomain.is_none() && self.dns.is_some() {
                    warn!("no --subdomain given, DNS records left in place");
                }
                emit(&teardown::TeardownOutcome::Deleted {
                    instance_id: instance.id,
                })
            }
        }
    }
}

fn emit<T: Serialize>(value: &T) -> SpinupResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(name = "spinup")]
#[command(about = "Provision and tear down DigitalOcean droplets", version)]
pub struct Cli {
    /// Read configuration from this file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every droplet in the account
    List,

    /// Show one droplet
    Get {
        /// Droplet name or numeric id
        target: String,
    },

    /// Create a droplet unless one with that name exists
    Create {
        /// Droplet name
        name: String,

        /// Subdomain label to point at the droplet
        #[arg(long)]
        subdomain: Option<String>,

        /// slow, medium, fast or blazing
        #[arg(long, default_value = "slow")]
        size: String,

        /// Tag to apply (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Delete the droplet this many seconds after it is ready
        #[arg(long)]
        burn_after: Option<u64>,
    },

    /// Delete a droplet
    Delete {
        /// Droplet name or numeric id
        target: String,

        /// Subdomain record to remove with it
        #[arg(long)]
        subdomain: Option<String>,

        /// Wait this many seconds before deleting
        #[arg(long)]
        burn_after: Option<u64>,
    },

    /// Attach a droplet to the configured firewall
    Firewall {
        /// Droplet name or numeric id
        target: String,
    },

    /// List SSH keys registered with the account
    Keys,

    /// List subdomains of the configured root domain
    Subdomains,

    /// Delete a subdomain record
    RemoveSubdomain {
        /// Subdomain label
        label: String,
    },
}
