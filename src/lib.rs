//! Spin up `DigitalOcean` droplets on demand and burn them afterwards.
//!
//! `spinup` creates a droplet (optionally from a snapshot), waits for
//! it to become active, attaches a firewall, points a subdomain at
//! it and finally logs in over SSH to issue a TLS certificate and
//! put nginx in front of the application. The same tool deletes the
//! droplet again, immediately or after a delay.
//!
//! # Overview
//!
//! A [`Pipeline`] wires together:
//!
//! - a [`CloudApi`] for droplets, firewalls, snapshots and account
//!   keys (e.g. [`DigitalOcean`])
//! - an optional [`DnsProvider`] for the root domain's records
//!   (e.g. [`DigitalOceanDns`])
//! - a [`Connector`](remote::Connector) for remote sessions (e.g.
//!   [`SshConnector`])
//! - a [`Probe`](probe::Probe) for network readiness
//!
//! # Provisioning
//!
//! [`Pipeline::provision`] drives the [`workflow`] state machine:
//!
//! 1. **Resolve** - skip creation if a droplet with the name exists
//! 2. **Create** - issue the create call and wait until active
//! 3. **Firewall** - attach the configured firewall, wait for the
//!    droplet to answer on port 80
//! 4. **DNS** - create the subdomain `A` record and wait until the
//!    provider lists it
//! 5. **Remote** - certbot + nginx over SSH
//!
//! Every wait has a deadline and honours the pipeline's
//! [`CancelToken`]. A failure after the create call deletes the new
//! droplet again.
//!
//! # Example
//!
//! ```rust,no_run
//! use spinup::{Config, Pipeline, ProvisionRequest, SizeTier};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let pipeline = Pipeline::from_config(config)?;
//!
//!     let req = ProvisionRequest::new("build-box")
//!         .create(true)
//!         .size(SizeTier::Fast)
//!         .subdomain("build");
//!
//!     if let Some(outcome) = pipeline.provision(&req)? {
//!         println!("{}", outcome.instance.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`CloudApi`]: provision::CloudApi
//! [`DnsProvider`]: dns::DnsProvider

// Allow noisy pedantic lints that don't add value for a
// provisioning tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod api;
pub mod cmd;
pub mod config;
pub mod dns;
pub mod error;
pub mod model;
pub mod nginx;
pub mod pipeline;
pub mod poll;
pub mod probe;
pub mod provision;
pub mod remote;
pub mod resolve;
pub mod ssh;
pub mod teardown;
pub mod workflow;

pub use config::Config;
pub use dns::digitalocean::DigitalOceanDns;
pub use error::{ApiFailure, SpinupError, SpinupResult};
pub use model::{Instance, ProvisioningOutcome, SizeTier, Target};
pub use pipeline::Pipeline;
pub use poll::CancelToken;
pub use provision::digitalocean::DigitalOcean;
pub use ssh::SshConnector;
pub use teardown::DeferredTeardown;
pub use workflow::ProvisionRequest;
