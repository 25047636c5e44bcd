//! Remote configuration of a new instance: issue a TLS certificate
//! and put nginx in front of the application port.
//!
//! One session per run. The session is closed exactly once on every
//! exit path. A failing step stops the sequence but nothing already
//! written on the host is undone.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::cmd::CommandOutput;
use crate::error::{SpinupError, SpinupResult};
use crate::nginx;

/// Where and as whom to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub private_key: PathBuf,
    pub passphrase: Option<String>,
}

/// An open remote command channel.
pub trait RemoteSession {
    fn exec(&mut self, command: &str) -> SpinupResult<CommandOutput>;

    fn close(&mut self) -> SpinupResult<()>;
}

/// Opens [`RemoteSession`]s.
pub trait Connector: Send + Sync {
    fn connect(&self, target: &SshTarget) -> SpinupResult<Box<dyn RemoteSession>>;
}

/// Settings for the proxy that fronts the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Contact address registered with the certificate authority.
    pub email: String,
    /// Local port the application listens on.
    pub upstream_port: u16,
}

impl ProxySettings {
    pub const DEFAULT_UPSTREAM_PORT: u16 = 3000;

    #[must_use]
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            upstream_port: Self::DEFAULT_UPSTREAM_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStep {
    pub label: &'static str,
    pub command: String,
}

/// Closes the wrapped session when dropped.
struct SessionGuard {
    session: Box<dyn RemoteSession>,
    host: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        match self.session.close() {
            Ok(()) => info!(host = %self.host, "SSH session closed"),
            Err(e) => warn!(host = %self.host, error = %e, "closing SSH session failed"),
        }
    }
}

/// The fixed command sequence for `domain`, in execution order.
#[must_use]
pub fn plan(domain: &str, settings: &ProxySettings) -> Vec<RemoteStep> {
    let site = nginx::site_path(domain);
    vec![
        RemoteStep {
            label: "issue certificate",
            command: format!(
                "certbot --nginx -d {domain} --agree-tos --non-interactive --email {}",
                settings.email
            ),
        },
        RemoteStep {
            label: "write default site",
            command: write_file_command(
                &nginx::default_path(),
                &nginx::render_default(domain, settings.upstream_port),
            ),
        },
        RemoteStep {
            label: "write site config",
            command: write_file_command(
                &site,
                &nginx::render_site(domain, settings.upstream_port),
            ),
        },
        RemoteStep {
            label: "enable site",
            command: format!("ln -sfn {site} {}", nginx::enabled_path(domain)),
        },
        RemoteStep {
            label: "check nginx config",
            command: "nginx -t".to_string(),
        },
        RemoteStep {
            label: "reload nginx",
            command: "systemctl reload nginx".to_string(),
        },
    ]
}

/// Shell command that writes `content` verbatim to `path`. The
/// quoted heredoc keeps `$` sequences from being expanded.
#[must_use]
pub fn write_file_command(path: &str, content: &str) -> String {
    format!("cat > {path} <<'SPINUP_EOF'\n{content}\nSPINUP_EOF")
}

/// Run `steps` in order, stopping at the first non-zero exit.
pub fn run_steps(session: &mut dyn RemoteSession, steps: &[RemoteStep]) -> SpinupResult<()> {
    for step in steps {
        let output = session.exec(&step.command)?;
        if !output.success() {
            error!(
                step = step.label,
                code = output.code,
                stderr = %output.stderr,
                "remote step failed"
            );
            return Err(SpinupError::RemoteStep {
                step: step.label.to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }
        info!(step = step.label, "remote step done");
    }
    Ok(())
}

/// Connect to `target`, issue the certificate for `domain` and
/// configure nginx as its reverse proxy.
pub fn configure(
    connector: &dyn Connector,
    target: &SshTarget,
    domain: &str,
    settings: &ProxySettings,
) -> SpinupResult<()> {
    let session = connector.connect(target)?;
    info!(host = %target.host, user = %target.user, "connected");

    let mut guard = SessionGuard {
        session,
        host: target.host.clone(),
    };
    run_steps(guard.session.as_mut(), &plan(domain, settings))?;

    info!(domain, "nginx configured with TLS");
    Ok(())
}
