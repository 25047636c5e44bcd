use std::path::PathBuf;

use tracing::debug;

use crate::cmd::{self, CommandOutput};
use crate::error::{SpinupError, SpinupResult};
use crate::remote::{Connector, RemoteSession, SshTarget};

/// Opens sessions with the system `ssh` client.
///
/// A passphrase-protected key is unlocked through `sshpass`, which
/// must then be on PATH.
#[derive(Debug, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    fn connect(&self, target: &SshTarget) -> SpinupResult<Box<dyn RemoteSession>> {
        if !target.private_key.exists() {
            return Err(SpinupError::FileNotFound(format!(
                "private key {}",
                target.private_key.display()
            )));
        }
        let session = SshSession::open(target)?;
        Ok(Box::new(session))
    }
}

/// SSH control-master connection: authenticated once, then reused
/// for every command until [`RemoteSession::close`].
pub struct SshSession {
    host: String,
    user: String,
    key: String,
    socket: PathBuf,
    open: bool,
}

impl SshSession {
    pub fn open(target: &SshTarget) -> SpinupResult<Self> {
        let socket = std::env::temp_dir().join(format!(
            "spinup-{}-{}.sock",
            std::process::id(),
            target.host
        ));
        let session = Self {
            host: target.host.clone(),
            user: target.user.clone(),
            key: target.private_key.to_string_lossy().to_string(),
            socket,
            open: false,
        };

        let mut args = session.base_args();
        args.extend(
            ["-M", "-f", "-N", "-o", "ControlPersist=yes"]
                .iter()
                .map(|s| (*s).to_string()),
        );
        args.push(session.destination());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let result = match &target.passphrase {
            Some(passphrase) => {
                if !cmd::command_exists("sshpass") {
                    return Err(SpinupError::SshFailed(
                        "key has a passphrase but sshpass is not installed".into(),
                    ));
                }
                let mut wrapped = vec!["-P", "passphrase", "-e", "ssh"];
                wrapped.extend(refs);
                cmd::run_detached("sshpass", &wrapped, &[("SSHPASS", passphrase)])
            }
            None => cmd::run_detached("ssh", &refs, &[]),
        };

        result.map_err(|e| {
            SpinupError::SshFailed(format!("{}: {e}", session.destination()))
        })?;
        debug!(host = %session.host, socket = %session.socket.display(), "control master up");

        Ok(Self {
            open: true,
            ..session
        })
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-i".to_string(),
            self.key.clone(),
            "-S".to_string(),
            self.socket.to_string_lossy().to_string(),
        ]
    }
}

impl RemoteSession for SshSession {
    fn exec(&mut self, command: &str) -> SpinupResult<CommandOutput> {
        if !self.open {
            return Err(SpinupError::SshFailed(format!(
                "session to {} is closed",
                self.host
            )));
        }
        let mut args = self.base_args();
        args.push(self.destination());
        args.push(command.to_string());
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd::capture("ssh", &refs, &[])
    }

    fn close(&mut self) -> SpinupResult<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;

        let mut args = self.base_args();
        args.extend(["-O".to_string(), "exit".to_string(), self.destination()]);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = cmd::run("ssh", &refs, &[]);

        if self.socket.exists() {
            std::fs::remove_file(&self.socket)?;
        }
        result.map(|_| ())
    }
}
