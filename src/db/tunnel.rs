//! SSH tunnel provisioning.
//!
//! A tunnel binds an OS-assigned port on `127.0.0.1` and relays every accepted
//! connection to the database `host:port` through an SSH `direct-tcpip`
//! channel. The [`TunnelProvider`] / [`Tunnel`] traits are the seam the agent
//! uses, so lifecycle tests can substitute in-memory doubles.

use crate::error::{DbError, DbResult};
use crate::models::{ServerConfig, SshAuth, SshTunnelConfig};
use async_trait::async_trait;
use russh::client;
use russh_keys::key::KeyPair;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A live forwarding port.
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Local port the database client should connect to.
    fn local_port(&self) -> u16;

    /// Stop forwarding and close the SSH session.
    ///
    /// Idempotent: only the first call does anything.
    async fn stop(&self);
}

/// Opens tunnels for servers that request one.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Establish a tunnel to `server.host:server.port` through `ssh`.
    ///
    /// On error nothing is left running.
    async fn open(&self, server: &ServerConfig, ssh: &SshTunnelConfig)
    -> DbResult<Box<dyn Tunnel>>;
}

type SshSession = Arc<Mutex<client::Handle<SshClientHandler>>>;

/// russh client handler.
struct SshClientHandler;

#[async_trait]
impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host keys are not verified; there is no known_hosts policy.
        Ok(true)
    }
}

/// [`TunnelProvider`] backed by russh.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshTunnelProvider;

impl SshTunnelProvider {
    pub fn new() -> Self {
        Self
    }

    async fn connect(ssh: &SshTunnelConfig, auth: &SshAuth) -> DbResult<client::Handle<SshClientHandler>> {
        // Load the key before touching the network so a bad path fails fast
        let key = match auth {
            SshAuth::PrivateKey { path, passphrase } => {
                Some(load_private_key(path, passphrase.as_deref()).await?)
            }
            SshAuth::Password(_) => None,
        };

        let config = Arc::new(client::Config::default());
        let mut handle = client::connect(config, (ssh.host.as_str(), ssh.port), SshClientHandler)
            .await
            .map_err(|e| {
                DbError::connection(
                    "",
                    format!("Failed to connect to SSH server {}:{}: {}", ssh.host, ssh.port, e),
                    "Verify the SSH host and port, and that the bastion is reachable",
                )
            })?;

        let authenticated = match (auth, key) {
            (_, Some(key)) => handle.authenticate_publickey(&ssh.user, key).await,
            (SshAuth::Password(password), None) => {
                handle.authenticate_password(&ssh.user, password).await
            }
            (SshAuth::PrivateKey { .. }, None) => Ok(false),
        };

        match authenticated {
            Ok(true) => {
                info!(ssh_user = %ssh.user, ssh_host = %ssh.host, "SSH authentication successful");
                Ok(handle)
            }
            Ok(false) => {
                disconnect(&handle).await;
                Err(DbError::connection(
                    "",
                    format!("SSH authentication failed for {}@{}", ssh.user, ssh.host),
                    "Check the SSH user and the configured private key or password",
                ))
            }
            Err(e) => {
                disconnect(&handle).await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl TunnelProvider for SshTunnelProvider {
    async fn open(
        &self,
        server: &ServerConfig,
        ssh: &SshTunnelConfig,
    ) -> DbResult<Box<dyn Tunnel>> {
        let auth = ssh.auth()?;

        info!(
            server = %server.name,
            ssh_host = %ssh.host,
            ssh_port = ssh.port,
            "Establishing SSH tunnel"
        );

        let handle = Self::connect(ssh, &auth)
            .await
            .map_err(|e| e.with_server(&server.name))?;

        let listener = match TcpListener::bind(("127.0.0.1", 0)).await {
            Ok(listener) => listener,
            Err(e) => {
                disconnect(&handle).await;
                return Err(DbError::connection(
                    &server.name,
                    format!("Failed to bind local port for SSH tunnel: {}", e),
                    "Check that the process may listen on 127.0.0.1",
                ));
            }
        };
        let local_port = match listener.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                disconnect(&handle).await;
                return Err(DbError::internal(format!(
                    "Failed to read tunnel listener address: {}",
                    e
                )));
            }
        };

        let session: SshSession = Arc::new(Mutex::new(handle));
        let cancel = CancellationToken::new();

        tokio::spawn(run_tunnel(
            listener,
            session.clone(),
            server.host.clone(),
            server.port,
            cancel.clone(),
        ));

        info!(
            server = %server.name,
            local_port,
            remote = %format!("{}:{}", server.host, server.port),
            "SSH tunnel listening"
        );

        Ok(Box::new(SshTunnel::new(local_port, cancel, Some(session))))
    }
}

/// Handle to a running SSH tunnel.
pub struct SshTunnel {
    local_port: u16,
    cancel: CancellationToken,
    session: Mutex<Option<SshSession>>,
    stopped: AtomicBool,
}

impl SshTunnel {
    fn new(local_port: u16, cancel: CancellationToken, session: Option<SshSession>) -> Self {
        Self {
            local_port,
            cancel,
            session: Mutex::new(session),
            stopped: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Tunnel for SshTunnel {
    fn local_port(&self) -> u16 {
        self.local_port
    }

    async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        if let Some(session) = self.session.lock().await.take() {
            let handle = session.lock().await;
            disconnect(&handle).await;
        }
        info!(local_port = self.local_port, "SSH tunnel stopped");
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn disconnect(handle: &client::Handle<SshClientHandler>) {
    if let Err(e) = handle
        .disconnect(russh::Disconnect::ByApplication, "", "en")
        .await
    {
        warn!(error = %e, "Failed to close SSH session cleanly");
    }
}

async fn load_private_key(path: &Path, passphrase: Option<&str>) -> DbResult<Arc<KeyPair>> {
    let key_data = tokio::fs::read(path).await.map_err(|e| {
        DbError::connection(
            "",
            format!("Failed to read SSH key file {}: {}", path.display(), e),
            "Check that the key file exists and is readable",
        )
    })?;

    let key = russh_keys::decode_secret_key(&String::from_utf8_lossy(&key_data), passphrase)
        .map_err(|e| {
            let hint = if passphrase.is_some() {
                "Check that private_key_passphrase is correct"
            } else {
                "The key may be encrypted - set private_key_passphrase"
            };
            DbError::connection("", format!("Failed to load SSH key: {}", e), hint)
        })?;

    Ok(Arc::new(key))
}

async fn run_tunnel(
    listener: TcpListener,
    session: SshSession,
    remote_host: String,
    remote_port: u16,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted tunnel connection");
                    let session = session.clone();
                    let remote_host = remote_host.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        if let Err(e) = forward_connection(stream, session, &remote_host, remote_port, cancel).await {
                            warn!(error = %e, "Tunnel forwarding error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept tunnel connection"),
            },
            _ = cancel.cancelled() => break,
        }
    }
}

async fn forward_connection(
    mut local: TcpStream,
    session: SshSession,
    remote_host: &str,
    remote_port: u16,
    cancel: CancellationToken,
) -> DbResult<()> {
    let channel = {
        let handle = session.lock().await;
        handle
            .channel_open_direct_tcpip(remote_host, u32::from(remote_port), "127.0.0.1", 0)
            .await
            .map_err(|e| {
                DbError::connection(
                    "",
                    format!("Failed to open SSH channel to {}:{}: {}", remote_host, remote_port, e),
                    "The SSH server may not allow TCP forwarding",
                )
            })?
    };
    let mut remote = channel.into_stream();

    tokio::select! {
        copied = tokio::io::copy_bidirectional(&mut local, &mut remote) => {
            if let Ok((up, down)) = copied {
                debug!(bytes_up = up, bytes_down = down, "Tunnel connection closed");
            }
        }
        _ = cancel.cancelled() => {}
    }
    Ok(())
}
