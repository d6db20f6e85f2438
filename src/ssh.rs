//! Interactive shell access to a server using the root credentials the API
//! hands out at provisioning time.

use crate::client::ApiClient;
use crate::printer::print_response;
use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect, Pty};
use russh_keys::key::PublicKey;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const SSH_PORT: u16 = 22;
pub const LOGIN_USER: &str = "root";

const TERM: &str = "xterm";
const PTY_ROWS: u32 = 80;
const PTY_COLS: u32 = 40;
const BAUD: u32 = 14400;

/// One entry of `server/list`. Numbers arrive as strings from this API, and
/// any field may be `null` on servers that are still provisioning.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub os: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ram: String,
    #[serde(deserialize_with = "null_as_default")]
    pub disk: String,
    #[serde(deserialize_with = "null_as_default")]
    pub main_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub vcpu_count: String,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub default_password: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date_created: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pending_charges: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cost_per_month: String,
    #[serde(deserialize_with = "null_as_default")]
    pub current_bandwidth_gb: f64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The API answers `[]` instead of `{}` when the account has no servers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerList {
    Keyed(HashMap<String, ServerRecord>),
    Empty(Vec<serde_json::Value>),
}

impl ServerList {
    fn into_map(self) -> HashMap<String, ServerRecord> {
        match self {
            ServerList::Keyed(map) => map,
            ServerList::Empty(_) => HashMap::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SshError {
    #[error("server `{0}` not found")]
    ServerNotFound(String),
    #[error("server `{0}` has no main IP yet")]
    MissingAddress(String),
    #[error("authentication failed for {user}@{address}")]
    AuthenticationFailed { user: String, address: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub address: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ShellTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellTarget")
            .field("address", &self.address)
            .field("user", &self.user)
            .field("password", &"*****")
            .finish()
    }
}

/// Transport that turns a resolved target into an interactive session.
pub trait RemoteShell {
    /// Blocks until the remote side closes the session.
    fn open(&self, target: &ShellTarget) -> Result<()>;
}

pub fn decode_servers(body: impl std::io::Read) -> Result<HashMap<String, ServerRecord>> {
    let list: ServerList = serde_json::from_reader(body).context("decoding server list")?;
    Ok(list.into_map())
}

pub fn resolve_target(
    servers: &HashMap<String, ServerRecord>,
    server_id: &str,
) -> Result<ShellTarget, SshError> {
    let record = servers
        .get(server_id)
        .ok_or_else(|| SshError::ServerNotFound(server_id.to_string()))?;
    if record.main_ip.trim().is_empty() {
        return Err(SshError::MissingAddress(server_id.to_string()));
    }

    Ok(ShellTarget {
        address: format!("{}:{}", record.main_ip, SSH_PORT),
        user: LOGIN_USER.to_string(),
        password: record.default_password.clone(),
    })
}

/// Looks the server up through `list_path` and hands its credentials to `shell`.
pub fn open_shell(
    client: &ApiClient,
    shell: &dyn RemoteShell,
    out: &mut dyn Write,
    list_path: &str,
    server_id: &str,
) -> Result<()> {
    let response = client.get(list_path)?;
    if !response.status().is_success() {
        return print_response(out, Ok(response));
    }

    let servers = decode_servers(response)?;
    let target = resolve_target(&servers, server_id)?;
    if let Some(record) = servers.get(server_id) {
        tracing::debug!(
            os = %record.os,
            location = %record.location,
            status = %record.status,
            ram = %record.ram,
            disk = %record.disk,
            vcpus = %record.vcpu_count,
            created = %record.date_created,
            pending_charges = %record.pending_charges,
            cost_per_month = %record.cost_per_month,
            bandwidth_gb = record.current_bandwidth_gb,
            "resolved server"
        );
    }
    tracing::info!("IP: {}", target.address);

    shell.open(&target)
}

#[derive(Debug, Default)]
pub struct RusshShell;

impl RemoteShell for RusshShell {
    fn open(&self, target: &ShellTarget) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("starting SSH runtime")?;
        let result = runtime.block_on(interactive_session(
            target,
            tokio::io::stdin(),
            tokio::io::stdout(),
            tokio::io::stderr(),
        ));
        // A stdin read parked on the blocking pool would hold a plain drop open.
        runtime.shutdown_background();
        result
    }
}

struct SshHandler;

#[async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: verify against ~/.ssh/known_hosts once hosts are recorded on create
        Ok(true)
    }
}

/// Bridges `input` into a remote login shell and copies its output back
/// until the server closes the channel.
async fn interactive_session<I, O, E>(
    target: &ShellTarget,
    mut input: I,
    mut output: O,
    mut errors: E,
) -> Result<()>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let config = Arc::new(client::Config::default());
    let mut session = client::connect(config, target.address.as_str(), SshHandler)
        .await
        .with_context(|| format!("connecting to {}", target.address))?;

    let authenticated = session
        .authenticate_password(&target.user, &target.password)
        .await
        .context("authenticating")?;
    if !authenticated {
        return Err(SshError::AuthenticationFailed {
            user: target.user.clone(),
            address: target.address.clone(),
        }
        .into());
    }

    let mut channel = session
        .channel_open_session()
        .await
        .context("opening session channel")?;
    let modes = [
        (Pty::ECHO, 0),
        (Pty::TTY_OP_ISPEED, BAUD),
        (Pty::TTY_OP_OSPEED, BAUD),
    ];
    channel
        .request_pty(false, TERM, PTY_COLS, PTY_ROWS, 0, 0, &modes)
        .await
        .context("requesting pseudo terminal")?;
    channel
        .request_shell(true)
        .await
        .context("starting remote shell")?;

    let mut buf = vec![0u8; 1024];
    let mut input_open = true;

    loop {
        tokio::select! {
            read = input.read(&mut buf), if input_open => {
                match read.context("reading input")? {
                    0 => {
                        input_open = false;
                        channel.eof().await?;
                    }
                    n => channel.data(&buf[..n]).await?,
                }
            }
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { ref data }) => {
                    output.write_all(data).await?;
                    output.flush().await?;
                }
                Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => {
                    errors.write_all(data).await?;
                    errors.flush().await?;
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    tracing::debug!(exit_status, "remote shell exited");
                }
                Some(ChannelMsg::Close) | None => break,
                _ => {}
            },
        }
    }

    session
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
        .context("closing SSH session")?;
    Ok(())
}
