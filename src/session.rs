use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::{ControlChannel, bounded};
use crate::data;
use crate::error::{FtpError, FtpResult};
use crate::operations::{list, navigate, raw};
use crate::status;
use crate::types::{FileMetadata, Mode, Reply, SessionOption, TransferType};

/// An open FTP control connection
///
/// Created by [`FtpSession::connect`] and released by [`FtpSession::close`],
/// which consumes the session so it can only be closed once.
#[derive(Debug)]
pub struct FtpSession {
    pub(crate) channel: ControlChannel<TcpStream>,
    pub(crate) peer: SocketAddr,
    pub(crate) timeout: Duration,
    pub(crate) use_pasv_address: bool,
    pub(crate) mode: Mode,
    /// Address negotiated by the last PASV, consumed by the next data command
    pub(crate) pending_passive: Option<SocketAddr>,
    welcome: Reply,
}

impl FtpSession {
    /// Opens the control connection and reads the server greeting
    ///
    /// # Arguments
    ///
    /// * `host` - Hostname or IP address of the server
    /// * `port` - Control port
    /// * `timeout` - Bound on the connect and on every later network wait
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The host cannot be resolved or the TCP connection is refused
    /// - The connection or the greeting takes longer than `timeout`
    /// - The server greets with anything but a 2xx reply
    ///
    /// # Example
    ///
    /// ```ignore
    /// let session = FtpSession::connect("localhost", 9090, Duration::from_secs(10)).await?;
    /// println!("{}", session.welcome());
    /// ```
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> FtpResult<Self> {
        if timeout.is_zero() {
            return Err(FtpError::InvalidOption("timeout must be non-zero".into()));
        }
        let addr = format!("{host}:{port}");
        info!("Connecting to {}", addr);

        let stream = bounded(timeout, "connecting", async {
            TcpStream::connect((host, port))
                .await
                .map_err(|source| FtpError::Connect {
                    addr: addr.clone(),
                    source,
                })
        })
        .await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on the control connection: {}", e);
        }
        let peer = stream.peer_addr()?;

        let mut channel = ControlChannel::new(stream, timeout);
        let mut welcome = channel.read_reply().await?;
        if welcome.code == status::SERVICE_READY_IN {
            debug!("Server not ready yet: {}", welcome);
            welcome = channel.read_reply().await?;
        }
        if !welcome.is_completion() {
            return Err(FtpError::UnexpectedReply {
                command: "connect".to_string(),
                reply: welcome,
            });
        }
        if welcome.code != status::SERVICE_READY {
            warn!("Unusual greeting code: {}", welcome);
        }
        info!(%peer, "Connected: {}", welcome);

        Ok(Self {
            channel,
            peer,
            timeout,
            use_pasv_address: true,
            mode: Mode::default(),
            pending_passive: None,
            welcome,
        })
    }

    /// The greeting the server sent on connect
    pub fn welcome(&self) -> &Reply {
        &self.welcome
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn use_pasv_address(&self) -> bool {
        self.use_pasv_address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Changes a runtime option of the session
    ///
    /// A zero timeout is rejected and leaves the session unchanged.
    pub fn set_option(&mut self, option: SessionOption) -> FtpResult<()> {
        match option {
            SessionOption::UsePasvAddress(enabled) => {
                self.use_pasv_address = enabled;
            }
            SessionOption::Timeout(timeout) => {
                if timeout.is_zero() {
                    return Err(FtpError::InvalidOption("timeout must be non-zero".into()));
                }
                self.timeout = timeout;
                self.channel.set_timeout(timeout);
            }
        }
        debug!(?option, "Session option set");
        Ok(())
    }

    /// Authenticates with USER and, when the server asks for it, PASS
    pub async fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        info!("Logging in as {:?}", user);
        let reply = self.channel.execute(&format!("USER {user}")).await?;
        let reply = match reply.code {
            status::USER_LOGGED_IN => reply,
            status::USERNAME_OK => {
                let command = format!("PASS {password}");
                let reply = self.channel.execute(&command).await?;
                match reply.code {
                    status::USER_LOGGED_IN | status::NOT_IMPLEMENTED_SUPERFLUOUS => reply,
                    code => {
                        if code == status::NEED_ACCOUNT {
                            warn!("Server asks for an account, which is not supported");
                        }
                        return Err(FtpError::UnexpectedReply {
                            command: "PASS ****".to_string(),
                            reply,
                        });
                    }
                }
            }
            _ => {
                return Err(FtpError::UnexpectedReply {
                    command: format!("USER {user}"),
                    reply,
                });
            }
        };
        info!("Logged in: {}", reply);
        Ok(())
    }

    /// Changes the working directory
    pub async fn chdir(&mut self, path: &str) -> FtpResult<()> {
        navigate::cwd(self, path).await
    }

    /// Returns the working directory
    pub async fn pwd(&mut self) -> FtpResult<String> {
        navigate::pwd(self).await
    }

    /// Switches between passive and active data connections
    ///
    /// Enabling passive mode negotiates an address with PASV right away; that
    /// address serves the next data command. Disabling it sends nothing.
    pub async fn set_passive(&mut self, enabled: bool) -> FtpResult<()> {
        if !enabled {
            self.mode = Mode::Active;
            self.pending_passive = None;
            debug!("Active mode enabled");
            return Ok(());
        }
        let target = data::request_passive(self).await?;
        self.mode = Mode::Passive;
        self.pending_passive = Some(target);
        debug!(%target, "Passive mode enabled");
        Ok(())
    }

    /// Announces the representation type with TYPE
    pub async fn transfer_type(&mut self, transfer_type: TransferType) -> FtpResult<()> {
        let reply = self
            .channel
            .expect(&format!("TYPE {}", transfer_type.code()), 2)
            .await?;
        if reply.code != status::COMMAND_OK {
            debug!("TYPE accepted with {}", reply);
        }
        Ok(())
    }

    /// Sends `command` as-is and returns whatever the server answers
    pub async fn raw(&mut self, command: &str) -> FtpResult<Reply> {
        raw::raw(self, command).await
    }

    /// Lists `path` (or the working directory) over a data connection
    ///
    /// Returns the listing lines as the server sent them.
    pub async fn list(&mut self, path: Option<&str>) -> FtpResult<Vec<String>> {
        list::list(self, path, CancellationToken::new()).await
    }

    /// Lists `path` (or the working directory) and parses every entry
    pub async fn ls(
        &mut self,
        path: Option<&str>,
        cancel_token: CancellationToken,
    ) -> FtpResult<Vec<FileMetadata>> {
        list::ls(self, path, cancel_token).await
    }

    pub async fn noop(&mut self) -> FtpResult<()> {
        self.channel.expect("NOOP", 2).await?;
        Ok(())
    }

    /// Checks that the server still answers on the control connection
    pub async fn connected(&mut self) -> bool {
        match self.noop().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Control connection is dead: {}", e);
                false
            }
        }
    }

    /// Sends QUIT and closes the control connection
    ///
    /// A missing or negative reply to QUIT is logged, not returned; only a
    /// failure to send it is.
    pub async fn close(mut self) -> FtpResult<()> {
        info!("Closing connection to {}", self.peer);
        self.channel.send("QUIT").await?;
        match self.channel.read_reply().await {
            Ok(reply) if reply.code == status::CLOSING_CONTROL_CONN => {
                debug!("Server said goodbye: {}", reply);
            }
            Ok(reply) => warn!("Unexpected reply to QUIT: {}", reply),
            Err(e) => warn!("No reply to QUIT: {}", e),
        }
        if let Err(e) = self.channel.shutdown().await {
            debug!("Shutdown after QUIT failed: {}", e);
        }
        Ok(())
    }
}
