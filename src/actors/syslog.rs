//! SyslogListenerActor - Receives syslog datagrams and persists them
//!
//! ```text
//! UDP socket → parse_datagram → spawned insert (one task per datagram)
//!     ↑
//!     └─── Commands (GetStats, Shutdown)
//! ```
//!
//! Inserts are fire-and-forget: a slow store never stalls the receive loop,
//! and a failed insert is logged and dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::storage::LogStore;
use crate::syslog::parse_datagram;

use super::messages::{SyslogCommand, SyslogStats};

/// Largest possible UDP payload
const MAX_DATAGRAM: usize = 65_535;

pub struct SyslogListenerActor {
    socket: UdpSocket,
    store: Arc<dyn LogStore>,
    stats: SyslogStats,
    command_rx: mpsc::Receiver<SyslogCommand>,
}

impl SyslogListenerActor {
    pub fn new(
        socket: UdpSocket,
        store: Arc<dyn LogStore>,
        command_rx: mpsc::Receiver<SyslogCommand>,
    ) -> Self {
        Self {
            socket,
            store,
            stats: SyslogStats::default(),
            command_rx,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting syslog listener");

        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => self.handle_datagram(&buf[..len], peer),
                        Err(e) => warn!("failed to receive syslog datagram: {}", e),
                    }
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        SyslogCommand::GetStats { respond_to } => {
                            let _ = respond_to.send(self.stats);
                        }

                        SyslogCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("syslog listener stopped");
    }

    fn handle_datagram(&mut self, bytes: &[u8], peer: SocketAddr) {
        self.stats.received += 1;

        let record = parse_datagram(bytes, peer.ip().to_canonical(), Utc::now());
        trace!(
            host = %record.hostname,
            facility = record.facility,
            severity = record.severity,
            "syslog message"
        );

        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert_syslog(&record).await {
                error!(host = %record.hostname, "failed to persist syslog message: {}", e);
            }
        });
    }
}

/// Handle for controlling a SyslogListenerActor
#[derive(Clone)]
pub struct SyslogHandle {
    sender: mpsc::Sender<SyslogCommand>,
    local_addr: SocketAddr,
}

impl SyslogHandle {
    /// Bind the socket and start listening
    ///
    /// A bind failure is returned to the caller; nothing is spawned then.
    pub async fn spawn(bind_addr: SocketAddr, store: Arc<dyn LogStore>) -> Result<Self> {
        let socket = UdpSocket::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind syslog listener on {}", bind_addr))?;
        let local_addr = socket
            .local_addr()
            .context("failed to read syslog listener address")?;
        info!("syslog listener bound on {}", local_addr);

        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SyslogListenerActor::new(socket, store, cmd_rx);
        tokio::spawn(actor.run());

        Ok(Self {
            sender: cmd_tx,
            local_addr,
        })
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn stats(&self) -> Result<SyslogStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SyslogCommand::GetStats { respond_to: tx })
            .await
            .context("failed to send GetStats command")?;

        rx.await.context("failed to receive response")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(SyslogCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
