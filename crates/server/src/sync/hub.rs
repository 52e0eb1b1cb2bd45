//! Real-time sync hub.
//!
//! A single task owns the clipboard and the viewer registry and serializes
//! every mutation through one event channel. Outbound fan-out uses bounded
//! per-viewer channels with try_send; a viewer whose channel is full is
//! dropped rather than allowed to stall the hub.

use protocol::{Packet, SendPacket};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::command;
use crate::error::{ServerError, ServerResult};
use crate::sync::clipboard::{Clipboard, ClipboardEntry};

/// Unique identifier for a connected viewer.
pub type ViewerId = Uuid;

/// Capacity of the hub's event channel.
const HUB_CHANNEL_CAPACITY: usize = 256;

/// Capacity of each viewer's outbound channel.
const VIEWER_CHANNEL_CAPACITY: usize = 64;

/// A registered viewer's outbound side.
struct ViewerHandle {
    id: ViewerId,
    tx: mpsc::Sender<SendPacket>,
}

impl ViewerHandle {
    /// Attempts to queue a packet without blocking.
    ///
    /// Returns false if the viewer is full or gone, in which case the hub
    /// evicts it.
    fn try_send(&self, packet: SendPacket) -> bool {
        match self.tx.try_send(packet) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(viewer_id = %self.id, "viewer outbound queue full, evicting");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Events processed by the hub loop.
enum HubEvent {
    Register {
        id: ViewerId,
        tx: mpsc::Sender<SendPacket>,
    },
    Unregister {
        id: ViewerId,
    },
    Inbound {
        id: ViewerId,
        packet: Packet,
    },
    CommandOutput {
        output: String,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<ClipboardEntry>>,
    },
    Dump {
        reply: oneshot::Sender<String>,
    },
}

/// Cloneable handle to the hub task.
#[derive(Clone)]
pub struct SyncHub {
    tx: mpsc::Sender<HubEvent>,
}

impl SyncHub {
    /// Spawn the hub loop. Clipboard mutation and remote command execution
    /// are each honored only when enabled; disabled packets are dropped
    /// with a warning.
    pub fn spawn(enable_clipboard: bool, enable_command: bool) -> Self {
        let (tx, rx) = mpsc::channel(HUB_CHANNEL_CAPACITY);
        let hub = SyncHub { tx };
        tokio::spawn(run_loop(rx, hub.tx.clone(), enable_clipboard, enable_command));
        hub
    }

    /// Register a new viewer. Returns its id and the outbound receiver to
    /// drain into the socket.
    pub async fn register(&self) -> ServerResult<(ViewerId, mpsc::Receiver<SendPacket>)> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(VIEWER_CHANNEL_CAPACITY);
        self.send(HubEvent::Register { id, tx }).await?;
        Ok((id, rx))
    }

    /// Remove a viewer. Safe to call for an already-evicted viewer.
    pub async fn unregister(&self, id: ViewerId) {
        let _ = self.tx.send(HubEvent::Unregister { id }).await;
    }

    /// Feed a packet received from a viewer into the hub.
    pub async fn handle_packet(&self, id: ViewerId, packet: Packet) -> ServerResult<()> {
        self.send(HubEvent::Inbound { id, packet }).await
    }

    /// Current clipboard entries, newest first.
    pub async fn snapshot(&self) -> ServerResult<Vec<ClipboardEntry>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Snapshot { reply }).await?;
        rx.await
            .map_err(|_| ServerError::Internal("sync hub unavailable".to_string()))
    }

    /// Serialized clipboard for a download response.
    pub async fn dump_json(&self) -> ServerResult<String> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Dump { reply }).await?;
        rx.await
            .map_err(|_| ServerError::Internal("sync hub unavailable".to_string()))
    }

    async fn send(&self, event: HubEvent) -> ServerResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServerError::Internal("sync hub unavailable".to_string()))
    }
}

async fn run_loop(
    mut rx: mpsc::Receiver<HubEvent>,
    self_tx: mpsc::Sender<HubEvent>,
    enable_clipboard: bool,
    enable_command: bool,
) {
    let mut clipboard = Clipboard::new();
    let mut viewers: Vec<ViewerHandle> = Vec::new();

    while let Some(event) = rx.recv().await {
        match event {
            HubEvent::Register { id, tx } => {
                viewers.push(ViewerHandle { id, tx });
                tracing::debug!(viewer_id = %id, viewers = viewers.len(), "viewer registered");
            }
            HubEvent::Unregister { id } => {
                viewers.retain(|v| v.id != id);
                tracing::debug!(viewer_id = %id, viewers = viewers.len(), "viewer unregistered");
            }
            HubEvent::Inbound { id, packet } => {
                handle_inbound(
                    id,
                    packet,
                    &mut clipboard,
                    &mut viewers,
                    &self_tx,
                    enable_clipboard,
                    enable_command,
                );
            }
            HubEvent::CommandOutput { output } => {
                broadcast(&mut viewers, SendPacket::UpdateCli(output));
            }
            HubEvent::Snapshot { reply } => {
                let _ = reply.send(clipboard.entries());
            }
            HubEvent::Dump { reply } => {
                let _ = reply.send(clipboard.dump_json());
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_inbound(
    viewer_id: ViewerId,
    packet: Packet,
    clipboard: &mut Clipboard,
    viewers: &mut Vec<ViewerHandle>,
    self_tx: &mpsc::Sender<HubEvent>,
    enable_clipboard: bool,
    enable_command: bool,
) {
    if !enable_clipboard && !matches!(packet, Packet::Command(_)) {
        tracing::warn!(viewer_id = %viewer_id, "clipboard packet dropped, clipboard disabled");
        return;
    }
    match packet {
        Packet::NewEntry(content) => {
            clipboard.add(content);
            broadcast(viewers, SendPacket::RefreshClipboard);
        }
        Packet::DelEntry(raw_id) => match Packet::DelEntry(raw_id).entry_id() {
            Ok(id) => {
                if !clipboard.delete(id) {
                    tracing::debug!(viewer_id = %viewer_id, id, "delete for unknown clipboard id");
                }
                broadcast(viewers, SendPacket::RefreshClipboard);
            }
            Err(e) => {
                tracing::warn!(viewer_id = %viewer_id, error = %e, "bad clipboard delete packet");
            }
        },
        Packet::ClearClipboard => {
            clipboard.clear();
            broadcast(viewers, SendPacket::RefreshClipboard);
        }
        Packet::Command(cmd) => {
            if !enable_command {
                tracing::warn!(viewer_id = %viewer_id, "command packet dropped, execution disabled");
                return;
            }
            tracing::info!(viewer_id = %viewer_id, command = %cmd, "running remote command");
            let tx = self_tx.clone();
            tokio::spawn(async move {
                let output = command::run(&cmd).await;
                let _ = tx.send(HubEvent::CommandOutput { output }).await;
            });
        }
    }
}

/// Fan a packet out to every viewer, dropping any that cannot keep up.
fn broadcast(viewers: &mut Vec<ViewerHandle>, packet: SendPacket) {
    viewers.retain(|v| v.try_send(packet.clone()));
}
