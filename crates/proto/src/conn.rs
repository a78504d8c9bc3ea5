//! Connection handling for the datagram transport
//!
//! A [`Connection`] wraps a UDP socket bound to a single peer. Reads are
//! performed by one worker at a time. Writes may come from any number of
//! tasks and are serialized internally; callers must never add their own
//! write lock on top.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};

use crate::codec;
use crate::error::{ProtoError, Result};
use crate::packet::Packet;
use crate::types::{
    GameData, IdentityData, PLAY_STATUS_PLAYER_SPAWN,
};

/// How long handshake phases may wait for their expected packet.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

const RECV_BUFFER_SIZE: usize = 65535;

/// A single established connection to one remote peer.
pub struct Connection {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    /// Serializes frame writes from concurrent producers.
    write_lock: Mutex<()>,
    /// Only one task reads at a time; handshakes and relays take turns.
    read_lock: Mutex<()>,
    /// Packets received while a handshake was waiting for a specific kind.
    /// Drained by `read_packet` before touching the socket again.
    pending: Mutex<VecDeque<Packet>>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    game_data: RwLock<Option<GameData>>,
    identity: RwLock<Option<IdentityData>>,
}

impl Connection {
    /// Wrap an established socket/peer pair.
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        Self {
            socket,
            peer,
            write_lock: Mutex::new(()),
            read_lock: Mutex::new(()),
            pending: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            closed_tx,
            closed_rx,
            game_data: RwLock::new(None),
            identity: RwLock::new(None),
        }
    }

    /// Remote address of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The world snapshot captured at handshake, if the handshake completed.
    pub fn game_data(&self) -> Option<GameData> {
        self.game_data.read().clone()
    }

    /// Identity of the player on this connection, if known.
    pub fn identity_data(&self) -> Option<IdentityData> {
        self.identity.read().clone()
    }

    pub(crate) fn set_game_data(&self, gd: GameData) {
        *self.game_data.write() = Some(gd);
    }

    pub(crate) fn set_identity(&self, id: IdentityData) {
        *self.identity.write() = Some(id);
    }

    /// True once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the connection. Pending and future reads and writes fail with
    /// `ProtoError::Closed`. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.closed_tx.send(true);
            tracing::debug!("connection to {} closed", self.peer);
        }
    }

    /// Read the next packet from the peer. Datagrams from other sources are
    /// dropped; frames that fail to decode are logged and skipped.
    pub async fn read_packet(&self) -> Result<Packet> {
        let _guard = self.read_lock.lock().await;

        if let Some(pk) = self.pending.lock().await.pop_front() {
            return Ok(pk);
        }

        let mut closed_rx = self.closed_rx.clone();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            if *closed_rx.borrow() {
                return Err(ProtoError::Closed);
            }
            let (len, addr) = tokio::select! {
                _ = closed_rx.changed() => return Err(ProtoError::Closed),
                res = self.socket.recv_from(&mut buf) => res?,
            };
            if addr != self.peer {
                tracing::warn!(
                    "dropping datagram from unexpected address {} (expected {})",
                    addr,
                    self.peer
                );
                continue;
            }
            match codec::decode(&buf[..len]) {
                Ok(pk) => return Ok(pk),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::warn!("skipping undecodable frame from {}: {}", self.peer, err);
                }
            }
        }
    }

    /// Write one packet to the peer. Safe to call from multiple tasks; the
    /// internal lock keeps frames whole and ordered per producer.
    pub async fn write_packet(&self, pk: &Packet) -> Result<()> {
        if self.is_closed() {
            return Err(ProtoError::Closed);
        }
        let frame = codec::encode(pk)?;
        let _guard = self.write_lock.lock().await;
        if self.is_closed() {
            return Err(ProtoError::Closed);
        }
        self.socket.send_to(&frame, self.peer).await?;
        Ok(())
    }

    /// Server-role half of the handshake pair: replay `gd` to the peer and
    /// wait until it reports itself spawned. Packets of other kinds arriving
    /// meanwhile are queued for later `read_packet` calls.
    pub async fn start_game(&self, gd: GameData) -> Result<()> {
        self.write_packet(&Packet::StartGame {
            game_data: gd.clone(),
        })
        .await?;
        self.set_game_data(gd);
        self.write_packet(&Packet::PlayStatus {
            status: PLAY_STATUS_PLAYER_SPAWN,
        })
        .await?;

        tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                match self.read_packet().await? {
                    Packet::SetLocalPlayerAsInitialised { .. } => return Ok(()),
                    other => self.pending.lock().await.push_back(other),
                }
            }
        })
        .await
        .map_err(|_| ProtoError::Timeout("client spawn"))?
    }

    /// Client-role half of the handshake pair: wait for the server's spawn
    /// notification, then acknowledge with our runtime id.
    pub async fn do_spawn(&self) -> Result<()> {
        tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                match self.read_packet().await? {
                    Packet::PlayStatus { status } if status == PLAY_STATUS_PLAYER_SPAWN => {
                        break;
                    }
                    other => self.pending.lock().await.push_back(other),
                }
            }
            let runtime_id = self
                .game_data()
                .map(|gd| gd.entity_runtime_id)
                .ok_or_else(|| ProtoError::Handshake("spawn before game data".to_string()))?;
            self.write_packet(&Packet::SetLocalPlayerAsInitialised {
                entity_runtime_id: runtime_id,
            })
            .await
        })
        .await
        .map_err(|_| ProtoError::Timeout("server spawn"))?
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    /// Two connections talking to each other over loopback sockets.
    async fn conn_pair() -> (Arc<Connection>, Arc<Connection>) {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr_a = a.local_addr().unwrap();
        let addr_b = b.local_addr().unwrap();
        (
            Arc::new(Connection::new(Arc::new(a), addr_b)),
            Arc::new(Connection::new(Arc::new(b), addr_a)),
        )
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (a, b) = conn_pair().await;
        let pk = Packet::SetTime { time: 6000 };
        a.write_packet(&pk).await.unwrap();
        assert_eq!(b.read_packet().await.unwrap(), pk);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let (a, _b) = conn_pair().await;
        a.close();
        let err = a
            .write_packet(&Packet::SetTime { time: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, ProtoError::Closed));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_read() {
        let (a, _b) = conn_pair().await;
        let reader = {
            let a = Arc::clone(&a);
            tokio::spawn(async move { a.read_packet().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        a.close();
        let result = reader.await.unwrap();
        assert!(matches!(result, Err(ProtoError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (a, _b) = conn_pair().await;
        a.close();
        a.close();
        assert!(a.is_closed());
    }

    #[tokio::test]
    async fn test_spawn_handshake_queues_early_packets() {
        let (server, client) = conn_pair().await;
        let gd = GameData {
            world_name: "World".to_string(),
            entity_runtime_id: 42,
            player_position: Vec3::new(0.0, 64.0, 0.0),
            ..Default::default()
        };

        let server_task = {
            let server = Arc::clone(&server);
            let gd = gd.clone();
            tokio::spawn(async move { server.start_game(gd).await })
        };

        // Client side: consume StartGame, then send a chat packet *before*
        // finishing the spawn handshake.
        let pk = client.read_packet().await.unwrap();
        match pk {
            Packet::StartGame { game_data } => assert_eq!(game_data.world_name, "World"),
            other => panic!("expected StartGame, got {other:?}"),
        }
        match client.read_packet().await.unwrap() {
            Packet::PlayStatus { status } => assert_eq!(status, PLAY_STATUS_PLAYER_SPAWN),
            other => panic!("expected PlayStatus, got {other:?}"),
        }
        client
            .write_packet(&Packet::SetTime { time: 99 })
            .await
            .unwrap();
        client
            .write_packet(&Packet::SetLocalPlayerAsInitialised {
                entity_runtime_id: 42,
            })
            .await
            .unwrap();

        server_task.await.unwrap().unwrap();

        // The early packet was queued, not lost.
        assert_eq!(
            server.read_packet().await.unwrap(),
            Packet::SetTime { time: 99 }
        );
    }
}
