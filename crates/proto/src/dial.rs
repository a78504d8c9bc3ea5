//! Upstream dialer
//!
//! Dials a remote server, logs in with the identity the token layer vouches
//! for, and captures the StartGame snapshot. The returned connection has not
//! spawned yet; callers run [`Connection::do_spawn`] as their half of the
//! handshake pair.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::conn::Connection;
use crate::error::{ProtoError, Result};
use crate::packet::Packet;
use crate::types::{
    IdentityData, PLAY_STATUS_LOGIN_SUCCESS, PROTOCOL_VERSION,
};

/// How long the dialer waits for each login-phase packet.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Dials upstream servers on behalf of a player identity.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    /// Identity presented at login.
    pub identity: IdentityData,
}

impl Dialer {
    /// Dial `addr` (`host:port`) and complete the login exchange.
    pub async fn dial(self, addr: &str) -> Result<Arc<Connection>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;
        let peer = socket.peer_addr()?;
        tracing::info!("dialing {} as {}", peer, self.identity.display_name);

        let conn = Arc::new(Connection::new(Arc::new(socket), peer));
        conn.set_identity(self.identity.clone());
        conn.write_packet(&Packet::Login {
            client_protocol: PROTOCOL_VERSION,
            identity: self.identity,
        })
        .await?;

        tokio::time::timeout(DIAL_TIMEOUT, async {
            // Login acknowledgement first, then the world snapshot. Anything
            // else at this stage is a protocol violation worth surfacing.
            match conn.read_packet().await? {
                Packet::PlayStatus { status } if status == PLAY_STATUS_LOGIN_SUCCESS => {}
                Packet::PlayStatus { status } => {
                    return Err(ProtoError::Handshake(format!(
                        "login rejected with status {status}"
                    )));
                }
                Packet::Disconnect { message, .. } => {
                    return Err(ProtoError::Handshake(format!(
                        "disconnected during login: {message}"
                    )));
                }
                other => {
                    return Err(ProtoError::Handshake(format!(
                        "expected PlayStatus, got {}",
                        other.name()
                    )));
                }
            }
            match conn.read_packet().await? {
                Packet::StartGame { game_data } => {
                    conn.set_game_data(game_data);
                    Ok(())
                }
                other => Err(ProtoError::Handshake(format!(
                    "expected StartGame, got {}",
                    other.name()
                ))),
            }
        })
        .await
        .map_err(|_| ProtoError::Timeout("login"))??;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::types::{GameData, Vec3};

    #[tokio::test]
    async fn test_dial_captures_game_data() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            let (len, peer) = server.recv_from(&mut buf).await.unwrap();
            let login = codec::decode(&buf[..len]).unwrap();
            let name = match login {
                Packet::Login { identity, .. } => identity.display_name,
                other => panic!("expected Login, got {other:?}"),
            };
            let ack = Packet::PlayStatus {
                status: PLAY_STATUS_LOGIN_SUCCESS,
            };
            server
                .send_to(&codec::encode(&ack).unwrap(), peer)
                .await
                .unwrap();
            let start = Packet::StartGame {
                game_data: GameData {
                    world_name: "Realm World".to_string(),
                    entity_runtime_id: 42,
                    player_position: Vec3::new(1.0, 64.0, 2.0),
                    ..Default::default()
                },
            };
            server
                .send_to(&codec::encode(&start).unwrap(), peer)
                .await
                .unwrap();
            name
        });

        let dialer = Dialer {
            identity: IdentityData {
                display_name: "Steve".to_string(),
                xuid: "123".to_string(),
                identity: "uuid".to_string(),
            },
        };
        let conn = dialer.dial(&server_addr.to_string()).await.unwrap();

        let gd = conn.game_data().unwrap();
        assert_eq!(gd.world_name, "Realm World");
        assert_eq!(gd.entity_runtime_id, 42);
        assert_eq!(server_task.await.unwrap(), "Steve");
    }

    #[tokio::test]
    async fn test_dial_rejected_login() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            let (_, peer) = server.recv_from(&mut buf).await.unwrap();
            let reject = Packet::Disconnect {
                message: "server full".to_string(),
                hide_screen: false,
            };
            server
                .send_to(&codec::encode(&reject).unwrap(), peer)
                .await
                .unwrap();
        });

        let err = Dialer::default()
            .dial(&server_addr.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtoError::Handshake(_)));
    }
}
