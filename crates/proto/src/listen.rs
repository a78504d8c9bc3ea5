//! Local listener for incoming client connections
//!
//! The listener binds one socket and keeps it for its whole lifetime.
//! Clients cache the listener's identifiers and fail to reconnect after a
//! rebind, so the accept loop never re-binds between sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::net::UdpSocket;

use crate::codec;
use crate::conn::Connection;
use crate::error::Result;
use crate::io::ProtoWrite;
use crate::packet::Packet;
use crate::types::PLAY_STATUS_LOGIN_SUCCESS;

/// First byte of an offline status query datagram and its reply.
const STATUS_QUERY: u8 = 0xff;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Friendly name reported to status queries.
    pub server_name: String,
    /// Keep relaying packet ids this crate does not model.
    pub allow_unknown_packets: bool,
    /// Skip frames that fail to decode instead of dropping the connection.
    pub allow_invalid_packets: bool,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            server_name: "realmbridge".to_string(),
            allow_unknown_packets: true,
            allow_invalid_packets: true,
        }
    }
}

impl ListenConfig {
    /// Bind a listener on `addr`. An address of the form `:19132` binds all
    /// interfaces on that port.
    pub async fn listen(self, addr: &str) -> Result<Listener> {
        let addr = normalize_listen_addr(addr);
        let socket = UdpSocket::bind(&addr).await?;
        tracing::info!("listening on {}", socket.local_addr()?);
        Ok(Listener {
            socket: Arc::new(socket),
            config: self,
        })
    }
}

/// A bound listener accepting one login at a time.
pub struct Listener {
    socket: Arc<UdpSocket>,
    config: ListenConfig,
}

impl Listener {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next client login and complete it. Status queries are
    /// answered inline; anything else arriving before a login is dropped.
    pub async fn accept(&self) -> Result<Connection> {
        let mut buf = vec![0u8; 65535];
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;

            if len == 1 && buf[0] == STATUS_QUERY {
                let mut reply = BytesMut::with_capacity(self.config.server_name.len() + 8);
                reply.put_u8(STATUS_QUERY);
                reply.put_string(&self.config.server_name);
                let _ = self.socket.send_to(&reply, peer).await;
                continue;
            }

            let pk = match codec::decode(&buf[..len]) {
                Ok(pk) => pk,
                Err(err) => {
                    if !self.config.allow_invalid_packets {
                        return Err(err);
                    }
                    tracing::debug!("dropping undecodable pre-login frame from {}: {}", peer, err);
                    continue;
                }
            };

            match pk {
                Packet::Login {
                    client_protocol,
                    identity,
                } => {
                    tracing::info!(
                        "accepting client {} ({}, protocol {})",
                        identity.display_name,
                        peer,
                        client_protocol
                    );
                    let conn = Connection::new(Arc::clone(&self.socket), peer);
                    conn.set_identity(identity);
                    conn.write_packet(&Packet::PlayStatus {
                        status: PLAY_STATUS_LOGIN_SUCCESS,
                    })
                    .await?;
                    return Ok(conn);
                }
                other => {
                    tracing::debug!(
                        "ignoring pre-login {} packet from {}",
                        other.name(),
                        peer
                    );
                }
            }
        }
    }
}

/// Turn `:19132` into `0.0.0.0:19132`; full addresses pass through.
fn normalize_listen_addr(addr: &str) -> String {
    if let Some(stripped) = addr.strip_prefix(':') {
        format!("0.0.0.0:{stripped}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ProtoRead;
    use crate::types::{IdentityData, PROTOCOL_VERSION};

    #[test]
    fn test_normalize_listen_addr() {
        assert_eq!(normalize_listen_addr(":19132"), "0.0.0.0:19132");
        assert_eq!(normalize_listen_addr("127.0.0.1:19132"), "127.0.0.1:19132");
    }

    #[tokio::test]
    async fn test_accept_completes_login() {
        let listener = ListenConfig::default()
            .listen("127.0.0.1:0")
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let login = Packet::Login {
            client_protocol: PROTOCOL_VERSION,
            identity: IdentityData {
                display_name: "Steve".to_string(),
                xuid: "123".to_string(),
                identity: "uuid".to_string(),
            },
        };
        client
            .send_to(&codec::encode(&login).unwrap(), addr)
            .await
            .unwrap();

        let conn = listener.accept().await.unwrap();
        assert_eq!(
            conn.identity_data().unwrap().display_name,
            "Steve".to_string()
        );

        // Client receives the login acknowledgement.
        let mut buf = vec![0u8; 1024];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        match codec::decode(&buf[..len]).unwrap() {
            Packet::PlayStatus { status } => assert_eq!(status, PLAY_STATUS_LOGIN_SUCCESS),
            other => panic!("expected PlayStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_query_answered() {
        let listener = ListenConfig {
            server_name: "My Proxy".to_string(),
            ..Default::default()
        }
        .listen("127.0.0.1:0")
        .await
        .unwrap();
        let addr = listener.local_addr().unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[STATUS_QUERY], addr).await.unwrap();

        // Follow with a login so accept() returns.
        let login = Packet::Login {
            client_protocol: PROTOCOL_VERSION,
            identity: IdentityData::default(),
        };
        client
            .send_to(&codec::encode(&login).unwrap(), addr)
            .await
            .unwrap();
        let _conn = listener.accept().await.unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        let mut reply = bytes::Bytes::copy_from_slice(&buf[..len]);
        assert_eq!(reply.get_u8_checked().unwrap(), STATUS_QUERY);
        assert_eq!(reply.get_string().unwrap(), "My Proxy");
    }
}
