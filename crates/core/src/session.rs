//! Session engine and listener loop
//!
//! One persistent listener accepts a single client at a time. Each accepted
//! client drives a full session: resolve the realm address, dial upstream,
//! run the twin handshake, then relay bidirectionally while a keepalive
//! worker holds the upstream's liveness detector at bay.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};

use realmbridge_proto::types::{
    INPUT_MODE_MOUSE, INTERACTION_MODEL_CROSSHAIR, PLAYER_AUTH_INPUT_BITSET_SIZE,
    PLAY_MODE_NORMAL,
};
use realmbridge_proto::{Bitset, Connection, Dialer, IdentityData, Listener, Packet, Vec3};

use crate::intercept::{on_client_packet, on_server_packet};
use crate::realms::{resolve_realm_address, RealmsClient, TokenSource};
use crate::state::{GameState, Status};

/// Cadence of the synthetic authoritative-input keepalive. The upstream's
/// timeout detector expects this packet every tick; without it an idle
/// client gets dropped after roughly 30 seconds and later chat/command
/// writes fail silently.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(50);

/// Accept clients forever, one session at a time. The bound port is held
/// across sessions: clients cache the listener's identifiers, so the
/// socket must never be rebound.
pub async fn run_proxy<T: TokenSource>(
    listener: Listener,
    invite: String,
    realms: Arc<RealmsClient<T>>,
    identity: IdentityData,
    state: Arc<GameState>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        state.set_status(Status::WaitingForClient);

        let client_conn = tokio::select! {
            _ = shutdown.changed() => return,
            accepted = listener.accept() => match accepted {
                Ok(conn) => Arc::new(conn),
                Err(err) => {
                    tracing::error!("accept error: {err}");
                    continue;
                }
            },
        };
        tracing::info!("client connected from {}", client_conn.peer_addr());

        if let Err(err) = handle_session(
            client_conn,
            &invite,
            &realms,
            &identity,
            &state,
            shutdown.clone(),
        )
        .await
        {
            tracing::error!("session error: {err:#}");
        }

        state.clear_connections();
        state.clear_identity();
        state.set_status(Status::Disconnected);
        tracing::info!("session ended, waiting for new client");
    }
}

/// One client's session: resolve, dial, handshake, relay, teardown.
async fn handle_session<T: TokenSource>(
    client_conn: Arc<Connection>,
    invite: &str,
    realms: &RealmsClient<T>,
    identity: &IdentityData,
    state: &Arc<GameState>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    state.set_status(Status::ConnectingToRealm);

    let realm_addr = match resolve_realm_address(realms, invite, shutdown.clone()).await {
        Ok(addr) => addr,
        Err(err) => {
            client_conn.close();
            return Err(crate::error::BridgeError::from(err))
                .context("realm address resolution failed");
        }
    };

    run_session(client_conn, &realm_addr, identity, state, shutdown).await
}

/// Dial `realm_addr` and relay between it and the already-accepted client.
/// Split from `handle_session` so sessions are exercisable against a plain
/// socket endpoint.
pub async fn run_session(
    client_conn: Arc<Connection>,
    realm_addr: &str,
    identity: &IdentityData,
    state: &Arc<GameState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let dialer = Dialer {
        identity: identity.clone(),
    };
    let server_conn = match dialer.dial(realm_addr).await {
        Ok(conn) => conn,
        Err(err) => {
            client_conn.close();
            return Err(err).context("realm dial failed");
        }
    };

    let Some(gd) = server_conn.game_data() else {
        server_conn.close();
        client_conn.close();
        anyhow::bail!("upstream produced no game data");
    };
    let id = server_conn.identity_data().unwrap_or_else(|| identity.clone());

    // Handshake pair: replay game data to the client while spawning in
    // upstream. Either failure tears down both ends.
    let (client_result, server_result) =
        tokio::join!(client_conn.start_game(gd.clone()), server_conn.do_spawn());
    if let Err(err) = client_result.and(server_result) {
        server_conn.close();
        client_conn.close();
        return Err(err).context("handshake pair failed");
    }

    tracing::info!(
        world = %gd.world_name,
        player = %id.display_name,
        xuid = %id.xuid,
        "connected to realm"
    );

    state.set_connections(Arc::clone(&server_conn), Arc::clone(&client_conn));
    state.set_identity(&id.display_name, &id.xuid, gd.entity_runtime_id);
    state.init_from_game_data(&gd);
    state.set_status(Status::Connected);

    // Session-scoped stop signal for the keepalive worker.
    let (session_tx, session_rx) = watch::channel(false);
    let keepalive = tokio::spawn(keepalive_loop(
        Arc::clone(&server_conn),
        Arc::clone(state),
        session_rx,
    ));

    // One completion slot per relay direction; the first to finish ends the
    // session.
    let (done_tx, mut done_rx) = mpsc::channel::<()>(2);
    let client_to_server = tokio::spawn(relay_loop(
        Arc::clone(&client_conn),
        Arc::clone(&server_conn),
        Arc::clone(state),
        RelayDirection::ClientToServer,
        done_tx.clone(),
    ));
    let server_to_client = tokio::spawn(relay_loop(
        Arc::clone(&server_conn),
        Arc::clone(&client_conn),
        Arc::clone(state),
        RelayDirection::ServerToClient,
        done_tx,
    ));

    tokio::select! {
        _ = done_rx.recv() => {}
        _ = shutdown.changed() => {}
    }

    // Teardown order matters: the keepalive must stop before the upstream
    // connection closes so it never writes to a closed connection.
    let _ = session_tx.send(true);
    let _ = keepalive.await;
    server_conn.close();
    client_conn.close();
    let _ = client_to_server.await;
    let _ = server_to_client.await;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayDirection {
    ClientToServer,
    ServerToClient,
}

/// Relay one direction: read, inspect, forward, until either side fails.
/// Packets are forwarded unmodified and in order.
async fn relay_loop(
    src: Arc<Connection>,
    dst: Arc<Connection>,
    state: Arc<GameState>,
    direction: RelayDirection,
    done: mpsc::Sender<()>,
) {
    loop {
        let pk = match src.read_packet().await {
            Ok(pk) => pk,
            Err(err) => {
                tracing::debug!(?direction, "relay read ended: {err}");
                break;
            }
        };
        match direction {
            RelayDirection::ClientToServer => on_client_packet(&pk, &state),
            RelayDirection::ServerToClient => on_server_packet(&pk, &state),
        }
        if let Err(err) = dst.write_packet(&pk).await {
            tracing::debug!(?direction, "relay write ended: {err}");
            break;
        }
    }
    let _ = done.try_send(());
}

/// Build the synthetic authoritative-input packet for one keepalive tick.
fn keepalive_packet(state: &GameState, tick: u64) -> Packet {
    let (x, y, z, pitch, yaw, _) = state.position();
    Packet::PlayerAuthInput {
        position: Vec3::new(x, y, z),
        pitch,
        yaw,
        head_yaw: yaw,
        input_data: Bitset::new(PLAYER_AUTH_INPUT_BITSET_SIZE),
        input_mode: INPUT_MODE_MOUSE,
        play_mode: PLAY_MODE_NORMAL,
        interaction_model: INTERACTION_MODEL_CROSSHAIR,
        tick,
        item_interaction: None,
        block_actions: vec![],
    }
}

/// Write a synthetic input packet upstream every tick so the realm keeps
/// treating the proxied player as present while the local client idles.
/// Write errors are logged and swallowed; the relay worker observes the
/// same failure and drives the teardown.
async fn keepalive_loop(
    conn: Arc<Connection>,
    state: Arc<GameState>,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(KEEPALIVE_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut tick: u64 = 0;
    loop {
        if *stop.borrow() {
            return;
        }
        tokio::select! {
            _ = stop.changed() => return,
            _ = interval.tick() => {}
        }
        tick += 1;
        if let Err(err) = conn.write_packet(&keepalive_packet(&state, tick)).await {
            tracing::debug!("keepalive write failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmbridge_proto::codec;
    use realmbridge_proto::types::{
        GameData, ItemEntry, PLAY_STATUS_LOGIN_SUCCESS, PLAY_STATUS_PLAYER_SPAWN,
    };
    use tokio::net::UdpSocket;

    #[test]
    fn test_keepalive_packet_reads_current_position() {
        let state = GameState::new();
        state.update_position(10.0, 64.0, -3.0, 12.0, 34.0);
        match keepalive_packet(&state, 7) {
            Packet::PlayerAuthInput {
                position,
                pitch,
                yaw,
                head_yaw,
                tick,
                input_mode,
                item_interaction,
                ..
            } => {
                assert_eq!(position, Vec3::new(10.0, 64.0, -3.0));
                assert_eq!(pitch, 12.0);
                assert_eq!(yaw, 34.0);
                assert_eq!(head_yaw, 34.0);
                assert_eq!(tick, 7);
                assert_eq!(input_mode, INPUT_MODE_MOUSE);
                assert!(item_interaction.is_none());
            }
            other => panic!("expected PlayerAuthInput, got {other:?}"),
        }
    }

    async fn send_pk(socket: &UdpSocket, peer: std::net::SocketAddr, pk: &Packet) {
        socket
            .send_to(&codec::encode(pk).unwrap(), peer)
            .await
            .unwrap();
    }

    /// Full session against a scripted upstream and client: handshake pair,
    /// interception of relayed packets, keepalive emission, clean teardown.
    #[tokio::test]
    async fn test_run_session_end_to_end() {
        let state = Arc::new(GameState::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Scripted upstream server.
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let upstream_addr = upstream.local_addr().unwrap();
        let upstream_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];

            // Login -> ack -> StartGame -> spawn notification.
            let (len, peer) = upstream.recv_from(&mut buf).await.unwrap();
            assert!(matches!(
                codec::decode(&buf[..len]).unwrap(),
                Packet::Login { .. }
            ));
            send_pk(
                &upstream,
                peer,
                &Packet::PlayStatus {
                    status: PLAY_STATUS_LOGIN_SUCCESS,
                },
            )
            .await;
            send_pk(
                &upstream,
                peer,
                &Packet::StartGame {
                    game_data: GameData {
                        world_name: "Realm World".to_string(),
                        entity_runtime_id: 42,
                        player_position: Vec3::new(1.0, 64.0, 2.0),
                        items: vec![ItemEntry {
                            runtime_id: 5,
                            name: "minecraft:stone".to_string(),
                            component_based: false,
                        }],
                        ..Default::default()
                    },
                },
            )
            .await;
            send_pk(
                &upstream,
                peer,
                &Packet::PlayStatus {
                    status: PLAY_STATUS_PLAYER_SPAWN,
                },
            )
            .await;

            // Proxy acknowledges the spawn.
            loop {
                let (len, _) = upstream.recv_from(&mut buf).await.unwrap();
                if matches!(
                    codec::decode(&buf[..len]).unwrap(),
                    Packet::SetLocalPlayerAsInitialised { .. }
                ) {
                    break;
                }
            }

            // Push a movement for our entity through the relay.
            send_pk(
                &upstream,
                peer,
                &Packet::MovePlayer {
                    entity_runtime_id: 42,
                    position: Vec3::new(50.0, 70.0, 80.0),
                    pitch: 15.0,
                    yaw: 45.0,
                    head_yaw: 45.0,
                    mode: 0,
                    on_ground: true,
                },
            )
            .await;

            // Wait for at least one keepalive tick.
            loop {
                let (len, _) = upstream.recv_from(&mut buf).await.unwrap();
                if let Packet::PlayerAuthInput { tick, .. } = codec::decode(&buf[..len]).unwrap() {
                    assert!(tick >= 1);
                    break;
                }
            }
        });

        // Scripted local client on the other side of the proxy.
        let client_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let proxy_side = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client_socket.local_addr().unwrap();
        let proxy_addr = proxy_side.local_addr().unwrap();
        let client_conn = Arc::new(Connection::new(Arc::new(proxy_side), client_addr));

        let client_task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            let mut saw_start_game = false;
            loop {
                let (len, peer) = client_socket.recv_from(&mut buf).await.unwrap();
                assert_eq!(peer, proxy_addr);
                match codec::decode(&buf[..len]).unwrap() {
                    Packet::StartGame { game_data } => {
                        assert_eq!(game_data.world_name, "Realm World");
                        saw_start_game = true;
                    }
                    Packet::PlayStatus { status } if status == PLAY_STATUS_PLAYER_SPAWN => {
                        let ack = Packet::SetLocalPlayerAsInitialised {
                            entity_runtime_id: 42,
                        };
                        client_socket
                            .send_to(&codec::encode(&ack).unwrap(), peer)
                            .await
                            .unwrap();
                        break;
                    }
                    _ => {}
                }
            }
            saw_start_game
        });

        let identity = IdentityData {
            display_name: "Steve".to_string(),
            xuid: "123".to_string(),
            identity: "uuid".to_string(),
        };
        let session_state = Arc::clone(&state);
        let session = tokio::spawn(async move {
            run_session(
                client_conn,
                &upstream_addr.to_string(),
                &identity,
                &session_state,
                shutdown_rx,
            )
            .await
        });

        upstream_task.await.unwrap();
        assert!(client_task.await.unwrap());

        // The relayed MovePlayer for our runtime id reached the state model.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let (x, _, _, _, _, _) = state.position();
            if x == 50.0 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "position never updated from relayed MovePlayer"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.status(), Status::Connected);
        let (name, xuid) = state.identity();
        assert_eq!(name, "Steve");
        assert_eq!(xuid, "123");
        assert_eq!(state.entity_id(), 42);
        assert_eq!(state.resolve_item_name(5), "minecraft:stone");

        // Cancel the session and verify clean teardown. The session may
        // already be unwinding if the scripted upstream went away first, so
        // the receiver side is allowed to be gone.
        let _ = shutdown_tx.send(true);
        session.await.unwrap().unwrap();
        assert!(state.server_conn().is_some()); // cleared by the listener loop, not the session
    }
}
