//! Write-side control operations
//!
//! Actions reach the upstream connection through the handle stored in
//! `GameState`. Commands travel as `/`-prefixed chat on purpose: the
//! hosting platform's packet validation trips on the command-request
//! packet kind and drops the session.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;

use realmbridge_proto::types::{
    CLIENT_PREDICTION_SUCCESS, PLAYER_ACTION_START_ITEM_USE_ON, PLAYER_ACTION_STOP_ITEM_USE_ON,
    TEXT_TYPE_CHAT, TRIGGER_TYPE_PLAYER_INPUT, USE_ITEM_ACTION_CLICK_AIR,
    USE_ITEM_ACTION_CLICK_BLOCK,
};
use realmbridge_proto::{
    BlockPos, Connection, ItemInstance, ItemStack, ItemType, Packet, TransactionData,
    UseItemTransactionData, Vec3,
};

use crate::control::query::require_connected;
use crate::error::BridgeError;
use crate::state::GameState;

/// Default pause between structure chunks.
pub const DEFAULT_UPLOAD_DELAY_MS: u64 = 50;

/// Default pause between block placements.
pub const DEFAULT_PLACE_DELAY_MS: u64 = 100;

/// Send a chat message to the realm as the connected player.
pub async fn chat(state: &GameState, message: &str) -> Result<String, BridgeError> {
    require_connected(state)?;
    send_text(state, message).await?;
    Ok(format!("sent chat: {message}"))
}

/// Execute a command on the realm. The leading slash is optional on input
/// and always present on the wire.
pub async fn command(state: &GameState, command: &str) -> Result<String, BridgeError> {
    require_connected(state)?;
    let command = command.trim_start_matches('/');
    send_text(state, &format!("/{command}")).await?;
    Ok(format!("executed: /{command}"))
}

/// Teleport the player via the command path.
pub async fn teleport(state: &GameState, x: f64, y: f64, z: f64) -> Result<String, BridgeError> {
    require_connected(state)?;
    send_text(state, &format!("/tp @s {x:.2} {y:.2} {z:.2}")).await?;
    Ok(format!("teleporting to ({x:.2}, {y:.2}, {z:.2})"))
}

/// Toggle verbose diagnostics for building-related packets.
pub fn toggle_packet_logging(state: &GameState, enabled: bool) -> String {
    state.set_verbose_packet_log(enabled);
    tracing::info!(enabled, "packet logging toggled");
    format!(
        "verbose packet logging {}",
        if enabled { "enabled" } else { "disabled" }
    )
}

/// Upload a line-delimited structure file: each non-empty line travels as a
/// `!chunk` chat message consumed by the in-world script. Cancellation
/// between chunks reports the index reached.
pub async fn upload_structure(
    state: &GameState,
    path: &str,
    delay_ms: Option<u64>,
    mut cancel: watch::Receiver<bool>,
) -> Result<String, BridgeError> {
    require_connected(state)?;
    let delay = Duration::from_millis(delay_ms.unwrap_or(DEFAULT_UPLOAD_DELAY_MS));

    let chunks = read_chunks_file(path).await?;
    if chunks.is_empty() {
        return Err(BridgeError::invalid_argument("no chunks found in file"));
    }

    tracing::info!(file = path, chunks = chunks.len(), "uploading structure");

    for (i, chunk) in chunks.iter().enumerate() {
        if *cancel.borrow() {
            return Ok(format!("interrupted after {}/{} chunks", i, chunks.len()));
        }
        send_text(state, &format!("!chunk {chunk}"))
            .await
            .map_err(|err| match err {
                BridgeError::WriteFailed(msg) => {
                    BridgeError::WriteFailed(format!("at chunk {}: {}", i + 1, msg))
                }
                other => other,
            })?;

        if !delay.is_zero() {
            tokio::select! {
                _ = cancel.changed() => {
                    return Ok(format!("interrupted after {}/{} chunks", i + 1, chunks.len()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    Ok(format!("uploaded {} chunks from {}", chunks.len(), path))
}

/// One requested block placement.
#[derive(Debug, Deserialize)]
pub struct BlockPlacement {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block_name: String,
}

/// Place blocks by replaying the client's placement packet sequence.
/// Requires creative mode or the blocks in inventory.
pub async fn place_blocks(
    state: &GameState,
    blocks_json: &str,
    delay_ms: Option<u64>,
    mut cancel: watch::Receiver<bool>,
) -> Result<String, BridgeError> {
    require_connected(state)?;
    let delay = Duration::from_millis(delay_ms.unwrap_or(DEFAULT_PLACE_DELAY_MS));

    let blocks: Vec<BlockPlacement> = serde_json::from_str(blocks_json)
        .map_err(|err| BridgeError::invalid_argument(format!("invalid blocks JSON: {err}")))?;
    if blocks.is_empty() {
        return Err(BridgeError::invalid_argument("blocks array is empty"));
    }

    let conn = state
        .server_conn()
        .ok_or(BridgeError::ConnectionUnavailable)?;

    let mut placed = 0usize;
    for (i, block) in blocks.iter().enumerate() {
        if *cancel.borrow() {
            return Ok(format!("interrupted after {}/{} blocks", placed, blocks.len()));
        }

        place_block(&conn, state, block).await.map_err(|err| {
            tracing::warn!(index = i, block = %block.block_name, error = %err, "placement failed");
            match err {
                BridgeError::WriteFailed(msg) => BridgeError::WriteFailed(format!(
                    "at block {} ({} at {},{},{}): {}",
                    i, block.block_name, block.x, block.y, block.z, msg
                )),
                other => other,
            }
        })?;
        placed += 1;

        if !delay.is_zero() && i < blocks.len() - 1 {
            tokio::select! {
                _ = cancel.changed() => {
                    return Ok(format!("interrupted after {}/{} blocks", placed, blocks.len()));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    Ok(format!("placed {placed} blocks"))
}

/// Write a Text chat packet carrying the current identity.
async fn send_text(state: &GameState, message: &str) -> Result<(), BridgeError> {
    let (name, xuid) = state.identity();
    let conn = state
        .server_conn()
        .ok_or(BridgeError::ConnectionUnavailable)?;
    conn.write_packet(&Packet::Text {
        text_type: TEXT_TYPE_CHAT,
        needs_translation: false,
        source_name: name,
        message: message.to_string(),
        parameters: vec![],
        xuid,
    })
    .await
    .map_err(|err| BridgeError::WriteFailed(err.to_string()))
}

/// Read a line-delimited chunks file, skipping empty lines.
async fn read_chunks_file(path: &str) -> Result<Vec<String>, BridgeError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| BridgeError::invalid_argument(format!("could not open chunks file: {err}")))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Send the four-packet block placement sequence the real client emits:
/// StartItemUseOn, ClickBlock, ClickAir, StopItemUseOn.
async fn place_block(
    conn: &Arc<Connection>,
    state: &GameState,
    block: &BlockPlacement,
) -> Result<(), BridgeError> {
    let network_id = state
        .resolve_item_network_id(&block.block_name)
        .ok_or_else(|| {
            BridgeError::invalid_argument(format!(
                "unknown block name {:?} (not in item registry)",
                block.block_name
            ))
        })?;

    let entity_id = state.entity_id();
    let (pos_x, pos_y, pos_z, _, _, _) = state.position();
    let player_pos = Vec3::new(pos_x, pos_y, pos_z);

    // We "click on top" of the block below the target position.
    let target_pos = BlockPos::new(block.x, block.y - 1, block.z);
    let new_pos = BlockPos::new(block.x, block.y, block.z);

    let held_item = ItemInstance {
        stack_network_id: 0,
        stack: ItemStack {
            item_type: ItemType {
                network_id,
                metadata_value: 0,
            },
            block_runtime_id: 0,
            count: 1,
            has_network_id: false,
        },
    };

    async fn write(conn: &Connection, pk: Packet) -> Result<(), BridgeError> {
        conn.write_packet(&pk)
            .await
            .map_err(|err| BridgeError::WriteFailed(err.to_string()))
    }

    write(conn, Packet::PlayerAction {
        entity_runtime_id: entity_id,
        action_type: PLAYER_ACTION_START_ITEM_USE_ON,
        block_position: target_pos,
        result_position: new_pos,
        block_face: 1, // Up
    })
    .await?;

    write(conn, Packet::InventoryTransaction {
        legacy_request_id: 0,
        transaction_data: TransactionData::UseItem(UseItemTransactionData {
            action_type: USE_ITEM_ACTION_CLICK_BLOCK,
            trigger_type: TRIGGER_TYPE_PLAYER_INPUT,
            block_position: target_pos,
            block_face: 1,
            hot_bar_slot: 0,
            held_item: held_item.clone(),
            position: player_pos,
            clicked_position: Vec3::new(0.5, 0.5, 0.5),
            block_runtime_id: 0,
            client_prediction: CLIENT_PREDICTION_SUCCESS,
        }),
    })
    .await?;

    write(conn, Packet::InventoryTransaction {
        legacy_request_id: 0,
        transaction_data: TransactionData::UseItem(UseItemTransactionData {
            action_type: USE_ITEM_ACTION_CLICK_AIR,
            trigger_type: TRIGGER_TYPE_PLAYER_INPUT,
            block_position: BlockPos::default(),
            block_face: -1,
            hot_bar_slot: 0,
            held_item,
            position: player_pos,
            clicked_position: Vec3::default(),
            block_runtime_id: 0,
            client_prediction: CLIENT_PREDICTION_SUCCESS,
        }),
    })
    .await?;

    write(conn, Packet::PlayerAction {
        entity_runtime_id: entity_id,
        action_type: PLAYER_ACTION_STOP_ITEM_USE_ON,
        block_position: new_pos,
        result_position: BlockPos::default(),
        block_face: 0, // Down
    })
    .await
}
