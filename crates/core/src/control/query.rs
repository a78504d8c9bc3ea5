//! Read-side control operations
//!
//! Every query returns JSON built from a defensive snapshot of `GameState`.
//! Apart from `get_status`, they all require a connected session.

use serde_json::{json, Value};

use crate::error::BridgeError;
use crate::state::{GameState, Status, MAX_CHAT_HISTORY};

/// Messages returned by `get_chat_history` when no count is given.
pub const DEFAULT_CHAT_COUNT: usize = 20;

/// Current proxy status; usable in every session state.
pub fn get_status(state: &GameState) -> Value {
    let (name, _) = state.identity();
    json!({
        "status": state.status(),
        "player_name": name,
        "realm_connected": state.status() == Status::Connected,
    })
}

/// The player's position, rotation and dimension.
pub fn get_position(state: &GameState) -> Result<Value, BridgeError> {
    require_connected(state)?;
    let (x, y, z, pitch, yaw, dimension) = state.position();
    Ok(json!({
        "x": x,
        "y": y,
        "z": z,
        "pitch": pitch,
        "yaw": yaw,
        "dimension": dimension_name(dimension),
    }))
}

/// Non-empty inventory slots with resolved item names.
pub fn get_inventory(state: &GameState) -> Result<Value, BridgeError> {
    require_connected(state)?;
    Ok(serde_json::to_value(state.inventory()).unwrap_or(Value::Null))
}

/// Players currently online in the realm.
pub fn get_players(state: &GameState) -> Result<Value, BridgeError> {
    require_connected(state)?;
    Ok(serde_json::to_value(state.players()).unwrap_or(Value::Null))
}

/// The last `count` chat messages, capped at the ring size.
pub fn get_chat_history(state: &GameState, count: Option<usize>) -> Result<Value, BridgeError> {
    require_connected(state)?;
    let count = count.unwrap_or(DEFAULT_CHAT_COUNT).min(MAX_CHAT_HISTORY);
    Ok(serde_json::to_value(state.chat_history(count)).unwrap_or(Value::Null))
}

/// World name, time, game mode, health and spawn position.
pub fn get_world_info(state: &GameState) -> Result<Value, BridgeError> {
    require_connected(state)?;
    let (world_name, world_time, game_mode, health, spawn) = state.world_info();
    Ok(json!({
        "world_name": world_name,
        "time": world_time,
        "game_mode": game_mode_name(game_mode),
        "health": health,
        "spawn_pos": { "x": spawn.x, "y": spawn.y, "z": spawn.z },
    }))
}

/// Gate for operations that need a live session.
pub fn require_connected(state: &GameState) -> Result<(), BridgeError> {
    if state.status() != Status::Connected {
        return Err(BridgeError::NotConnected {
            status: state.status().to_string(),
        });
    }
    Ok(())
}

fn dimension_name(dimension: i32) -> String {
    match dimension {
        0 => "overworld".to_string(),
        1 => "nether".to_string(),
        2 => "the_end".to_string(),
        other => format!("unknown({other})"),
    }
}

fn game_mode_name(mode: i32) -> String {
    match mode {
        0 => "survival".to_string(),
        1 => "creative".to_string(),
        2 => "adventure".to_string(),
        3 => "spectator".to_string(),
        other => format!("unknown({other})"),
    }
}
