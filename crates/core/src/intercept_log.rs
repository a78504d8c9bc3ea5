//! Verbose diagnostics for building-related packets
//!
//! A separate inspection path gated by the runtime logging flag. It surfaces
//! block placement, breaking, inventory traffic and container activity with
//! structured fields. One state mutation lives here on purpose: a placement
//! transaction whose held item resolves to a known name teaches the block
//! registry its runtime id. That write is idempotent.

use realmbridge_proto::types::{
    self, LEVEL_EVENT_PARTICLES_DESTROY_BLOCK, LEVEL_EVENT_START_BLOCK_CRACKING,
    LEVEL_EVENT_STOP_BLOCK_CRACKING, LEVEL_EVENT_UPDATE_BLOCK_CRACKING,
    USE_ITEM_ON_ENTITY_ACTION_ATTACK,
};
use realmbridge_proto::{BlockPos, Packet, TransactionData, Vec3};

use crate::state::GameState;

/// Diagnostics for a client-origin packet.
pub fn log_client_packet(pk: &Packet, state: &GameState) {
    match pk {
        Packet::InventoryTransaction {
            transaction_data, ..
        } => log_inventory_transaction(transaction_data, state),
        Packet::PlayerAction {
            action_type,
            block_position,
            result_position,
            block_face,
            ..
        } => log_player_action(*action_type, *block_position, *result_position, *block_face, state),
        Packet::MobEquipment {
            new_item,
            hot_bar_slot,
            window_id,
            ..
        } => {
            if state.verbose_packet_log() {
                tracing::info!(
                    dir = "C→S",
                    pkt = "MobEquipment",
                    item = %state.resolve_item_name(new_item.stack.item_type.network_id),
                    slot = hot_bar_slot,
                    window = window_id,
                    "pkt"
                );
            }
        }
        Packet::PlayerAuthInput {
            item_interaction,
            block_actions,
            ..
        } => log_auth_input_building(item_interaction.as_ref(), block_actions, state),
        _ => {}
    }
}

/// Diagnostics for a server-origin packet.
pub fn log_server_packet(pk: &Packet, state: &GameState) {
    if !state.verbose_packet_log() {
        return;
    }
    match pk {
        Packet::UpdateBlock {
            position,
            new_block_runtime_id,
            flags,
            layer,
        } => {
            tracing::info!(
                dir = "S→C",
                pkt = "UpdateBlock",
                pos = %format_block_pos(*position),
                rid = new_block_runtime_id,
                name = %state.resolve_block_name(*new_block_runtime_id),
                flags,
                layer,
                "pkt"
            );
        }
        Packet::LevelEvent {
            event_type,
            position,
            event_data,
        } => {
            let event_name = match *event_type {
                LEVEL_EVENT_START_BLOCK_CRACKING => "StartBlockCracking",
                LEVEL_EVENT_STOP_BLOCK_CRACKING => "StopBlockCracking",
                LEVEL_EVENT_UPDATE_BLOCK_CRACKING => "UpdateBlockCracking",
                LEVEL_EVENT_PARTICLES_DESTROY_BLOCK => "ParticlesDestroyBlock",
                // Not a building event.
                _ => return,
            };
            tracing::info!(
                dir = "S→C",
                pkt = "LevelEvent",
                event = event_name,
                pos = %format_vec3(*position),
                data = event_data,
                "pkt"
            );
        }
        Packet::ItemStackResponse { responses } => {
            for resp in responses {
                tracing::info!(
                    dir = "S→C",
                    pkt = "ItemStackResponse",
                    status = resp.status,
                    request_id = resp.request_id,
                    "pkt"
                );
            }
        }
        Packet::ContainerOpen {
            window_id,
            container_type,
            container_position,
            ..
        } => {
            tracing::info!(
                dir = "S→C",
                pkt = "ContainerOpen",
                window = window_id,
                container_type,
                pos = %format_block_pos(*container_position),
                "pkt"
            );
        }
        Packet::ContainerClose {
            window_id,
            container_type,
            server_side,
        } => {
            tracing::info!(
                dir = "S→C",
                pkt = "ContainerClose",
                window = window_id,
                container_type,
                server_side,
                "pkt"
            );
        }
        _ => {}
    }
}

fn log_inventory_transaction(td: &TransactionData, state: &GameState) {
    match td {
        TransactionData::UseItem(td) => {
            let item_name = state.resolve_item_name(td.held_item.stack.item_type.network_id);
            if state.verbose_packet_log() {
                tracing::info!(
                    dir = "C→S",
                    pkt = "InventoryTransaction",
                    kind = "UseItem",
                    action = use_item_action_name(td.action_type).as_str(),
                    pos = %format_block_pos(td.block_position),
                    face = block_face_name(td.block_face).as_str(),
                    rid = td.block_runtime_id,
                    item = %item_name,
                    slot = td.hot_bar_slot,
                    "pkt"
                );
            }
            // Block-name learning also runs with logging disabled; it is the
            // only correlation point between placements and runtime ids.
            if td.action_type == types::USE_ITEM_ACTION_CLICK_BLOCK && item_name != "unknown:0" {
                state.learn_block(td.block_runtime_id, &item_name);
            }
        }
        TransactionData::UseItemOnEntity(td) => {
            if state.verbose_packet_log() {
                let action = if td.action_type == USE_ITEM_ON_ENTITY_ACTION_ATTACK {
                    "Attack"
                } else {
                    "Interact"
                };
                tracing::info!(
                    dir = "C→S",
                    pkt = "InventoryTransaction",
                    kind = "UseItemOnEntity",
                    action,
                    target = td.target_entity_runtime_id,
                    item = %state.resolve_item_name(td.held_item.stack.item_type.network_id),
                    "pkt"
                );
            }
        }
        TransactionData::Normal { actions } => {
            if state.verbose_packet_log() {
                tracing::info!(
                    dir = "C→S",
                    pkt = "InventoryTransaction",
                    kind = "Normal",
                    actions = actions.len(),
                    "pkt"
                );
            }
        }
        TransactionData::Mismatch => {
            if state.verbose_packet_log() {
                tracing::warn!(
                    dir = "C→S",
                    pkt = "InventoryTransaction",
                    kind = "Mismatch (inventory desync)",
                    "pkt"
                );
            }
        }
    }
}

fn log_player_action(
    action_type: i32,
    block_position: BlockPos,
    result_position: BlockPos,
    block_face: i32,
    state: &GameState,
) {
    if !state.verbose_packet_log() {
        return;
    }
    // Only building-relevant actions are surfaced.
    match action_type {
        types::PLAYER_ACTION_START_BREAK
        | types::PLAYER_ACTION_ABORT_BREAK
        | types::PLAYER_ACTION_STOP_BREAK
        | types::PLAYER_ACTION_DROP_ITEM
        | types::PLAYER_ACTION_CREATIVE_DESTROY_BLOCK
        | types::PLAYER_ACTION_CRACK_BREAK
        | types::PLAYER_ACTION_START_BUILDING_BLOCK
        | types::PLAYER_ACTION_PREDICT_DESTROY_BLOCK
        | types::PLAYER_ACTION_CONTINUE_DESTROY_BLOCK
        | types::PLAYER_ACTION_START_ITEM_USE_ON
        | types::PLAYER_ACTION_STOP_ITEM_USE_ON => {
            tracing::info!(
                dir = "C→S",
                pkt = "PlayerAction",
                action = player_action_name(action_type).as_str(),
                pos = %format_block_pos(block_position),
                result_pos = %format_block_pos(result_position),
                face = block_face_name(block_face).as_str(),
                "pkt"
            );
        }
        _ => {}
    }
}

fn log_auth_input_building(
    item_interaction: Option<&realmbridge_proto::UseItemTransactionData>,
    block_actions: &[realmbridge_proto::BlockAction],
    state: &GameState,
) {
    if !state.verbose_packet_log() {
        return;
    }
    if let Some(td) = item_interaction {
        tracing::info!(
            dir = "C→S",
            pkt = "PlayerAuthInput",
            flag = "ItemInteraction",
            action = use_item_action_name(td.action_type).as_str(),
            pos = %format_block_pos(td.block_position),
            face = block_face_name(td.block_face).as_str(),
            rid = td.block_runtime_id,
            item = %state.resolve_item_name(td.held_item.stack.item_type.network_id),
            "pkt"
        );
    }
    for ba in block_actions {
        tracing::info!(
            dir = "C→S",
            pkt = "PlayerAuthInput",
            flag = "BlockAction",
            action = player_action_name(ba.action).as_str(),
            pos = %format_block_pos(ba.block_pos),
            face = block_face_name(ba.face).as_str(),
            "pkt"
        );
    }
}

/// Readable name for building-relevant player actions.
pub fn player_action_name(action: i32) -> String {
    match action {
        types::PLAYER_ACTION_START_BREAK => "StartBreak".to_string(),
        types::PLAYER_ACTION_ABORT_BREAK => "AbortBreak".to_string(),
        types::PLAYER_ACTION_STOP_BREAK => "StopBreak".to_string(),
        types::PLAYER_ACTION_DROP_ITEM => "DropItem".to_string(),
        types::PLAYER_ACTION_CREATIVE_DESTROY_BLOCK => "CreativeDestroyBlock".to_string(),
        types::PLAYER_ACTION_CRACK_BREAK => "CrackBreak".to_string(),
        types::PLAYER_ACTION_START_BUILDING_BLOCK => "StartBuildingBlock".to_string(),
        types::PLAYER_ACTION_PREDICT_DESTROY_BLOCK => "PredictDestroyBlock".to_string(),
        types::PLAYER_ACTION_CONTINUE_DESTROY_BLOCK => "ContinueDestroyBlock".to_string(),
        types::PLAYER_ACTION_START_ITEM_USE_ON => "StartItemUseOn".to_string(),
        types::PLAYER_ACTION_STOP_ITEM_USE_ON => "StopItemUseOn".to_string(),
        other => format!("Action({other})"),
    }
}

/// Readable name for UseItem action kinds.
pub fn use_item_action_name(action: u32) -> String {
    match action {
        types::USE_ITEM_ACTION_CLICK_BLOCK => "ClickBlock".to_string(),
        types::USE_ITEM_ACTION_CLICK_AIR => "ClickAir".to_string(),
        types::USE_ITEM_ACTION_BREAK_BLOCK => "BreakBlock".to_string(),
        other => format!("UseItemAction({other})"),
    }
}

/// Readable name for a block face.
pub fn block_face_name(face: i32) -> String {
    match face {
        0 => "Down".to_string(),
        1 => "Up".to_string(),
        2 => "North".to_string(),
        3 => "South".to_string(),
        4 => "West".to_string(),
        5 => "East".to_string(),
        other => format!("Face({other})"),
    }
}

/// Format a block position as `[x, y, z]`.
pub fn format_block_pos(pos: BlockPos) -> String {
    format!("[{}, {}, {}]", pos.x, pos.y, pos.z)
}

/// Format a vector as `(x, y, z)` with one decimal.
pub fn format_vec3(v: Vec3) -> String {
    format!("({:.1}, {:.1}, {:.1})", v.x, v.y, v.z)
}
