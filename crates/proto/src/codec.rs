//! Frame codec for the Bedrock packet model
//!
//! A frame is one datagram: a varuint packet id followed by the packet body.
//! `encode` and `decode` are total over [`Packet`]: ids this crate does not
//! model round-trip through `Packet::Unknown` with the payload untouched.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, Result};
use crate::io::{ProtoRead, ProtoWrite};
use crate::packet::{self, Packet};
use crate::types::{
    Attribute, Bitset, BlockAction, GameData, IdentityData, InventoryAction, ItemEntry,
    ItemInstance, ItemStack, ItemStackResponseEntry, ItemType, PlayerListEntry, TransactionData,
    UseItemOnEntityTransactionData, UseItemTransactionData,
};

/// Upper bound on a single frame. Bedrock batches stay well under this.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

const TRANSACTION_NORMAL: u32 = 0;
const TRANSACTION_MISMATCH: u32 = 1;
const TRANSACTION_USE_ITEM: u32 = 2;
const TRANSACTION_USE_ITEM_ON_ENTITY: u32 = 3;

/// Encode a packet into a wire frame.
pub fn encode(pk: &Packet) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(64);
    buf.put_varu32(pk.id());

    match pk {
        Packet::Login {
            client_protocol,
            identity,
        } => {
            buf.put_vari32(*client_protocol);
            put_identity(&mut buf, identity);
        }
        Packet::PlayStatus { status } => {
            buf.put_i32(*status); // big-endian on the wire, unlike everything else
        }
        Packet::Disconnect {
            message,
            hide_screen,
        } => {
            buf.put_bool(*hide_screen);
            buf.put_string(message);
        }
        Packet::Text {
            text_type,
            needs_translation,
            source_name,
            message,
            parameters,
            xuid,
        } => {
            buf.put_u8(*text_type);
            buf.put_bool(*needs_translation);
            buf.put_string(source_name);
            buf.put_string(message);
            buf.put_varu32(parameters.len() as u32);
            for p in parameters {
                buf.put_string(p);
            }
            buf.put_string(xuid);
        }
        Packet::SetTime { time } => buf.put_vari32(*time),
        Packet::StartGame { game_data } => put_game_data(&mut buf, game_data),
        Packet::AddPlayer {
            entity_runtime_id,
            username,
            position,
            velocity,
            pitch,
            yaw,
        } => {
            buf.put_string(username);
            buf.put_varu64(*entity_runtime_id);
            buf.put_vec3(*position);
            buf.put_vec3(*velocity);
            buf.put_f32_le(*pitch);
            buf.put_f32_le(*yaw);
        }
        Packet::AddActor {
            entity_unique_id,
            entity_runtime_id,
            entity_type,
            position,
            velocity,
            pitch,
            yaw,
        } => {
            buf.put_vari64(*entity_unique_id);
            buf.put_varu64(*entity_runtime_id);
            buf.put_string(entity_type);
            buf.put_vec3(*position);
            buf.put_vec3(*velocity);
            buf.put_f32_le(*pitch);
            buf.put_f32_le(*yaw);
        }
        Packet::RemoveActor { entity_unique_id } => buf.put_vari64(*entity_unique_id),
        Packet::MovePlayer {
            entity_runtime_id,
            position,
            pitch,
            yaw,
            head_yaw,
            mode,
            on_ground,
        } => {
            buf.put_varu64(*entity_runtime_id);
            buf.put_vec3(*position);
            buf.put_f32_le(*pitch);
            buf.put_f32_le(*yaw);
            buf.put_f32_le(*head_yaw);
            buf.put_u8(*mode);
            buf.put_bool(*on_ground);
        }
        Packet::UpdateBlock {
            position,
            new_block_runtime_id,
            flags,
            layer,
        } => {
            buf.put_block_pos(*position);
            buf.put_varu32(*new_block_runtime_id);
            buf.put_varu32(*flags);
            buf.put_varu32(*layer);
        }
        Packet::LevelEvent {
            event_type,
            position,
            event_data,
        } => {
            buf.put_vari32(*event_type);
            buf.put_vec3(*position);
            buf.put_vari32(*event_data);
        }
        Packet::UpdateAttributes {
            entity_runtime_id,
            attributes,
            tick,
        } => {
            buf.put_varu64(*entity_runtime_id);
            buf.put_varu32(attributes.len() as u32);
            for attr in attributes {
                put_attribute(&mut buf, attr);
            }
            buf.put_varu64(*tick);
        }
        Packet::InventoryTransaction {
            legacy_request_id,
            transaction_data,
        } => {
            buf.put_vari32(*legacy_request_id);
            put_transaction_data(&mut buf, transaction_data);
        }
        Packet::MobEquipment {
            entity_runtime_id,
            new_item,
            inventory_slot,
            hot_bar_slot,
            window_id,
        } => {
            buf.put_varu64(*entity_runtime_id);
            put_item_instance(&mut buf, new_item);
            buf.put_u8(*inventory_slot);
            buf.put_u8(*hot_bar_slot);
            buf.put_u8(*window_id);
        }
        Packet::PlayerAction {
            entity_runtime_id,
            action_type,
            block_position,
            result_position,
            block_face,
        } => {
            buf.put_varu64(*entity_runtime_id);
            buf.put_vari32(*action_type);
            buf.put_block_pos(*block_position);
            buf.put_block_pos(*result_position);
            buf.put_vari32(*block_face);
        }
        Packet::SetHealth { health } => buf.put_vari32(*health),
        Packet::ContainerOpen {
            window_id,
            container_type,
            container_position,
            container_entity_unique_id,
        } => {
            buf.put_u8(*window_id);
            buf.put_u8(*container_type);
            buf.put_block_pos(*container_position);
            buf.put_vari64(*container_entity_unique_id);
        }
        Packet::ContainerClose {
            window_id,
            container_type,
            server_side,
        } => {
            buf.put_u8(*window_id);
            buf.put_u8(*container_type);
            buf.put_bool(*server_side);
        }
        Packet::InventoryContent { window_id, content } => {
            buf.put_varu32(*window_id);
            buf.put_varu32(content.len() as u32);
            for item in content {
                put_item_instance(&mut buf, item);
            }
        }
        Packet::InventorySlot {
            window_id,
            slot,
            new_item,
        } => {
            buf.put_varu32(*window_id);
            buf.put_varu32(*slot);
            put_item_instance(&mut buf, new_item);
        }
        Packet::ChangeDimension {
            dimension,
            position,
            respawn,
        } => {
            buf.put_vari32(*dimension);
            buf.put_vec3(*position);
            buf.put_bool(*respawn);
        }
        Packet::PlayerList {
            action_type,
            entries,
        } => {
            buf.put_u8(*action_type);
            buf.put_varu32(entries.len() as u32);
            for entry in entries {
                buf.put_string(&entry.xuid);
                buf.put_string(&entry.username);
                buf.put_vari64(entry.entity_unique_id);
            }
        }
        Packet::MoveActorDelta {
            entity_runtime_id,
            position,
            rotation,
            flags,
        } => {
            buf.put_varu64(*entity_runtime_id);
            buf.put_u16_le(*flags);
            buf.put_vec3(*position);
            buf.put_vec3(*rotation);
        }
        Packet::SetLocalPlayerAsInitialised { entity_runtime_id } => {
            buf.put_varu64(*entity_runtime_id);
        }
        Packet::PlayerAuthInput {
            pitch,
            yaw,
            position,
            head_yaw,
            input_data,
            input_mode,
            play_mode,
            interaction_model,
            tick,
            item_interaction,
            block_actions,
        } => {
            buf.put_f32_le(*pitch);
            buf.put_f32_le(*yaw);
            buf.put_vec3(*position);
            buf.put_f32_le(*head_yaw);
            put_bitset(&mut buf, input_data);
            buf.put_varu32(*input_mode);
            buf.put_varu32(*play_mode);
            buf.put_varu32(*interaction_model);
            buf.put_varu64(*tick);
            match item_interaction {
                Some(td) => {
                    buf.put_bool(true);
                    put_use_item(&mut buf, td);
                }
                None => buf.put_bool(false),
            }
            buf.put_varu32(block_actions.len() as u32);
            for ba in block_actions {
                buf.put_vari32(ba.action);
                buf.put_block_pos(ba.block_pos);
                buf.put_vari32(ba.face);
            }
        }
        Packet::ItemStackResponse { responses } => {
            buf.put_varu32(responses.len() as u32);
            for resp in responses {
                buf.put_u8(resp.status);
                buf.put_vari32(resp.request_id);
            }
        }
        Packet::Unknown { payload, .. } => buf.extend_from_slice(payload),
    }

    Ok(buf.freeze())
}

/// Decode one wire frame into a packet. Ids this crate does not model decode
/// into `Packet::Unknown`.
pub fn decode(frame: &[u8]) -> Result<Packet> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtoError::Malformed(format!(
            "frame of {} bytes exceeds maximum",
            frame.len()
        )));
    }
    let mut buf = Bytes::copy_from_slice(frame);
    let id = buf.get_varu32()?;

    let pk = match id {
        packet::ID_LOGIN => Packet::Login {
            client_protocol: buf.get_vari32()?,
            identity: get_identity(&mut buf)?,
        },
        packet::ID_PLAY_STATUS => Packet::PlayStatus {
            status: {
                buf.need(4)?;
                buf.get_i32()
            },
        },
        packet::ID_DISCONNECT => {
            let hide_screen = buf.get_bool()?;
            Packet::Disconnect {
                message: buf.get_string()?,
                hide_screen,
            }
        }
        packet::ID_TEXT => {
            let text_type = buf.get_u8_checked()?;
            let needs_translation = buf.get_bool()?;
            let source_name = buf.get_string()?;
            let message = buf.get_string()?;
            let count = buf.get_varu32()? as usize;
            let mut parameters = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                parameters.push(buf.get_string()?);
            }
            Packet::Text {
                text_type,
                needs_translation,
                source_name,
                message,
                parameters,
                xuid: buf.get_string()?,
            }
        }
        packet::ID_SET_TIME => Packet::SetTime {
            time: buf.get_vari32()?,
        },
        packet::ID_START_GAME => Packet::StartGame {
            game_data: get_game_data(&mut buf)?,
        },
        packet::ID_ADD_PLAYER => {
            let username = buf.get_string()?;
            Packet::AddPlayer {
                username,
                entity_runtime_id: buf.get_varu64()?,
                position: buf.get_vec3()?,
                velocity: buf.get_vec3()?,
                pitch: buf.get_f32_le_checked()?,
                yaw: buf.get_f32_le_checked()?,
            }
        }
        packet::ID_ADD_ACTOR => Packet::AddActor {
            entity_unique_id: buf.get_vari64()?,
            entity_runtime_id: buf.get_varu64()?,
            entity_type: buf.get_string()?,
            position: buf.get_vec3()?,
            velocity: buf.get_vec3()?,
            pitch: buf.get_f32_le_checked()?,
            yaw: buf.get_f32_le_checked()?,
        },
        packet::ID_REMOVE_ACTOR => Packet::RemoveActor {
            entity_unique_id: buf.get_vari64()?,
        },
        packet::ID_MOVE_PLAYER => Packet::MovePlayer {
            entity_runtime_id: buf.get_varu64()?,
            position: buf.get_vec3()?,
            pitch: buf.get_f32_le_checked()?,
            yaw: buf.get_f32_le_checked()?,
            head_yaw: buf.get_f32_le_checked()?,
            mode: buf.get_u8_checked()?,
            on_ground: buf.get_bool()?,
        },
        packet::ID_UPDATE_BLOCK => Packet::UpdateBlock {
            position: buf.get_block_pos()?,
            new_block_runtime_id: buf.get_varu32()?,
            flags: buf.get_varu32()?,
            layer: buf.get_varu32()?,
        },
        packet::ID_LEVEL_EVENT => Packet::LevelEvent {
            event_type: buf.get_vari32()?,
            position: buf.get_vec3()?,
            event_data: buf.get_vari32()?,
        },
        packet::ID_UPDATE_ATTRIBUTES => {
            let entity_runtime_id = buf.get_varu64()?;
            let count = buf.get_varu32()? as usize;
            let mut attributes = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                attributes.push(get_attribute(&mut buf)?);
            }
            Packet::UpdateAttributes {
                entity_runtime_id,
                attributes,
                tick: buf.get_varu64()?,
            }
        }
        packet::ID_INVENTORY_TRANSACTION => Packet::InventoryTransaction {
            legacy_request_id: buf.get_vari32()?,
            transaction_data: get_transaction_data(&mut buf)?,
        },
        packet::ID_MOB_EQUIPMENT => Packet::MobEquipment {
            entity_runtime_id: buf.get_varu64()?,
            new_item: get_item_instance(&mut buf)?,
            inventory_slot: buf.get_u8_checked()?,
            hot_bar_slot: buf.get_u8_checked()?,
            window_id: buf.get_u8_checked()?,
        },
        packet::ID_PLAYER_ACTION => Packet::PlayerAction {
            entity_runtime_id: buf.get_varu64()?,
            action_type: buf.get_vari32()?,
            block_position: buf.get_block_pos()?,
            result_position: buf.get_block_pos()?,
            block_face: buf.get_vari32()?,
        },
        packet::ID_SET_HEALTH => Packet::SetHealth {
            health: buf.get_vari32()?,
        },
        packet::ID_CONTAINER_OPEN => Packet::ContainerOpen {
            window_id: buf.get_u8_checked()?,
            container_type: buf.get_u8_checked()?,
            container_position: buf.get_block_pos()?,
            container_entity_unique_id: buf.get_vari64()?,
        },
        packet::ID_CONTAINER_CLOSE => Packet::ContainerClose {
            window_id: buf.get_u8_checked()?,
            container_type: buf.get_u8_checked()?,
            server_side: buf.get_bool()?,
        },
        packet::ID_INVENTORY_CONTENT => {
            let window_id = buf.get_varu32()?;
            let count = buf.get_varu32()? as usize;
            let mut content = Vec::with_capacity(count.min(256));
            for _ in 0..count {
                content.push(get_item_instance(&mut buf)?);
            }
            Packet::InventoryContent { window_id, content }
        }
        packet::ID_INVENTORY_SLOT => Packet::InventorySlot {
            window_id: buf.get_varu32()?,
            slot: buf.get_varu32()?,
            new_item: get_item_instance(&mut buf)?,
        },
        packet::ID_CHANGE_DIMENSION => Packet::ChangeDimension {
            dimension: buf.get_vari32()?,
            position: buf.get_vec3()?,
            respawn: buf.get_bool()?,
        },
        packet::ID_PLAYER_LIST => {
            let action_type = buf.get_u8_checked()?;
            let count = buf.get_varu32()? as usize;
            let mut entries = Vec::with_capacity(count.min(256));
            for _ in 0..count {
                entries.push(PlayerListEntry {
                    xuid: buf.get_string()?,
                    username: buf.get_string()?,
                    entity_unique_id: buf.get_vari64()?,
                });
            }
            Packet::PlayerList {
                action_type,
                entries,
            }
        }
        packet::ID_MOVE_ACTOR_DELTA => {
            let entity_runtime_id = buf.get_varu64()?;
            let flags = buf.get_u16_le_checked()?;
            Packet::MoveActorDelta {
                entity_runtime_id,
                flags,
                position: buf.get_vec3()?,
                rotation: buf.get_vec3()?,
            }
        }
        packet::ID_SET_LOCAL_PLAYER_AS_INITIALISED => Packet::SetLocalPlayerAsInitialised {
            entity_runtime_id: buf.get_varu64()?,
        },
        packet::ID_PLAYER_AUTH_INPUT => {
            let pitch = buf.get_f32_le_checked()?;
            let yaw = buf.get_f32_le_checked()?;
            let position = buf.get_vec3()?;
            let head_yaw = buf.get_f32_le_checked()?;
            let input_data = get_bitset(&mut buf)?;
            let input_mode = buf.get_varu32()?;
            let play_mode = buf.get_varu32()?;
            let interaction_model = buf.get_varu32()?;
            let tick = buf.get_varu64()?;
            let item_interaction = if buf.get_bool()? {
                Some(get_use_item(&mut buf)?)
            } else {
                None
            };
            let count = buf.get_varu32()? as usize;
            let mut block_actions = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                block_actions.push(BlockAction {
                    action: buf.get_vari32()?,
                    block_pos: buf.get_block_pos()?,
                    face: buf.get_vari32()?,
                });
            }
            Packet::PlayerAuthInput {
                pitch,
                yaw,
                position,
                head_yaw,
                input_data,
                input_mode,
                play_mode,
                interaction_model,
                tick,
                item_interaction,
                block_actions,
            }
        }
        packet::ID_ITEM_STACK_RESPONSE => {
            let count = buf.get_varu32()? as usize;
            let mut responses = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                responses.push(ItemStackResponseEntry {
                    status: buf.get_u8_checked()?,
                    request_id: buf.get_vari32()?,
                });
            }
            Packet::ItemStackResponse { responses }
        }
        other => Packet::Unknown {
            id: other,
            payload: buf.copy_to_bytes(buf.remaining()),
        },
    };

    Ok(pk)
}

fn put_identity(buf: &mut BytesMut, identity: &IdentityData) {
    buf.put_string(&identity.display_name);
    buf.put_string(&identity.xuid);
    buf.put_string(&identity.identity);
}

fn get_identity(buf: &mut Bytes) -> Result<IdentityData> {
    Ok(IdentityData {
        display_name: buf.get_string()?,
        xuid: buf.get_string()?,
        identity: buf.get_string()?,
    })
}

fn put_item_instance(buf: &mut BytesMut, item: &ItemInstance) {
    buf.put_vari32(item.stack_network_id);
    buf.put_vari32(item.stack.item_type.network_id);
    buf.put_varu32(item.stack.item_type.metadata_value);
    buf.put_vari32(item.stack.block_runtime_id);
    buf.put_u16_le(item.stack.count);
    buf.put_bool(item.stack.has_network_id);
}

fn get_item_instance(buf: &mut Bytes) -> Result<ItemInstance> {
    Ok(ItemInstance {
        stack_network_id: buf.get_vari32()?,
        stack: ItemStack {
            item_type: ItemType {
                network_id: buf.get_vari32()?,
                metadata_value: buf.get_varu32()?,
            },
            block_runtime_id: buf.get_vari32()?,
            count: buf.get_u16_le_checked()?,
            has_network_id: buf.get_bool()?,
        },
    })
}

fn put_attribute(buf: &mut BytesMut, attr: &Attribute) {
    buf.put_f32_le(attr.min);
    buf.put_f32_le(attr.max);
    buf.put_f32_le(attr.value);
    buf.put_f32_le(attr.default_value);
    buf.put_string(&attr.name);
}

fn get_attribute(buf: &mut Bytes) -> Result<Attribute> {
    Ok(Attribute {
        min: buf.get_f32_le_checked()?,
        max: buf.get_f32_le_checked()?,
        value: buf.get_f32_le_checked()?,
        default_value: buf.get_f32_le_checked()?,
        name: buf.get_string()?,
    })
}

fn put_use_item(buf: &mut BytesMut, td: &UseItemTransactionData) {
    buf.put_varu32(td.action_type);
    buf.put_varu32(td.trigger_type);
    buf.put_block_pos(td.block_position);
    buf.put_vari32(td.block_face);
    buf.put_vari32(td.hot_bar_slot);
    put_item_instance(buf, &td.held_item);
    buf.put_vec3(td.position);
    buf.put_vec3(td.clicked_position);
    buf.put_varu32(td.block_runtime_id);
    buf.put_varu32(td.client_prediction);
}

fn get_use_item(buf: &mut Bytes) -> Result<UseItemTransactionData> {
    Ok(UseItemTransactionData {
        action_type: buf.get_varu32()?,
        trigger_type: buf.get_varu32()?,
        block_position: buf.get_block_pos()?,
        block_face: buf.get_vari32()?,
        hot_bar_slot: buf.get_vari32()?,
        held_item: get_item_instance(buf)?,
        position: buf.get_vec3()?,
        clicked_position: buf.get_vec3()?,
        block_runtime_id: buf.get_varu32()?,
        client_prediction: buf.get_varu32()?,
    })
}

fn put_transaction_data(buf: &mut BytesMut, td: &TransactionData) {
    match td {
        TransactionData::Normal { actions } => {
            buf.put_varu32(TRANSACTION_NORMAL);
            buf.put_varu32(actions.len() as u32);
            for action in actions {
                buf.put_varu32(action.source_type);
                buf.put_vari32(action.window_id);
                buf.put_varu32(action.slot);
                put_item_instance(buf, &action.old_item);
                put_item_instance(buf, &action.new_item);
            }
        }
        TransactionData::Mismatch => buf.put_varu32(TRANSACTION_MISMATCH),
        TransactionData::UseItem(td) => {
            buf.put_varu32(TRANSACTION_USE_ITEM);
            put_use_item(buf, td);
        }
        TransactionData::UseItemOnEntity(td) => {
            buf.put_varu32(TRANSACTION_USE_ITEM_ON_ENTITY);
            buf.put_varu64(td.target_entity_runtime_id);
            buf.put_varu32(td.action_type);
            buf.put_vari32(td.hot_bar_slot);
            put_item_instance(buf, &td.held_item);
            buf.put_vec3(td.position);
            buf.put_vec3(td.clicked_position);
        }
    }
}

fn get_transaction_data(buf: &mut Bytes) -> Result<TransactionData> {
    let kind = buf.get_varu32()?;
    match kind {
        TRANSACTION_NORMAL => {
            let count = buf.get_varu32()? as usize;
            let mut actions = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                actions.push(InventoryAction {
                    source_type: buf.get_varu32()?,
                    window_id: buf.get_vari32()?,
                    slot: buf.get_varu32()?,
                    old_item: get_item_instance(buf)?,
                    new_item: get_item_instance(buf)?,
                });
            }
            Ok(TransactionData::Normal { actions })
        }
        TRANSACTION_MISMATCH => Ok(TransactionData::Mismatch),
        TRANSACTION_USE_ITEM => Ok(TransactionData::UseItem(get_use_item(buf)?)),
        TRANSACTION_USE_ITEM_ON_ENTITY => Ok(TransactionData::UseItemOnEntity(
            UseItemOnEntityTransactionData {
                target_entity_runtime_id: buf.get_varu64()?,
                action_type: buf.get_varu32()?,
                hot_bar_slot: buf.get_vari32()?,
                held_item: get_item_instance(buf)?,
                position: buf.get_vec3()?,
                clicked_position: buf.get_vec3()?,
            },
        )),
        other => Err(ProtoError::Malformed(format!(
            "unknown transaction kind {other}"
        ))),
    }
}

fn put_bitset(buf: &mut BytesMut, bs: &Bitset) {
    buf.put_varu32(bs.size() as u32);
    for word in bs.words() {
        buf.put_u64_le(*word);
    }
}

fn get_bitset(buf: &mut Bytes) -> Result<Bitset> {
    let size = buf.get_varu32()? as usize;
    if size > 4096 {
        return Err(ProtoError::Malformed(format!("bitset of {size} bits")));
    }
    let mut words = Vec::with_capacity(size.div_ceil(64));
    for _ in 0..size.div_ceil(64) {
        words.push(buf.get_u64_le_checked()?);
    }
    Ok(Bitset::from_words(size, words))
}

fn put_game_data(buf: &mut BytesMut, gd: &GameData) {
    buf.put_string(&gd.world_name);
    buf.put_vari32(gd.difficulty);
    buf.put_vari64(gd.entity_unique_id);
    buf.put_varu64(gd.entity_runtime_id);
    buf.put_vari32(gd.player_game_mode);
    buf.put_vec3(gd.player_position);
    buf.put_f32_le(gd.pitch);
    buf.put_f32_le(gd.yaw);
    buf.put_vari32(gd.dimension);
    buf.put_block_pos(gd.world_spawn);
    buf.put_vari64(gd.time);
    buf.put_varu32(gd.items.len() as u32);
    for item in &gd.items {
        buf.put_i16_le(item.runtime_id);
        buf.put_string(&item.name);
        buf.put_bool(item.component_based);
    }
}

fn get_game_data(buf: &mut Bytes) -> Result<GameData> {
    let world_name = buf.get_string()?;
    let difficulty = buf.get_vari32()?;
    let entity_unique_id = buf.get_vari64()?;
    let entity_runtime_id = buf.get_varu64()?;
    let player_game_mode = buf.get_vari32()?;
    let player_position = buf.get_vec3()?;
    let pitch = buf.get_f32_le_checked()?;
    let yaw = buf.get_f32_le_checked()?;
    let dimension = buf.get_vari32()?;
    let world_spawn = buf.get_block_pos()?;
    let time = buf.get_vari64()?;
    let count = buf.get_varu32()? as usize;
    let mut items = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        buf.need(2)?;
        items.push(ItemEntry {
            runtime_id: buf.get_i16_le(),
            name: buf.get_string()?,
            component_based: buf.get_bool()?,
        });
    }
    Ok(GameData {
        world_name,
        difficulty,
        entity_unique_id,
        entity_runtime_id,
        player_game_mode,
        player_position,
        pitch,
        yaw,
        dimension,
        world_spawn,
        time,
        items,
    })
}
