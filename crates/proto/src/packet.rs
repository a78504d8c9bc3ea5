//! The Bedrock packet model
//!
//! One enum with a struct variant per packet the proxy inspects, forwards
//! with meaning, or synthesises. Everything else travels through the
//! `Unknown` variant untouched, which is what keeps the relay transparent
//! for protocol revisions this crate does not model.

use bytes::Bytes;

use crate::types::{
    Attribute, Bitset, BlockAction, BlockPos, GameData, IdentityData, ItemInstance,
    ItemStackResponseEntry, PlayerListEntry, TransactionData, Vec3,
};

// Packet ids, little-varint-prefixed on the wire.
pub const ID_LOGIN: u32 = 0x01;
pub const ID_PLAY_STATUS: u32 = 0x02;
pub const ID_DISCONNECT: u32 = 0x05;
pub const ID_TEXT: u32 = 0x09;
pub const ID_SET_TIME: u32 = 0x0a;
pub const ID_START_GAME: u32 = 0x0b;
pub const ID_ADD_PLAYER: u32 = 0x0c;
pub const ID_ADD_ACTOR: u32 = 0x0d;
pub const ID_REMOVE_ACTOR: u32 = 0x0e;
pub const ID_MOVE_PLAYER: u32 = 0x13;
pub const ID_UPDATE_BLOCK: u32 = 0x15;
pub const ID_LEVEL_EVENT: u32 = 0x19;
pub const ID_UPDATE_ATTRIBUTES: u32 = 0x1d;
pub const ID_INVENTORY_TRANSACTION: u32 = 0x1e;
pub const ID_MOB_EQUIPMENT: u32 = 0x1f;
pub const ID_PLAYER_ACTION: u32 = 0x24;
pub const ID_SET_HEALTH: u32 = 0x2a;
pub const ID_CONTAINER_OPEN: u32 = 0x2e;
pub const ID_CONTAINER_CLOSE: u32 = 0x2f;
pub const ID_INVENTORY_CONTENT: u32 = 0x31;
pub const ID_INVENTORY_SLOT: u32 = 0x32;
pub const ID_CHANGE_DIMENSION: u32 = 0x3d;
pub const ID_PLAYER_LIST: u32 = 0x3f;
pub const ID_MOVE_ACTOR_DELTA: u32 = 0x6f;
pub const ID_SET_LOCAL_PLAYER_AS_INITIALISED: u32 = 0x71;
pub const ID_PLAYER_AUTH_INPUT: u32 = 0x90;
pub const ID_ITEM_STACK_RESPONSE: u32 = 0x94;

/// A decoded Bedrock packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Login request carrying the connecting player's identity claims.
    Login {
        client_protocol: i32,
        identity: IdentityData,
    },
    /// Login/spawn progress notification.
    PlayStatus { status: i32 },
    /// Connection termination with a reason shown to the player.
    Disconnect { message: String, hide_screen: bool },
    /// Chat, whispers, system text, translations.
    Text {
        text_type: u8,
        needs_translation: bool,
        source_name: String,
        message: String,
        parameters: Vec<String>,
        xuid: String,
    },
    SetTime { time: i32 },
    /// World snapshot sent by the server once login completes.
    StartGame { game_data: GameData },
    AddPlayer {
        entity_runtime_id: u64,
        username: String,
        position: Vec3,
        velocity: Vec3,
        pitch: f32,
        yaw: f32,
    },
    AddActor {
        entity_unique_id: i64,
        entity_runtime_id: u64,
        entity_type: String,
        position: Vec3,
        velocity: Vec3,
        pitch: f32,
        yaw: f32,
    },
    RemoveActor { entity_unique_id: i64 },
    MovePlayer {
        entity_runtime_id: u64,
        position: Vec3,
        pitch: f32,
        yaw: f32,
        head_yaw: f32,
        mode: u8,
        on_ground: bool,
    },
    UpdateBlock {
        position: BlockPos,
        new_block_runtime_id: u32,
        flags: u32,
        layer: u32,
    },
    LevelEvent {
        event_type: i32,
        position: Vec3,
        event_data: i32,
    },
    UpdateAttributes {
        entity_runtime_id: u64,
        attributes: Vec<Attribute>,
        tick: u64,
    },
    InventoryTransaction {
        legacy_request_id: i32,
        transaction_data: TransactionData,
    },
    MobEquipment {
        entity_runtime_id: u64,
        new_item: ItemInstance,
        inventory_slot: u8,
        hot_bar_slot: u8,
        window_id: u8,
    },
    PlayerAction {
        entity_runtime_id: u64,
        action_type: i32,
        block_position: BlockPos,
        result_position: BlockPos,
        block_face: i32,
    },
    SetHealth { health: i32 },
    ContainerOpen {
        window_id: u8,
        container_type: u8,
        container_position: BlockPos,
        container_entity_unique_id: i64,
    },
    ContainerClose {
        window_id: u8,
        container_type: u8,
        server_side: bool,
    },
    InventoryContent {
        window_id: u32,
        content: Vec<ItemInstance>,
    },
    InventorySlot {
        window_id: u32,
        slot: u32,
        new_item: ItemInstance,
    },
    ChangeDimension {
        dimension: i32,
        position: Vec3,
        respawn: bool,
    },
    PlayerList {
        action_type: u8,
        entries: Vec<PlayerListEntry>,
    },
    MoveActorDelta {
        entity_runtime_id: u64,
        position: Vec3,
        rotation: Vec3,
        flags: u16,
    },
    /// Sent by a client once it has finished spawning in.
    SetLocalPlayerAsInitialised { entity_runtime_id: u64 },
    /// The client-authoritative movement/input packet, also used by the
    /// proxy's keepalive loop.
    PlayerAuthInput {
        pitch: f32,
        yaw: f32,
        position: Vec3,
        head_yaw: f32,
        input_data: Bitset,
        input_mode: u32,
        play_mode: u32,
        interaction_model: u32,
        tick: u64,
        item_interaction: Option<crate::types::UseItemTransactionData>,
        block_actions: Vec<BlockAction>,
    },
    ItemStackResponse { responses: Vec<ItemStackResponseEntry> },
    /// Any packet id this crate does not model. The payload is relayed
    /// byte-identically.
    Unknown { id: u32, payload: Bytes },
}

impl Packet {
    /// Wire id of this packet.
    pub fn id(&self) -> u32 {
        match self {
            Packet::Login { .. } => ID_LOGIN,
            Packet::PlayStatus { .. } => ID_PLAY_STATUS,
            Packet::Disconnect { .. } => ID_DISCONNECT,
            Packet::Text { .. } => ID_TEXT,
            Packet::SetTime { .. } => ID_SET_TIME,
            Packet::StartGame { .. } => ID_START_GAME,
            Packet::AddPlayer { .. } => ID_ADD_PLAYER,
            Packet::AddActor { .. } => ID_ADD_ACTOR,
            Packet::RemoveActor { .. } => ID_REMOVE_ACTOR,
            Packet::MovePlayer { .. } => ID_MOVE_PLAYER,
            Packet::UpdateBlock { .. } => ID_UPDATE_BLOCK,
            Packet::LevelEvent { .. } => ID_LEVEL_EVENT,
            Packet::UpdateAttributes { .. } => ID_UPDATE_ATTRIBUTES,
            Packet::InventoryTransaction { .. } => ID_INVENTORY_TRANSACTION,
            Packet::MobEquipment { .. } => ID_MOB_EQUIPMENT,
            Packet::PlayerAction { .. } => ID_PLAYER_ACTION,
            Packet::SetHealth { .. } => ID_SET_HEALTH,
            Packet::ContainerOpen { .. } => ID_CONTAINER_OPEN,
            Packet::ContainerClose { .. } => ID_CONTAINER_CLOSE,
            Packet::InventoryContent { .. } => ID_INVENTORY_CONTENT,
            Packet::InventorySlot { .. } => ID_INVENTORY_SLOT,
            Packet::ChangeDimension { .. } => ID_CHANGE_DIMENSION,
            Packet::PlayerList { .. } => ID_PLAYER_LIST,
            Packet::MoveActorDelta { .. } => ID_MOVE_ACTOR_DELTA,
            Packet::SetLocalPlayerAsInitialised { .. } => ID_SET_LOCAL_PLAYER_AS_INITIALISED,
            Packet::PlayerAuthInput { .. } => ID_PLAYER_AUTH_INPUT,
            Packet::ItemStackResponse { .. } => ID_ITEM_STACK_RESPONSE,
            Packet::Unknown { id, .. } => *id,
        }
    }

    /// Readable packet name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Login { .. } => "Login",
            Packet::PlayStatus { .. } => "PlayStatus",
            Packet::Disconnect { .. } => "Disconnect",
            Packet::Text { .. } => "Text",
            Packet::SetTime { .. } => "SetTime",
            Packet::StartGame { .. } => "StartGame",
            Packet::AddPlayer { .. } => "AddPlayer",
            Packet::AddActor { .. } => "AddActor",
            Packet::RemoveActor { .. } => "RemoveActor",
            Packet::MovePlayer { .. } => "MovePlayer",
            Packet::UpdateBlock { .. } => "UpdateBlock",
            Packet::LevelEvent { .. } => "LevelEvent",
            Packet::UpdateAttributes { .. } => "UpdateAttributes",
            Packet::InventoryTransaction { .. } => "InventoryTransaction",
            Packet::MobEquipment { .. } => "MobEquipment",
            Packet::PlayerAction { .. } => "PlayerAction",
            Packet::SetHealth { .. } => "SetHealth",
            Packet::ContainerOpen { .. } => "ContainerOpen",
            Packet::ContainerClose { .. } => "ContainerClose",
            Packet::InventoryContent { .. } => "InventoryContent",
            Packet::InventorySlot { .. } => "InventorySlot",
            Packet::ChangeDimension { .. } => "ChangeDimension",
            Packet::PlayerList { .. } => "PlayerList",
            Packet::MoveActorDelta { .. } => "MoveActorDelta",
            Packet::SetLocalPlayerAsInitialised { .. } => "SetLocalPlayerAsInitialised",
            Packet::PlayerAuthInput { .. } => "PlayerAuthInput",
            Packet::ItemStackResponse { .. } => "ItemStackResponse",
            Packet::Unknown { .. } => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_ids_are_distinct() {
        let ids = [
            ID_LOGIN,
            ID_PLAY_STATUS,
            ID_DISCONNECT,
            ID_TEXT,
            ID_SET_TIME,
            ID_START_GAME,
            ID_ADD_PLAYER,
            ID_ADD_ACTOR,
            ID_REMOVE_ACTOR,
            ID_MOVE_PLAYER,
            ID_UPDATE_BLOCK,
            ID_LEVEL_EVENT,
            ID_UPDATE_ATTRIBUTES,
            ID_INVENTORY_TRANSACTION,
            ID_MOB_EQUIPMENT,
            ID_PLAYER_ACTION,
            ID_SET_HEALTH,
            ID_CONTAINER_OPEN,
            ID_CONTAINER_CLOSE,
            ID_INVENTORY_CONTENT,
            ID_INVENTORY_SLOT,
            ID_CHANGE_DIMENSION,
            ID_PLAYER_LIST,
            ID_MOVE_ACTOR_DELTA,
            ID_SET_LOCAL_PLAYER_AS_INITIALISED,
            ID_PLAYER_AUTH_INPUT,
            ID_ITEM_STACK_RESPONSE,
        ];
        let mut seen = std::collections::HashSet::new();
        for id in ids {
            assert!(seen.insert(id), "duplicate packet id 0x{id:02x}");
        }
    }

    #[test]
    fn test_name_matches_variant() {
        let pk = Packet::SetHealth { health: 20 };
        assert_eq!(pk.name(), "SetHealth");
        assert_eq!(pk.id(), ID_SET_HEALTH);
    }
}
