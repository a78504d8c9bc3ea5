//! Protocol value types shared by packets, the codec and connection handshakes
//!
//! These mirror the Bedrock Edition data model closely enough for a relay:
//! item stacks, entity attributes, the game-data snapshot carried by
//! StartGame, and the constants packet consumers dispatch on.

use serde::{Deserialize, Serialize};

/// Current protocol version advertised during login.
pub const PROTOCOL_VERSION: i32 = 712;

/// Main inventory window.
pub const WINDOW_ID_INVENTORY: u32 = 0;

// Text packet kinds.
pub const TEXT_TYPE_RAW: u8 = 0;
pub const TEXT_TYPE_CHAT: u8 = 1;
pub const TEXT_TYPE_TRANSLATION: u8 = 2;
pub const TEXT_TYPE_POPUP: u8 = 3;
pub const TEXT_TYPE_TIP: u8 = 5;
pub const TEXT_TYPE_SYSTEM: u8 = 6;
pub const TEXT_TYPE_WHISPER: u8 = 7;
pub const TEXT_TYPE_ANNOUNCEMENT: u8 = 8;

// PlayStatus codes.
pub const PLAY_STATUS_LOGIN_SUCCESS: i32 = 0;
pub const PLAY_STATUS_LOGIN_FAILED_CLIENT: i32 = 1;
pub const PLAY_STATUS_PLAYER_SPAWN: i32 = 3;

// PlayerList actions.
pub const PLAYER_LIST_ACTION_ADD: u8 = 0;
pub const PLAYER_LIST_ACTION_REMOVE: u8 = 1;

// PlayerAuthInput modes.
pub const INPUT_MODE_MOUSE: u32 = 1;
pub const INPUT_MODE_TOUCH: u32 = 2;
pub const PLAY_MODE_NORMAL: u32 = 0;
pub const INTERACTION_MODEL_TOUCH: u32 = 0;
pub const INTERACTION_MODEL_CROSSHAIR: u32 = 1;

/// Width of the PlayerAuthInput flag bitset for the supported protocol.
pub const PLAYER_AUTH_INPUT_BITSET_SIZE: usize = 65;

// PlayerAuthInput flag bit indices (subset the proxy inspects).
pub const INPUT_FLAG_PERFORM_ITEM_INTERACTION: usize = 32;
pub const INPUT_FLAG_PERFORM_BLOCK_ACTIONS: usize = 34;

// UseItem transaction actions.
pub const USE_ITEM_ACTION_CLICK_BLOCK: u32 = 0;
pub const USE_ITEM_ACTION_CLICK_AIR: u32 = 1;
pub const USE_ITEM_ACTION_BREAK_BLOCK: u32 = 2;

// UseItemOnEntity transaction actions.
pub const USE_ITEM_ON_ENTITY_ACTION_INTERACT: u32 = 0;
pub const USE_ITEM_ON_ENTITY_ACTION_ATTACK: u32 = 1;

// UseItem trigger types.
pub const TRIGGER_TYPE_PLAYER_INPUT: u32 = 1;

// Client-side placement prediction.
pub const CLIENT_PREDICTION_FAILURE: u32 = 0;
pub const CLIENT_PREDICTION_SUCCESS: u32 = 1;

// PlayerAction kinds (subset the proxy inspects or emits).
pub const PLAYER_ACTION_START_BREAK: i32 = 0;
pub const PLAYER_ACTION_ABORT_BREAK: i32 = 1;
pub const PLAYER_ACTION_STOP_BREAK: i32 = 2;
pub const PLAYER_ACTION_DROP_ITEM: i32 = 4;
pub const PLAYER_ACTION_CREATIVE_DESTROY_BLOCK: i32 = 13;
pub const PLAYER_ACTION_CRACK_BREAK: i32 = 18;
pub const PLAYER_ACTION_START_BUILDING_BLOCK: i32 = 25;
pub const PLAYER_ACTION_PREDICT_DESTROY_BLOCK: i32 = 26;
pub const PLAYER_ACTION_CONTINUE_DESTROY_BLOCK: i32 = 27;
pub const PLAYER_ACTION_START_ITEM_USE_ON: i32 = 28;
pub const PLAYER_ACTION_STOP_ITEM_USE_ON: i32 = 29;

// LevelEvent kinds the diagnostics path names.
pub const LEVEL_EVENT_PARTICLES_DESTROY_BLOCK: i32 = 2001;
pub const LEVEL_EVENT_START_BLOCK_CRACKING: i32 = 3600;
pub const LEVEL_EVENT_STOP_BLOCK_CRACKING: i32 = 3601;
pub const LEVEL_EVENT_UPDATE_BLOCK_CRACKING: i32 = 3602;

/// Single-precision 3D vector used for entity and player positions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// Item type reference: a per-session numeric handle plus metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemType {
    pub network_id: i32,
    pub metadata_value: u32,
}

/// An item stack as carried in inventory packets. A count of zero denotes
/// an empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemStack {
    pub item_type: ItemType,
    pub block_runtime_id: i32,
    pub count: u16,
    pub has_network_id: bool,
}

/// An item stack together with its server-assigned stack network id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemInstance {
    pub stack_network_id: i32,
    pub stack: ItemStack,
}

/// One entry of the item registry sent in StartGame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    pub runtime_id: i16,
    pub name: String,
    pub component_based: bool,
}

/// A named entity attribute with its value bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attribute {
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub value: f32,
    pub default_value: f32,
}

/// One roster entry of a PlayerList packet. Remove entries carry only the
/// XUID.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerListEntry {
    pub xuid: String,
    pub username: String,
    pub entity_unique_id: i64,
}

/// Transaction payload of a UseItem inventory transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UseItemTransactionData {
    pub action_type: u32,
    pub trigger_type: u32,
    pub block_position: BlockPos,
    pub block_face: i32,
    pub hot_bar_slot: i32,
    pub held_item: ItemInstance,
    pub position: Vec3,
    pub clicked_position: Vec3,
    pub block_runtime_id: u32,
    pub client_prediction: u32,
}

/// Transaction payload of a UseItemOnEntity inventory transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UseItemOnEntityTransactionData {
    pub target_entity_runtime_id: u64,
    pub action_type: u32,
    pub hot_bar_slot: i32,
    pub held_item: ItemInstance,
    pub position: Vec3,
    pub clicked_position: Vec3,
}

/// One slot mutation inside a Normal inventory transaction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InventoryAction {
    pub source_type: u32,
    pub window_id: i32,
    pub slot: u32,
    pub old_item: ItemInstance,
    pub new_item: ItemInstance,
}

/// The typed payload of an InventoryTransaction packet.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionData {
    Normal { actions: Vec<InventoryAction> },
    Mismatch,
    UseItem(UseItemTransactionData),
    UseItemOnEntity(UseItemOnEntityTransactionData),
}

/// A block action embedded in PlayerAuthInput.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockAction {
    pub action: i32,
    pub block_pos: BlockPos,
    pub face: i32,
}

/// Entry of an ItemStackResponse packet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemStackResponseEntry {
    pub status: u8,
    pub request_id: i32,
}

/// Fixed-width flag bitset as carried by PlayerAuthInput.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitset {
    size: usize,
    words: Vec<u64>,
}

impl Bitset {
    /// Create an all-zero bitset of the given width in bits.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            words: vec![0; size.div_ceil(64)],
        }
    }

    /// Width in bits.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Set the bit at `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize) {
        if index < self.size {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    /// Read the bit at `index`. Out-of-range indices read as false.
    pub fn load(&self, index: usize) -> bool {
        if index >= self.size {
            return false;
        }
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.words
    }

    pub(crate) fn from_words(size: usize, words: Vec<u64>) -> Self {
        Self { size, words }
    }
}

/// The world snapshot a server sends in StartGame. The dialer captures this
/// for the session; the proxy replays it to the local client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameData {
    pub world_name: String,
    pub difficulty: i32,
    pub entity_unique_id: i64,
    pub entity_runtime_id: u64,
    pub player_game_mode: i32,
    pub player_position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub dimension: i32,
    pub world_spawn: BlockPos,
    pub time: i64,
    pub items: Vec<ItemEntry>,
}

/// Identity claims of the connecting player as vouched for at login.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentityData {
    /// In-game display name.
    pub display_name: String,
    /// Xbox user id. Empty for unauthenticated connections.
    pub xuid: String,
    /// Stable player identity (UUID string).
    pub identity: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_set_load() {
        let mut bs = Bitset::new(PLAYER_AUTH_INPUT_BITSET_SIZE);
        assert!(!bs.load(0));
        bs.set(0);
        bs.set(64);
        assert!(bs.load(0));
        assert!(bs.load(64));
        assert!(!bs.load(63));
    }

    #[test]
    fn test_bitset_out_of_range() {
        let mut bs = Bitset::new(10);
        bs.set(200);
        assert!(!bs.load(200));
        assert_eq!(bs.size(), 10);
    }

    #[test]
    fn test_empty_stack_is_default() {
        let item = ItemInstance::default();
        assert_eq!(item.stack.count, 0);
        assert_eq!(item.stack.item_type.network_id, 0);
    }
}
