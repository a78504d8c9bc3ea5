//! Thread-safe cached game state updated from intercepted packets
//!
//! `GameState` is the single shared container of the proxy: one instance is
//! created at startup and lives for the whole process. Sessions reset its
//! content through `init_from_game_data` but the container itself never
//! moves, so the control surface keeps a stable reference.
//!
//! Every accessor takes the internal lock in the right mode, performs no I/O
//! while holding it, and hands out defensive copies.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use serde::Serialize;

use realmbridge_proto::{BlockPos, Connection, GameData, ItemInstance, Vec3};

/// Upper bound of the chat ring buffer.
pub const MAX_CHAT_HISTORY: usize = 100;

/// Connection status of the proxy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Starting,
    WaitingForClient,
    ConnectingToRealm,
    Connected,
    Disconnected,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Starting => "starting",
            Status::WaitingForClient => "waiting_for_client",
            Status::ConnectingToRealm => "connecting_to_realm",
            Status::Connected => "connected",
            Status::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a recorded chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatDirection {
    Incoming,
    Outgoing,
}

/// A single chat message with metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub time: SystemTime,
    pub source: String,
    pub message: String,
    #[serde(rename = "type")]
    pub direction: ChatDirection,
}

/// An online player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerInfo {
    pub username: String,
    pub xuid: String,
}

/// A tracked nearby entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityInfo {
    pub runtime_id: u64,
    /// Entity identifier, or the username for player entities.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub position: Vec3,
}

/// A non-empty inventory slot as reported to the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventorySlot {
    pub slot: usize,
    pub item: String,
    pub count: u32,
}

#[derive(Default)]
struct Inner {
    status: Status,

    // Connections, set during session install and cleared on teardown.
    server_conn: Option<Arc<Connection>>,
    client_conn: Option<Arc<Connection>>,

    // Player identity, set once per session.
    display_name: String,
    xuid: String,
    entity_id: u64,

    // Position and rotation.
    pos_x: f32,
    pos_y: f32,
    pos_z: f32,
    pitch: f32,
    yaw: f32,
    dimension: i32,

    // Window id -> slots.
    inventory: HashMap<u32, Vec<ItemInstance>>,

    chat_history: VecDeque<ChatMessage>,

    // Keyed by XUID.
    players: HashMap<String, PlayerInfo>,

    // World info.
    world_name: String,
    world_time: i64,
    game_mode: i32,
    spawn_pos: BlockPos,

    health: f32,
    attributes: HashMap<String, f32>,

    // Keyed by entity runtime id.
    entities: HashMap<u64, EntityInfo>,

    // Item network id -> name, from the StartGame manifest.
    item_registry: HashMap<i32, String>,

    // Block runtime id -> name, learned from observed placements.
    block_registry: HashMap<u32, String>,

    verbose_packet_log: bool,
}

/// The process-wide session snapshot.
pub struct GameState {
    inner: RwLock<Inner>,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn set_status(&self, status: Status) {
        self.inner.write().status = status;
    }

    pub fn status(&self) -> Status {
        self.inner.read().status
    }

    /// Store the live connection handles. Ownership stays with the session
    /// engine; these are collaborator references cleared at teardown.
    pub fn set_connections(&self, server: Arc<Connection>, client: Arc<Connection>) {
        let mut inner = self.inner.write();
        inner.server_conn = Some(server);
        inner.client_conn = Some(client);
    }

    pub fn clear_connections(&self) {
        let mut inner = self.inner.write();
        inner.server_conn = None;
        inner.client_conn = None;
    }

    /// The upstream connection, if a session is live.
    pub fn server_conn(&self) -> Option<Arc<Connection>> {
        self.inner.read().server_conn.clone()
    }

    /// The local client connection, if a session is live.
    pub fn client_conn(&self) -> Option<Arc<Connection>> {
        self.inner.read().client_conn.clone()
    }

    pub fn set_identity(&self, display_name: &str, xuid: &str, entity_id: u64) {
        let mut inner = self.inner.write();
        inner.display_name = display_name.to_string();
        inner.xuid = xuid.to_string();
        inner.entity_id = entity_id;
    }

    /// Forget the per-session identity. Part of session teardown.
    pub fn clear_identity(&self) {
        let mut inner = self.inner.write();
        inner.display_name.clear();
        inner.xuid.clear();
        inner.entity_id = 0;
    }

    /// Display name and XUID of the proxied player.
    pub fn identity(&self) -> (String, String) {
        let inner = self.inner.read();
        (inner.display_name.clone(), inner.xuid.clone())
    }

    /// Our own entity runtime id.
    pub fn entity_id(&self) -> u64 {
        self.inner.read().entity_id
    }

    pub fn update_position(&self, x: f32, y: f32, z: f32, pitch: f32, yaw: f32) {
        let mut inner = self.inner.write();
        inner.pos_x = x;
        inner.pos_y = y;
        inner.pos_z = z;
        inner.pitch = pitch;
        inner.yaw = yaw;
    }

    /// Position, rotation and dimension.
    pub fn position(&self) -> (f32, f32, f32, f32, f32, i32) {
        let inner = self.inner.read();
        (
            inner.pos_x,
            inner.pos_y,
            inner.pos_z,
            inner.pitch,
            inner.yaw,
            inner.dimension,
        )
    }

    pub fn set_dimension(&self, dimension: i32) {
        self.inner.write().dimension = dimension;
    }

    /// Replace the full slot list of one window.
    pub fn set_inventory(&self, window_id: u32, items: Vec<ItemInstance>) {
        self.inner.write().inventory.insert(window_id, items);
    }

    /// Update a single slot, growing the window as needed so that
    /// `len >= slot + 1` holds afterwards.
    pub fn update_inventory_slot(&self, window_id: u32, slot: usize, item: ItemInstance) {
        let mut inner = self.inner.write();
        let slots = inner.inventory.entry(window_id).or_default();
        if slots.len() <= slot {
            slots.resize(slot + 1, ItemInstance::default());
        }
        slots[slot] = item;
    }

    /// All non-empty slots across all windows, with resolved item names.
    /// Ordering is unspecified.
    pub fn inventory(&self) -> Vec<InventorySlot> {
        let inner = self.inner.read();
        let mut result = Vec::new();
        for items in inner.inventory.values() {
            for (i, item) in items.iter().enumerate() {
                if item.stack.count == 0 {
                    continue;
                }
                result.push(InventorySlot {
                    slot: i,
                    item: inner.resolve_item_name(item.stack.item_type.network_id),
                    count: u32::from(item.stack.count),
                });
            }
        }
        result
    }

    /// Resolve an item network id to its name, `unknown:<id>` if absent.
    pub fn resolve_item_name(&self, network_id: i32) -> String {
        self.inner.read().resolve_item_name(network_id)
    }

    /// Reverse registry lookup by item name.
    pub fn resolve_item_network_id(&self, name: &str) -> Option<i32> {
        let inner = self.inner.read();
        inner
            .item_registry
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    /// Record a block runtime id -> name correlation. Placements holding an
    /// unresolvable item teach nothing.
    pub fn learn_block(&self, runtime_id: u32, name: &str) {
        if name.starts_with("unknown:") {
            return;
        }
        self.inner
            .write()
            .block_registry
            .insert(runtime_id, name.to_string());
    }

    /// Resolve a block runtime id to its name, `rid:<id>` if never learned.
    pub fn resolve_block_name(&self, runtime_id: u32) -> String {
        match self.inner.read().block_registry.get(&runtime_id) {
            Some(name) => name.clone(),
            None => format!("rid:{runtime_id}"),
        }
    }

    /// Append to the chat ring, evicting the oldest entry past capacity.
    pub fn append_chat(&self, msg: ChatMessage) {
        let mut inner = self.inner.write();
        inner.chat_history.push_back(msg);
        while inner.chat_history.len() > MAX_CHAT_HISTORY {
            inner.chat_history.pop_front();
        }
    }

    /// The last `n` chat messages; all of them when `n` is zero or exceeds
    /// the retained count.
    pub fn chat_history(&self, n: usize) -> Vec<ChatMessage> {
        let inner = self.inner.read();
        let len = inner.chat_history.len();
        let n = if n == 0 || n > len { len } else { n };
        inner.chat_history.iter().skip(len - n).cloned().collect()
    }

    pub fn add_player(&self, xuid: &str, username: &str) {
        self.inner.write().players.insert(
            xuid.to_string(),
            PlayerInfo {
                username: username.to_string(),
                xuid: xuid.to_string(),
            },
        );
    }

    pub fn remove_player(&self, xuid: &str) {
        self.inner.write().players.remove(xuid);
    }

    /// Snapshot of the online player list.
    pub fn players(&self) -> Vec<PlayerInfo> {
        self.inner.read().players.values().cloned().collect()
    }

    pub fn set_world_time(&self, time: i64) {
        self.inner.write().world_time = time;
    }

    pub fn set_health(&self, health: f32) {
        let mut inner = self.inner.write();
        inner.health = health;
        inner.attributes.insert("health".to_string(), health);
    }

    /// Set a named attribute; `minecraft:health` is mirrored to the health
    /// field.
    pub fn set_attribute(&self, name: &str, value: f32) {
        let mut inner = self.inner.write();
        inner.attributes.insert(name.to_string(), value);
        if name == "minecraft:health" {
            inner.health = value;
        }
    }

    pub fn attribute(&self, name: &str) -> Option<f32> {
        self.inner.read().attributes.get(name).copied()
    }

    /// Populate world info, initial position and the item registry from the
    /// StartGame snapshot of a fresh session.
    pub fn init_from_game_data(&self, gd: &GameData) {
        let mut inner = self.inner.write();
        inner.world_name = gd.world_name.clone();
        inner.game_mode = gd.player_game_mode;
        inner.world_time = gd.time;
        inner.dimension = gd.dimension;
        inner.spawn_pos = gd.world_spawn;
        inner.pos_x = gd.player_position.x;
        inner.pos_y = gd.player_position.y;
        inner.pos_z = gd.player_position.z;
        inner.pitch = gd.pitch;
        inner.yaw = gd.yaw;
        inner.health = 20.0;

        // The item manifest's runtime ids correspond to the network ids item
        // stacks carry later in the session.
        for item in &gd.items {
            inner
                .item_registry
                .insert(i32::from(item.runtime_id), item.name.clone());
        }
    }

    /// World name, time, game mode, health and spawn position.
    pub fn world_info(&self) -> (String, i64, i32, f32, BlockPos) {
        let inner = self.inner.read();
        (
            inner.world_name.clone(),
            inner.world_time,
            inner.game_mode,
            inner.health,
            inner.spawn_pos,
        )
    }

    /// Add or replace a tracked entity.
    pub fn add_entity(&self, runtime_id: u64, entity_type: &str, position: Vec3) {
        self.inner.write().entities.insert(
            runtime_id,
            EntityInfo {
                runtime_id,
                entity_type: entity_type.to_string(),
                position,
            },
        );
    }

    /// Remove a tracked entity. A miss is a no-op, not an error.
    pub fn remove_entity(&self, runtime_id: u64) {
        self.inner.write().entities.remove(&runtime_id);
    }

    /// Update a tracked entity's position. Unknown ids are ignored.
    pub fn update_entity_position(&self, runtime_id: u64, position: Vec3) {
        if let Some(entity) = self.inner.write().entities.get_mut(&runtime_id) {
            entity.position = position;
        }
    }

    /// Snapshot of one tracked entity.
    pub fn entity(&self, runtime_id: u64) -> Option<EntityInfo> {
        self.inner.read().entities.get(&runtime_id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    pub fn set_verbose_packet_log(&self, enabled: bool) {
        self.inner.write().verbose_packet_log = enabled;
    }

    pub fn verbose_packet_log(&self) -> bool {
        self.inner.read().verbose_packet_log
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn resolve_item_name(&self, network_id: i32) -> String {
        match self.item_registry.get(&network_id) {
            Some(name) => name.clone(),
            None => format!("unknown:{network_id}"),
        }
    }
}
