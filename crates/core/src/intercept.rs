//! Packet interception
//!
//! Pure inspection of relayed packets: both entry points update `GameState`
//! and nothing else. Packets are never modified, no I/O happens here, and a
//! kind without a match arm is a no-op.

use std::time::SystemTime;

use realmbridge_proto::types::{
    PLAYER_LIST_ACTION_ADD, PLAYER_LIST_ACTION_REMOVE, TEXT_TYPE_CHAT,
};
use realmbridge_proto::Packet;

use crate::intercept_log;
use crate::state::{ChatDirection, ChatMessage, GameState};

/// Process a packet from the client heading to the server.
pub fn on_client_packet(pk: &Packet, state: &GameState) {
    match pk {
        Packet::PlayerAuthInput {
            position,
            pitch,
            yaw,
            ..
        } => {
            state.update_position(position.x, position.y, position.z, *pitch, *yaw);
        }
        Packet::Text {
            text_type,
            source_name,
            message,
            ..
        } if *text_type == TEXT_TYPE_CHAT => {
            state.append_chat(ChatMessage {
                time: SystemTime::now(),
                source: source_name.clone(),
                message: message.clone(),
                direction: ChatDirection::Outgoing,
            });
        }
        _ => {}
    }

    intercept_log::log_client_packet(pk, state);
}

/// Process a packet from the server heading to the client.
pub fn on_server_packet(pk: &Packet, state: &GameState) {
    match pk {
        Packet::MovePlayer {
            entity_runtime_id,
            position,
            pitch,
            yaw,
            ..
        } => {
            if *entity_runtime_id == state.entity_id() {
                state.update_position(position.x, position.y, position.z, *pitch, *yaw);
            }
        }

        Packet::ChangeDimension { dimension, .. } => {
            state.set_dimension(*dimension);
            tracing::debug!("dimension changed to {}", dimension);
        }

        Packet::InventoryContent { window_id, content } => {
            state.set_inventory(*window_id, content.clone());
        }

        Packet::InventorySlot {
            window_id,
            slot,
            new_item,
        } => {
            state.update_inventory_slot(*window_id, *slot as usize, new_item.clone());
        }

        // Every text kind is retained here; the outgoing path filters to
        // chat only.
        Packet::Text {
            source_name,
            message,
            ..
        } => {
            state.append_chat(ChatMessage {
                time: SystemTime::now(),
                source: source_name.clone(),
                message: message.clone(),
                direction: ChatDirection::Incoming,
            });
        }

        Packet::PlayerList {
            action_type,
            entries,
        } => {
            if *action_type == PLAYER_LIST_ACTION_ADD {
                for entry in entries {
                    state.add_player(&entry.xuid, &entry.username);
                }
            } else if *action_type == PLAYER_LIST_ACTION_REMOVE {
                for entry in entries {
                    state.remove_player(&entry.xuid);
                }
            }
        }

        Packet::SetTime { time } => {
            state.set_world_time(i64::from(*time));
        }

        Packet::UpdateAttributes {
            entity_runtime_id,
            attributes,
            ..
        } => {
            if *entity_runtime_id == state.entity_id() {
                for attr in attributes {
                    state.set_attribute(&attr.name, attr.value);
                }
            }
        }

        Packet::SetHealth { health } => {
            state.set_health(*health as f32);
        }

        Packet::AddActor {
            entity_runtime_id,
            entity_type,
            position,
            ..
        } => {
            state.add_entity(*entity_runtime_id, entity_type, *position);
        }

        Packet::AddPlayer {
            entity_runtime_id,
            username,
            position,
            ..
        } => {
            state.add_entity(*entity_runtime_id, username, *position);
        }

        Packet::RemoveActor { entity_unique_id } => {
            // The unique id is a different identifier from the runtime id the
            // entity map is keyed by, but hosts set them equal in practice.
            state.remove_entity(*entity_unique_id as u64);
        }

        Packet::MoveActorDelta {
            entity_runtime_id,
            position,
            ..
        } => {
            state.update_entity_position(*entity_runtime_id, *position);
        }

        _ => {}
    }

    intercept_log::log_server_packet(pk, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use realmbridge_proto::types::{
        self, PLAYER_AUTH_INPUT_BITSET_SIZE, TEXT_TYPE_SYSTEM,
    };
    use realmbridge_proto::{
        Attribute, Bitset, ItemInstance, ItemStack, ItemType, PlayerListEntry, Vec3,
    };

    fn auth_input(position: Vec3, pitch: f32, yaw: f32) -> Packet {
        Packet::PlayerAuthInput {
            position,
            pitch,
            yaw,
            head_yaw: yaw,
            input_data: Bitset::new(PLAYER_AUTH_INPUT_BITSET_SIZE),
            input_mode: types::INPUT_MODE_MOUSE,
            play_mode: types::PLAY_MODE_NORMAL,
            interaction_model: types::INTERACTION_MODEL_CROSSHAIR,
            tick: 0,
            item_interaction: None,
            block_actions: vec![],
        }
    }

    fn text(text_type: u8, source: &str, message: &str) -> Packet {
        Packet::Text {
            text_type,
            needs_translation: false,
            source_name: source.to_string(),
            message: message.to_string(),
            parameters: vec![],
            xuid: String::new(),
        }
    }

    fn item(network_id: i32, count: u16) -> ItemInstance {
        ItemInstance {
            stack_network_id: 0,
            stack: ItemStack {
                item_type: ItemType {
                    network_id,
                    metadata_value: 0,
                },
                block_runtime_id: 0,
                count,
                has_network_id: false,
            },
        }
    }

    #[test]
    fn test_player_auth_input_updates_position() {
        let gs = GameState::new();
        gs.set_identity("Steve", "xuid", 42);
        on_client_packet(&auth_input(Vec3::new(100.0, 65.0, 200.0), 30.0, 90.0), &gs);

        let (x, y, z, pitch, yaw, _) = gs.position();
        assert_eq!((x, y, z), (100.0, 65.0, 200.0));
        assert_eq!((pitch, yaw), (30.0, 90.0));
    }

    #[test]
    fn test_outgoing_chat_recorded() {
        let gs = GameState::new();
        on_client_packet(&text(types::TEXT_TYPE_CHAT, "Player1", "hello world"), &gs);
        on_client_packet(&text(TEXT_TYPE_SYSTEM, "Server", "x"), &gs);

        let history = gs.chat_history(0);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].direction, ChatDirection::Outgoing);
        assert_eq!(history[0].source, "Player1");
        assert_eq!(history[0].message, "hello world");
    }

    #[test]
    fn test_move_player_our_entity() {
        let gs = GameState::new();
        gs.set_identity("Steve", "123", 42);

        on_server_packet(
            &Packet::MovePlayer {
                entity_runtime_id: 42,
                position: Vec3::new(50.0, 70.0, 80.0),
                pitch: 15.0,
                yaw: 45.0,
                head_yaw: 45.0,
                mode: 0,
                on_ground: true,
            },
            &gs,
        );
        // A different entity's movement must be ignored.
        on_server_packet(
            &Packet::MovePlayer {
                entity_runtime_id: 99,
                position: Vec3::new(999.0, 999.0, 999.0),
                pitch: 0.0,
                yaw: 0.0,
                head_yaw: 0.0,
                mode: 0,
                on_ground: true,
            },
            &gs,
        );

        let (x, y, z, pitch, yaw, _) = gs.position();
        assert_eq!((x, y, z), (50.0, 70.0, 80.0));
        assert_eq!((pitch, yaw), (15.0, 45.0));
    }

    #[test]
    fn test_change_dimension() {
        let gs = GameState::new();
        on_server_packet(
            &Packet::ChangeDimension {
                dimension: 1,
                position: Vec3::default(),
                respawn: false,
            },
            &gs,
        );
        let (_, _, _, _, _, dim) = gs.position();
        assert_eq!(dim, 1);
    }

    #[test]
    fn test_inventory_content_and_slot() {
        let gs = GameState::new();
        on_server_packet(
            &Packet::InventoryContent {
                window_id: 0,
                content: vec![item(5, 10), item(6, 20)],
            },
            &gs,
        );
        on_server_packet(
            &Packet::InventorySlot {
                window_id: 0,
                slot: 5,
                new_item: item(7, 5),
            },
            &gs,
        );

        let inv = gs.inventory();
        assert_eq!(inv.len(), 3);
        let slot5 = inv.iter().find(|s| s.slot == 5).expect("slot 5 present");
        assert_eq!(slot5.item, "unknown:7");
        assert_eq!(slot5.count, 5);
    }

    #[test]
    fn test_incoming_text_all_kinds_kept() {
        let gs = GameState::new();
        on_server_packet(&text(types::TEXT_TYPE_CHAT, "OtherPlayer", "hey there"), &gs);
        on_server_packet(&text(TEXT_TYPE_SYSTEM, "", "server notice"), &gs);

        let history = gs.chat_history(0);
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|m| m.direction == ChatDirection::Incoming));
    }

    #[test]
    fn test_player_list_add_remove() {
        let gs = GameState::new();
        on_server_packet(
            &Packet::PlayerList {
                action_type: PLAYER_LIST_ACTION_ADD,
                entries: vec![
                    PlayerListEntry {
                        xuid: "x1".to_string(),
                        username: "Alice".to_string(),
                        entity_unique_id: 1,
                    },
                    PlayerListEntry {
                        xuid: "x2".to_string(),
                        username: "Bob".to_string(),
                        entity_unique_id: 2,
                    },
                ],
            },
            &gs,
        );
        assert_eq!(gs.players().len(), 2);

        on_server_packet(
            &Packet::PlayerList {
                action_type: PLAYER_LIST_ACTION_REMOVE,
                entries: vec![PlayerListEntry {
                    xuid: "x1".to_string(),
                    ..Default::default()
                }],
            },
            &gs,
        );
        let players = gs.players();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].username, "Bob");
    }

    #[test]
    fn test_set_time() {
        let gs = GameState::new();
        on_server_packet(&Packet::SetTime { time: 12345 }, &gs);
        let (_, world_time, _, _, _) = gs.world_info();
        assert_eq!(world_time, 12345);
    }

    #[test]
    fn test_update_attributes_health_alias() {
        let gs = GameState::new();
        gs.set_identity("Steve", "123", 42);
        on_server_packet(
            &Packet::UpdateAttributes {
                entity_runtime_id: 42,
                attributes: vec![Attribute {
                    name: "minecraft:health".to_string(),
                    min: 0.0,
                    max: 20.0,
                    value: 15.0,
                    default_value: 20.0,
                }],
                tick: 0,
            },
            &gs,
        );
        let (_, _, _, health, _) = gs.world_info();
        assert_eq!(health, 15.0);
    }

    #[test]
    fn test_update_attributes_other_entity_ignored() {
        let gs = GameState::new();
        gs.set_identity("Steve", "123", 42);
        gs.set_health(20.0);
        on_server_packet(
            &Packet::UpdateAttributes {
                entity_runtime_id: 99,
                attributes: vec![Attribute {
                    name: "minecraft:health".to_string(),
                    value: 5.0,
                    ..Default::default()
                }],
                tick: 0,
            },
            &gs,
        );
        let (_, _, _, health, _) = gs.world_info();
        assert_eq!(health, 20.0);
    }

    #[test]
    fn test_set_health() {
        let gs = GameState::new();
        on_server_packet(&Packet::SetHealth { health: 18 }, &gs);
        let (_, _, _, health, _) = gs.world_info();
        assert_eq!(health, 18.0);
    }

    #[test]
    fn test_add_actor_and_player() {
        let gs = GameState::new();
        on_server_packet(
            &Packet::AddActor {
                entity_unique_id: 200,
                entity_runtime_id: 200,
                entity_type: "minecraft:zombie".to_string(),
                position: Vec3::new(10.0, 20.0, 30.0),
                velocity: Vec3::default(),
                pitch: 0.0,
                yaw: 0.0,
            },
            &gs,
        );
        on_server_packet(
            &Packet::AddPlayer {
                entity_runtime_id: 300,
                username: "OtherPlayer".to_string(),
                position: Vec3::new(5.0, 10.0, 15.0),
                velocity: Vec3::default(),
                pitch: 0.0,
                yaw: 0.0,
            },
            &gs,
        );

        assert_eq!(gs.entity(200).unwrap().entity_type, "minecraft:zombie");
        assert_eq!(gs.entity(300).unwrap().entity_type, "OtherPlayer");
    }

    #[test]
    fn test_remove_actor_by_unique_id() {
        let gs = GameState::new();
        gs.add_entity(500, "minecraft:creeper", Vec3::default());
        on_server_packet(&Packet::RemoveActor { entity_unique_id: 500 }, &gs);
        assert!(gs.entity(500).is_none());

        // Unknown ids are a no-op.
        on_server_packet(&Packet::RemoveActor { entity_unique_id: 777 }, &gs);
    }

    #[test]
    fn test_move_actor_delta() {
        let gs = GameState::new();
        gs.add_entity(600, "minecraft:pig", Vec3::default());
        on_server_packet(
            &Packet::MoveActorDelta {
                entity_runtime_id: 600,
                position: Vec3::new(100.0, 200.0, 300.0),
                rotation: Vec3::default(),
                flags: 0,
            },
            &gs,
        );
        assert_eq!(
            gs.entity(600).unwrap().position,
            Vec3::new(100.0, 200.0, 300.0)
        );
    }

    #[test]
    fn test_unmatched_packet_is_noop() {
        let gs = GameState::new();
        on_server_packet(
            &Packet::Unknown {
                id: 0xc8,
                payload: bytes::Bytes::from_static(b"xyz"),
            },
            &gs,
        );
        on_client_packet(&Packet::SetTime { time: 1 }, &gs);
        // Client-side SetTime has no meaning; nothing changed.
        let (_, world_time, _, _, _) = gs.world_info();
        assert_eq!(world_time, 0);
        assert!(gs.chat_history(0).is_empty());
    }
}
