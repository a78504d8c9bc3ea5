//! Bedrock Edition protocol library for realmbridge
//!
//! This crate provides the packet model, wire codec and connection handling
//! the proxy core delegates to: a datagram transport with internally
//! serialized writes, a persistent listener, an upstream dialer and the
//! twin-handshake operations. It knows nothing about Realms or proxying.

#![warn(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::str_to_string,
    clippy::manual_let_else,
    clippy::explicit_iter_loop,
    clippy::inefficient_to_string,
    clippy::large_types_passed_by_value
)]

pub mod codec;
pub mod conn;
pub mod dial;
pub mod error;
pub mod io;
pub mod listen;
pub mod packet;
pub mod types;

pub use conn::{Connection, HANDSHAKE_TIMEOUT};
pub use dial::{Dialer, DIAL_TIMEOUT};
pub use error::{ProtoError, Result};
pub use listen::{ListenConfig, Listener};
pub use packet::Packet;
pub use types::{
    Attribute, Bitset, BlockAction, BlockPos, GameData, IdentityData, ItemEntry, ItemInstance,
    ItemStack, ItemType, PlayerListEntry, TransactionData, UseItemOnEntityTransactionData,
    UseItemTransactionData, Vec3,
};
