//! Core of the realmbridge proxy
//!
//! A transparent Bedrock protocol proxy between a local game client and a
//! hosted Realm. While relaying the packet stream unmodified it maintains a
//! live model of the session and exposes that model, plus a set of actions,
//! over a stdio tool channel.

#![warn(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::manual_let_else,
    clippy::explicit_iter_loop,
    clippy::inefficient_to_string
)]

pub mod auth;
pub mod config;
pub mod control;
pub mod error;
pub mod intercept;
pub mod intercept_log;
pub mod logging;
pub mod realms;
pub mod session;
pub mod state;

pub use error::BridgeError;
pub use state::{GameState, Status};
