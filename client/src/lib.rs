//! # Grid Sync Client Library
//!
//! Client-side half of the state-sync engine. It turns held keys into sequenced input
//! packets, predicts the local player immediately, reconciles with the server's
//! authoritative state, and renders other entities slightly in the past by
//! interpolating between buffered world views.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Inputs move the local player as soon as they are produced, without waiting for the
//! server. Each sent input stays in a pending queue until the server acknowledges it.
//!
//! ### Server Reconciliation
//! Every update carries "your state" and the last input sequence the server applied.
//! The client overwrites its player with that state and replays the inputs the server
//! has not seen yet, using the same movement function as the server.
//!
//! ### Entity Interpolation
//! Remote players and projectiles are drawn between two received world views. The
//! render delay adapts to how often updates actually arrive.
//!
//! ## Module Organization
//!
//! - `config`: tunable client parameters
//! - `input`: send policy and input sequencing
//! - `prediction`: predictor and reconciler for the local player
//! - `interpolation`: world-view buffer and remote-entity interpolation
//! - `camera`: player-following camera and the viewport reported to the server
//! - `game`: fixed-step session driver and the typed network event queue
//! - `network`: UDP transport with handshake and reconnect
//! - `bot`: headless control source used by the binary
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::bot::RandomBot;
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut bot = RandomBot::new(None, 0.05, 1920.0, 1080.0);
//!     let mut client = Client::new("127.0.0.1:8080", ClientConfig::default(), 0).await?;
//!     client.run(&mut bot, None).await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod camera;
pub mod config;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod network;
pub mod prediction;
