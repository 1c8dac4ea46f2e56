//! # Pong Match Server Library
//!
//! This library provides the authoritative server for a two-player Pong match
//! played over TCP. It owns the only copy of the match, applies each player's
//! paddle input, steps the ball at a fixed tick rate and streams snapshots of
//! the whole match back to both players.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Ball movement, wall bounces, paddle hits, scoring and the match lifecycle
//! are all decided here. Clients only report where their paddle is and
//! whether they are ready; everything else they see comes from snapshots.
//!
//! ### Player Management
//! Exactly two player slots exist. The first connection gets slot 0 (left
//! paddle), the second slot 1 (right paddle). A third connection is refused
//! and closed straight away. When a player leaves, the match is abandoned and
//! the server waits for a replacement.
//!
//! ### State Broadcasting
//! While both players are connected, every broadcast tick encodes the match
//! once and queues the same frame to both players. A player who cannot keep
//! up loses frames rather than slowing the match down.
//!
//! ## Match Lifecycle
//!
//! ```text
//! AwaitingConnection --both connected--> AwaitingReady --both ready--> Playing
//!        ^                                    ^                          |
//!        |                                    +--both vote rematch--+    | score reaches win_score
//!        +------- any disconnect -------------------------------- GameOver <-+
//! ```
//!
//! ## Wire Format
//!
//! Every message is a bincode payload behind a 4-byte big-endian length
//! prefix (see `pong_shared::codec`). The server sends a `Handshake` first,
//! then `MatchState` snapshots; clients send `ClientInput`.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Address, tick and broadcast rates, and the per-write timeout.
//!
//! ### Client Manager Module (`client_manager`)
//! The two-slot roster and each player's outbound frame queue.
//!
//! ### Game Module (`game`)
//! The match state machine. Every status change and its resets live here.
//!
//! ### Physics Module (`physics`)
//! Ball integration, wall and paddle collisions, speed cap and goal checks.
//!
//! ### Session Module (`session`)
//! Per-player receive loop and the writer task that owns the socket's write
//! half.
//!
//! ### Network Module (`network`)
//! The acceptor, the simulation and broadcast loops, and orderly shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pong_server::config::ServerConfig;
//! use pong_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default()).await?;
//!     let shutdown = server.shutdown_handle();
//!
//!     let running = tokio::spawn(server.run());
//!     tokio::signal::ctrl_c().await?;
//!     shutdown.shutdown();
//!     running.await??;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! The match and the roster each sit behind their own `tokio::sync::Mutex`.
//! Code that needs both always locks the roster first. Each player session
//! is two tasks: a receive loop that applies input, and a writer whose every
//! write is bounded by the configured timeout, so one stalled client can
//! never hold up the tick loops or the other player.

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod physics;
pub mod session;
