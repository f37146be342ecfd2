//! # Relay Server Library
//!
//! This library implements the real-time relay server for a small
//! multiplayer falling-block game. Players form rooms identified by short
//! generated codes, synchronize lobby and ready state, and, once a match
//! is running, exchange per-tick board snapshots and garbage attacks
//! through the server until a single player remains alive.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms are created on demand, mutated by join/leave/ready/settings and
//! match events, and deleted exactly when their last member leaves. The
//! host may tune match settings; when the host departs, the oldest
//! remaining member is promoted automatically.
//!
//! ### Message Routing
//! Every inbound message is dispatched by its `type` tag to exactly one
//! room operation, and the results fan out as broadcasts, targeted sends,
//! or unicasts. Game payloads (board snapshots, garbage attacks) are
//! relayed opaquely; the server never simulates game physics.
//!
//! ### Match Arbitration
//! The server tracks which players are still alive, relays defeat events,
//! declares a winner when one player remains (or a draw when none do), and
//! returns the room to the lobby after a short delay.
//!
//! ## Architecture Design
//!
//! A single engine task owns all room and connection state and handles
//! every event to completion before the next, so no locking is needed
//! anywhere in the core. Transport tasks (one reader and one writer per
//! WebSocket connection) only decode/encode JSON and exchange typed events
//! with the engine over channels. The one piece of deferred work, the
//! post-match lobby reset, re-enters the engine as an event keyed by room
//! code, so a room deleted in the meantime is skipped safely.
//!
//! ## Module Organization
//!
//! - [`registry`]: connection identities, outbound queues, and the
//!   player-to-room side mapping.
//! - [`rooms`]: the room entity, its lobby/match state transitions, and
//!   the process-wide room store with unique code generation.
//! - [`router`]: the message router, room state machine operations, and
//!   the garbage-attack targeter.
//! - [`network`]: the WebSocket listener and per-connection tasks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::bind("0.0.0.0:3000").await?;
//!     // Accepts connections and relays room/game traffic until the
//!     // process is stopped.
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod registry;
pub mod rooms;
pub mod router;
