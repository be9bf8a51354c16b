//! # Word Game Server Library
//!
//! This library provides the server for a shared, turn-based word guessing
//! game played over plain TCP. Clients connect, pick a unique name, and then
//! take turns guessing letters of a hidden word until it is solved or the
//! guesses run out. A new word is drawn straight away and play continues with
//! whoever is still connected.
//!
//! ## Core Responsibilities
//!
//! ### Connection Management
//! Handles the complete lifecycle of a connection:
//! - Admission on accept, as a pending connection without a name
//! - Promotion to an active player once a unique name is chosen
//! - Removal on close, read/write failure, or an oversized line
//!
//! ### Game Authority
//! The server holds the only copy of the word, the reveal string, the
//! guessed letters and the turn pointer. Clients only ever see rendered text.
//!
//! ### Notification
//! Every state change is pushed to the players it concerns. Delivery is best
//! effort per recipient: one broken socket never stops the others from
//! receiving a message.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! A single `mio::Poll` waits on the listener and all connections at once.
//! Ready sockets are handled in ascending token order and every line framed
//! from a read is handled in stream order before moving on. Since there is
//! exactly one thread there is no locking anywhere.
//!
//! ### Line Protocol
//! Every message in both directions ends with CR LF. Incoming bytes are
//! reassembled by a bounded per-connection [`shared::LineFramer`]; a line that
//! does not fit is a protocol violation and the connection is dropped.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection records and the registry of pending and active connections,
//! including the active join order used as the turn order.
//!
//! ### Game Module (`game`)
//! Round state, guess validation and the turn pointer.
//!
//! ### Notifier Module (`notifier`)
//! Broadcast with optional exclusion, and the announcements built on it.
//!
//! ### Dictionary Module (`dictionary`)
//! Supplies a random word for each round.
//!
//! ### Network Module (`network`)
//! The event loop that ties the above together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::dictionary::Dictionary;
//! use server::network::{Server, ServerConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let words = Dictionary::load("words.txt")?;
//!     let mut server = Server::bind(ServerConfig::default(), words)?;
//!
//!     // Blocks until a ShutdownHandle is triggered.
//!     server.run()?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod dictionary;
pub mod error;
pub mod game;
pub mod network;
pub mod notifier;
