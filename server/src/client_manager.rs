//! Connection bookkeeping for the word game server
//!
//! This module owns every connected socket and tracks which lifecycle each
//! one is in:
//! - pending: connected, still choosing a name
//! - active: named and taking part in the turn order
//!
//! Connections live in a single map keyed by id and carry their own state
//! tag, so classifying one is a lookup rather than a search. The active join
//! order is kept separately because it doubles as the turn order.
//!
//! The manager never talks to clients on its own; all output goes through
//! the notifier.

use crate::error::NameError;
use log::{debug, info, warn};
use mio::net::TcpStream;
use shared::{FrameError, LineFramer, MAX_NAME};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// Identity of a connection. Also used as its poll token.
pub type ClientId = usize;

/// Ceiling on output queued for a client that is not reading.
pub const MAX_OUTBOX: usize = 64 * 1024;

/// Lifecycle stage of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Pending,
    Active,
}

/// What a single read from a connection produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    /// Lines completed by this read, in stream order. An error entry is
    /// always last and means the connection must be dropped.
    Frames(Vec<Result<String, FrameError>>),
    /// The peer closed its end.
    Closed,
    /// Nothing more to read until the next readiness event.
    WouldBlock,
}

/// A single connection and its per-connection buffers
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    /// Identity, assigned on admission
    pub id: ClientId,
    /// Peer address, for logging
    pub addr: SocketAddr,
    stream: S,
    framer: LineFramer,
    name: String,
    state: ClientState,
    connected: bool,
    outbox: Vec<u8>,
}

impl<S> Client<S> {
    /// Creates a pending connection with no name and empty buffers
    ///
    /// `line_capacity` bounds the inbound line buffer; filling it without a
    /// terminator is fatal for the connection.
    pub fn new(id: ClientId, addr: SocketAddr, stream: S, line_capacity: usize) -> Self {
        Self {
            id,
            addr,
            stream,
            framer: LineFramer::new(line_capacity),
            name: String::new(),
            state: ClientState::Pending,
            connected: true,
            outbox: Vec::new(),
        }
    }

    /// Empty until the client has been promoted.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// False once a read or write has failed; the event loop reaps such
    /// connections.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Flags the connection for removal. Used when a write fails somewhere
    /// the caller cannot remove it on the spot.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// Whether output is queued waiting for the socket to become writable
    pub fn has_pending_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: Write> Client<S> {
    /// Queues `message` and writes as much of the queue as the socket takes.
    ///
    /// Any failure marks the connection disconnected; the caller only needs
    /// the result to decide whether to keep talking to it.
    pub fn send(&mut self, message: &str) -> io::Result<()> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if self.outbox.len() + message.len() > MAX_OUTBOX {
            warn!("Client {} ({}) is not reading, dropping it", self.id, self.addr);
            self.connected = false;
            return Err(io::Error::new(io::ErrorKind::Other, "outbound queue full"));
        }

        self.outbox.extend_from_slice(message.as_bytes());
        self.flush()
    }

    /// Writes queued output until it is gone or the socket would block.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => {
                    self.connected = false;
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Write to client {} ({}) failed: {}", self.id, self.addr, e);
                    self.connected = false;
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl<S: Read> Client<S> {
    /// Performs one read, sized so the line buffer can never overflow, and
    /// frames whatever arrived.
    pub fn receive(&mut self) -> io::Result<Received> {
        let room = self.framer.remaining();
        if room == 0 {
            return Ok(Received::Frames(self.framer.feed(&[]).collect()));
        }

        let mut chunk = vec![0u8; room];
        let n = loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(Received::WouldBlock)
                }
                Err(e) => return Err(e),
            }
        };

        if n == 0 {
            return Ok(Received::Closed);
        }
        debug!("[{}] Read {} bytes", self.id, n);
        Ok(Received::Frames(self.framer.feed(&chunk[..n]).collect()))
    }
}

/// Checks that `name` is one printable token of acceptable length.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    let len = name.chars().count();
    if len > MAX_NAME {
        return Err(NameError::TooLong { len, max: MAX_NAME });
    }
    if !name.chars().all(|c| c.is_ascii_graphic()) {
        return Err(NameError::Malformed);
    }
    Ok(())
}

/// Owns all connections, pending and active
///
/// Keeps every connection in one id-keyed map, tagged pending or active, plus
/// the active ids in the order they joined. That order is the turn order
/// handed to the game.
pub struct ClientManager<S = TcpStream> {
    clients: HashMap<ClientId, Client<S>>,
    /// Active ids in promotion order; this is the turn order
    active: Vec<ClientId>,
    /// Next id handed out; 0 is reserved for the listener
    next_client_id: ClientId,
    line_capacity: usize,
}

impl<S> ClientManager<S> {
    /// Creates an empty registry
    ///
    /// Ids start at 1 since token 0 belongs to the listener. Every connection
    /// gets a line buffer of `line_capacity` bytes.
    pub fn new(line_capacity: usize) -> Self {
        Self {
            clients: HashMap::new(),
            active: Vec::new(),
            next_client_id: 1,
            line_capacity,
        }
    }

    /// Registers a freshly accepted connection as pending and returns its id.
    pub fn admit(&mut self, addr: SocketAddr, stream: S) -> ClientId {
        let id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", id, addr);
        self.clients
            .insert(id, Client::new(id, addr, stream, self.line_capacity));
        id
    }

    /// Looks up whether `id` is pending or active
    ///
    /// Returns `None` for ids that were never admitted or are already gone.
    pub fn classify(&self, id: ClientId) -> Option<ClientState> {
        self.clients.get(&id).map(Client::state)
    }

    /// Names a pending connection and appends it to the active order.
    ///
    /// Names are compared exactly, case included, against active players
    /// only. Unknown or already active ids are left untouched.
    pub fn promote(&mut self, id: ClientId, name: &str) -> Result<(), NameError> {
        validate_name(name)?;
        if self.is_name_taken(name) {
            return Err(NameError::Taken(name.to_string()));
        }

        let Some(client) = self.clients.get_mut(&id) else {
            warn!("Tried to promote unknown client {}", id);
            return Ok(());
        };
        if client.state == ClientState::Active {
            return Ok(());
        }

        client.name = name.to_string();
        client.state = ClientState::Active;
        self.active.push(id);
        info!("Client {} is now playing as {}", id, name);
        Ok(())
    }

    /// Whether an active player already uses `name`, compared exactly
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.active
            .iter()
            .filter_map(|id| self.clients.get(id))
            .any(|client| client.name == name)
    }

    /// Drops a connection from whichever collection holds it.
    ///
    /// If it held the turn, the caller must vacate the turn first, while the
    /// id is still in [`active_order`](Self::active_order).
    pub fn remove(&mut self, id: ClientId) -> Option<Client<S>> {
        let client = self.clients.remove(&id)?;
        self.active.retain(|&active_id| active_id != id);
        info!("Removing client {} ({})", id, client.addr);
        Some(client)
    }

    /// Returns the connection for `id`, pending or active
    pub fn get(&self, id: ClientId) -> Option<&Client<S>> {
        self.clients.get(&id)
    }

    /// Mutable access to a connection, for sending and flushing
    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client<S>> {
        self.clients.get_mut(&id)
    }

    /// Name of `id`; empty while it is still pending
    pub fn name_of(&self, id: ClientId) -> Option<&str> {
        self.clients.get(&id).map(Client::name)
    }

    /// Active ids in join order, which is also the turn order
    pub fn active_order(&self) -> &[ClientId] {
        &self.active
    }

    /// Ids flagged by a failed write, in ascending order.
    pub fn disconnected(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| !client.connected)
            .map(|client| client.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn clients_mut(&mut self) -> impl Iterator<Item = &mut Client<S>> {
        self.clients.values_mut()
    }

    /// Returns the number of connections, pending and active
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    /// In-memory stream: reads come from `input` chunks, writes land in
    /// `output`, optionally failing or stalling.
    #[derive(Debug, Default)]
    struct MockStream {
        input: VecDeque<Vec<u8>>,
        output: Vec<u8>,
        fail_writes: bool,
        write_limit: Option<usize>,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.input.pop_front() {
                Some(mut chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.input.push_front(chunk.split_off(n));
                    }
                    Ok(n)
                }
                None => Err(io::ErrorKind::WouldBlock.into()),
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            let n = match self.write_limit {
                Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
                Some(limit) => buf.len().min(limit),
                None => buf.len(),
            };
            self.output.extend_from_slice(&buf[..n]);
            if let Some(limit) = self.write_limit.as_mut() {
                *limit -= n;
            }
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn manager_with(names: &[&str]) -> (ClientManager<MockStream>, Vec<ClientId>) {
        let mut manager = ClientManager::new(64);
        let ids = names
            .iter()
            .map(|name| {
                let id = manager.admit(test_addr(), MockStream::default());
                manager.promote(id, name).unwrap();
                id
            })
            .collect();
        (manager, ids)
    }

    #[test]
    fn test_admit_starts_pending() {
        let mut manager: ClientManager<MockStream> = ClientManager::new(64);
        let id = manager.admit(test_addr(), MockStream::default());

        assert_eq!(id, 1);
        assert_eq!(manager.classify(id), Some(ClientState::Pending));
        assert_eq!(manager.name_of(id), Some(""));
        assert!(manager.active_order().is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_unique_and_skip_listener() {
        let mut manager: ClientManager<MockStream> = ClientManager::new(64);
        let a = manager.admit(test_addr(), MockStream::default());
        manager.remove(a);
        let b = manager.admit(test_addr(), MockStream::default());

        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_promote_appends_in_join_order() {
        let (manager, ids) = manager_with(&["alice", "bob", "carol"]);

        assert_eq!(manager.active_order(), ids.as_slice());
        for id in ids {
            assert_eq!(manager.classify(id), Some(ClientState::Active));
        }
        assert_eq!(manager.name_of(2), Some("bob"));
    }

    #[test]
    fn test_promote_rejects_taken_name() {
        let (mut manager, _) = manager_with(&["alice"]);
        let id = manager.admit(test_addr(), MockStream::default());

        assert_eq!(
            manager.promote(id, "alice"),
            Err(NameError::Taken("alice".to_string()))
        );
        assert_eq!(manager.classify(id), Some(ClientState::Pending));
        assert_eq!(manager.name_of(id), Some(""));

        // Exact match only.
        assert!(manager.promote(id, "Alice").is_ok());
        assert_eq!(manager.active_order().len(), 2);
    }

    #[test]
    fn test_pending_names_do_not_reserve() {
        let mut manager: ClientManager<MockStream> = ClientManager::new(64);
        let first = manager.admit(test_addr(), MockStream::default());
        let second = manager.admit(test_addr(), MockStream::default());

        // A pending client has no name yet, so an empty string never collides
        // and the first valid claim wins.
        assert!(manager.promote(second, "dave").is_ok());
        assert!(manager.promote(first, "dave").is_err());
    }

    #[test]
    fn test_promote_validates_name() {
        let mut manager: ClientManager<MockStream> = ClientManager::new(64);
        let id = manager.admit(test_addr(), MockStream::default());

        assert_eq!(manager.promote(id, ""), Err(NameError::Empty));
        assert_eq!(manager.promote(id, "two words"), Err(NameError::Malformed));
        assert_eq!(manager.promote(id, "tab\there"), Err(NameError::Malformed));
        assert!(matches!(
            manager.promote(id, &"x".repeat(MAX_NAME + 1)),
            Err(NameError::TooLong { .. })
        ));
        assert!(manager.promote(id, &"x".repeat(MAX_NAME)).is_ok());
    }

    #[test]
    fn test_promote_twice_is_noop() {
        let (mut manager, ids) = manager_with(&["alice"]);
        assert!(manager.promote(ids[0], "other").is_ok());
        assert_eq!(manager.name_of(ids[0]), Some("alice"));
        assert_eq!(manager.active_order(), &[ids[0]]);
    }

    #[test]
    fn test_remove_from_either_state() {
        let (mut manager, ids) = manager_with(&["alice", "bob"]);
        let pending = manager.admit(test_addr(), MockStream::default());

        assert!(manager.remove(pending).is_some());
        assert_eq!(manager.classify(pending), None);

        let removed = manager.remove(ids[0]).unwrap();
        assert_eq!(removed.name(), "alice");
        assert_eq!(manager.active_order(), &[ids[1]]);
        assert!(!manager.is_name_taken("alice"));

        assert!(manager.remove(ids[0]).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_send_writes_to_stream() {
        let (mut manager, ids) = manager_with(&["alice"]);
        let client = manager.get_mut(ids[0]).unwrap();

        client.send("hello\r\n").unwrap();
        assert_eq!(client.stream_mut().output, b"hello\r\n");
        assert!(!client.has_pending_output());
    }

    #[test]
    fn test_send_failure_marks_disconnected() {
        let (mut manager, ids) = manager_with(&["alice", "bob"]);
        manager.get_mut(ids[1]).unwrap().stream_mut().fail_writes = true;

        assert!(manager.get_mut(ids[1]).unwrap().send("x").is_err());
        assert!(!manager.get(ids[1]).unwrap().is_connected());
        assert_eq!(manager.disconnected(), vec![ids[1]]);

        // Further sends are refused without touching the socket.
        let err = manager.get_mut(ids[1]).unwrap().send("y").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_partial_write_is_queued_then_flushed() {
        let (mut manager, ids) = manager_with(&["alice"]);
        let client = manager.get_mut(ids[0]).unwrap();
        client.stream_mut().write_limit = Some(3);

        client.send("abcdef").unwrap();
        assert_eq!(client.stream_mut().output, b"abc");
        assert!(client.has_pending_output());

        client.stream_mut().write_limit = None;
        client.flush().unwrap();
        assert_eq!(client.stream_mut().output, b"abcdef");
        assert!(!client.has_pending_output());
    }

    #[test]
    fn test_outbox_overflow_disconnects() {
        let (mut manager, ids) = manager_with(&["alice"]);
        let client = manager.get_mut(ids[0]).unwrap();
        client.stream_mut().write_limit = Some(0);

        let big = "x".repeat(MAX_OUTBOX);
        client.send(&big).unwrap();
        assert!(client.send("more").is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_receive_frames_lines() {
        let mut client = Client::new(1, test_addr(), MockStream::default(), 64);
        client.stream_mut().input.push_back(b"ali".to_vec());
        client.stream_mut().input.push_back(b"ce\r\nc\r".to_vec());
        client.stream_mut().input.push_back(b"\n".to_vec());

        assert_eq!(client.receive().unwrap(), Received::Frames(vec![]));
        assert_eq!(
            client.receive().unwrap(),
            Received::Frames(vec![Ok("alice".to_string())])
        );
        assert_eq!(
            client.receive().unwrap(),
            Received::Frames(vec![Ok("c".to_string())])
        );
        assert_eq!(client.receive().unwrap(), Received::WouldBlock);
    }

    #[test]
    fn test_receive_reports_close() {
        let mut client = Client::new(1, test_addr(), MockStream::default(), 64);
        client.stream_mut().input.push_back(Vec::new());
        assert_eq!(client.receive().unwrap(), Received::Closed);
    }

    #[test]
    fn test_receive_overflow() {
        let mut client = Client::new(1, test_addr(), MockStream::default(), 8);
        client.stream_mut().input.push_back(b"abcdefghijkl".to_vec());

        match client.receive().unwrap() {
            Received::Frames(frames) => {
                assert_eq!(frames.len(), 1);
                assert!(frames[0].is_err());
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }
}
