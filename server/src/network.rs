//! Server network layer: the single-threaded readiness loop
//!
//! One `mio::Poll` watches the listener and every connection. Each wake-up
//! handles ready sockets in ascending token order; all lines framed from one
//! read are handled, in order, before the next socket is looked at. Nothing
//! blocks outside `Poll::poll`.

use crate::client_manager::{ClientId, ClientManager, ClientState, Received};
use crate::dictionary::WordSource;
use crate::error::{GuessError, ServerError};
use crate::game::{Game, RoundState};
use crate::notifier::Notifier;
use log::{debug, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use shared::{ServerMessage, DEFAULT_PORT, MAX_GUESSES, MAX_LINE};
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(usize::MAX);
const EVENT_CAPACITY: usize = 1024;

/// Runtime settings for a [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Misses allowed per round
    pub max_guesses: u32,
    /// Per-connection ceiling on an unterminated line, in bytes
    pub line_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_guesses: MAX_GUESSES,
            line_capacity: MAX_LINE,
        }
    }
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            warn!("Failed to wake server for shutdown: {}", e);
        }
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// The word game server: listener, connections, and the shared game
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    clients: ClientManager,
    game: Game,
    words: Box<dyn WordSource + Send>,
    shutdown: ShutdownHandle,
    /// Connections currently registered for writable events
    write_interest: HashSet<ClientId>,
}

impl Server {
    /// Binds the listener and picks the first word.
    pub fn bind<W>(config: ServerConfig, mut words: W) -> Result<Self, ServerError>
    where
        W: WordSource + Send + 'static,
    {
        if config.max_guesses == 0 {
            return Err(ServerError::NoGuesses);
        }

        let poll = Poll::new().map_err(ServerError::Poll)?;
        let mut listener = TcpListener::bind(config.addr).map_err(|source| ServerError::Bind {
            addr: config.addr,
            source,
        })?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ServerError::Register)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(ServerError::Register)?;

        match listener.local_addr() {
            Ok(addr) => info!("Server listening on {}", addr),
            Err(_) => info!("Server listening on {}", config.addr),
        }

        let game = Game::new(words.pick_word(), config.max_guesses);

        Ok(Self {
            poll,
            listener,
            clients: ClientManager::new(config.line_capacity),
            game,
            words: Box::new(words),
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                waker: Arc::new(waker),
            },
            write_interest: HashSet::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs until shut down or the poller itself fails. Client failures never
    /// end the loop.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);

        loop {
            if self.shutdown.is_requested() {
                info!("Server shutting down");
                return Ok(());
            }

            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Poll(e));
            }

            let mut ready: Vec<(Token, bool, bool)> = events
                .iter()
                .map(|event| {
                    let readable =
                        event.is_readable() || event.is_read_closed() || event.is_error();
                    (event.token(), readable, event.is_writable())
                })
                .collect();
            ready.sort_by_key(|(token, _, _)| token.0);

            for (token, readable, writable) in ready {
                match token {
                    LISTENER => self.accept_connections(),
                    WAKER => {}
                    Token(id) => {
                        if writable {
                            self.flush_client(id);
                        }
                        if readable {
                            self.read_client(id);
                        }
                    }
                }
                self.reap();
            }

            self.settle();
        }
    }

    /// Accepts until the listener would block. Accept errors only cost the
    /// connection being accepted.
    fn accept_connections(&mut self) {
        loop {
            let (stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    return;
                }
            };

            info!("A new client is connecting from {}", addr);
            let id = self.clients.admit(addr, stream);
            let registered = match self.clients.get_mut(id) {
                Some(client) => self.poll.registry().register(
                    client.stream_mut(),
                    Token(id),
                    Interest::READABLE,
                ),
                None => continue,
            };
            if let Err(e) = registered {
                warn!("Failed to register client {}: {}", id, e);
                self.clients.remove(id);
                continue;
            }

            if !Notifier::new(&mut self.clients).send(id, &ServerMessage::Welcome) {
                warn!("Write of welcome banner to client {} failed", id);
                self.disconnect(id);
            }
        }
    }

    fn flush_client(&mut self, id: ClientId) {
        if let Some(client) = self.clients.get_mut(id) {
            if client.is_connected() && client.flush().is_err() {
                debug!("Client {} failed while flushing queued output", id);
            }
        }
    }

    /// Drains one readable connection, handling each complete line as it is
    /// framed.
    fn read_client(&mut self, id: ClientId) {
        loop {
            let received = match self.clients.get_mut(id) {
                Some(client) if client.is_connected() => client.receive(),
                _ => return,
            };

            let frames = match received {
                Ok(Received::Frames(frames)) => frames,
                Ok(Received::WouldBlock) => return,
                Ok(Received::Closed) => {
                    debug!("Client {} closed the connection", id);
                    self.disconnect(id);
                    return;
                }
                Err(e) => {
                    warn!("Read from client {} failed: {}", id, e);
                    self.disconnect(id);
                    return;
                }
            };

            for frame in frames {
                match frame {
                    Ok(line) => {
                        debug!("[{}] Found line {:?}", id, line);
                        self.handle_line(id, &line);
                    }
                    Err(e) => {
                        warn!("Client {} sent a bad line: {}", id, e);
                        Notifier::new(&mut self.clients).send(id, &ServerMessage::LineTooLong);
                        self.disconnect(id);
                        return;
                    }
                }

                self.reap();
                if self.clients.get(id).is_none() {
                    return;
                }
            }
        }
    }

    fn handle_line(&mut self, id: ClientId, line: &str) {
        match self.clients.classify(id) {
            Some(ClientState::Pending) => self.handle_name(id, line),
            Some(ClientState::Active) => self.handle_guess(id, line),
            None => {}
        }
    }

    fn handle_name(&mut self, id: ClientId, name: &str) {
        if let Err(reason) = self.clients.promote(id, name) {
            info!("Client {} cannot use name {:?}: {}", id, name, reason);
            let reason = reason.to_string();
            Notifier::new(&mut self.clients)
                .send(id, &ServerMessage::NameRejected { reason: &reason });
            return;
        }

        info!("{} has just joined", name);
        self.game.seat(id);

        let mut notifier = Notifier::new(&mut self.clients);
        notifier.announce_join(id);
        notifier.announce_board(&self.game, Some(id));
        notifier.announce_turn(&self.game);
    }

    fn handle_guess(&mut self, id: ClientId, input: &str) {
        let order = self.clients.active_order().to_vec();
        let name = self.clients.name_of(id).unwrap_or_default().to_string();

        let outcome = match self.game.apply_guess(id, input, &order) {
            Ok(outcome) => outcome,
            Err(GuessError::NotYourTurn) => {
                info!("{} tried to guess out of turn", name);
                Notifier::new(&mut self.clients).send(id, &ServerMessage::NotYourTurn);
                return;
            }
            Err(reason) => {
                info!("{} made an invalid guess, trying again: {}", name, reason);
                let reason = reason.to_string();
                Notifier::new(&mut self.clients)
                    .send(id, &ServerMessage::InvalidGuess { reason: &reason });
                return;
            }
        };

        info!(
            "{} guessed {} ({} hits, {} guesses left)",
            name,
            outcome.letter,
            outcome.hits,
            self.game.round().guesses_left()
        );

        let mut notifier = Notifier::new(&mut self.clients);
        notifier.announce_guess(&outcome);

        let finished = match outcome.state {
            RoundState::InProgress => false,
            RoundState::Won => {
                notifier.announce_winner(outcome.guesser);
                true
            }
            RoundState::Lost => {
                notifier.announce_loss(self.game.round().word());
                true
            }
        };

        if finished {
            notifier.announce_new_game();
            self.game.start_round(self.words.pick_word());
        }

        notifier.announce_board(&self.game, None);
        notifier.announce_turn(&self.game);
    }

    /// Removes a connection now. The turn moves on first if it held it, and
    /// remaining players hear about an active player leaving.
    fn disconnect(&mut self, id: ClientId) {
        self.game.vacate(id, self.clients.active_order());

        let Some(mut client) = self.clients.remove(id) else {
            return;
        };
        self.write_interest.remove(&id);
        if let Err(e) = self.poll.registry().deregister(client.stream_mut()) {
            debug!("Deregistering client {} failed: {}", id, e);
        }

        if client.state() == ClientState::Active {
            info!("{} has just exited", client.name());
            let mut notifier = Notifier::new(&mut self.clients);
            notifier.announce_exit(client.name());
            notifier.announce_turn(&self.game);
        }
        // Dropping the client closes its socket.
    }

    /// Removes every connection a failed write has flagged. Each removal
    /// broadcasts, which may flag more, so this runs until none are left.
    fn reap(&mut self) {
        loop {
            let dead = self.clients.disconnected();
            if dead.is_empty() {
                return;
            }
            for id in dead {
                self.disconnect(id);
            }
        }
    }

    /// Brings writable interest in line with queued output.
    fn settle(&mut self) {
        loop {
            self.reap();
            if !self.sync_interest() {
                return;
            }
        }
    }

    /// Returns true if a reregistration failure flagged a connection.
    fn sync_interest(&mut self) -> bool {
        let registry = self.poll.registry();
        let mut flagged = false;

        for client in self.clients.clients_mut() {
            let wants_write = client.has_pending_output();
            if wants_write == self.write_interest.contains(&client.id) {
                continue;
            }

            let interest = if wants_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            let token = Token(client.id);
            match registry.reregister(client.stream_mut(), token, interest) {
                Ok(()) if wants_write => {
                    self.write_interest.insert(client.id);
                }
                Ok(()) => {
                    self.write_interest.remove(&client.id);
                }
                Err(e) => {
                    warn!("Failed to update interest for client {}: {}", client.id, e);
                    client.mark_disconnected();
                    flagged = true;
                }
            }
        }
        flagged
    }
}
