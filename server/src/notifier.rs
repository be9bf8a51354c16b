//! Outbound messaging.
//!
//! Delivery is best effort per recipient: a failed write marks that one
//! connection disconnected and the rest still get the message. Nothing here
//! returns an error; the event loop reaps marked connections afterwards.

use crate::client_manager::{ClientId, ClientManager};
use crate::game::{Game, GuessOutcome};
use log::{debug, info};
use shared::ServerMessage;
use std::io::Write;

/// Sends rendered messages to connections in a [`ClientManager`]
///
/// A notifier only borrows the registry for as long as one batch of
/// announcements takes, so the event loop builds a fresh one per batch.
pub struct Notifier<'a, S> {
    clients: &'a mut ClientManager<S>,
}

impl<'a, S: Write> Notifier<'a, S> {
    /// Wraps the registry whose connections will receive messages
    pub fn new(clients: &'a mut ClientManager<S>) -> Self {
        Self { clients }
    }

    /// Sends to one connection, pending or active. Returns whether it is
    /// still connected afterwards.
    pub fn send(&mut self, id: ClientId, message: &ServerMessage<'_>) -> bool {
        self.send_raw(id, &message.to_string())
    }

    fn send_raw(&mut self, id: ClientId, text: &str) -> bool {
        match self.clients.get_mut(id) {
            Some(client) if client.is_connected() => client.send(text).is_ok(),
            _ => false,
        }
    }

    /// Sends `message` to every active connection except `excluded`, then
    /// `for_excluded` (if both are given) to `excluded` alone.
    pub fn broadcast(
        &mut self,
        message: &ServerMessage<'_>,
        excluded: Option<ClientId>,
        for_excluded: Option<&ServerMessage<'_>>,
    ) {
        let text = message.to_string();
        let recipients: Vec<ClientId> = self.clients.active_order().to_vec();
        for id in recipients {
            if Some(id) != excluded {
                self.send_raw(id, &text);
            }
        }

        if let (Some(id), Some(special)) = (excluded, for_excluded) {
            self.send(id, special);
        }
    }

    /// Board state to `to`, or to every active player.
    pub fn announce_board(&mut self, game: &Game, to: Option<ClientId>) {
        let round = game.round();
        let guessed = round.guessed_letters();
        let board = ServerMessage::Board {
            reveal: round.reveal(),
            guesses_left: round.guesses_left(),
            guessed: &guessed,
        };
        match to {
            Some(id) => {
                self.send(id, &board);
            }
            None => self.broadcast(&board, None, None),
        }
    }

    /// Tells the turn holder it is their move and everyone else whose it is.
    ///
    /// Does nothing while the turn is empty, which only happens when no one
    /// is playing.
    pub fn announce_turn(&mut self, game: &Game) {
        let Some(holder) = game.turn() else {
            return;
        };
        let name = self.clients.name_of(holder).unwrap_or_default().to_string();
        debug!("It's {}'s turn", name);
        self.broadcast(
            &ServerMessage::Turn { name: &name },
            Some(holder),
            Some(&ServerMessage::YourTurn),
        );
    }

    /// Confirms an accepted guess
    ///
    /// The guesser gets "You guessed", everyone else learns who guessed what.
    /// A miss is then announced to all active players.
    pub fn announce_guess(&mut self, outcome: &GuessOutcome) {
        let name = self
            .clients
            .name_of(outcome.guesser)
            .unwrap_or_default()
            .to_string();
        self.broadcast(
            &ServerMessage::Guessed {
                name: &name,
                letter: outcome.letter,
            },
            Some(outcome.guesser),
            Some(&ServerMessage::YouGuessed {
                letter: outcome.letter,
            }),
        );

        if outcome.hits == 0 {
            self.broadcast(
                &ServerMessage::NotInWord {
                    letter: outcome.letter,
                },
                None,
                None,
            );
        }
    }

    /// Ends a won round: the winner gets a personal message, the rest get
    /// the winner's name.
    pub fn announce_winner(&mut self, winner: ClientId) {
        let name = self.clients.name_of(winner).unwrap_or_default().to_string();
        info!("Game over! {} won", name);
        self.broadcast(
            &ServerMessage::Winner { name: &name },
            Some(winner),
            Some(&ServerMessage::YouWon),
        );
    }

    /// Ends a lost round and reveals the word to everyone
    pub fn announce_loss(&mut self, word: &str) {
        info!("Game over, nobody found {}", word);
        self.broadcast(&ServerMessage::OutOfGuesses, None, None);
        self.broadcast(&ServerMessage::WordWas { word }, None, None);
    }

    pub fn announce_new_game(&mut self) {
        self.broadcast(&ServerMessage::NewGame, None, None);
    }

    /// Tells every other active player that `id` has joined
    ///
    /// The newcomer gets the board and turn instead; see
    /// [`announce_board`](Self::announce_board).
    pub fn announce_join(&mut self, id: ClientId) {
        let name = self.clients.name_of(id).unwrap_or_default().to_string();
        self.broadcast(&ServerMessage::Joined { name: &name }, Some(id), None);
    }

    /// Exit notice for `name` to every remaining active player.
    pub fn announce_exit(&mut self, name: &str) {
        self.broadcast(&ServerMessage::Exited { name }, None, None);
    }
}
