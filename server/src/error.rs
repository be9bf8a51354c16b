//! Error types for the word game server.
//!
//! Only setup and multiplexer failures ever reach the caller of
//! [`Server::run`](crate::network::Server::run). Per-connection I/O errors are
//! absorbed by disconnecting that connection, and the rejections below are
//! reported back to the offending client as a re-prompt.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),

    #[error("failed to register socket with poller: {0}")]
    Register(#[source] io::Error),

    #[error("max_guesses must be at least 1")]
    NoGuesses,

    #[error(transparent)]
    Dictionary(#[from] DictionaryError),
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("cannot read dictionary {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dictionary {} contains no usable words", .0.display())]
    Empty(PathBuf),
}

/// Why a name was refused. The `Display` text is sent to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("Name must be a single word of printable characters")]
    Malformed,

    #[error("Username already taken")]
    Taken(String),
}

/// Why a guess was refused. The `Display` text is sent to the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuessError {
    #[error("it is not your turn")]
    NotYourTurn,

    #[error("'{0}' is not a single lowercase letter")]
    NotALetter(String),

    #[error("{0} has already been guessed")]
    AlreadyGuessed(char),
}
