use std::fmt;

pub mod framer;

pub use framer::{FrameError, Frames, LineFramer};

/// Every message in either direction ends with this two-byte sequence.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";
/// Per-connection ceiling on buffered inbound bytes, terminator included.
pub const MAX_LINE: usize = 256;
pub const MAX_NAME: usize = 30;
pub const MAX_GUESSES: u32 = 4;
pub const DEFAULT_PORT: u16 = 57715;
/// Shown in the reveal string for letters nobody has found yet.
pub const PLACEHOLDER: char = '-';

/// Everything the server ever says to a client.
///
/// The text of each variant is the contract; rendering goes through
/// `Display` so callers can `to_string()` once and broadcast the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage<'a> {
    Welcome,
    NameRejected { reason: &'a str },
    Board {
        reveal: &'a str,
        guesses_left: u32,
        guessed: &'a str,
    },
    YourTurn,
    Turn { name: &'a str },
    NotYourTurn,
    InvalidGuess { reason: &'a str },
    YouGuessed { letter: char },
    Guessed { name: &'a str, letter: char },
    NotInWord { letter: char },
    YouWon,
    Winner { name: &'a str },
    OutOfGuesses,
    WordWas { word: &'a str },
    NewGame,
    Joined { name: &'a str },
    Exited { name: &'a str },
    LineTooLong,
}

impl fmt::Display for ServerMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => write!(f, "Welcome to our word game. What is your name?\r\n"),
            Self::NameRejected { reason } => write!(f, "{}. Try again:\r\n", reason),
            Self::Board {
                reveal,
                guesses_left,
                guessed,
            } => write!(
                f,
                "***************\r\n\
                 Word to guess: {}\r\n\
                 Guesses remaining: {}\r\n\
                 Letters guessed: {}\r\n\
                 ***************\r\n",
                reveal, guesses_left, guessed
            ),
            Self::YourTurn => write!(f, "It's your turn!\r\nEnter your guess:\r\n"),
            Self::Turn { name } => write!(f, "It's {}'s turn!\r\n", name),
            Self::NotYourTurn => write!(f, "It's not your turn to guess.\r\n"),
            Self::InvalidGuess { reason } => {
                write!(f, "Your guess is invalid: {}!\r\nYour guess again:\r\n", reason)
            }
            Self::YouGuessed { letter } => write!(f, "You guessed {}!\r\n", letter),
            Self::Guessed { name, letter } => write!(f, "{} guessed {}!\r\n", name, letter),
            Self::NotInWord { letter } => {
                write!(f, "The letter {} is not in the word!\r\n", letter)
            }
            Self::YouWon => write!(f, "Game over! You won!\r\n\r\n"),
            Self::Winner { name } => write!(f, "Game over! {} won!\r\n\r\n", name),
            Self::OutOfGuesses => write!(f, "Game over, no more guesses!\r\n"),
            Self::WordWas { word } => write!(f, "The word was {}.\r\n\r\n", word),
            Self::NewGame => write!(f, "\r\nLet's start a new game\r\n"),
            Self::Joined { name } => write!(f, "\r\n{} has just joined!\r\n", name),
            Self::Exited { name } => write!(f, "\r\n{} has just exited!\r\n", name),
            Self::LineTooLong => write!(f, "Line too long, closing connection.\r\n"),
        }
    }
}
