//! Turn-based word guessing rules.
//!
//! A [`Round`] is one secret word and everything guessed against it. The
//! [`Game`] wraps the current round together with the turn pointer, which
//! refers to a connection by id and is always revalidated against the
//! active join order passed in by the caller. The game never owns
//! connections.

use crate::client_manager::ClientId;
use crate::error::GuessError;
use log::{debug, info};
use shared::PLACEHOLDER;

const ALPHABET: usize = 26;

/// Where a round stands after the latest guess
///
/// `Won` and `Lost` are terminal: the server announces the result and
/// replaces the round with a fresh word straight away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Letters still hidden and guesses left
    InProgress,
    /// Every letter revealed
    Won,
    /// Out of guesses with letters still hidden
    Lost,
}

/// One secret word and the progress made on it.
#[derive(Debug, Clone)]
pub struct Round {
    word: String,
    reveal: String,
    guessed: [bool; ALPHABET],
    guesses_left: u32,
}

impl Round {
    /// Creates a round for `word` with nothing revealed
    ///
    /// The reveal string starts as one placeholder per character of the word
    /// and keeps that length for the whole round.
    pub fn new(word: String, max_guesses: u32) -> Self {
        let reveal = word.chars().map(|_| PLACEHOLDER).collect();
        Self {
            word,
            reveal,
            guessed: [false; ALPHABET],
            guesses_left: max_guesses,
        }
    }

    /// The secret word. Only shown to players once the round is lost.
    pub fn word(&self) -> &str {
        &self.word
    }

    /// The word with unfound letters replaced by the placeholder
    pub fn reveal(&self) -> &str {
        &self.reveal
    }

    /// Misses still allowed before the round is lost
    pub fn guesses_left(&self) -> u32 {
        self.guesses_left
    }

    pub fn is_guessed(&self, letter: char) -> bool {
        letter_index(letter).is_some_and(|i| self.guessed[i])
    }

    /// Letters tried so far, alphabetical, space separated.
    pub fn guessed_letters(&self) -> String {
        ('a'..='z')
            .filter(|&c| self.is_guessed(c))
            .map(String::from)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Turns raw client input into a guessable letter without touching state.
    pub fn parse_guess(&self, input: &str) -> Result<char, GuessError> {
        let mut chars = input.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => c,
            _ => return Err(GuessError::NotALetter(input.to_string())),
        };

        if self.is_guessed(letter) {
            return Err(GuessError::AlreadyGuessed(letter));
        }
        Ok(letter)
    }

    /// Reveals every occurrence of `letter` and returns how many there were.
    /// A miss costs one guess.
    pub fn guess(&mut self, letter: char) -> Result<usize, GuessError> {
        let index = letter_index(letter).ok_or_else(|| GuessError::NotALetter(letter.to_string()))?;
        if self.guessed[index] {
            return Err(GuessError::AlreadyGuessed(letter));
        }
        self.guessed[index] = true;

        let hits = self.word.chars().filter(|&c| c == letter).count();
        if hits == 0 {
            self.guesses_left = self.guesses_left.saturating_sub(1);
        } else {
            self.reveal = self
                .word
                .chars()
                .zip(self.reveal.chars())
                .map(|(w, r)| if w == letter { w } else { r })
                .collect();
        }
        Ok(hits)
    }

    /// Computes the round's state from the reveal and the guess counter
    ///
    /// A fully revealed word counts as won even if the last guess also
    /// exhausted the counter.
    pub fn state(&self) -> RoundState {
        if !self.reveal.contains(PLACEHOLDER) {
            RoundState::Won
        } else if self.guesses_left == 0 {
            RoundState::Lost
        } else {
            RoundState::InProgress
        }
    }
}

fn letter_index(letter: char) -> Option<usize> {
    letter
        .is_ascii_lowercase()
        .then(|| (letter as u8 - b'a') as usize)
}

/// Result of an accepted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    /// Connection that made the guess
    pub guesser: ClientId,
    /// The letter guessed
    pub letter: char,
    /// Occurrences revealed; zero is a miss
    pub hits: usize,
    /// Round state right after the guess
    pub state: RoundState,
}

/// The shared game: current round plus whose turn it is.
#[derive(Debug)]
pub struct Game {
    round: Round,
    turn: Option<ClientId>,
    max_guesses: u32,
}

impl Game {
    /// Starts the first round with `word`.
    ///
    /// Every round allows at least one miss: a `max_guesses` of zero would
    /// open each round already lost, so it is raised to one.
    pub fn new(word: String, max_guesses: u32) -> Self {
        debug!("First word is {}", word);
        let max_guesses = max_guesses.max(1);
        Self {
            round: Round::new(word, max_guesses),
            turn: None,
            max_guesses,
        }
    }

    /// The round currently being played
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Connection allowed to guess, or `None` while nobody is playing
    pub fn turn(&self) -> Option<ClientId> {
        self.turn
    }

    pub fn holds_turn(&self, id: ClientId) -> bool {
        self.turn == Some(id)
    }

    /// Hands the turn to `id` if nobody holds it, i.e. the first player to
    /// join an empty game starts guessing.
    pub fn seat(&mut self, id: ClientId) {
        if self.turn.is_none() {
            self.turn = Some(id);
        }
    }

    /// Applies a guess from `id`.
    ///
    /// Rejections leave the round and the turn untouched. A hit keeps the
    /// turn with the guesser; a miss passes it along `order`.
    pub fn apply_guess(
        &mut self,
        id: ClientId,
        input: &str,
        order: &[ClientId],
    ) -> Result<GuessOutcome, GuessError> {
        if !self.holds_turn(id) {
            return Err(GuessError::NotYourTurn);
        }

        let letter = self.round.parse_guess(input)?;
        let hits = self.round.guess(letter)?;
        if hits == 0 {
            self.advance_turn(order);
        }

        Ok(GuessOutcome {
            guesser: id,
            letter,
            hits,
            state: self.evaluate(),
        })
    }

    /// Evaluates the current round
    ///
    /// Pure: derived from the reveal and the remaining guesses, so it can be
    /// called at any time without side effects.
    pub fn evaluate(&self) -> RoundState {
        self.round.state()
    }

    /// Moves the turn to the entry after the current holder in `order`,
    /// wrapping to the front. A holder missing from `order` restarts at the
    /// front; an empty `order` clears the turn.
    pub fn advance_turn(&mut self, order: &[ClientId]) {
        let next = match self.turn.and_then(|t| order.iter().position(|&id| id == t)) {
            Some(pos) => order.get((pos + 1) % order.len()).copied(),
            None => order.first().copied(),
        };
        self.turn = next;
    }

    /// Releases the turn held by a departing connection. Must run while `id`
    /// is still in `order`, so the successor is computed from its position.
    pub fn vacate(&mut self, id: ClientId, order: &[ClientId]) {
        if !self.holds_turn(id) {
            return;
        }
        self.advance_turn(order);
        if self.turn == Some(id) {
            // It was the only player.
            self.turn = None;
        }
    }

    /// Replaces the finished round. The turn pointer carries over.
    pub fn start_round(&mut self, word: String) {
        info!("Starting a new round ({} letters)", word.len());
        debug!("New word is {}", word);
        self.round = Round::new(word, self.max_guesses);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reveal_matches_word(round: &Round) -> bool {
        round.reveal().len() == round.word().len()
            && round
                .reveal()
                .chars()
                .zip(round.word().chars())
                .all(|(r, w)| r == PLACEHOLDER || r == w)
    }

    #[test]
    fn test_new_round_is_hidden() {
        let round = Round::new("cat".to_string(), 4);
        assert_eq!(round.reveal(), "---");
        assert_eq!(round.guesses_left(), 4);
        assert_eq!(round.state(), RoundState::InProgress);
        assert_eq!(round.guessed_letters(), "");
    }

    #[test]
    fn test_guess_reveals_every_occurrence() {
        let mut round = Round::new("banana".to_string(), 4);
        assert_eq!(round.guess('a'), Ok(3));
        assert_eq!(round.reveal(), "-a-a-a");
        assert_eq!(round.guesses_left(), 4);
    }

    #[test]
    fn test_miss_costs_a_guess() {
        let mut round = Round::new("cat".to_string(), 4);
        assert_eq!(round.guess('z'), Ok(0));
        assert_eq!(round.reveal(), "---");
        assert_eq!(round.guesses_left(), 3);
    }

    #[test]
    fn test_repeat_guess_is_rejected_without_mutation() {
        let mut round = Round::new("cat".to_string(), 4);
        round.guess('x').unwrap();
        round.guess('c').unwrap();

        assert_eq!(round.guess('x'), Err(GuessError::AlreadyGuessed('x')));
        assert_eq!(round.guess('c'), Err(GuessError::AlreadyGuessed('c')));
        assert_eq!(round.guesses_left(), 3);
        assert_eq!(round.reveal(), "c--");
    }

    #[test]
    fn test_parse_guess() {
        let mut round = Round::new("cat".to_string(), 4);
        assert_eq!(round.parse_guess("c"), Ok('c'));
        assert!(matches!(round.parse_guess(""), Err(GuessError::NotALetter(_))));
        assert!(matches!(round.parse_guess("ca"), Err(GuessError::NotALetter(_))));
        assert!(matches!(round.parse_guess("C"), Err(GuessError::NotALetter(_))));
        assert!(matches!(round.parse_guess("1"), Err(GuessError::NotALetter(_))));
        assert!(matches!(round.parse_guess("é"), Err(GuessError::NotALetter(_))));

        round.guess('c').unwrap();
        assert_eq!(round.parse_guess("c"), Err(GuessError::AlreadyGuessed('c')));
    }

    #[test]
    fn test_win_and_loss() {
        let mut won = Round::new("aa".to_string(), 1);
        won.guess('a').unwrap();
        assert_eq!(won.state(), RoundState::Won);

        let mut lost = Round::new("aa".to_string(), 2);
        lost.guess('b').unwrap();
        assert_eq!(lost.state(), RoundState::InProgress);
        lost.guess('c').unwrap();
        assert_eq!(lost.state(), RoundState::Lost);
        assert_eq!(lost.guesses_left(), 0);
    }

    #[test]
    fn test_reveal_invariant_holds_through_a_whole_alphabet() {
        let mut round = Round::new("quizzical".to_string(), 26);
        for letter in ('a'..='z').rev() {
            round.guess(letter).unwrap();
            assert!(reveal_matches_word(&round));
        }
        assert_eq!(round.reveal(), "quizzical");
        assert_eq!(round.guessed_letters().len(), 26 * 2 - 1);
    }

    #[test]
    fn test_guessed_letters_are_sorted() {
        let mut round = Round::new("cat".to_string(), 4);
        round.guess('t').unwrap();
        round.guess('b').unwrap();
        round.guess('a').unwrap();
        assert_eq!(round.guessed_letters(), "a b t");
    }

    #[test]
    fn test_cat_scenario() {
        let order = [1, 2];
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);
        game.seat(2);
        assert_eq!(game.turn(), Some(1));

        let hit = game.apply_guess(1, "c", &order).unwrap();
        assert_eq!(hit.hits, 1);
        assert_eq!(game.round().reveal(), "c--");
        assert_eq!(game.round().guesses_left(), 4);
        assert_eq!(game.turn(), Some(1));

        let miss = game.apply_guess(1, "x", &order).unwrap();
        assert_eq!(miss.hits, 0);
        assert_eq!(miss.state, RoundState::InProgress);
        assert_eq!(game.round().reveal(), "c--");
        assert_eq!(game.round().guesses_left(), 3);
        assert_eq!(game.turn(), Some(2));
    }

    #[test]
    fn test_out_of_turn_guess_is_rejected() {
        let order = [1, 2];
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);

        assert_eq!(
            game.apply_guess(2, "c", &order),
            Err(GuessError::NotYourTurn)
        );
        assert_eq!(game.round().reveal(), "---");
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_invalid_guess_keeps_turn() {
        let order = [1, 2];
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);

        assert!(game.apply_guess(1, "xy", &order).is_err());
        assert_eq!(game.turn(), Some(1));
        assert_eq!(game.round().guesses_left(), 4);
    }

    #[test]
    fn test_advance_turn_wraps() {
        let order = [3, 5, 9];
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(3);

        let mut seen = Vec::new();
        for _ in 0..4 {
            game.advance_turn(&order);
            seen.push(game.turn().unwrap());
        }
        assert_eq!(seen, vec![5, 9, 3, 5]);
    }

    #[test]
    fn test_advance_turn_with_no_players() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);
        game.advance_turn(&[]);
        assert_eq!(game.turn(), None);
    }

    #[test]
    fn test_advance_turn_recovers_unknown_holder() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(42);
        game.advance_turn(&[1, 2]);
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_vacate_passes_turn_to_next() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);
        game.vacate(1, &[1, 2, 3]);
        assert_eq!(game.turn(), Some(2));

        // Removal done by the registry; cycle over who is left.
        game.advance_turn(&[2, 3]);
        assert_eq!(game.turn(), Some(3));
        game.advance_turn(&[2, 3]);
        assert_eq!(game.turn(), Some(2));
    }

    #[test]
    fn test_vacate_last_in_order_wraps() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(3);
        game.vacate(3, &[1, 2, 3]);
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_vacate_only_player_clears_turn() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(7);
        game.vacate(7, &[7]);
        assert_eq!(game.turn(), None);

        game.seat(8);
        assert_eq!(game.turn(), Some(8));
    }

    #[test]
    fn test_vacate_by_non_holder_is_noop() {
        let mut game = Game::new("cat".to_string(), 4);
        game.seat(1);
        game.vacate(2, &[1, 2]);
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_loss_then_new_round() {
        let order = [1];
        let mut game = Game::new("cat".to_string(), 2);
        game.seat(1);

        game.apply_guess(1, "x", &order).unwrap();
        let last = game.apply_guess(1, "y", &order).unwrap();
        assert_eq!(last.state, RoundState::Lost);

        game.start_round("dog".to_string());
        assert_eq!(game.evaluate(), RoundState::InProgress);
        assert_eq!(game.round().guesses_left(), 2);
        assert_eq!(game.round().reveal(), "---");
        assert_eq!(game.round().guessed_letters(), "");
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_winning_guess_reports_won() {
        let order = [1];
        let mut game = Game::new("aa".to_string(), 4);
        game.seat(1);
        let outcome = game.apply_guess(1, "a", &order).unwrap();
        assert_eq!(outcome.state, RoundState::Won);
        assert_eq!(game.turn(), Some(1));
    }

    #[test]
    fn test_zero_guesses_still_starts_in_progress() {
        let order = [1];
        let mut game = Game::new("cat".to_string(), 0);
        assert_eq!(game.evaluate(), RoundState::InProgress);
        assert_eq!(game.round().guesses_left(), 1);

        game.seat(1);
        let hit = game.apply_guess(1, "c", &order).unwrap();
        assert_eq!(hit.state, RoundState::InProgress);

        game.start_round("dog".to_string());
        assert_eq!(game.evaluate(), RoundState::InProgress);
        assert_eq!(game.round().guesses_left(), 1);
    }
}
