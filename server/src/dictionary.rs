//! Word source for new rounds.
//!
//! The server only ever asks for "a word"; anything implementing
//! [`WordSource`] can stand in for the file-backed [`Dictionary`].

use crate::error::DictionaryError;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

pub trait WordSource {
    /// Returns a non-empty word made of ASCII lowercase letters.
    fn pick_word(&mut self) -> String;
}

/// An in-memory word list loaded from a word-per-line file.
pub struct Dictionary {
    words: Vec<String>,
    rng: StdRng,
}

impl Dictionary {
    /// Loads every usable line of `path`.
    ///
    /// Lines are trimmed; blank lines are ignored and lines containing
    /// anything but `a-z` are skipped with a warning. A file with no usable
    /// word is an error, since the game cannot start without one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut words = Vec::new();
        let mut skipped = 0;
        for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if is_playable(line) {
                words.push(line.to_string());
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            warn!("Skipped {} unusable lines in {}", skipped, path.display());
        }
        if words.is_empty() {
            return Err(DictionaryError::Empty(path.to_path_buf()));
        }

        info!("Loaded {} words from {}", words.len(), path.display());
        Ok(Self {
            words,
            rng: StdRng::from_entropy(),
        })
    }

    /// Builds a dictionary from a fixed list, dropping unplayable entries.
    /// Returns `None` if nothing is left.
    pub fn from_words<I, S>(words: I, seed: u64) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(Into::into)
            .filter(|w| is_playable(w))
            .collect();

        if words.is_empty() {
            return None;
        }

        Some(Self {
            words,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl WordSource for Dictionary {
    fn pick_word(&mut self) -> String {
        // Construction guarantees at least one word.
        self.words
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default()
    }
}

fn is_playable(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_lowercase())
}
