//! Module dedicated to message flags.
//!
//! Flags are the only mutable attribute of a message the engine
//! synchronizes. They are kept as a bitset whose canonical order
//! matches the alphabetical maildir sort: `D`raft, `F`lagged,
//! `R`eplied, `S`een, `T`rashed. The same letter encoding is used in
//! the sync-state file.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

/// Errors related to flag parsing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse flags {0:?}: unexpected letter {1:?}")]
    ParseFlagsError(String, char),
}

bitflags! {
    /// The set of synchronizable message flags, in canonical order.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct Flags: u8 {
        const DRAFT = 1 << 0;
        const FLAGGED = 1 << 1;
        const ANSWERED = 1 << 2;
        const SEEN = 1 << 3;
        const DELETED = 1 << 4;
    }
}

const LETTERS: [(char, Flags); 5] = [
    ('D', Flags::DRAFT),
    ('F', Flags::FLAGGED),
    ('R', Flags::ANSWERED),
    ('S', Flags::SEEN),
    ('T', Flags::DELETED),
];

impl Flags {
    /// Parses the state-file letter encoding.
    ///
    /// Letters must appear in canonical order; anything else is
    /// treated as corruption.
    pub fn from_letters(s: &str) -> Result<Self, Error> {
        let mut flags = Flags::empty();
        let mut letters = LETTERS.iter();
        'chars: for c in s.chars() {
            for (letter, flag) in letters.by_ref() {
                if *letter == c {
                    flags |= *flag;
                    continue 'chars;
                }
            }
            return Err(Error::ParseFlagsError(s.to_owned(), c));
        }
        Ok(flags)
    }

    /// Formats the state-file letter encoding.
    pub fn to_letters(self) -> String {
        LETTERS
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(letter, _)| letter)
            .collect()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_letters())
    }
}

impl FromStr for Flags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::from_letters(s)
    }
}
