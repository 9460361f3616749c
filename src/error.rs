//! Module dedicated to library errors.
//!
//! Every module owns its error enum; this module aggregates them
//! behind one crate-wide [`Error`] so that callers can `?` across
//! module boundaries, and maps any error to the OR-able outcome
//! codes of a run.

use std::result;

use thiserror::Error;

use crate::sync::report::SyncOutcome;
use crate::{channel, state, sync};

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ChannelError(#[from] channel::Error),
    #[error(transparent)]
    StateError(#[from] state::Error),
    #[error(transparent)]
    SyncError(#[from] sync::Error),
}

impl Error {
    /// The OR-able outcome bits a run terminated with because of
    /// this error.
    pub fn outcome(&self) -> SyncOutcome {
        match self {
            Self::ChannelError(_) | Self::StateError(_) => SyncOutcome::FAIL,
            Self::SyncError(err) => err.outcome(),
        }
    }
}

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;
