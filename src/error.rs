use thiserror::Error;

use crate::matcher::ConfigError;
use crate::reaction::{ReactionSmartsError, ReactionSmilesError};
use crate::smarts::SmartsError;
use crate::smiles::SmilesError;

/// Any error the crate can report. "No match" is never an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Smiles(#[from] SmilesError),
    #[error(transparent)]
    Smarts(#[from] SmartsError),
    #[error(transparent)]
    ReactionSmarts(#[from] ReactionSmartsError),
    #[error(transparent)]
    ReactionSmiles(#[from] ReactionSmilesError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
