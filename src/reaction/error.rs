use thiserror::Error;

use crate::smarts::SmartsError;
use crate::smiles::SmilesError;

use super::Role;

/// Error returned when parsing a reaction SMARTS string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactionSmartsError {
    #[error("no '>>' separator found in reaction SMARTS")]
    MissingSeparator,
    #[error("too many '>' separators in reaction SMARTS")]
    TooManySeparators,
    #[error("reaction SMARTS has no reactant templates")]
    EmptyReactants,
    #[error("reaction SMARTS has no product templates")]
    EmptyProducts,
    #[error("invalid {role} template {index}: {source}")]
    InvalidComponent {
        role: Role,
        index: usize,
        #[source]
        source: SmartsError,
    },
}

/// Error returned when parsing a reaction SMILES string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactionSmilesError {
    #[error("no '>>' separator found in reaction SMILES")]
    MissingSeparator,
    #[error("too many '>' separators in reaction SMILES")]
    TooManySeparators,
    #[error("reaction SMILES has no reactants")]
    EmptyReactants,
    #[error("reaction SMILES has no products")]
    EmptyProducts,
    #[error("invalid {role} {index}: {source}")]
    InvalidComponent {
        role: Role,
        index: usize,
        #[source]
        source: SmilesError,
    },
    /// The trailing `|...|` block is malformed or refers to missing atoms.
    #[error("invalid extension block: {reason}")]
    InvalidExtension { reason: String },
}
