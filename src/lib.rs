pub mod atom;
pub mod bond;
pub mod canonical;
pub mod element;
pub mod error;
pub mod graph_ops;
pub mod matcher;
pub mod mol;
pub mod reaction;
pub mod rings;
pub mod smarts;
pub mod smiles;
pub mod substruct;

pub use atom::{Atom, Chirality};
pub use bond::{Bond, BondOrder};
pub use element::Element;
pub use error::{Error, Result};
pub use matcher::{
    has_reaction_match, highlight_reaction_match, AamPolicy, ConfigError, HighlightedReaction,
    MatchOptions, MoleculeCorrespondence, ReactionMatch, ReactionMatcher, TargetAtom, TargetBond,
};
pub use mol::Mol;
pub use reaction::{
    to_canonical_reaction_smiles, to_reaction_smarts, to_reaction_smiles, MolId, QueryReaction,
    Reaction, ReactionSmartsError, ReactionSmilesError, Role, TargetReaction,
};
pub use rings::RingInfo;
pub use smarts::{from_smarts, to_smarts, AtomExpr, BondExpr, MapClass, SmartsError};
pub use smiles::{from_smiles, to_canonical_smiles, to_smiles, SmilesError};
