pub mod error;
mod parser;
mod writer;

pub use error::{ReactionSmartsError, ReactionSmilesError};
pub use writer::{to_canonical_reaction_smiles, to_reaction_smarts, to_reaction_smiles};

pub(crate) use parser::{parse_highlight_block, parse_reaction_smiles};
pub(crate) use writer::write_reaction_smiles;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
use crate::smarts::{AtomExpr, BondExpr};

/// Side of the reaction arrow a molecule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reactant,
    Agent,
    Product,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Reactant, Role::Agent, Role::Product];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Reactant => "reactant",
            Role::Agent => "agent",
            Role::Product => "product",
        })
    }
}

/// Address of one molecule inside a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MolId {
    pub role: Role,
    pub index: usize,
}

impl MolId {
    pub fn new(role: Role, index: usize) -> Self {
        Self { role, index }
    }
}

impl fmt::Display for MolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.index)
    }
}

/// Molecules of a reaction grouped by role.
///
/// Queries and targets share this shape:
/// [`QueryReaction`] holds SMARTS templates and [`TargetReaction`] holds
/// fully specified molecules.
#[derive(Debug, Clone, PartialEq)]
pub struct Reaction<A, B> {
    reactants: Vec<Mol<A, B>>,
    agents: Vec<Mol<A, B>>,
    products: Vec<Mol<A, B>>,
}

pub type QueryReaction = Reaction<AtomExpr, BondExpr>;
pub type TargetReaction = Reaction<Atom, Bond>;

impl<A, B> Reaction<A, B> {
    pub fn new(reactants: Vec<Mol<A, B>>, agents: Vec<Mol<A, B>>, products: Vec<Mol<A, B>>) -> Self {
        Self {
            reactants,
            agents,
            products,
        }
    }

    pub fn reactants(&self) -> &[Mol<A, B>] {
        &self.reactants
    }

    pub fn agents(&self) -> &[Mol<A, B>] {
        &self.agents
    }

    pub fn products(&self) -> &[Mol<A, B>] {
        &self.products
    }

    pub fn molecules(&self, role: Role) -> &[Mol<A, B>] {
        match role {
            Role::Reactant => &self.reactants,
            Role::Agent => &self.agents,
            Role::Product => &self.products,
        }
    }

    pub fn molecule(&self, id: MolId) -> Option<&Mol<A, B>> {
        self.molecules(id.role).get(id.index)
    }

    /// Every molecule with its address: reactants, then agents, then products.
    pub fn iter(&self) -> impl Iterator<Item = (MolId, &Mol<A, B>)> + '_ {
        Role::ALL.into_iter().flat_map(move |role| {
            self.molecules(role)
                .iter()
                .enumerate()
                .map(move |(index, mol)| (MolId::new(role, index), mol))
        })
    }

    pub fn molecule_count(&self) -> usize {
        self.reactants.len() + self.agents.len() + self.products.len()
    }

    pub fn atom_count(&self) -> usize {
        self.iter().map(|(_, mol)| mol.atom_count()).sum()
    }
}

impl QueryReaction {
    /// Compiles a reaction SMARTS such as `[C:1][Br]>>[C:1]O`.
    ///
    /// Dot-separated components become separate templates unless grouped in
    /// parentheses, as in `(C.O)>>CO`.
    pub fn from_smarts(s: &str) -> Result<Self, ReactionSmartsError> {
        let rxn = parser::parse_reaction_smarts(s)?;
        tracing::debug!(
            smarts = s.trim(),
            reactants = rxn.reactants.len(),
            agents = rxn.agents.len(),
            products = rxn.products.len(),
            "compiled reaction SMARTS"
        );
        Ok(rxn)
    }
}

impl TargetReaction {
    /// Loads a reaction SMILES with atom maps, e.g.
    /// `[CH3:7][CH3:8]>>[CH3:7][CH3:8]`. Map numbers are kept as written.
    ///
    /// A trailing highlight block (`CO>>CO |ha:0,hb:0|`) is checked and
    /// discarded; see [`crate::HighlightedReaction::from_smiles`] to keep it.
    pub fn from_smiles(s: &str) -> Result<Self, ReactionSmilesError> {
        let (rxn, extension) = parse_reaction_smiles(s)?;
        if let Some(block) = extension {
            parse_highlight_block(block)?;
        }
        tracing::debug!(
            smiles = s.trim(),
            reactants = rxn.reactants.len(),
            agents = rxn.agents.len(),
            products = rxn.products.len(),
            "loaded reaction SMILES"
        );
        Ok(rxn)
    }
}

impl fmt::Display for QueryReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_reaction_smarts(self))
    }
}

impl fmt::Display for TargetReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_reaction_smiles(self))
    }
}
