use std::collections::BTreeSet;
use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::reaction::{
    parse_highlight_block, parse_reaction_smiles, write_reaction_smiles, MolId,
    ReactionSmilesError, TargetReaction,
};

use super::search::{Embedding, Placement};

/// An atom of a target reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetAtom {
    pub mol: MolId,
    pub atom: NodeIndex,
}

/// A bond of a target reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetBond {
    pub mol: MolId,
    pub bond: EdgeIndex,
}

/// Index table for one query molecule: entry `i` is the target index that
/// query atom (or bond) `i` matched, or `None` for an implicit hydrogen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoleculeCorrespondence {
    pub query: MolId,
    pub target: MolId,
    pub atoms: Vec<Option<usize>>,
    pub bonds: Vec<Option<usize>>,
}

/// A witnessed embedding of a query reaction into a target reaction.
///
/// Borrows the target; lookups are keyed by query molecule and query atom
/// or bond index.
#[derive(Debug, Clone)]
pub struct ReactionMatch<'t> {
    target: &'t TargetReaction,
    placements: Vec<Placement>,
}

impl<'t> ReactionMatch<'t> {
    pub(crate) fn new(target: &'t TargetReaction, placements: Embedding) -> Self {
        Self { target, placements }
    }

    pub fn target(&self) -> &'t TargetReaction {
        self.target
    }

    fn placement(&self, query: MolId) -> Option<&Placement> {
        self.placements.iter().find(|p| p.query == query)
    }

    /// Target molecule that query molecule `query` was placed in.
    pub fn target_molecule(&self, query: MolId) -> Option<MolId> {
        self.placement(query).map(|p| p.target)
    }

    pub fn map_atom(&self, query: MolId, atom: NodeIndex) -> Option<TargetAtom> {
        let placement = self.placement(query)?;
        let target = (*placement.atoms.get(atom.index())?)?;
        Some(TargetAtom {
            mol: placement.target,
            atom: target,
        })
    }

    pub fn map_bond(&self, query: MolId, bond: EdgeIndex) -> Option<TargetBond> {
        let placement = self.placement(query)?;
        let target = (*placement.bonds.get(bond.index())?)?;
        Some(TargetBond {
            mol: placement.target,
            bond: target,
        })
    }

    /// Every mapped target atom, in query order.
    pub fn atoms(&self) -> impl Iterator<Item = TargetAtom> + '_ {
        self.placements.iter().flat_map(|p| {
            p.atoms.iter().flatten().map(move |&atom| TargetAtom {
                mol: p.target,
                atom,
            })
        })
    }

    pub fn bonds(&self) -> impl Iterator<Item = TargetBond> + '_ {
        self.placements.iter().flat_map(|p| {
            p.bonds.iter().flatten().map(move |&bond| TargetBond {
                mol: p.target,
                bond,
            })
        })
    }

    pub fn correspondence(&self) -> Vec<MoleculeCorrespondence> {
        self.placements
            .iter()
            .map(|p| MoleculeCorrespondence {
                query: p.query,
                target: p.target,
                atoms: p.atoms.iter().map(|a| a.map(NodeIndex::index)).collect(),
                bonds: p.bonds.iter().map(|b| b.map(EdgeIndex::index)).collect(),
            })
            .collect()
    }

    /// A copy of the whole target with the matched atoms and bonds marked.
    pub fn highlighted_target(&self) -> HighlightedReaction {
        HighlightedReaction::new(self.target.clone(), self.atoms(), self.bonds())
    }
}

/// A target reaction with a subset of its atoms and bonds highlighted.
///
/// Written as canonical reaction SMILES followed by an `|ha:...,hb:...|`
/// block listing highlighted atoms by order of appearance and bonds by
/// order of completion, counted across the whole reaction.
///
/// ```
/// use rxnmatch::HighlightedReaction;
///
/// let h = HighlightedReaction::from_smiles("OC>>OC[H] |ha:0,1|").unwrap();
/// assert_eq!(h.highlighted_atoms().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightedReaction {
    reaction: TargetReaction,
    atoms: BTreeSet<TargetAtom>,
    bonds: BTreeSet<TargetBond>,
}

impl HighlightedReaction {
    pub fn new(
        reaction: TargetReaction,
        atoms: impl IntoIterator<Item = TargetAtom>,
        bonds: impl IntoIterator<Item = TargetBond>,
    ) -> Self {
        Self {
            reaction,
            atoms: atoms.into_iter().collect(),
            bonds: bonds.into_iter().collect(),
        }
    }

    pub fn reaction(&self) -> &TargetReaction {
        &self.reaction
    }

    pub fn is_atom_highlighted(&self, atom: TargetAtom) -> bool {
        self.atoms.contains(&atom)
    }

    pub fn is_bond_highlighted(&self, bond: TargetBond) -> bool {
        self.bonds.contains(&bond)
    }

    pub fn highlighted_atoms(&self) -> impl Iterator<Item = TargetAtom> + '_ {
        self.atoms.iter().copied()
    }

    pub fn highlighted_bonds(&self) -> impl Iterator<Item = TargetBond> + '_ {
        self.bonds.iter().copied()
    }

    pub fn smiles(&self) -> String {
        let (mut text, outputs) = write_reaction_smiles(&self.reaction, true);

        let mut ha = Vec::new();
        let mut hb = Vec::new();
        let mut atom_offset = 0;
        let mut bond_offset = 0;
        for (mol, out) in &outputs {
            for (pos, &atom) in out.atom_order.iter().enumerate() {
                if self.atoms.contains(&TargetAtom { mol: *mol, atom }) {
                    ha.push(atom_offset + pos);
                }
            }
            for (pos, &bond) in out.bond_order.iter().enumerate() {
                if self.bonds.contains(&TargetBond { mol: *mol, bond }) {
                    hb.push(bond_offset + pos);
                }
            }
            atom_offset += out.atom_order.len();
            bond_offset += out.bond_order.len();
        }

        let mut fields = Vec::new();
        if !ha.is_empty() {
            fields.push(format!("ha:{}", join_indices(&ha)));
        }
        if !hb.is_empty() {
            fields.push(format!("hb:{}", join_indices(&hb)));
        }
        if !fields.is_empty() {
            text.push_str(" |");
            text.push_str(&fields.join(","));
            text.push('|');
        }
        text
    }

    /// Reads reaction SMILES with an optional highlight block, as written by
    /// [`HighlightedReaction::smiles`].
    pub fn from_smiles(s: &str) -> Result<Self, ReactionSmilesError> {
        let (reaction, block) = parse_reaction_smiles(s)?;
        let (ha, hb) = match block {
            Some(block) => parse_highlight_block(block)?,
            None => (Vec::new(), Vec::new()),
        };

        // Reading order is index order for both atoms and bonds.
        let mut atom_slots = Vec::new();
        let mut bond_slots = Vec::new();
        for (id, mol) in reaction.iter() {
            atom_slots.extend(mol.atoms().map(|atom| TargetAtom { mol: id, atom }));
            bond_slots.extend(mol.bonds().map(|bond| TargetBond { mol: id, bond }));
        }

        let atoms = ha
            .into_iter()
            .map(|i| {
                atom_slots.get(i).copied().ok_or_else(|| ReactionSmilesError::InvalidExtension {
                    reason: format!("highlighted atom {i} out of range"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let bonds = hb
            .into_iter()
            .map(|i| {
                bond_slots.get(i).copied().ok_or_else(|| ReactionSmilesError::InvalidExtension {
                    reason: format!("highlighted bond {i} out of range"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(reaction, atoms, bonds))
    }
}

impl fmt::Display for HighlightedReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.smiles())
    }
}

fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::Role;

    fn atom(role: Role, mol: usize, atom: usize) -> TargetAtom {
        TargetAtom {
            mol: MolId::new(role, mol),
            atom: NodeIndex::new(atom),
        }
    }

    #[test]
    fn highlight_positions_follow_canonical_order() {
        let target = TargetReaction::from_smiles("OC>>OC[H]").unwrap();
        let bond = TargetBond {
            mol: MolId::new(Role::Reactant, 0),
            bond: EdgeIndex::new(0),
        };
        let h = HighlightedReaction::new(
            target,
            [
                atom(Role::Reactant, 0, 0),
                atom(Role::Reactant, 0, 1),
                atom(Role::Product, 0, 1),
            ],
            [bond],
        );
        assert_eq!(h.smiles(), "CO>>[H]CO |ha:0,1,3,hb:0|");
    }

    #[test]
    fn block_is_omitted_without_highlights() {
        let target = TargetReaction::from_smiles("OC>>OC").unwrap();
        let h = HighlightedReaction::new(target, [], []);
        assert_eq!(h.smiles(), "CO>>CO");
    }

    #[test]
    fn reading_back_is_stable() {
        let written = "CO>>[H]CO |ha:0,1,3,hb:0|";
        let h = HighlightedReaction::from_smiles(written).unwrap();
        assert!(h.is_atom_highlighted(atom(Role::Product, 0, 1)));
        assert!(!h.is_atom_highlighted(atom(Role::Product, 0, 0)));
        assert_eq!(h.smiles(), written);
        assert_eq!(h.to_string(), written);
    }

    #[test]
    fn out_of_range_highlights_are_rejected() {
        assert!(matches!(
            HighlightedReaction::from_smiles("C>>C |ha:2|"),
            Err(ReactionSmilesError::InvalidExtension { .. })
        ));
        assert!(matches!(
            HighlightedReaction::from_smiles("C>>C |hb:0|"),
            Err(ReactionSmilesError::InvalidExtension { .. })
        ));
    }
}
