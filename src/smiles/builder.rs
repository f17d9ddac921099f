use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::element::Element;
use crate::mol::{permutation_parity, Mol};
use crate::smiles::parse_tree::{ParseAtom, ParseTree};
use crate::smiles::tokenizer::{BondToken, ChiralityToken};

/// Placeholder for an implicit hydrogen in a neighbor ordering.
const H_SENTINEL: usize = usize::MAX;

pub fn build_mol(tree: &ParseTree) -> Mol<Atom, Bond> {
    let mut mol = Mol::new();

    for parse_atom in &tree.atoms {
        mol.add_atom(Atom {
            atomic_num: parse_atom.element.atomic_num(),
            formal_charge: parse_atom.charge,
            isotope: parse_atom.isotope,
            hydrogen_count: 0,
            is_aromatic: parse_atom.is_aromatic,
            chirality: Chirality::None,
            map_num: parse_atom.atom_class,
        });
    }

    for pb in &tree.bonds {
        let order = resolve_bond_order(
            pb.bond,
            tree.atoms[pb.a].is_aromatic,
            tree.atoms[pb.b].is_aromatic,
        );
        mol.add_bond(NodeIndex::new(pb.a), NodeIndex::new(pb.b), Bond::new(order));
    }

    for (i, parse_atom) in tree.atoms.iter().enumerate() {
        let node = NodeIndex::new(i);
        let h_count = if parse_atom.is_bracket {
            parse_atom.hcount.unwrap_or(0)
        } else {
            let bos = bond_order_sum(&mol, node);
            implicit_hydrogens(parse_atom.element, parse_atom.is_aromatic, bos)
        };
        mol.atom_mut(node).hydrogen_count = h_count;
        mol.atom_mut(node).chirality = resolve_chirality(&mol, node, parse_atom);
    }

    mol
}

fn resolve_bond_order(bond_tok: Option<BondToken>, from_aromatic: bool, to_aromatic: bool) -> BondOrder {
    match bond_tok {
        Some(BondToken::Single) | Some(BondToken::Up) | Some(BondToken::Down) => BondOrder::Single,
        Some(BondToken::Double) => BondOrder::Double,
        Some(BondToken::Triple) => BondOrder::Triple,
        Some(BondToken::Aromatic) => BondOrder::Aromatic,
        None if from_aromatic && to_aromatic => BondOrder::Aromatic,
        None => BondOrder::Single,
    }
}

/// Re-expresses the written `@`/`@@` against the stored reference order
/// (implicit H first, then neighbors by index).
fn resolve_chirality(mol: &Mol<Atom, Bond>, node: NodeIndex, parse_atom: &ParseAtom) -> Chirality {
    let written = match parse_atom.chirality {
        ChiralityToken::None => return Chirality::None,
        ChiralityToken::CounterClockwise => Chirality::Ccw,
        ChiralityToken::Clockwise => Chirality::Cw,
    };

    let mut smiles_order = parse_atom.neighbors.clone();
    let mut reference: Vec<usize> = mol
        .sorted_neighbors(node)
        .into_iter()
        .map(|nb| nb.index())
        .collect();
    if mol.atom(node).hydrogen_count > 0 {
        let at = usize::from(parse_atom.has_preceding).min(smiles_order.len());
        smiles_order.insert(at, H_SENTINEL);
        reference.insert(0, H_SENTINEL);
    }

    if permutation_parity(&smiles_order, &reference) {
        written
    } else {
        written.inverted()
    }
}

pub(crate) fn bond_order_sum(mol: &Mol<Atom, Bond>, node: NodeIndex) -> u8 {
    mol.bonds_of(node)
        .map(|e| mol.bond(e).order.valence_contribution())
        .fold(0u8, u8::saturating_add)
}

/// Implicit hydrogen count of a bare (unbracketed) atom: the smallest default
/// valence that fits the explicit bonds, minus one for aromatic atoms.
pub(crate) fn implicit_hydrogens(element: Element, is_aromatic: bool, bond_order_sum: u8) -> u8 {
    let Some(&target) = element
        .default_valences()
        .iter()
        .find(|&&v| v >= bond_order_sum)
    else {
        return 0;
    };
    let h = target - bond_order_sum;
    if is_aromatic {
        h.saturating_sub(1)
    } else {
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_tree::build_parse_tree;
    use crate::smiles::tokenizer::tokenize;

    fn parse(s: &str) -> Mol<Atom, Bond> {
        build_mol(&build_parse_tree(&tokenize(s).unwrap()).unwrap())
    }

    fn h(mol: &Mol<Atom, Bond>, i: usize) -> u8 {
        mol.atom(NodeIndex::new(i)).hydrogen_count
    }

    #[test]
    fn implicit_h_counts() {
        assert_eq!(h(&parse("C"), 0), 4);
        let ethene = parse("C=C");
        assert_eq!((h(&ethene, 0), h(&ethene, 1)), (2, 2));
        assert_eq!(h(&parse("CS(=O)(=O)C"), 1), 0);
        assert_eq!(h(&parse("[CH4]"), 0), 4);
        assert_eq!(h(&parse("[C]"), 0), 0);
    }

    #[test]
    fn aromatic_rings() {
        let mol = parse("c1ccncc1");
        assert_eq!(h(&mol, 0), 1);
        assert_eq!(h(&mol, 3), 0);
        assert!(mol
            .bonds()
            .all(|e| mol.bond(e).order == BondOrder::Aromatic));
    }

    #[test]
    fn aromatic_to_aliphatic_bond_is_single() {
        let mol = parse("Cc1ccccc1");
        let e = mol.bond_between(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_eq!(mol.bond(e).order, BondOrder::Single);
    }

    #[test]
    fn map_numbers_are_carried() {
        let mol = parse("[CH3:7][CH3:8]");
        assert_eq!(mol.atom(NodeIndex::new(0)).map_num, 7);
        assert_eq!(mol.atom(NodeIndex::new(1)).map_num, 8);
        assert_eq!(h(&mol, 0), 3);
    }

    #[test]
    fn chirality_relative_to_index_order() {
        // Neighbors already written in index order with H right after the
        // preceding atom: F, H, Cl, Br vs reference H, F, Cl, Br is odd.
        let mol = parse("F[C@H](Cl)Br");
        assert_eq!(mol.atom(NodeIndex::new(1)).chirality, Chirality::Cw);
        // H leads when there is no preceding atom.
        let mol = parse("[C@H](F)(Cl)Br");
        assert_eq!(mol.atom(NodeIndex::new(0)).chirality, Chirality::Ccw);
    }

    #[test]
    fn swapped_neighbor_indices_flip_the_stored_tag() {
        // Both spell L-alanine. The methyl and carboxyl carbons trade index
        // order between the two, so the stored tags differ.
        let a = parse("N[C@@H](C)C(=O)O");
        let b = parse("N[C@H](C(=O)O)C");
        assert_eq!(a.atom(NodeIndex::new(1)).chirality, Chirality::Ccw);
        assert_eq!(b.atom(NodeIndex::new(1)).chirality, Chirality::Cw);
    }
}
