mod builder;
pub mod error;
mod parse_tree;
mod tokenizer;
mod writer;

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
pub(crate) use builder::bond_order_sum;
pub use error::SmilesError;
pub use writer::{to_canonical_smiles, to_smiles, write_smiles, SmilesOutput};

/// Parses a molecule SMILES string.
///
/// Atom indices follow the order in which atoms are written. Atom classes
/// (`[CH3:7]`) are kept as [`Atom::map_num`].
pub fn from_smiles(s: &str) -> Result<Mol<Atom, Bond>, SmilesError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(SmilesError::EmptyInput);
    }
    let tokens = tokenizer::tokenize(trimmed)?;
    if tokens.is_empty() {
        return Err(SmilesError::EmptyInput);
    }
    let tree = parse_tree::build_parse_tree(&tokens)?;
    let mol = builder::build_mol(&tree);
    tracing::trace!(
        smiles = trimmed,
        atoms = mol.atom_count(),
        bonds = mol.bond_count(),
        "parsed SMILES"
    );
    Ok(mol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Chirality;
    use crate::bond::BondOrder;
    use petgraph::graph::NodeIndex;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    fn atom(mol: &Mol<Atom, Bond>, i: usize) -> &Atom {
        mol.atom(n(i))
    }

    #[test]
    fn methane() {
        let mol = from_smiles("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(atom(&mol, 0).atomic_num, 6);
        assert_eq!(atom(&mol, 0).hydrogen_count, 4);
    }

    #[test]
    fn acetic_acid() {
        let mol = from_smiles("CC(=O)O").unwrap();
        assert_eq!(mol.atom_count(), 4);
        assert_eq!(atom(&mol, 0).hydrogen_count, 3);
        assert_eq!(atom(&mol, 1).hydrogen_count, 0);
        assert_eq!(atom(&mol, 3).hydrogen_count, 1);
        let e = mol.bond_between(n(1), n(2)).unwrap();
        assert_eq!(mol.bond(e).order, BondOrder::Double);
    }

    #[test]
    fn multi_digit_ring() {
        let mol = from_smiles("C%10CC%10").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 3);
    }

    #[test]
    fn bracket_atoms() {
        let mol = from_smiles("[NH4+]").unwrap();
        assert_eq!(atom(&mol, 0).hydrogen_count, 4);
        assert_eq!(atom(&mol, 0).formal_charge, 1);

        let mol = from_smiles("[2H]").unwrap();
        assert_eq!(atom(&mol, 0).atomic_num, 1);
        assert_eq!(atom(&mol, 0).isotope, 2);
        assert_eq!(atom(&mol, 0).hydrogen_count, 0);
    }

    #[test]
    fn explicit_hydrogen_is_an_atom() {
        let mol = from_smiles("OC[H]").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert!(atom(&mol, 2).is_hydrogen());
        assert_eq!(atom(&mol, 1).hydrogen_count, 2);
    }

    #[test]
    fn pyrrole() {
        let mol = from_smiles("[nH]1cccc1").unwrap();
        assert_eq!(mol.atom_count(), 5);
        assert!(atom(&mol, 0).is_aromatic);
        assert_eq!(atom(&mol, 0).hydrogen_count, 1);
        for i in 1..5 {
            assert_eq!(atom(&mol, i).hydrogen_count, 1);
        }
    }

    #[test]
    fn tetrahedral_without_h() {
        let mol = from_smiles("[C@](F)(Cl)(Br)I").unwrap();
        assert_eq!(atom(&mol, 0).chirality, Chirality::Ccw);
        let mol = from_smiles("[C@@](F)(Cl)(Br)I").unwrap();
        assert_eq!(atom(&mol, 0).chirality, Chirality::Cw);
    }

    #[test]
    fn directional_bonds_read_as_single() {
        let mol = from_smiles("F/C=C/F").unwrap();
        let e = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(e).order, BondOrder::Single);
        assert_eq!(mol.bond_count(), 3);
    }

    #[test]
    fn nitro_group() {
        let mol = from_smiles("C[N+](=O)[O-]").unwrap();
        assert_eq!(atom(&mol, 1).formal_charge, 1);
        assert_eq!(atom(&mol, 3).formal_charge, -1);
        assert_eq!(atom(&mol, 1).hydrogen_count, 0);
    }

    #[test]
    fn errors() {
        assert_eq!(from_smiles("").unwrap_err(), SmilesError::EmptyInput);
        assert_eq!(from_smiles("   ").unwrap_err(), SmilesError::EmptyInput);
        assert!(matches!(
            from_smiles("C)C").unwrap_err(),
            SmilesError::UnmatchedParen { pos: 1 }
        ));
        assert!(matches!(
            from_smiles("X").unwrap_err(),
            SmilesError::UnexpectedChar { pos: 0, ch: 'X' }
        ));
        assert!(matches!(
            from_smiles("C>C").unwrap_err(),
            SmilesError::UnexpectedChar { ch: '>', .. }
        ));
    }
}
