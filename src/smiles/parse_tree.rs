use crate::element::Element;
use crate::smiles::error::SmilesError;
use crate::smiles::tokenizer::{AtomToken, BondToken, ChiralityToken, Token};

#[derive(Debug, Clone)]
pub struct ParseAtom {
    pub element: Element,
    pub is_aromatic: bool,
    pub isotope: u16,
    pub chirality: ChiralityToken,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub atom_class: u16,
    pub is_bracket: bool,
    /// Whether the atom was bonded to the atom written before it.
    pub has_preceding: bool,
    /// Neighbor atom indices in the order the bonds are written.
    pub neighbors: Vec<usize>,
}

/// A bond recorded when it is completed: chain and branch bonds when their
/// second atom is read, ring bonds at the closing digit.
#[derive(Debug, Clone, Copy)]
pub struct ParseBond {
    pub a: usize,
    pub b: usize,
    pub bond: Option<BondToken>,
}

#[derive(Debug, Clone)]
pub struct ParseTree {
    pub atoms: Vec<ParseAtom>,
    pub bonds: Vec<ParseBond>,
}

struct RingOpen {
    atom: usize,
    slot: usize,
    bond: Option<BondToken>,
}

const UNFILLED: usize = usize::MAX;

pub fn build_parse_tree(tokens: &[Token]) -> Result<ParseTree, SmilesError> {
    let mut atoms: Vec<ParseAtom> = Vec::new();
    let mut bonds: Vec<ParseBond> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new(); // (branch point, paren pos)
    let mut current: Option<usize> = None;
    let mut pending_bond: Option<BondToken> = None;
    let mut ring_opens: Vec<Option<RingOpen>> = (0..100).map(|_| None).collect();

    for token in tokens {
        match token {
            Token::Atom(atom_tok) => {
                let idx = atoms.len();
                atoms.push(parse_atom_from_token(atom_tok));

                if let Some(cur) = current {
                    let bond = pending_bond.take();
                    atoms[cur].neighbors.push(idx);
                    atoms[idx].neighbors.push(cur);
                    atoms[idx].has_preceding = true;
                    bonds.push(ParseBond { a: cur, b: idx, bond });
                } else {
                    pending_bond = None;
                }

                current = Some(idx);
            }
            Token::Bond(b) => {
                pending_bond = Some(*b);
            }
            Token::RingClosure { bond, digit, pos } => {
                let d = *digit as usize;
                let invalid = SmilesError::InvalidRingBond {
                    digit: *digit,
                    pos: *pos,
                };
                let cur = current.ok_or(invalid.clone())?;
                let bond = bond.or(pending_bond.take());

                if let Some(open) = ring_opens[d].take() {
                    if open.atom == cur || atoms[cur].neighbors.contains(&open.atom) {
                        return Err(invalid);
                    }
                    let ring_bond = match (bond, open.bond) {
                        (None, None) => None,
                        (Some(b), None) | (None, Some(b)) => Some(b),
                        (Some(b1), Some(b2)) if b1 == b2 => Some(b1),
                        (Some(_), Some(_)) => {
                            return Err(SmilesError::RingBondConflict { digit: *digit });
                        }
                    };

                    atoms[open.atom].neighbors[open.slot] = cur;
                    atoms[cur].neighbors.push(open.atom);
                    bonds.push(ParseBond {
                        a: open.atom,
                        b: cur,
                        bond: ring_bond,
                    });
                } else {
                    let slot = atoms[cur].neighbors.len();
                    atoms[cur].neighbors.push(UNFILLED);
                    ring_opens[d] = Some(RingOpen {
                        atom: cur,
                        slot,
                        bond,
                    });
                }
            }
            Token::OpenParen(pos) => {
                let cur = current.ok_or(SmilesError::UnmatchedParen { pos: *pos })?;
                stack.push((cur, *pos));
            }
            Token::CloseParen(pos) => {
                let (branch_point, _) =
                    stack.pop().ok_or(SmilesError::UnmatchedParen { pos: *pos })?;
                current = Some(branch_point);
                pending_bond = None;
            }
            Token::Dot(_) => {
                current = None;
                pending_bond = None;
            }
        }
    }

    if let Some(&(_, pos)) = stack.last() {
        return Err(SmilesError::UnmatchedParen { pos });
    }

    if let Some(digit) = ring_opens.iter().position(Option::is_some) {
        return Err(SmilesError::UnclosedRing {
            digit: digit as u16,
        });
    }

    Ok(ParseTree { atoms, bonds })
}

fn parse_atom_from_token(tok: &AtomToken) -> ParseAtom {
    ParseAtom {
        element: tok.element,
        is_aromatic: tok.is_aromatic,
        isotope: tok.isotope,
        chirality: tok.chirality,
        hcount: tok.hcount,
        charge: tok.charge,
        atom_class: tok.atom_class,
        is_bracket: tok.is_bracket,
        has_preceding: false,
        neighbors: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::tokenizer::tokenize;

    fn tree(s: &str) -> ParseTree {
        build_parse_tree(&tokenize(s).unwrap()).unwrap()
    }

    #[test]
    fn ethane_tree() {
        let t = tree("CC");
        assert_eq!(t.atoms.len(), 2);
        assert_eq!(t.atoms[0].neighbors, vec![1]);
        assert!(t.atoms[1].has_preceding);
        assert!(!t.atoms[0].has_preceding);
    }

    #[test]
    fn ring_bond_keeps_digit_slot() {
        let t = tree("C1CC1");
        assert_eq!(t.atoms[0].neighbors, vec![2, 1]);
        assert_eq!(t.atoms[2].neighbors, vec![1, 0]);
    }

    #[test]
    fn bonds_in_completion_order() {
        let t = tree("C1CC1O");
        let pairs: Vec<(usize, usize)> = t.bonds.iter().map(|b| (b.a, b.b)).collect();
        assert_eq!(pairs, vec![(0, 1), (1, 2), (0, 2), (2, 3)]);
    }

    #[test]
    fn branch_tree() {
        let t = tree("CC(C)C");
        assert_eq!(t.atoms.len(), 4);
        assert_eq!(t.atoms[1].neighbors, vec![0, 2, 3]);
    }

    #[test]
    fn ring_errors() {
        let err = |s: &str| build_parse_tree(&tokenize(s).unwrap()).unwrap_err();
        assert_eq!(err("C1CC"), SmilesError::UnclosedRing { digit: 1 });
        assert_eq!(err("C11"), SmilesError::InvalidRingBond { digit: 1, pos: 2 });
        assert_eq!(err("C1C1"), SmilesError::InvalidRingBond { digit: 1, pos: 3 });
        assert_eq!(err("C=1CC#1"), SmilesError::RingBondConflict { digit: 1 });
        assert_eq!(err("1CC"), SmilesError::InvalidRingBond { digit: 1, pos: 0 });
    }

    #[test]
    fn unmatched_paren_errors() {
        let err = |s: &str| build_parse_tree(&tokenize(s).unwrap()).unwrap_err();
        assert_eq!(err("C(C"), SmilesError::UnmatchedParen { pos: 1 });
        assert_eq!(err("CC)"), SmilesError::UnmatchedParen { pos: 2 });
    }

    #[test]
    fn disconnected() {
        let t = tree("[Na+].[Cl-]");
        assert_eq!(t.atoms.len(), 2);
        assert!(t.bonds.is_empty());
    }
}
