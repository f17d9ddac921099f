use std::collections::{HashMap, HashSet};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::element::Element;
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::smiles::bond_order_sum;
use crate::substruct::Vf2;

/// Atom map class written after a bracket expression (`[C:1]`, `[C:?1]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapClass {
    pub number: u16,
    /// `:?n`: the mapped target atom may carry no map number.
    pub optional: bool,
}

/// AST node for a SMARTS atom query expression.
///
/// Each variant represents a primitive test or a logical combination of tests.
/// During substructure search, [`AtomExpr::matches`] evaluates the expression
/// tree against a target atom.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// Matches any atom (wildcard `*`).
    True,
    /// Matches by element. `aromatic` is `None` for `#n` (either), `Some(true)`
    /// for lowercase (`c`), `Some(false)` for uppercase (`C`).
    Element {
        atomic_num: u8,
        aromatic: Option<bool>,
    },
    /// Matches any aromatic atom (`a`).
    Aromatic,
    /// Matches any aliphatic atom (`A`).
    Aliphatic,
    /// Matches a specific isotope number.
    Isotope(u16),
    /// Number of explicit connections (`D`).
    Degree(u8),
    /// Number of explicit connections to non-hydrogen atoms (`d`).
    NonHDegree(u8),
    /// Total valence: bond orders plus hydrogens (`v`).
    Valence(u8),
    /// Total connectivity: degree plus implicit H count (`X`).
    Connectivity(u8),
    /// Total hydrogen count including explicit H neighbors (`H`).
    TotalHCount(u8),
    /// Implicit hydrogen count (`h`).
    ImplicitHCount(u8),
    /// Number of SSSR rings containing the atom (`Rn`).
    RingMembership(u8),
    /// Size of the smallest SSSR ring containing the atom (`rn`).
    SmallestRingSize(u8),
    /// Number of ring bonds on the atom (`xn`).
    RingBondCount(u8),
    /// Formal charge.
    Charge(i8),
    /// Atom in at least one ring (`R`, `r`).
    InRing,
    /// Atom not in any ring (`R0`).
    NotInRing,
    /// Tetrahedral stereocentre (`@` or `@@`).
    Chirality(Chirality),
    /// A recursive SMARTS sub-query (`$(...)`), anchored at its first atom.
    Recursive(Mol<AtomExpr, BondExpr>),
    /// Atom map class. Always matches; it only constrains reaction mapping.
    AtomMapClass(MapClass),
    And(Vec<AtomExpr>),
    Or(Vec<AtomExpr>),
    Not(Box<AtomExpr>),
}

/// AST node for a SMARTS bond query expression.
///
/// Implicit bonds in SMARTS default to [`BondExpr::SingleOrAromatic`], unlike
/// SMILES where implicit bonds are always single.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// Matches any bond (`~`).
    True,
    /// Non-aromatic single bond (`-`).
    Single,
    Double,
    Triple,
    /// Aromatic bond (`:`).
    Aromatic,
    /// Ring bond (`@`).
    Ring,
    /// Default SMARTS bond: single or aromatic.
    SingleOrAromatic,
    /// Directional single bond (`/`). Direction is not compared.
    Up,
    /// Directional single bond (`\`). Direction is not compared.
    Down,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

/// A target molecule prepared for SMARTS evaluation.
///
/// Recursive sub-queries are evaluated once per target molecule by
/// [`MatchContext::prepare`]; [`AtomExpr::matches`] then looks the anchor
/// atoms up by the address of the sub-query.
pub struct MatchContext<'a> {
    pub mol: &'a Mol<Atom, Bond>,
    pub ring_info: &'a RingInfo,
    recursive_matches: HashMap<usize, HashSet<NodeIndex>>,
}

impl<'a> MatchContext<'a> {
    pub fn new(mol: &'a Mol<Atom, Bond>, ring_info: &'a RingInfo) -> Self {
        Self {
            mol,
            ring_info,
            recursive_matches: HashMap::new(),
        }
    }

    /// Evaluates every recursive sub-query of `query` (innermost first)
    /// against the target molecule.
    pub fn prepare(&mut self, query: &Mol<AtomExpr, BondExpr>) {
        for idx in query.atoms() {
            let mut refs = Vec::new();
            collect_recursive_refs(query.atom(idx), &mut refs);
            for inner in refs {
                let key = recursive_key(inner);
                if self.recursive_matches.contains_key(&key) {
                    continue;
                }
                self.prepare(inner);
                let anchors = self.anchor_atoms(inner);
                self.recursive_matches.insert(key, anchors);
            }
        }
    }

    fn anchor_atoms(&self, inner: &Mol<AtomExpr, BondExpr>) -> HashSet<NodeIndex> {
        if inner.atom_count() == 0 {
            return HashSet::new();
        }
        let anchor = NodeIndex::new(0);
        let mut vf2 = Vf2::new(
            self.mol,
            inner,
            |t, q| inner.atom(q).matches(self, t),
            |t, q| inner.bond(q).matches(self, t),
        )
        .with_implicit_hydrogens(absorbable_hydrogens(inner), |t| {
            self.mol.atom(t).hydrogen_count
        });
        self.mol
            .atoms()
            .filter(|&t| vf2.find_anchored(anchor, t).is_some())
            .collect()
    }
}

fn recursive_key(inner: &Mol<AtomExpr, BondExpr>) -> usize {
    inner as *const Mol<AtomExpr, BondExpr> as usize
}

fn collect_recursive_refs<'q>(expr: &'q AtomExpr, out: &mut Vec<&'q Mol<AtomExpr, BondExpr>>) {
    match expr {
        AtomExpr::Recursive(inner) => out.push(inner),
        AtomExpr::And(parts) | AtomExpr::Or(parts) => {
            for p in parts {
                collect_recursive_refs(p, out);
            }
        }
        AtomExpr::Not(inner) => collect_recursive_refs(inner, out),
        _ => {}
    }
}

fn count_u8(n: usize) -> u8 {
    n.min(u8::MAX as usize) as u8
}

fn explicit_h_count(mol: &Mol<Atom, Bond>, idx: NodeIndex) -> u8 {
    count_u8(mol.neighbors(idx).filter(|&nb| mol.atom(nb).is_hydrogen()).count())
}

fn non_h_degree(mol: &Mol<Atom, Bond>, idx: NodeIndex) -> u8 {
    count_u8(mol.neighbors(idx).filter(|&nb| !mol.atom(nb).is_hydrogen()).count())
}

/// Bond orders plus implicit hydrogens. An aromatic atom is lifted to the
/// smallest normal valence of its element, which accounts for its share of
/// the pi system.
fn total_valence(mol: &Mol<Atom, Bond>, idx: NodeIndex) -> u8 {
    let atom = mol.atom(idx);
    let explicit = bond_order_sum(mol, idx).saturating_add(atom.hydrogen_count);
    if !atom.is_aromatic {
        return explicit;
    }
    Element::from_atomic_num(atom.atomic_num)
        .and_then(|e| e.default_valences().iter().copied().find(|&v| v >= explicit))
        .unwrap_or(explicit)
}

impl AtomExpr {
    pub fn matches(&self, ctx: &MatchContext, idx: NodeIndex) -> bool {
        let atom = ctx.mol.atom(idx);
        match self {
            AtomExpr::True => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => atom.atomic_num == *atomic_num && aromatic.is_none_or(|a| atom.is_aromatic == a),
            AtomExpr::Aromatic => atom.is_aromatic,
            AtomExpr::Aliphatic => !atom.is_aromatic,
            AtomExpr::Isotope(iso) => atom.isotope == *iso,
            AtomExpr::Degree(d) => count_u8(ctx.mol.degree(idx)) == *d,
            AtomExpr::NonHDegree(d) => non_h_degree(ctx.mol, idx) == *d,
            AtomExpr::Valence(v) => total_valence(ctx.mol, idx) == *v,
            AtomExpr::Connectivity(x) => {
                count_u8(ctx.mol.degree(idx)).saturating_add(atom.hydrogen_count) == *x
            }
            AtomExpr::TotalHCount(h) => {
                atom.hydrogen_count.saturating_add(explicit_h_count(ctx.mol, idx)) == *h
            }
            AtomExpr::ImplicitHCount(h) => atom.hydrogen_count == *h,
            AtomExpr::RingMembership(n) => ctx.ring_info.num_atom_rings(idx) == *n,
            AtomExpr::SmallestRingSize(r) => ctx.ring_info.smallest_ring_size(idx).unwrap_or(0) == *r,
            AtomExpr::RingBondCount(x) => ctx.ring_info.ring_bond_count(ctx.mol, idx) == *x,
            AtomExpr::Charge(c) => atom.formal_charge == *c,
            AtomExpr::InRing => ctx.ring_info.is_ring_atom(idx),
            AtomExpr::NotInRing => !ctx.ring_info.is_ring_atom(idx),
            AtomExpr::Chirality(Chirality::None) => true,
            AtomExpr::Chirality(_) => atom.chirality != Chirality::None,
            AtomExpr::Recursive(inner) => ctx
                .recursive_matches
                .get(&recursive_key(inner))
                .is_some_and(|anchors| anchors.contains(&idx)),
            AtomExpr::AtomMapClass(_) => true,
            AtomExpr::And(exprs) => exprs.iter().all(|e| e.matches(ctx, idx)),
            AtomExpr::Or(exprs) => exprs.iter().any(|e| e.matches(ctx, idx)),
            AtomExpr::Not(expr) => !expr.matches(ctx, idx),
        }
    }

    /// The map class of a bracket atom, if one was written.
    pub fn map_class(&self) -> Option<MapClass> {
        match self {
            AtomExpr::AtomMapClass(class) => Some(*class),
            AtomExpr::And(parts) => parts.iter().find_map(AtomExpr::map_class),
            _ => None,
        }
    }

    /// True when no atom other than hydrogen can satisfy the expression.
    pub fn is_hydrogen_only(&self) -> bool {
        match self {
            AtomExpr::Element { atomic_num, .. } => *atomic_num == 1,
            AtomExpr::And(parts) => parts.iter().any(AtomExpr::is_hydrogen_only),
            AtomExpr::Or(parts) => !parts.is_empty() && parts.iter().all(AtomExpr::is_hydrogen_only),
            _ => false,
        }
    }

    /// Evaluates the expression against an implicit hydrogen: a bare,
    /// uncharged, non-ring hydrogen with a single heavy neighbor.
    pub fn matches_implicit_hydrogen(&self) -> bool {
        match self {
            AtomExpr::True | AtomExpr::Aliphatic | AtomExpr::NotInRing => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => *atomic_num == 1 && *aromatic != Some(true),
            AtomExpr::Aromatic | AtomExpr::InRing => false,
            AtomExpr::Isotope(iso) => *iso == 0,
            AtomExpr::Degree(n)
            | AtomExpr::NonHDegree(n)
            | AtomExpr::Valence(n)
            | AtomExpr::Connectivity(n) => *n == 1,
            AtomExpr::TotalHCount(n)
            | AtomExpr::ImplicitHCount(n)
            | AtomExpr::RingMembership(n)
            | AtomExpr::SmallestRingSize(n)
            | AtomExpr::RingBondCount(n) => *n == 0,
            AtomExpr::Charge(c) => *c == 0,
            AtomExpr::Chirality(c) => *c == Chirality::None,
            AtomExpr::Recursive(_) => false,
            AtomExpr::AtomMapClass(_) => true,
            AtomExpr::And(parts) => parts.iter().all(AtomExpr::matches_implicit_hydrogen),
            AtomExpr::Or(parts) => parts.iter().any(AtomExpr::matches_implicit_hydrogen),
            AtomExpr::Not(inner) => !inner.matches_implicit_hydrogen(),
        }
    }
}

impl BondExpr {
    pub fn matches(&self, ctx: &MatchContext, bond: EdgeIndex) -> bool {
        let order = ctx.mol.bond(bond).order;
        match self {
            BondExpr::True => true,
            BondExpr::Single | BondExpr::Up | BondExpr::Down => order == BondOrder::Single,
            BondExpr::Double => order == BondOrder::Double,
            BondExpr::Triple => order == BondOrder::Triple,
            BondExpr::Aromatic => order == BondOrder::Aromatic,
            BondExpr::Ring => ctx.ring_info.is_ring_bond(bond),
            BondExpr::SingleOrAromatic => {
                matches!(order, BondOrder::Single | BondOrder::Aromatic)
            }
            BondExpr::And(exprs) => exprs.iter().all(|e| e.matches(ctx, bond)),
            BondExpr::Or(exprs) => exprs.iter().any(|e| e.matches(ctx, bond)),
            BondExpr::Not(expr) => !expr.matches(ctx, bond),
        }
    }

    /// Evaluates the expression against the non-ring single bond that joins
    /// an implicit hydrogen to its host.
    pub fn matches_hydrogen_bond(&self) -> bool {
        match self {
            BondExpr::True
            | BondExpr::Single
            | BondExpr::SingleOrAromatic
            | BondExpr::Up
            | BondExpr::Down => true,
            BondExpr::Double | BondExpr::Triple | BondExpr::Aromatic | BondExpr::Ring => false,
            BondExpr::And(exprs) => exprs.iter().all(BondExpr::matches_hydrogen_bond),
            BondExpr::Or(exprs) => exprs.iter().any(BondExpr::matches_hydrogen_bond),
            BondExpr::Not(expr) => !expr.matches_hydrogen_bond(),
        }
    }
}

/// Query atoms that may stand for an implicit hydrogen of their neighbor:
/// terminal, hydrogen-only, and attached by a single-compatible bond.
///
/// Every matcher applies this rule, so `[H]` means the same thing in a
/// single-molecule query, inside `$(...)`, and in a reaction template.
pub fn absorbable_hydrogens(query: &Mol<AtomExpr, BondExpr>) -> Vec<bool> {
    query
        .atoms()
        .map(|q| {
            let expr = query.atom(q);
            query.degree(q) == 1
                && expr.is_hydrogen_only()
                && expr.matches_implicit_hydrogen()
                && query.bonds_of(q).all(|e| query.bond(e).matches_hydrogen_bond())
        })
        .collect()
}
