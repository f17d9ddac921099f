mod error;
mod parser;
pub mod query;
mod writer;

pub use error::SmartsError;
pub use query::{absorbable_hydrogens, AtomExpr, BondExpr, MapClass, MatchContext};
pub use writer::to_smarts;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::substruct::{AtomMapping, Vf2};

/// Parses a single-molecule SMARTS pattern.
pub fn from_smarts(s: &str) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
    let query = parser::parse(s)?;
    tracing::trace!(
        smarts = s.trim(),
        atoms = query.atom_count(),
        bonds = query.bond_count(),
        "parsed SMARTS"
    );
    Ok(query)
}

pub fn has_smarts_match(target: &Mol<Atom, Bond>, query: &Mol<AtomExpr, BondExpr>) -> bool {
    get_smarts_match(target, query).is_some()
}

pub fn get_smarts_match(
    target: &Mol<Atom, Bond>,
    query: &Mol<AtomExpr, BondExpr>,
) -> Option<AtomMapping> {
    let ring_info = RingInfo::sssr(target);
    let mut ctx = MatchContext::new(target, &ring_info);
    ctx.prepare(query);
    let found = smarts_vf2(&ctx, query).find_first();
    found
}

/// Every embedding of `query`, including symmetric duplicates. A hydrogen
/// query atom taken by an implicit hydrogen is absent from its mapping.
pub fn get_smarts_matches(
    target: &Mol<Atom, Bond>,
    query: &Mol<AtomExpr, BondExpr>,
) -> Vec<AtomMapping> {
    let ring_info = RingInfo::sssr(target);
    let mut ctx = MatchContext::new(target, &ring_info);
    ctx.prepare(query);
    let found = smarts_vf2(&ctx, query).find_all();
    found
}

fn smarts_vf2<'a>(
    ctx: &'a MatchContext<'a>,
    query: &'a Mol<AtomExpr, BondExpr>,
) -> Vf2<
    'a,
    Atom,
    Bond,
    AtomExpr,
    BondExpr,
    impl Fn(NodeIndex, NodeIndex) -> bool + 'a,
    impl Fn(EdgeIndex, EdgeIndex) -> bool + 'a,
> {
    Vf2::new(
        ctx.mol,
        query,
        move |t, q| query.atom(q).matches(ctx, t),
        move |t, q| query.bond(q).matches(ctx, t),
    )
    .with_implicit_hydrogens(absorbable_hydrogens(query), |t| ctx.mol.atom(t).hydrogen_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn mol(smiles: &str) -> Mol<Atom, Bond> {
        from_smiles(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    fn smarts(s: &str) -> Mol<AtomExpr, BondExpr> {
        from_smarts(s).unwrap_or_else(|e| panic!("bad SMARTS {s:?}: {e}"))
    }

    fn count(target: &str, query: &str) -> usize {
        get_smarts_matches(&mol(target), &smarts(query)).len()
    }

    #[test]
    fn match_carbon_in_ethanol() {
        assert_eq!(count("CCO", "[#6]"), 2);
        assert_eq!(count("c1ccncc1", "[#7]"), 1);
    }

    #[test]
    fn aromaticity_primitives() {
        assert_eq!(count("c1ccccc1", "[a]"), 6);
        assert_eq!(count("C1CCCCC1", "[a]"), 0);
        assert_eq!(count("C1CCCCC1", "[A]"), 6);
        assert_eq!(count("c1ccccc1", "C"), 0);
    }

    #[test]
    fn wildcard() {
        assert_eq!(count("CCO", "*"), 3);
    }

    #[test]
    fn degree_and_connectivity() {
        assert_eq!(count("CCC", "[D2]"), 1);
        assert_eq!(count("CCC", "[D1]"), 2);
        assert_eq!(count("C", "[X4]"), 1);
        assert_eq!(count("OC[H]", "[D2]"), 1);
        assert_eq!(count("OC[H]", "[d1]"), 3);
    }

    #[test]
    fn valence() {
        assert_eq!(count("C", "[v4]"), 1);
        assert_eq!(count("c1ccccc1", "[v4]"), 6);
        assert_eq!(count("c1ccncc1", "[n;v3]"), 1);
        assert_eq!(count("[nH]1cccc1", "[n;v3]"), 1);
        assert_eq!(count("CC(=O)O", "[v2]"), 2);
    }

    #[test]
    fn hydrogen_counts() {
        assert_eq!(count("CCO", "[H1]"), 1);
        assert_eq!(count("CCO", "[H3]"), 1);
        assert_eq!(count("OC[H]", "[C;H3]"), 1);
        assert_eq!(count("OC[H]", "[C;h2]"), 1);
    }

    #[test]
    fn ring_primitives() {
        assert_eq!(count("C1CCCCC1", "[R]"), 6);
        assert_eq!(count("CC1CCCCC1", "[R0]"), 1);
        assert_eq!(count("C1CCCCC1", "[r6]"), 6);
        assert_eq!(count("c1ccc2ccccc2c1", "[R2]"), 2);
        assert_eq!(count("c1ccc2ccccc2c1", "[x3]"), 2);
        assert_eq!(count("CC1CCCCC1", "[C;R]"), 6);
    }

    #[test]
    fn ring_bonds() {
        assert!(has_smarts_match(&mol("C1CCCCC1"), &smarts("C@C")));
        assert!(!has_smarts_match(&mol("CCCCCC"), &smarts("C@C")));
        assert_eq!(count("CC1CC1", "C!@C"), 2);
    }

    #[test]
    fn charges() {
        assert!(has_smarts_match(&mol("[Na+]"), &smarts("[+1]")));
        assert!(has_smarts_match(&mol("[Cl-]"), &smarts("[Cl-]")));
        assert!(!has_smarts_match(&mol("[Cl-]"), &smarts("[Cl;+0]")));
    }

    #[test]
    fn logical_atoms() {
        assert_eq!(count("CN", "[C,N]"), 2);
        assert_eq!(count("CCO", "[!C]"), 1);
        assert_eq!(count("CCO", "[C,O;D1]"), 2);
    }

    #[test]
    fn bond_orders() {
        assert!(has_smarts_match(&mol("c1ccccc1"), &smarts("c:c")));
        assert!(has_smarts_match(&mol("c1ccccc1"), &smarts("cc")));
        assert!(!has_smarts_match(&mol("c1ccccc1"), &smarts("c-c")));
        assert!(has_smarts_match(&mol("c1ccccc1-c1ccccc1"), &smarts("c-c")));
        assert!(has_smarts_match(&mol("CC"), &smarts("C~C")));
        assert!(has_smarts_match(&mol("C=C"), &smarts("C=C")));
        assert!(!has_smarts_match(&mol("C=C"), &smarts("CC")));
        assert!(has_smarts_match(&mol("C=C"), &smarts("C-,=C")));
        assert!(!has_smarts_match(&mol("CN"), &smarts("C#N")));
    }

    #[test]
    fn stereocentres() {
        assert!(has_smarts_match(&mol("N[C@@H](C)C(=O)O"), &smarts("[C@]")));
        assert!(has_smarts_match(&mol("N[C@@H](C)C(=O)O"), &smarts("[C@@]")));
        assert!(!has_smarts_match(&mol("NC(C)C(=O)O"), &smarts("[C@]")));
    }

    #[test]
    fn recursive_smarts() {
        assert!(has_smarts_match(&mol("Oc1ccccc1"), &smarts("[$([OH])]")));
        assert_eq!(count("c1ccccc1", "[$(cc)]"), 6);
        // Anchored at the first atom of the sub-pattern: only the carbon
        // bonded to oxygen qualifies.
        assert_eq!(count("CCO", "[C;$(CO)]"), 1);
        assert_eq!(count("OCC", "[C;$(CO)]"), 1);
        assert_eq!(count("CCO", "[$(C[$(CO)])]"), 1);
        assert_eq!(count("CCO", "[C;!$(CO)]"), 1);
    }

    #[test]
    fn multi_atom_patterns() {
        assert!(has_smarts_match(&mol("CN"), &smarts("[#6][#7]")));
        assert!(has_smarts_match(&mol("c1ccccc1"), &smarts("c1ccccc1")));
        assert!(has_smarts_match(&mol("C1CC1"), &smarts("C1CC1")));
        assert!(!has_smarts_match(&mol("CCC"), &smarts("C1CC1")));
        assert_eq!(count("CC", "CC"), 2);
    }

    #[test]
    fn first_match_is_deterministic() {
        let target = mol("OCCO");
        let query = smarts("OC");
        let m = get_smarts_match(&target, &query).unwrap();
        assert_eq!(m, vec![(NodeIndex::new(0), NodeIndex::new(0)), (NodeIndex::new(1), NodeIndex::new(1))]);
        assert_eq!(get_smarts_match(&target, &query), Some(m));
    }

    #[test]
    fn disconnected_query() {
        assert!(has_smarts_match(&mol("CC.O"), &smarts("C.O")));
        assert!(!has_smarts_match(&mol("CC"), &smarts("C.O")));
    }

    #[test]
    fn hydrogen_atoms_match_implicit_hydrogens() {
        assert!(has_smarts_match(&mol("CC"), &smarts("C[H]")));
        assert!(has_smarts_match(&mol("C"), &smarts("[H]C([H])([H])[H]")));
        assert!(!has_smarts_match(&mol("C"), &smarts("[H]C([H])([H])([H])[H]")));
        assert!(!has_smarts_match(&mol("ClCl"), &smarts("Cl[H]")));
        assert!(!has_smarts_match(&mol("C=C"), &smarts("C=[H]")));

        // Explicit hydrogens come first; the implicit one leaves no pair.
        let m = get_smarts_match(&mol("[H]C"), &smarts("C[H]")).unwrap();
        assert_eq!(m, vec![(NodeIndex::new(0), NodeIndex::new(1)), (NodeIndex::new(1), NodeIndex::new(0))]);
        let m = get_smarts_match(&mol("CO"), &smarts("C[H]")).unwrap();
        assert_eq!(m, vec![(NodeIndex::new(0), NodeIndex::new(0))]);
    }

    #[test]
    fn recursive_patterns_see_implicit_hydrogens() {
        assert_eq!(count("CC", "[C;$(C[H])]"), 2);
        assert_eq!(count("CC(C)(C)C", "[C;$(C[H])]"), 4);
        assert_eq!(count("CC(C)(C)C", "[C;!$(C[H])]"), 1);
    }

    #[test]
    fn absorbable_hydrogen_rule() {
        let flags = |s: &str| absorbable_hydrogens(&smarts(s));
        assert_eq!(flags("C[H]"), vec![false, true]);
        assert_eq!(flags("[#1]C"), vec![true, false]);
        assert_eq!(flags("C[H,O]"), vec![false, false]);
        assert_eq!(flags("C=[H]"), vec![false, false]);
        assert_eq!(flags("C[2H]"), vec![false, false]);
        assert_eq!(flags("[H]"), vec![false]);
    }

    #[test]
    fn map_classes_do_not_constrain_single_molecule_matching() {
        assert!(has_smarts_match(&mol("CC"), &smarts("[C:1][C:2]")));
        assert!(has_smarts_match(&mol("[CH3:7]C"), &smarts("[C:?9]")));
    }
}
