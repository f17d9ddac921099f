//! Reaction substructure matching with atom-map constraints.
//!
//! ```
//! use rxnmatch::{AamPolicy, MatchOptions, QueryReaction, ReactionMatcher, TargetReaction};
//!
//! let query = QueryReaction::from_smarts("[C:1][C:1]>>[C:1]").unwrap();
//! let target = TargetReaction::from_smiles("[CH3:7][CH3:7]>>[CH3:7][CH3:8]").unwrap();
//! let matcher = ReactionMatcher::new(&target, MatchOptions::with_policy(AamPolicy::DaylightAam));
//! assert!(matcher.has_match(&query));
//! ```

mod config;
mod result;
mod search;

pub use config::{AamPolicy, ConfigError, MatchOptions};
pub use result::{HighlightedReaction, MoleculeCorrespondence, ReactionMatch, TargetAtom, TargetBond};

use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
use crate::reaction::{MolId, QueryReaction, TargetReaction};
use crate::rings::RingInfo;
use crate::smarts::MatchContext;

use search::Search;

struct TargetMolecule<'t> {
    id: MolId,
    mol: &'t Mol<Atom, Bond>,
    rings: RingInfo,
}

/// Matches query reactions against one target reaction.
///
/// Ring perception for the target runs once in [`ReactionMatcher::new`] and
/// is shared by every query.
pub struct ReactionMatcher<'t> {
    target: &'t TargetReaction,
    molecules: Vec<TargetMolecule<'t>>,
    options: MatchOptions,
}

impl<'t> ReactionMatcher<'t> {
    pub fn new(target: &'t TargetReaction, options: MatchOptions) -> Self {
        let molecules = target
            .iter()
            .map(|(id, mol)| TargetMolecule {
                id,
                mol,
                rings: RingInfo::sssr(mol),
            })
            .collect();
        Self {
            target,
            molecules,
            options,
        }
    }

    pub fn target(&self) -> &'t TargetReaction {
        self.target
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// The first embedding in search order, or `None` when the query does not
    /// occur. Repeated calls return the same witness.
    pub fn find_first(&self, query: &QueryReaction) -> Option<ReactionMatch<'t>> {
        self.search(query, Some(1)).into_iter().next()
    }

    /// Every embedding, up to [`MatchOptions::max_matches`]. Symmetric
    /// embeddings are reported separately; embeddings that differ only in
    /// which implicit hydrogen was taken are reported once.
    pub fn find_all(&self, query: &QueryReaction) -> Vec<ReactionMatch<'t>> {
        self.search(query, self.options.max_matches)
    }

    pub fn has_match(&self, query: &QueryReaction) -> bool {
        self.find_first(query).is_some()
    }

    fn search(&self, query: &QueryReaction, limit: Option<usize>) -> Vec<ReactionMatch<'t>> {
        let contexts: Vec<(MolId, MatchContext<'_>)> = self
            .molecules
            .iter()
            .map(|target| {
                let mut ctx = MatchContext::new(target.mol, &target.rings);
                for template in query.molecules(target.id.role) {
                    ctx.prepare(template);
                }
                (target.id, ctx)
            })
            .collect();

        tracing::debug!(query = %query, policy = %self.options.policy, "matching reaction");
        Search::new(query, &contexts, self.options.policy, limit)
            .run()
            .into_iter()
            .map(|embedding| ReactionMatch::new(self.target, embedding))
            .collect()
    }
}

/// Compiles `query`, loads `target` and reports whether the query occurs.
pub fn has_reaction_match(query: &str, target: &str, options: MatchOptions) -> crate::Result<bool> {
    let query = QueryReaction::from_smarts(query)?;
    let target = TargetReaction::from_smiles(target)?;
    Ok(ReactionMatcher::new(&target, options).has_match(&query))
}

/// Like [`has_reaction_match`], returning the highlighted target of the
/// first embedding.
pub fn highlight_reaction_match(
    query: &str,
    target: &str,
    options: MatchOptions,
) -> crate::Result<Option<HighlightedReaction>> {
    let query = QueryReaction::from_smarts(query)?;
    let target = TargetReaction::from_smiles(target)?;
    let matcher = ReactionMatcher::new(&target, options);
    Ok(matcher.find_first(&query).map(|m| m.highlighted_target()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::Role;
    use petgraph::graph::{EdgeIndex, NodeIndex};

    fn query(s: &str) -> QueryReaction {
        QueryReaction::from_smarts(s).unwrap_or_else(|e| panic!("bad reaction SMARTS {s:?}: {e}"))
    }

    fn target(s: &str) -> TargetReaction {
        TargetReaction::from_smiles(s).unwrap_or_else(|e| panic!("bad reaction SMILES {s:?}: {e}"))
    }

    fn matches_with(q: &str, t: &str, policy: AamPolicy) -> bool {
        let t = target(t);
        ReactionMatcher::new(&t, policy.into()).has_match(&query(q))
    }

    fn matches(q: &str, t: &str) -> bool {
        matches_with(q, t, AamPolicy::DaylightAam)
    }

    const T78: &str = "[CH3:7][CH3:8]>>[CH3:7][CH3:8]";

    #[test]
    fn unmapped_queries() {
        assert!(matches("C>>C", "CC>>CC"));
        assert!(matches("C>>C", T78));
        assert!(matches("CC>>CC", T78));
        assert!(!matches("N>>C", T78));
        assert!(!matches("C>>N", T78));
    }

    #[test]
    fn one_sided_map_numbers_are_free() {
        assert!(matches("[C:1]>>C", T78));
        assert!(matches("[C:1]>>[C:2]", T78));
        assert!(matches("[C:1]>>[C:2]", "C>>C"));
    }

    #[test]
    fn required_maps_need_mapped_target_atoms() {
        assert!(!matches("[C:1]>>[C:1]", "[C]>>[C]"));
        assert!(matches("[C:?1]>>[C:?1]", "[C]>>[C]"));
        assert!(matches("[C:1]>>[C:1]", T78));
        assert!(!matches("[C:1]>>[C:?1]", "[C]>>[C]"));
    }

    #[test]
    fn shared_numbers_must_agree() {
        let all7 = "[CH3:7][CH3:7]>>[CH3:7][CH3:7]";
        assert!(matches("[C:1][C:1]>>[C:1]", all7));
        assert!(!matches("[C:1][C:1]>>[C:1]", T78));
        assert!(matches("[C:1][C:1]>>[C:1]", "[CH3:7][CH3:7]>>[CH3:7][CH3:8]"));
        assert!(!matches("[C:1][C:1]>>[C:1]", "[CH3:7][CH3:7]>>[CH3:8][CH3:8]"));
        assert!(matches("[C:?1][C:?1]>>[C:?1]", "[CH3:7][CH3]>>[CH3:7][CH3:8]"));
    }

    #[test]
    fn optional_numbers_are_not_conserved() {
        assert!(matches("[C:?1][C:?1]>>[C:?1]", T78));
        assert!(matches("[C:?1]>>[C:?1]", "[CH4:7]>>[CH4:8]"));
        assert!(!matches("[C:1]>>[C:1]", "[CH4:7]>>[CH4:8]"));
        // Required occurrences still agree among themselves.
        assert!(!matches("[C:1][C:1]>>[C:?1]", T78));
        assert!(matches("[C:1][C:?1]>>[C:1]", T78));
        let t = "[CH3:7][OH:7]>>[CH3:7][OH:7]";
        assert!(matches_with("[C:?1][O:?2]>>[C:?1][O:?2]", t, AamPolicy::StrictAam));
    }

    #[test]
    fn ignore_policy_skips_map_checks() {
        assert!(matches_with("[C:1]>>[C:1]", "[C]>>[C]", AamPolicy::IgnoreAam));
        assert!(matches_with("[C:1][C:1]>>[C:1]", T78, AamPolicy::IgnoreAam));
    }

    #[test]
    fn strict_policy_separates_numbers() {
        let t = "[CH3:7][OH:7]>>[CH3:7][OH:7]";
        assert!(matches_with("[C:1][O:2]>>[C:1][O:2]", t, AamPolicy::DaylightAam));
        assert!(!matches_with("[C:1][O:2]>>[C:1][O:2]", t, AamPolicy::StrictAam));
        assert!(matches_with(
            "[C:1][O:2]>>[C:1][O:2]",
            "[CH3:7][OH:8]>>[CH3:7][OH:8]",
            AamPolicy::StrictAam
        ));
    }

    #[test]
    fn alternation_and_explicit_hydrogen() {
        assert!(matches("C[H,O]>>C", "OC>>OC[H]"));
        assert!(!matches("C[N,S]>>C", "OC>>OC[H]"));
    }

    #[test]
    fn implicit_hydrogens_can_be_matched() {
        assert!(matches("C[H]>>C", "CC>>CC"));
        assert!(matches("[H]C>>C", "CC>>CC"));
        assert!(!matches("[Cl][H]>>C", "CCl>>C"));
        // Methane has four hydrogens to give.
        assert!(matches("[H]C([H])([H])[H]>>C", "C>>C"));
        assert!(!matches("[H]C([H])([H])([H])[H]>>C", "C>>C"));
    }

    #[test]
    fn recursive_expressions() {
        assert!(matches("[C$(CO)]>>[C$(CN)]", "OC>>NC"));
        assert!(!matches("[C$(CN)]>>[C$(CN)]", "OC>>NC"));
    }

    #[test]
    fn agents_must_be_present() {
        assert!(matches("C>[Pt]>C", "C>[Pt]>C"));
        assert!(!matches("C>[Pt]>C", "C>>C"));
        assert!(matches("C>>C", "C>[Pt]>C"));
    }

    #[test]
    fn grouped_templates_stay_in_one_molecule() {
        assert!(matches("(C.O)>>C", "CO>>C"));
        assert!(!matches("(C.O)>>C", "C.O>>C"));
        assert!(matches("C.O>>C", "C.O>>C"));
        assert!(matches("C.O>>C", "CO>>C"));
    }

    #[test]
    fn ungrouped_templates_share_a_molecule_injectively() {
        assert!(matches("C.C>>C", "CC>>C"));
        assert!(!matches("C.C>>C", "C>>C"));
    }

    #[test]
    fn map_lookups() {
        let t = target("OC>>OC[H]");
        let q = query("C[H,O]>>C");
        let matcher = ReactionMatcher::new(&t, MatchOptions::default());
        let m = matcher.find_first(&q).unwrap();

        let reactant = MolId::new(Role::Reactant, 0);
        let product = MolId::new(Role::Product, 0);
        let c = m.map_atom(reactant, NodeIndex::new(0)).unwrap();
        assert_eq!(c, TargetAtom { mol: reactant, atom: NodeIndex::new(1) });
        let o = m.map_atom(reactant, NodeIndex::new(1)).unwrap();
        assert_eq!(o.atom, NodeIndex::new(0));
        let b = m.map_bond(reactant, EdgeIndex::new(0)).unwrap();
        assert_eq!(b.bond, EdgeIndex::new(0));
        assert_eq!(m.map_atom(product, NodeIndex::new(0)).unwrap().atom, NodeIndex::new(1));
        assert!(m.map_atom(product, NodeIndex::new(5)).is_none());
        assert_eq!(m.target_molecule(product), Some(product));

        assert_eq!(m.highlighted_target().smiles(), "CO>>[H]CO |ha:0,1,3,hb:0|");
    }

    #[test]
    fn implicit_hydrogen_maps_to_nothing() {
        let t = target("CC>>CC");
        let q = query("C[H]>>C");
        let matcher = ReactionMatcher::new(&t, MatchOptions::default());
        let m = matcher.find_first(&q).unwrap();
        let reactant = MolId::new(Role::Reactant, 0);
        assert!(m.map_atom(reactant, NodeIndex::new(0)).is_some());
        assert!(m.map_atom(reactant, NodeIndex::new(1)).is_none());
        assert!(m.map_bond(reactant, EdgeIndex::new(0)).is_none());
        let table = m.correspondence();
        assert_eq!(table[0].atoms, vec![Some(0), None]);
        assert_eq!(table[0].bonds, vec![None]);
    }

    #[test]
    fn find_all_respects_the_limit() {
        let t = target("CC>>CC");
        let q = query("CC>>C");
        let all = ReactionMatcher::new(&t, MatchOptions::default()).find_all(&q);
        assert_eq!(all.len(), 4);
        let some = ReactionMatcher::new(&t, MatchOptions::default().max_matches(3)).find_all(&q);
        assert_eq!(some.len(), 3);
        let none = ReactionMatcher::new(&t, MatchOptions::default().max_matches(0)).find_all(&q);
        assert!(none.is_empty());
    }

    #[test]
    fn implicit_hydrogens_are_reported_once() {
        let options = MatchOptions::default();
        let t = target("C>>C");
        assert_eq!(ReactionMatcher::new(&t, options).find_all(&query("C[H]>>C")).len(), 1);
        assert_eq!(ReactionMatcher::new(&t, options).find_all(&query("[H]C[H]>>C")).len(), 1);
        let t = target("CC>>CC");
        assert_eq!(ReactionMatcher::new(&t, options).find_all(&query("C[H]>>C")).len(), 4);
    }

    #[test]
    fn recursive_hydrogens_follow_the_same_rule() {
        assert!(matches("[C;$(C[H])]>>C", "CC>>CC"));
        assert!(!matches("[C;$(C[H])]>>C", "FC(F)(F)F>>C"));
        assert!(matches("[C;$(C[H])]>>C", "FC(F)F>>C"));
    }

    #[test]
    fn repeated_matches_are_identical() {
        let t = target("OCCO>>OCC=O");
        let q = query("OC>>C=O");
        let matcher = ReactionMatcher::new(&t, MatchOptions::default());
        let first = matcher.find_first(&q).unwrap().correspondence();
        for _ in 0..3 {
            assert_eq!(matcher.find_first(&q).unwrap().correspondence(), first);
        }
        assert_eq!(first[0].atoms, vec![Some(0), Some(1)]);
    }
}
