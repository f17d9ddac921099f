use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// `(query atom, target atom)` pairs in query atom order. Query atoms matched
/// against an implicit hydrogen are left out.
pub type AtomMapping = Vec<(NodeIndex, NodeIndex)>;

pub fn has_substruct_match_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(NodeIndex, NodeIndex) -> bool,
    bond_match: impl Fn(EdgeIndex, EdgeIndex) -> bool,
) -> bool {
    get_substruct_match_with(target, query, atom_match, bond_match).is_some()
}

/// First embedding of `query` into `target`.
///
/// `atom_match(target_atom, query_atom)` and `bond_match(target_bond,
/// query_bond)` receive indices so callers can consult per-molecule data
/// (ring membership, neighbors) alongside the atom and bond values.
pub fn get_substruct_match_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(NodeIndex, NodeIndex) -> bool,
    bond_match: impl Fn(EdgeIndex, EdgeIndex) -> bool,
) -> Option<AtomMapping> {
    Vf2::new(target, query, atom_match, bond_match).find_first()
}

pub fn get_substruct_matches_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(NodeIndex, NodeIndex) -> bool,
    bond_match: impl Fn(EdgeIndex, EdgeIndex) -> bool,
) -> Vec<AtomMapping> {
    Vf2::new(target, query, atom_match, bond_match).find_all()
}

/// Order in which query atoms are placed.
///
/// Each connected component starts at `root` when given (and in that
/// component), otherwise at its highest-degree atom. The next atom is always
/// the one with the most already-placed neighbors, so every atom after the
/// first of a component has a placed neighbor to draw candidates from.
/// Ties go to higher degree, then lower index.
pub fn search_order<A, B>(query: &Mol<A, B>, root: Option<NodeIndex>) -> Vec<NodeIndex> {
    search_order_with(query, root, |_| false)
}

/// Like [`search_order`], but atoms for which `deferred` holds only start a
/// component when every unplaced atom is deferred.
pub fn search_order_with<A, B>(
    query: &Mol<A, B>,
    root: Option<NodeIndex>,
    deferred: impl Fn(NodeIndex) -> bool,
) -> Vec<NodeIndex> {
    let n = query.atom_count();
    let mut placed = vec![false; n];
    let mut placed_neighbors = vec![0usize; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n)
            .filter(|&i| !placed[i] && placed_neighbors[i] > 0)
            .max_by_key(|&i| (placed_neighbors[i], query.degree(NodeIndex::new(i)), std::cmp::Reverse(i)));
        let next = match next {
            Some(i) => i,
            None => match root.filter(|r| r.index() < n && !placed[r.index()]) {
                Some(r) => r.index(),
                None => {
                    let Some(start) = (0..n)
                        .filter(|&i| !placed[i])
                        .max_by_key(|&i| {
                            let node = NodeIndex::new(i);
                            (!deferred(node), query.degree(node), std::cmp::Reverse(i))
                        })
                    else {
                        break;
                    };
                    start
                }
            },
        };

        placed[next] = true;
        let node = NodeIndex::new(next);
        order.push(node);
        for nb in query.neighbors(node) {
            placed_neighbors[nb.index()] += 1;
        }
    }

    order
}

/// Backtracking subgraph matcher over index-aware predicates.
pub struct Vf2<'a, A1, B1, A2, B2, FA, FB> {
    target: &'a Mol<A1, B1>,
    query: &'a Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
    query_order: Vec<NodeIndex>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    anchor: Option<(NodeIndex, NodeIndex)>,
    absorbable: Vec<bool>,
    implicit_h: Vec<u8>,
    absorbed: Vec<u8>,
}

impl<'a, A1, B1, A2, B2, FA, FB> Vf2<'a, A1, B1, A2, B2, FA, FB>
where
    FA: Fn(NodeIndex, NodeIndex) -> bool,
    FB: Fn(EdgeIndex, EdgeIndex) -> bool,
{
    pub fn new(
        target: &'a Mol<A1, B1>,
        query: &'a Mol<A2, B2>,
        atom_match: FA,
        bond_match: FB,
    ) -> Self {
        Self {
            target,
            query,
            atom_match,
            bond_match,
            query_order: search_order(query, None),
            query_map: vec![None; query.atom_count()],
            target_used: vec![false; target.atom_count()],
            anchor: None,
            absorbable: vec![false; query.atom_count()],
            implicit_h: vec![0; target.atom_count()],
            absorbed: vec![0; target.atom_count()],
        }
    }

    /// Lets each query atom flagged in `absorbable` match one of the implicit
    /// hydrogens (`implicit_h(target_atom)` of them) on the target atom its
    /// neighbor is mapped to. Explicit candidates are still tried first.
    pub fn with_implicit_hydrogens(
        mut self,
        absorbable: Vec<bool>,
        implicit_h: impl Fn(NodeIndex) -> u8,
    ) -> Self {
        self.implicit_h = self.target.atoms().map(implicit_h).collect();
        self.absorbable = absorbable;
        self.anchor = None;
        self.query_order = self.order_for(None);
        self
    }

    pub fn find_first(&mut self) -> Option<AtomMapping> {
        self.reset(None);
        let mut results = Vec::new();
        self.recurse(0, &mut results, true);
        results.into_iter().next()
    }

    pub fn find_all(&mut self) -> Vec<AtomMapping> {
        self.reset(None);
        let mut results = Vec::new();
        self.recurse(0, &mut results, false);
        results
    }

    /// First embedding that sends `query_atom` to `target_atom`.
    pub fn find_anchored(
        &mut self,
        query_atom: NodeIndex,
        target_atom: NodeIndex,
    ) -> Option<AtomMapping> {
        self.reset(Some((query_atom, target_atom)));
        let mut results = Vec::new();
        self.recurse(0, &mut results, true);
        results.into_iter().next()
    }

    fn reset(&mut self, anchor: Option<(NodeIndex, NodeIndex)>) {
        if anchor.map(|a| a.0) != self.anchor.map(|a| a.0) {
            self.query_order = self.order_for(anchor.map(|a| a.0));
        }
        self.anchor = anchor;
        self.query_map.iter_mut().for_each(|m| *m = None);
        self.target_used.iter_mut().for_each(|u| *u = false);
        self.absorbed.iter_mut().for_each(|n| *n = 0);
    }

    fn order_for(&self, root: Option<NodeIndex>) -> Vec<NodeIndex> {
        let absorbable = &self.absorbable;
        search_order_with(self.query, root, |q| {
            absorbable.get(q.index()).copied().unwrap_or(false)
        })
    }

    fn recurse(&mut self, depth: usize, results: &mut Vec<AtomMapping>, first_only: bool) {
        if depth == self.query_order.len() {
            let mapping = self
                .query_map
                .iter()
                .enumerate()
                .filter_map(|(q, t)| t.map(|t| (NodeIndex::new(q), t)))
                .collect();
            results.push(mapping);
            return;
        }

        let query_node = self.query_order[depth];

        for target_node in self.candidates(query_node) {
            if !self.is_feasible(query_node, target_node) {
                continue;
            }

            self.query_map[query_node.index()] = Some(target_node);
            self.target_used[target_node.index()] = true;

            self.recurse(depth + 1, results, first_only);

            self.query_map[query_node.index()] = None;
            self.target_used[target_node.index()] = false;

            if first_only && !results.is_empty() {
                return;
            }
        }

        if let Some(host) = self.implicit_host(query_node) {
            self.absorbed[host.index()] += 1;
            self.recurse(depth + 1, results, first_only);
            self.absorbed[host.index()] -= 1;
        }
    }

    /// The target atom whose implicit hydrogen `query_node` may take, if any
    /// is still free.
    fn implicit_host(&self, query_node: NodeIndex) -> Option<NodeIndex> {
        if !self.absorbable[query_node.index()]
            || self.anchor.is_some_and(|(q, _)| q == query_node)
        {
            return None;
        }
        let host = self.placed_neighbor(query_node)?;
        (self.absorbed[host.index()] < self.implicit_h[host.index()]).then_some(host)
    }

    fn placed_neighbor(&self, query_node: NodeIndex) -> Option<NodeIndex> {
        self.query
            .sorted_neighbors(query_node)
            .into_iter()
            .find_map(|nb| self.query_map[nb.index()])
    }

    fn candidates(&self, query_node: NodeIndex) -> Vec<NodeIndex> {
        if let Some((q, t)) = self.anchor {
            if q == query_node {
                return vec![t];
            }
        }
        match self.placed_neighbor(query_node) {
            Some(t_neighbor) => self.target.sorted_neighbors(t_neighbor),
            None => self.target.atoms().collect(),
        }
    }

    fn is_feasible(&self, query_node: NodeIndex, target_node: NodeIndex) -> bool {
        if self.target_used[target_node.index()] {
            return false;
        }
        if !(self.atom_match)(target_node, query_node) {
            return false;
        }

        for q_bond in self.query.bonds_of(query_node) {
            let Some(q_neighbor) = self.query.other_end(q_bond, query_node) else {
                continue;
            };
            let Some(t_mapped) = self.query_map[q_neighbor.index()] else {
                continue;
            };
            match self.target.bond_between(target_node, t_mapped) {
                Some(t_bond) if (self.bond_match)(t_bond, q_bond) => {}
                _ => return false,
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;
    use crate::{Atom, Bond};

    fn mol(smiles: &str) -> Mol<Atom, Bond> {
        from_smiles(smiles).unwrap_or_else(|e| panic!("bad SMILES {smiles:?}: {e}"))
    }

    /// Element, aromaticity and bond order equality.
    fn exact_matches(target: &Mol<Atom, Bond>, query: &Mol<Atom, Bond>) -> Vec<AtomMapping> {
        get_substruct_matches_with(
            target,
            query,
            |t, q| {
                let (t, q) = (target.atom(t), query.atom(q));
                t.atomic_num == q.atomic_num && t.is_aromatic == q.is_aromatic
            },
            |t, q| target.bond(t).order == query.bond(q).order,
        )
    }

    fn has_exact_match(target: &Mol<Atom, Bond>, query: &Mol<Atom, Bond>) -> bool {
        has_substruct_match_with(
            target,
            query,
            |t, q| target.atom(t).atomic_num == query.atom(q).atomic_num,
            |t, q| target.bond(t).order == query.bond(q).order,
        )
    }

    #[test]
    fn ethanol_contains_cc() {
        assert!(has_exact_match(&mol("CCO"), &mol("CC")));
        assert_eq!(exact_matches(&mol("CCO"), &mol("CC")).len(), 2);
    }

    #[test]
    fn methane_does_not_contain_cc() {
        assert!(!has_exact_match(&mol("C"), &mol("CC")));
        assert!(exact_matches(&mol("C"), &mol("CC")).is_empty());
    }

    #[test]
    fn cyclohexane_cc_matches_cover_all_edges() {
        let target = mol("C1CCCCC1");
        let matches = exact_matches(&target, &mol("CC"));
        assert_eq!(matches.len(), 12);
        for mapping in &matches {
            assert_eq!(mapping.len(), 2);
            assert_eq!(mapping[0].0, NodeIndex::new(0));
            assert!(target.bond_between(mapping[0].1, mapping[1].1).is_some());
        }
    }

    #[test]
    fn benzene_automorphisms() {
        let benzene = mol("c1ccccc1");
        let matches = exact_matches(&benzene, &benzene);
        assert_eq!(matches.len(), 12);
        for (i, a) in matches.iter().enumerate() {
            for b in matches.iter().skip(i + 1) {
                assert_ne!(a, b, "duplicate mapping found");
            }
        }
    }

    #[test]
    fn empty_query_matches_once() {
        let target = mol("CCO");
        let query = Mol::<Atom, Bond>::new();
        let all = exact_matches(&target, &query);
        assert_eq!(all.len(), 1);
        assert!(all[0].is_empty());
    }

    #[test]
    fn bond_orders_are_compared() {
        assert!(has_exact_match(&mol("C=C"), &mol("C=C")));
        assert!(!has_exact_match(&mol("CC"), &mol("C=C")));
        assert!(!has_exact_match(&mol("C=C"), &mol("CC")));
        assert!(!has_exact_match(&mol("CN"), &mol("C#N")));
    }

    #[test]
    fn disconnected_query_components() {
        let target = mol("[Na+].[Cl-]");
        let query = mol("[Cl-].[Na+]");
        let matches = exact_matches(&target, &query);
        assert_eq!(matches, vec![vec![
            (NodeIndex::new(0), NodeIndex::new(1)),
            (NodeIndex::new(1), NodeIndex::new(0)),
        ]]);
    }

    #[test]
    fn anchored_search() {
        let target = mol("OCCO");
        let query = mol("OC");
        let mut vf2 = Vf2::new(
            &target,
            &query,
            |t, q| target.atom(t).atomic_num == query.atom(q).atomic_num,
            |_, _| true,
        );
        assert!(vf2.find_anchored(NodeIndex::new(0), NodeIndex::new(3)).is_some());
        assert!(vf2.find_anchored(NodeIndex::new(0), NodeIndex::new(1)).is_none());
        let m = vf2.find_anchored(NodeIndex::new(1), NodeIndex::new(1)).unwrap();
        assert_eq!(m, vec![
            (NodeIndex::new(0), NodeIndex::new(0)),
            (NodeIndex::new(1), NodeIndex::new(1)),
        ]);
    }

    #[test]
    fn search_order_is_connected() {
        let query = mol("CC(C)(C)CCO");
        let order = search_order(&query, None);
        assert_eq!(order[0], NodeIndex::new(1));
        for (i, &node) in order.iter().enumerate().skip(1) {
            assert!(query.neighbors(node).any(|nb| order[..i].contains(&nb)));
        }
        let rooted = search_order(&query, Some(NodeIndex::new(6)));
        assert_eq!(rooted[0], NodeIndex::new(6));
        assert_eq!(rooted[1], NodeIndex::new(5));
    }

    #[test]
    fn deferred_atoms_do_not_start_components() {
        let query = mol("OC");
        assert_eq!(search_order(&query, None)[0], NodeIndex::new(0));
        let order = search_order_with(&query, None, |a| a.index() == 0);
        assert_eq!(order, vec![NodeIndex::new(1), NodeIndex::new(0)]);
        let lone = mol("O");
        assert_eq!(search_order_with(&lone, None, |_| true), vec![NodeIndex::new(0)]);
    }
}
