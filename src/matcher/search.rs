use std::collections::{BTreeSet, HashMap};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;
use crate::reaction::{MolId, QueryReaction, Role};
use crate::smarts::{absorbable_hydrogens, AtomExpr, BondExpr, MatchContext};
use crate::substruct::search_order_with;

use super::config::AamPolicy;

/// One query molecule embedded in one target molecule. Query atoms matched
/// against an implicit hydrogen, and their bonds, are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub query: MolId,
    pub target: MolId,
    pub atoms: Vec<Option<NodeIndex>>,
    pub bonds: Vec<Option<EdgeIndex>>,
}

/// Placements for every query molecule, reactants first.
pub(crate) type Embedding = Vec<Placement>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Atom(NodeIndex),
    /// One of the implicit hydrogens carried by the host atom.
    ImplicitH(NodeIndex),
}

#[derive(Debug, Clone, Copy)]
struct GroupRef {
    group: usize,
    optional: bool,
}

/// Target map number currently bound to a constrained query map number.
#[derive(Debug, Clone, Copy, Default)]
struct GroupState {
    value: Option<u16>,
    hits: usize,
}

struct MolPlan<'q> {
    id: MolId,
    mol: &'q Mol<AtomExpr, BondExpr>,
    order: Vec<NodeIndex>,
    /// Indices into the prepared target list with the same role.
    targets: Vec<usize>,
    absorbable: Vec<bool>,
    groups: Vec<Option<GroupRef>>,
}

/// Backtracking search over every atom of a query reaction.
pub(crate) struct Search<'a, 'q> {
    plans: Vec<MolPlan<'q>>,
    targets: &'a [(MolId, MatchContext<'a>)],
    strict: bool,
    limit: Option<usize>,
    binding: Vec<usize>,
    slots: Vec<Vec<Slot>>,
    used: Vec<Vec<bool>>,
    absorbed: Vec<Vec<u8>>,
    groups: Vec<GroupState>,
    results: Vec<Embedding>,
}

impl<'a, 'q> Search<'a, 'q> {
    pub(crate) fn new(
        query: &'q QueryReaction,
        targets: &'a [(MolId, MatchContext<'a>)],
        policy: AamPolicy,
        limit: Option<usize>,
    ) -> Self {
        let numbers = constrained_numbers(query, policy);
        let plans: Vec<MolPlan<'q>> = query
            .iter()
            .map(|(id, mol)| plan_molecule(id, mol, targets, &numbers))
            .collect();

        Self {
            binding: vec![0; plans.len()],
            slots: plans
                .iter()
                .map(|p| vec![Slot::Empty; p.mol.atom_count()])
                .collect(),
            used: targets
                .iter()
                .map(|(_, ctx)| vec![false; ctx.mol.atom_count()])
                .collect(),
            absorbed: targets
                .iter()
                .map(|(_, ctx)| vec![0; ctx.mol.atom_count()])
                .collect(),
            groups: vec![GroupState::default(); numbers.len()],
            plans,
            targets,
            strict: policy == AamPolicy::StrictAam,
            limit,
            results: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) -> Vec<Embedding> {
        tracing::debug!(
            molecules = self.plans.len(),
            atoms = self.slots.iter().map(Vec::len).sum::<usize>(),
            constrained_maps = self.groups.len(),
            strict = self.strict,
            "starting reaction search"
        );
        if self.limit != Some(0) {
            self.place_molecule(0);
        }
        tracing::debug!(matches = self.results.len(), "reaction search finished");
        self.results
    }

    fn done(&self) -> bool {
        self.limit.is_some_and(|limit| self.results.len() >= limit)
    }

    fn place_molecule(&mut self, m: usize) {
        if m == self.plans.len() {
            self.record();
            return;
        }
        for i in 0..self.plans[m].targets.len() {
            self.binding[m] = self.plans[m].targets[i];
            self.place_atom(m, 0);
            if self.done() {
                return;
            }
        }
    }

    fn place_atom(&mut self, m: usize, depth: usize) {
        if depth == self.plans[m].order.len() {
            self.place_molecule(m + 1);
            return;
        }
        let q = self.plans[m].order[depth];

        for slot in self.candidates(m, q) {
            if !self.feasible(m, q, slot) {
                continue;
            }
            self.assign(m, q, slot);
            self.place_atom(m, depth + 1);
            self.unassign(m, q, slot);
            if self.done() {
                return;
            }
            tracing::trace!(molecule = %self.plans[m].id, atom = q.index(), "backtrack");
        }
    }

    /// Explicit target atoms in ascending index order, then an implicit
    /// hydrogen of the host when the query atom may be one.
    fn candidates(&self, m: usize, q: NodeIndex) -> Vec<Slot> {
        let plan = &self.plans[m];
        let target = self.targets[self.binding[m]].1.mol;
        let placed = plan
            .mol
            .sorted_neighbors(q)
            .into_iter()
            .find_map(|nb| match self.slots[m][nb.index()] {
                Slot::Atom(t) => Some(t),
                _ => None,
            });

        let mut out: Vec<Slot> = match placed {
            Some(t_neighbor) => target
                .sorted_neighbors(t_neighbor)
                .into_iter()
                .map(Slot::Atom)
                .collect(),
            None => target.atoms().map(Slot::Atom).collect(),
        };
        if let (true, Some(host)) = (plan.absorbable[q.index()], placed) {
            out.push(Slot::ImplicitH(host));
        }
        out
    }

    fn feasible(&self, m: usize, q: NodeIndex, slot: Slot) -> bool {
        let plan = &self.plans[m];
        let t_mol = self.binding[m];
        let ctx = &self.targets[t_mol].1;

        match slot {
            Slot::Empty => return false,
            Slot::Atom(t) => {
                if self.used[t_mol][t.index()] || !plan.mol.atom(q).matches(ctx, t) {
                    return false;
                }
                for q_bond in plan.mol.bonds_of(q) {
                    let Some(q_neighbor) = plan.mol.other_end(q_bond, q) else {
                        continue;
                    };
                    match self.slots[m][q_neighbor.index()] {
                        Slot::Empty => {}
                        Slot::Atom(t_neighbor) => match ctx.mol.bond_between(t, t_neighbor) {
                            Some(t_bond) if plan.mol.bond(q_bond).matches(ctx, t_bond) => {}
                            _ => return false,
                        },
                        Slot::ImplicitH(_) => return false,
                    }
                }
            }
            Slot::ImplicitH(host) => {
                if self.absorbed[t_mol][host.index()] >= ctx.mol.atom(host).hydrogen_count {
                    return false;
                }
            }
        }

        self.aam_allows(plan.groups[q.index()], self.map_num(m, slot))
    }

    /// Optional occurrences never bind or veto a group; only required ones
    /// are compared.
    fn aam_allows(&self, group: Option<GroupRef>, map_num: u16) -> bool {
        let Some(group) = group.filter(|g| !g.optional) else {
            return true;
        };
        if map_num == 0 {
            return false;
        }
        match self.groups[group.group].value {
            Some(value) => value == map_num,
            None => !self.strict || self.groups.iter().all(|g| g.value != Some(map_num)),
        }
    }

    fn map_num(&self, m: usize, slot: Slot) -> u16 {
        match slot {
            Slot::Atom(t) => self.targets[self.binding[m]].1.mol.atom(t).map_num,
            Slot::Empty | Slot::ImplicitH(_) => 0,
        }
    }

    /// The group a required occurrence binds, with the target map number it
    /// binds to.
    fn binding_group(&self, m: usize, q: NodeIndex, slot: Slot) -> Option<(usize, u16)> {
        let group = self.plans[m].groups[q.index()].filter(|g| !g.optional)?;
        let map_num = self.map_num(m, slot);
        (map_num != 0).then_some((group.group, map_num))
    }

    fn assign(&mut self, m: usize, q: NodeIndex, slot: Slot) {
        let t_mol = self.binding[m];
        match slot {
            Slot::Atom(t) => self.used[t_mol][t.index()] = true,
            Slot::ImplicitH(host) => self.absorbed[t_mol][host.index()] += 1,
            Slot::Empty => {}
        }
        if let Some((group, map_num)) = self.binding_group(m, q, slot) {
            let state = &mut self.groups[group];
            state.value = Some(map_num);
            state.hits += 1;
        }
        self.slots[m][q.index()] = slot;
    }

    fn unassign(&mut self, m: usize, q: NodeIndex, slot: Slot) {
        let t_mol = self.binding[m];
        match slot {
            Slot::Atom(t) => self.used[t_mol][t.index()] = false,
            Slot::ImplicitH(host) => self.absorbed[t_mol][host.index()] -= 1,
            Slot::Empty => {}
        }
        if let Some((group, _)) = self.binding_group(m, q, slot) {
            let state = &mut self.groups[group];
            state.hits -= 1;
            if state.hits == 0 {
                state.value = None;
            }
        }
        self.slots[m][q.index()] = Slot::Empty;
    }

    fn record(&mut self) {
        let embedding: Embedding = self
            .plans
            .iter()
            .enumerate()
            .map(|(m, plan)| {
                let (target_id, ctx) = &self.targets[self.binding[m]];
                let atoms: Vec<Option<NodeIndex>> = self.slots[m]
                    .iter()
                    .map(|slot| match slot {
                        Slot::Atom(t) => Some(*t),
                        Slot::Empty | Slot::ImplicitH(_) => None,
                    })
                    .collect();
                let bonds = plan
                    .mol
                    .bonds()
                    .map(|e| {
                        let (a, b) = plan.mol.bond_endpoints(e)?;
                        ctx.mol.bond_between(atoms[a.index()]?, atoms[b.index()]?)
                    })
                    .collect();
                Placement {
                    query: plan.id,
                    target: *target_id,
                    atoms,
                    bonds,
                }
            })
            .collect();
        // Absorbing a different implicit hydrogen of the same host yields the
        // same placements.
        if !self.results.contains(&embedding) {
            self.results.push(embedding);
        }
    }
}

fn plan_molecule<'q>(
    id: MolId,
    mol: &'q Mol<AtomExpr, BondExpr>,
    targets: &[(MolId, MatchContext<'_>)],
    numbers: &HashMap<u16, usize>,
) -> MolPlan<'q> {
    let absorbable = absorbable_hydrogens(mol);
    let order = search_order_with(mol, None, |q| absorbable[q.index()]);
    let groups = mol
        .atoms()
        .map(|q| {
            if id.role == Role::Agent {
                return None;
            }
            let class = mol.atom(q).map_class()?;
            numbers.get(&class.number).map(|&group| GroupRef {
                group,
                optional: class.optional,
            })
        })
        .collect();

    MolPlan {
        id,
        mol,
        order,
        targets: targets
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| t.role == id.role)
            .map(|(i, _)| i)
            .collect(),
        absorbable,
        groups,
    }
}

/// Query map numbers used on both the reactant and the product side, each
/// assigned a dense group index.
fn constrained_numbers(query: &QueryReaction, policy: AamPolicy) -> HashMap<u16, usize> {
    if policy == AamPolicy::IgnoreAam {
        return HashMap::new();
    }
    let reactant = map_numbers(query.reactants());
    let product = map_numbers(query.products());
    reactant
        .intersection(&product)
        .enumerate()
        .map(|(group, &number)| (number, group))
        .collect()
}

fn map_numbers(mols: &[Mol<AtomExpr, BondExpr>]) -> BTreeSet<u16> {
    mols.iter()
        .flat_map(|mol| mol.atoms().filter_map(|q| mol.atom(q).map_class()))
        .map(|class| class.number)
        .filter(|&n| n != 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrained_numbers_need_both_sides() {
        let query = QueryReaction::from_smarts("[C:1][O:2].[N:3]>[Pt:1]>[C:1][N:3]").unwrap();
        let numbers = constrained_numbers(&query, AamPolicy::DaylightAam);
        assert_eq!(numbers.len(), 2);
        assert!(numbers.contains_key(&1));
        assert!(numbers.contains_key(&3));
        assert!(!numbers.contains_key(&2));
        assert!(constrained_numbers(&query, AamPolicy::IgnoreAam).is_empty());
    }
}
