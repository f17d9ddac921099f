use petgraph::graph::NodeIndex;

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::mol::{permutation_parity, Mol};

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
struct AtomInvariant {
    atomic_num: u8,
    isotope: u16,
    degree: u8,
    hydrogen_count: u8,
    formal_charge: i8,
    is_aromatic: bool,
    singles: u8,
    doubles: u8,
    triples: u8,
    aromatic_bonds: u8,
    map_num: u16,
    chiral: bool,
}

fn atom_invariant(mol: &Mol<Atom, Bond>, idx: NodeIndex) -> AtomInvariant {
    let atom = mol.atom(idx);
    let mut singles = 0u8;
    let mut doubles = 0u8;
    let mut triples = 0u8;
    let mut aromatic_bonds = 0u8;
    for edge in mol.bonds_of(idx) {
        match mol.bond(edge).order {
            BondOrder::Single => singles += 1,
            BondOrder::Double => doubles += 1,
            BondOrder::Triple => triples += 1,
            BondOrder::Aromatic => aromatic_bonds += 1,
        }
    }
    AtomInvariant {
        atomic_num: atom.atomic_num,
        isotope: atom.isotope,
        degree: mol.degree(idx) as u8,
        hydrogen_count: atom.hydrogen_count,
        formal_charge: atom.formal_charge,
        is_aromatic: atom.is_aromatic,
        singles,
        doubles,
        triples,
        aromatic_bonds,
        map_num: atom.map_num,
        chiral: atom.chirality != Chirality::None,
    }
}

/// Dense ranks from sortable keys; equal keys share the rank of the first
/// member of their class.
fn ranks_from_keys<K: Ord>(keys: &[K]) -> Vec<usize> {
    let n = keys.len();
    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0usize; n];
    for i in 1..n {
        ranks[indices[i]] = if keys[indices[i]] == keys[indices[i - 1]] {
            ranks[indices[i - 1]]
        } else {
            i
        };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Stereo label of a chiral atom under the current ranks: 0 when not chiral,
/// 1 when its neighbors are not yet distinguishable, otherwise 2 or 3 for the
/// two handednesses expressed in rank order.
fn stereo_label(mol: &Mol<Atom, Bond>, idx: NodeIndex, ranks: &[usize]) -> u8 {
    let atom = mol.atom(idx);
    if atom.chirality == Chirality::None {
        return 0;
    }
    let stored: Vec<usize> = mol
        .sorted_neighbors(idx)
        .into_iter()
        .map(|nb| ranks[nb.index()])
        .collect();
    let mut by_rank = stored.clone();
    by_rank.sort_unstable();
    if by_rank.windows(2).any(|w| w[0] == w[1]) {
        return 1;
    }
    let even = permutation_parity(&stored, &by_rank);
    match (atom.chirality, even) {
        (Chirality::Ccw, true) | (Chirality::Cw, false) => 2,
        _ => 3,
    }
}

fn refine(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>) {
    let mut prev_distinct = count_distinct(ranks);
    loop {
        let keys: Vec<(usize, Vec<(usize, BondOrder)>, u8)> = mol
            .atoms()
            .map(|node| {
                let mut nbs: Vec<(usize, BondOrder)> = mol
                    .bonds_of(node)
                    .filter_map(|e| {
                        let other = mol.other_end(e, node)?;
                        Some((ranks[other.index()], mol.bond(e).order))
                    })
                    .collect();
                nbs.sort_unstable();
                (ranks[node.index()], nbs, stereo_label(mol, node, ranks))
            })
            .collect();
        let new_ranks = ranks_from_keys(&keys);
        let distinct = count_distinct(&new_ranks);
        if distinct <= prev_distinct {
            return;
        }
        *ranks = new_ranks;
        prev_distinct = distinct;
    }
}

/// Canonical rank of every atom (`ranks[atom] = position`). The result does
/// not depend on input atom numbering. Ties between symmetry-equivalent atoms
/// are broken deterministically.
pub fn canonical_ordering(mol: &Mol<Atom, Bond>) -> Vec<usize> {
    let n = mol.atom_count();
    if n == 0 {
        return Vec::new();
    }

    let invariants: Vec<AtomInvariant> = mol.atoms().map(|i| atom_invariant(mol, i)).collect();
    let mut ranks = ranks_from_keys(&invariants);
    refine(mol, &mut ranks);

    if count_distinct(&ranks) < n {
        break_ties(mol, &mut ranks, &invariants);
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by_key(|&i| ranks[i]);
    let mut final_ranks = vec![0usize; n];
    for (rank, &atom_idx) in indices.iter().enumerate() {
        final_ranks[atom_idx] = rank;
    }
    final_ranks
}

fn break_ties(mol: &Mol<Atom, Bond>, ranks: &mut Vec<usize>, invariants: &[AtomInvariant]) {
    let n = ranks.len();

    while count_distinct(ranks) < n {
        let Some(tied_rank) = lowest_tied_rank(ranks) else {
            return;
        };
        let tied_atoms: Vec<usize> = (0..n).filter(|&i| ranks[i] == tied_rank).collect();

        // Promote each tied atom in turn and keep the promotion whose refined
        // trace is smallest; the trace only sees invariants and ranks.
        let mut best: Option<(Vec<(AtomInvariant, Vec<usize>, u8)>, Vec<usize>)> = None;
        for &candidate in &tied_atoms {
            let mut trial = ranks.clone();
            for (i, r) in trial.iter_mut().enumerate() {
                if *r == tied_rank && i != candidate {
                    *r = tied_rank + 1;
                }
            }
            refine(mol, &mut trial);
            let trace = trace_of(mol, &trial, invariants);
            if best.as_ref().is_none_or(|(t, _)| trace < *t) {
                best = Some((trace, trial));
            }
        }

        match best {
            Some((_, trial)) => *ranks = trial,
            None => return,
        }
    }
}

fn trace_of(
    mol: &Mol<Atom, Bond>,
    ranks: &[usize],
    invariants: &[AtomInvariant],
) -> Vec<(AtomInvariant, Vec<usize>, u8)> {
    let mut order: Vec<usize> = (0..ranks.len()).collect();
    order.sort_by_key(|&i| ranks[i]);
    order
        .into_iter()
        .map(|i| {
            let node = NodeIndex::new(i);
            let mut nb_ranks: Vec<usize> = mol.neighbors(node).map(|nb| ranks[nb.index()]).collect();
            nb_ranks.sort_unstable();
            (invariants[i].clone(), nb_ranks, stereo_label(mol, node, ranks))
        })
        .collect()
}

fn lowest_tied_rank(ranks: &[usize]) -> Option<usize> {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
}
