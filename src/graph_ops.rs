use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::atom::{Atom, Chirality};
use crate::mol::{permutation_parity, Mol};

/// Connected fragments as sorted atom lists, ordered by their lowest atom.
pub fn connected_components<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for node in mol.atoms() {
        if visited[node.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(current);
            for neighbor in mol.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenumberError {
    #[error("permutation has {got} entries, molecule has {expected} atoms")]
    WrongLength { expected: usize, got: usize },
    #[error("atom {0} is missing from or repeated in the permutation")]
    NotAPermutation(usize),
}

/// Rebuilds `mol` with atoms in `new_order` (`new_order[new] = old`). Bonds
/// keep their relative order. Chirality tags are re-expressed against the
/// new neighbor numbering so the stereo configuration is unchanged.
pub fn renumber_atoms<B: Clone>(
    mol: &Mol<Atom, B>,
    new_order: &[usize],
) -> Result<Mol<Atom, B>, RenumberError> {
    let n = mol.atom_count();
    if new_order.len() != n {
        return Err(RenumberError::WrongLength {
            expected: n,
            got: new_order.len(),
        });
    }
    let mut old_to_new = vec![usize::MAX; n];
    for (new_idx, &old_idx) in new_order.iter().enumerate() {
        if old_idx >= n || old_to_new[old_idx] != usize::MAX {
            return Err(RenumberError::NotAPermutation(old_idx));
        }
        old_to_new[old_idx] = new_idx;
    }

    let mut renumbered = Mol::new();
    for &old_idx in new_order {
        renumbered.add_atom(mol.atom(NodeIndex::new(old_idx)).clone());
    }
    for edge in mol.bonds() {
        if let Some((a, b)) = mol.bond_endpoints(edge) {
            renumbered.add_bond(
                NodeIndex::new(old_to_new[a.index()]),
                NodeIndex::new(old_to_new[b.index()]),
                mol.bond(edge).clone(),
            );
        }
    }

    for old in mol.atoms() {
        if mol.atom(old).chirality == Chirality::None {
            continue;
        }
        let new = NodeIndex::new(old_to_new[old.index()]);
        let old_order: Vec<usize> = mol
            .sorted_neighbors(old)
            .into_iter()
            .map(|nb| old_to_new[nb.index()])
            .collect();
        let new_order: Vec<usize> = renumbered
            .sorted_neighbors(new)
            .into_iter()
            .map(|nb| nb.index())
            .collect();
        if !permutation_parity(&old_order, &new_order) {
            let atom = renumbered.atom_mut(new);
            atom.chirality = atom.chirality.inverted();
        }
    }

    Ok(renumbered)
}
