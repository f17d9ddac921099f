use std::collections::VecDeque;

use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// Smallest set of smallest rings with per-atom and per-bond lookup tables.
///
/// Built once per target molecule and shared by every SMARTS ring primitive
/// (`R`, `r`, `x`, `@`) evaluated against it.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
    atom_ring_count: Vec<u8>,
    atom_smallest: Vec<Option<u8>>,
    ring_bonds: Vec<bool>,
}

impl RingInfo {
    pub fn sssr<A, B>(mol: &Mol<A, B>) -> Self {
        let mut info = Self {
            rings: Vec::new(),
            atom_ring_count: vec![0; mol.atom_count()],
            atom_smallest: vec![None; mol.atom_count()],
            ring_bonds: vec![false; mol.bond_count()],
        };

        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return info;
        }

        let candidates = horton_candidates(mol);
        info.rings = select_independent_rings(&candidates, num_expected, mol);

        for ring in &info.rings {
            let size = ring.len().min(u8::MAX as usize) as u8;
            for (i, &atom) in ring.iter().enumerate() {
                let slot = atom.index();
                info.atom_ring_count[slot] = info.atom_ring_count[slot].saturating_add(1);
                info.atom_smallest[slot] = Some(info.atom_smallest[slot].map_or(size, |s| s.min(size)));
                let next = ring[(i + 1) % ring.len()];
                if let Some(edge) = mol.bond_between(atom, next) {
                    info.ring_bonds[edge.index()] = true;
                }
            }
        }

        info
    }

    /// Cyclomatic number `E - V + C`.
    pub fn expected_ring_count<A, B>(mol: &Mol<A, B>) -> usize {
        let v = mol.atom_count();
        let e = mol.bond_count();
        let c = connected_components(mol.graph());
        (e + c).saturating_sub(v)
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.num_atom_rings(atom) > 0
    }

    pub fn is_ring_bond(&self, bond: EdgeIndex) -> bool {
        self.ring_bonds.get(bond.index()).copied().unwrap_or(false)
    }

    /// Number of SSSR rings containing `atom`.
    pub fn num_atom_rings(&self, atom: NodeIndex) -> u8 {
        self.atom_ring_count.get(atom.index()).copied().unwrap_or(0)
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<u8> {
        self.atom_smallest.get(atom.index()).copied().flatten()
    }

    /// Number of ring bonds incident to `atom`.
    pub fn ring_bond_count<A, B>(&self, mol: &Mol<A, B>, atom: NodeIndex) -> u8 {
        mol.bonds_of(atom).filter(|&e| self.is_ring_bond(e)).count() as u8
    }
}

fn horton_candidates<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let (dist, pred) = shortest_path_trees(mol, n);

    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();
    for edge in mol.bonds() {
        let Some((u, v)) = mol.bond_endpoints(edge) else {
            continue;
        };
        for w in 0..n {
            let du = dist[w][u.index()];
            let dv = dist[w][v.index()];
            if du == u32::MAX || dv == u32::MAX || du + dv + 1 < 3 {
                continue;
            }
            let path_u = path_from(&pred[w], NodeIndex::new(w), u);
            let path_v = path_from(&pred[w], NodeIndex::new(w), v);
            if path_u.is_empty() || path_v.is_empty() {
                continue;
            }
            if path_u[1..].iter().any(|node| path_v[1..].contains(node)) {
                continue;
            }
            let mut ring = path_u;
            ring.extend(path_v[1..].iter().rev());
            candidates.push(normalize_ring(&ring));
        }
    }

    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.dedup();
    candidates
}

/// BFS distances and predecessors from every atom.
fn shortest_path_trees<A, B>(
    mol: &Mol<A, B>,
    n: usize,
) -> (Vec<Vec<u32>>, Vec<Vec<Option<NodeIndex>>>) {
    let mut dist = vec![vec![u32::MAX; n]; n];
    let mut pred = vec![vec![None; n]; n];
    for src in 0..n {
        dist[src][src] = 0;
        let mut queue = VecDeque::from([NodeIndex::new(src)]);
        while let Some(cur) = queue.pop_front() {
            let d = dist[src][cur.index()];
            for nb in mol.sorted_neighbors(cur) {
                if dist[src][nb.index()] == u32::MAX {
                    dist[src][nb.index()] = d + 1;
                    pred[src][nb.index()] = Some(cur);
                    queue.push_back(nb);
                }
            }
        }
    }
    (dist, pred)
}

fn path_from(pred: &[Option<NodeIndex>], src: NodeIndex, dst: NodeIndex) -> Vec<NodeIndex> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        match pred[cur.index()] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

fn select_independent_rings<A, B>(
    candidates: &[Vec<NodeIndex>],
    num_needed: usize,
    mol: &Mol<A, B>,
) -> Vec<Vec<NodeIndex>> {
    let words = mol.bond_count().div_ceil(64);
    let mut result = Vec::with_capacity(num_needed);
    let mut basis: Vec<Vec<u64>> = Vec::with_capacity(num_needed);

    for ring in candidates {
        if result.len() >= num_needed {
            break;
        }
        let mut bv = vec![0u64; words];
        for (i, &a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            if let Some(edge) = mol.bond_between(a, b) {
                bv[edge.index() / 64] |= 1u64 << (edge.index() % 64);
            }
        }
        if try_add_to_basis(&mut basis, bv) {
            result.push(ring.clone());
        }
    }

    result
}

/// Gaussian elimination over GF(2); keeps the reduced vector if it is
/// independent of the current basis.
fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                for (vw, rw) in v.iter_mut().zip(row) {
                    *vw ^= *rw;
                }
            }
        }
    }
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &word)| word != 0)
        .map(|(i, &word)| i * 64 + word.trailing_zeros() as usize)
}

/// Rotates the ring to start at its lowest atom and fixes the direction.
fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    let Some(min_pos) = (0..ring.len()).min_by_key(|&i| ring[i]) else {
        return Vec::new();
    };
    let len = ring.len();
    let mut normalized: Vec<NodeIndex> = (0..len).map(|i| ring[(min_pos + i) % len]).collect();
    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::from_smiles;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn cyclohexane() {
        let mol = from_smiles("C1CCCCC1").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert_eq!(ri.num_rings(), 1);
        assert_eq!(ri.rings()[0].len(), 6);
        assert!(mol.bonds().all(|e| ri.is_ring_bond(e)));
    }

    #[test]
    fn acyclic() {
        let mol = from_smiles("CCCC").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert_eq!(ri.num_rings(), 0);
        assert!(!ri.is_ring_atom(n(0)));
        assert_eq!(ri.smallest_ring_size(n(0)), None);
    }

    #[test]
    fn naphthalene_fusion_atoms() {
        let mol = from_smiles("c1ccc2ccccc2c1").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert_eq!(ri.num_rings(), 2);
        assert!(ri.rings().iter().all(|r| r.len() == 6));
        assert_eq!(ri.num_atom_rings(n(3)), 2);
        assert_eq!(ri.num_atom_rings(n(0)), 1);
        assert_eq!(ri.ring_bond_count(&mol, n(3)), 3);
    }

    #[test]
    fn cubane_cyclomatic_number() {
        let mol = from_smiles("C12C3C4C1C5C2C3C45").unwrap();
        assert_eq!(RingInfo::expected_ring_count(&mol), 5);
        assert_eq!(RingInfo::sssr(&mol).num_rings(), 5);
    }

    #[test]
    fn norbornane_smallest_rings() {
        let mol = from_smiles("C1CC2CCC1C2").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert_eq!(ri.num_rings(), 2);
        assert_eq!(ri.smallest_ring_size(n(0)), Some(5));
    }

    #[test]
    fn toluene_methyl_outside_ring() {
        let mol = from_smiles("Cc1ccccc1").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert!(!ri.is_ring_atom(n(0)));
        assert!(ri.is_ring_atom(n(1)));
        let exocyclic = mol.bond_between(n(0), n(1)).unwrap();
        assert!(!ri.is_ring_bond(exocyclic));
        assert_eq!(ri.smallest_ring_size(n(1)), Some(6));
    }

    #[test]
    fn disconnected_rings() {
        let mol = from_smiles("C1CC1.C1CCC1").unwrap();
        let ri = RingInfo::sssr(&mol);
        assert_eq!(ri.num_rings(), 2);
        assert_eq!(ri.smallest_ring_size(n(0)), Some(3));
        assert_eq!(ri.smallest_ring_size(n(3)), Some(4));
    }
}
