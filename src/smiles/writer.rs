use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::canonical::canonical_ordering;
use crate::element::Element;
use crate::graph_ops::connected_components;
use crate::mol::{permutation_parity, Mol};
use crate::smiles::builder::{bond_order_sum, implicit_hydrogens};

/// A written SMILES string together with the order in which a reader
/// encounters the atoms (order of appearance) and bonds (order of
/// completion) of the source molecule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmilesOutput {
    pub smiles: String,
    pub atom_order: Vec<NodeIndex>,
    pub bond_order: Vec<EdgeIndex>,
}

pub fn to_smiles(mol: &Mol<Atom, Bond>) -> String {
    write_smiles(mol, false).smiles
}

pub fn to_canonical_smiles(mol: &Mol<Atom, Bond>) -> String {
    write_smiles(mol, true).smiles
}

/// Writes `mol` as SMILES. With `canonical`, traversal starts from and
/// prefers the lowest canonical rank; otherwise input index order is used.
pub fn write_smiles(mol: &Mol<Atom, Bond>, canonical: bool) -> SmilesOutput {
    let ranks: Vec<usize> = if canonical {
        canonical_ordering(mol)
    } else {
        (0..mol.atom_count()).collect()
    };

    let mut components = connected_components(mol);
    components.sort_by_key(|c| c.iter().map(|a| ranks[a.index()]).min());

    let mut writer = Writer {
        mol,
        out: SmilesOutput {
            smiles: String::new(),
            atom_order: Vec::with_capacity(mol.atom_count()),
            bond_order: Vec::with_capacity(mol.bond_count()),
        },
        digits_in_use: [false; 100],
        open_digits: vec![None; mol.bond_count()],
    };
    for (i, component) in components.iter().enumerate() {
        if i > 0 {
            writer.out.smiles.push('.');
        }
        let tree = DfsTree::build(mol, component, &ranks);
        writer.write_node(&tree, tree.root);
    }
    writer.out
}

struct DfsTree {
    root: NodeIndex,
    parent: Vec<Option<NodeIndex>>,
    children: Vec<Vec<NodeIndex>>,
    /// Ring bonds opened at each atom, in write order.
    ring_opens: Vec<Vec<EdgeIndex>>,
    /// Ring bonds closed at each atom, in write order.
    ring_closes: Vec<Vec<EdgeIndex>>,
}

impl DfsTree {
    fn build(mol: &Mol<Atom, Bond>, component: &[NodeIndex], ranks: &[usize]) -> Self {
        let n = mol.atom_count();
        let root = component
            .iter()
            .copied()
            .min_by_key(|a| ranks[a.index()])
            .unwrap_or(NodeIndex::new(0));

        let mut tree = DfsTree {
            root,
            parent: vec![None; n],
            children: vec![Vec::new(); n],
            ring_opens: vec![Vec::new(); n],
            ring_closes: vec![Vec::new(); n],
        };
        let mut visited = vec![false; n];
        let mut seen_bond = vec![false; mol.bond_count()];

        let neighbor_lists: Vec<Vec<(NodeIndex, EdgeIndex)>> = mol
            .atoms()
            .map(|node| {
                let mut nbs: Vec<(NodeIndex, EdgeIndex)> = mol
                    .bonds_of(node)
                    .filter_map(|e| Some((mol.other_end(e, node)?, e)))
                    .collect();
                nbs.sort_by_key(|(nb, _)| ranks[nb.index()]);
                nbs
            })
            .collect();

        let mut stack: Vec<(NodeIndex, usize)> = vec![(root, 0)];
        visited[root.index()] = true;

        while let Some(&mut (node, ref mut ni)) = stack.last_mut() {
            let neighbors = &neighbor_lists[node.index()];
            if *ni >= neighbors.len() {
                stack.pop();
                continue;
            }
            let (neighbor, edge) = neighbors[*ni];
            *ni += 1;
            if seen_bond[edge.index()] {
                continue;
            }
            seen_bond[edge.index()] = true;

            if visited[neighbor.index()] {
                tree.ring_opens[neighbor.index()].push(edge);
                tree.ring_closes[node.index()].push(edge);
            } else {
                visited[neighbor.index()] = true;
                tree.parent[neighbor.index()] = Some(node);
                tree.children[node.index()].push(neighbor);
                stack.push((neighbor, 0));
            }
        }

        tree
    }
}

struct Writer<'m> {
    mol: &'m Mol<Atom, Bond>,
    out: SmilesOutput,
    digits_in_use: [bool; 100],
    open_digits: Vec<Option<u8>>,
}

impl Writer<'_> {
    fn write_node(&mut self, tree: &DfsTree, node: NodeIndex) {
        self.out.atom_order.push(node);
        let chirality = self.written_chirality(tree, node);
        write_atom_symbol(self.mol, node, chirality, &mut self.out.smiles);

        for &edge in &tree.ring_opens[node.index()] {
            let digit = (1..100u8)
                .find(|&d| !self.digits_in_use[d as usize])
                .unwrap_or(99);
            self.digits_in_use[digit as usize] = true;
            self.open_digits[edge.index()] = Some(digit);
            self.write_bond_symbol(edge);
            write_ring_digit(digit, &mut self.out.smiles);
        }

        for &edge in &tree.ring_closes[node.index()] {
            let digit = self.open_digits[edge.index()].take().unwrap_or(99);
            self.digits_in_use[digit as usize] = false;
            self.write_bond_symbol(edge);
            write_ring_digit(digit, &mut self.out.smiles);
            self.out.bond_order.push(edge);
        }

        let kids = &tree.children[node.index()];
        let last = kids.len().saturating_sub(1);
        for (i, &child) in kids.iter().enumerate() {
            let is_branch = i < last;
            if is_branch {
                self.out.smiles.push('(');
            }
            if let Some(edge) = self.mol.bond_between(node, child) {
                self.write_bond_symbol(edge);
                self.out.bond_order.push(edge);
            }
            self.write_node(tree, child);
            if is_branch {
                self.out.smiles.push(')');
            }
        }
    }

    /// Bond symbols are omitted where the reader would infer the same order.
    fn write_bond_symbol(&mut self, edge: EdgeIndex) {
        let Some((a, b)) = self.mol.bond_endpoints(edge) else {
            return;
        };
        let both_aromatic = self.mol.atom(a).is_aromatic && self.mol.atom(b).is_aromatic;
        let symbol = match (self.mol.bond(edge).order, both_aromatic) {
            (BondOrder::Aromatic, true) | (BondOrder::Single, false) => None,
            (BondOrder::Single, true) => Some('-'),
            (BondOrder::Aromatic, false) => Some(':'),
            (BondOrder::Double, _) => Some('='),
            (BondOrder::Triple, _) => Some('#'),
        };
        if let Some(c) = symbol {
            self.out.smiles.push(c);
        }
    }

    fn written_chirality(&self, tree: &DfsTree, node: NodeIndex) -> Chirality {
        const H: usize = usize::MAX;
        let atom = self.mol.atom(node);
        if atom.chirality == Chirality::None {
            return Chirality::None;
        }

        let has_h = atom.hydrogen_count > 0;
        let mut written = Vec::new();
        if let Some(p) = tree.parent[node.index()] {
            written.push(p.index());
        }
        if has_h {
            written.push(H);
        }
        for &edge in tree.ring_opens[node.index()]
            .iter()
            .chain(&tree.ring_closes[node.index()])
        {
            if let Some(other) = self.mol.other_end(edge, node) {
                written.push(other.index());
            }
        }
        written.extend(tree.children[node.index()].iter().map(|c| c.index()));

        let mut reference: Vec<usize> = Vec::with_capacity(written.len());
        if has_h {
            reference.push(H);
        }
        reference.extend(self.mol.sorted_neighbors(node).iter().map(|nb| nb.index()));

        if permutation_parity(&reference, &written) {
            atom.chirality
        } else {
            atom.chirality.inverted()
        }
    }
}

fn write_ring_digit(digit: u8, out: &mut String) {
    if digit <= 9 {
        out.push(char::from(b'0' + digit));
    } else {
        out.push('%');
        out.push(char::from(b'0' + digit / 10));
        out.push(char::from(b'0' + digit % 10));
    }
}

fn write_atom_symbol(mol: &Mol<Atom, Bond>, node: NodeIndex, chirality: Chirality, out: &mut String) {
    let atom = mol.atom(node);
    let elem = Element::from_atomic_num(atom.atomic_num);
    match elem {
        Some(e) if can_write_bare(mol, node, e) => push_symbol(e, atom.is_aromatic, out),
        _ => write_bracket_atom(atom, elem, chirality, out),
    }
}

fn push_symbol(elem: Element, aromatic: bool, out: &mut String) {
    if aromatic {
        out.push_str(&elem.symbol().to_ascii_lowercase());
    } else {
        out.push_str(elem.symbol());
    }
}

/// A bare atom is only written when reading it back yields the same atom.
fn can_write_bare(mol: &Mol<Atom, Bond>, node: NodeIndex, elem: Element) -> bool {
    let atom = mol.atom(node);
    if !elem.is_organic_subset() {
        return false;
    }
    if atom.is_aromatic && elem.symbol().len() != 1 {
        return false;
    }
    if atom.isotope != 0
        || atom.formal_charge != 0
        || atom.chirality != Chirality::None
        || atom.map_num != 0
    {
        return false;
    }
    let expected_h = implicit_hydrogens(elem, atom.is_aromatic, bond_order_sum(mol, node));
    atom.hydrogen_count == expected_h
}

fn write_bracket_atom(atom: &Atom, elem: Option<Element>, chirality: Chirality, out: &mut String) {
    out.push('[');

    if atom.isotope != 0 {
        out.push_str(&atom.isotope.to_string());
    }

    match elem {
        Some(e) => push_symbol(e, atom.is_aromatic, out),
        None => out.push('*'),
    }

    match chirality {
        Chirality::Ccw => out.push('@'),
        Chirality::Cw => out.push_str("@@"),
        Chirality::None => {}
    }

    if atom.hydrogen_count > 0 {
        out.push('H');
        if atom.hydrogen_count > 1 {
            out.push_str(&atom.hydrogen_count.to_string());
        }
    }

    if atom.formal_charge > 0 {
        out.push('+');
        if atom.formal_charge > 1 {
            out.push_str(&atom.formal_charge.to_string());
        }
    } else if atom.formal_charge < 0 {
        out.push('-');
        if atom.formal_charge < -1 {
            out.push_str(&atom.formal_charge.unsigned_abs().to_string());
        }
    }

    if atom.map_num != 0 {
        out.push(':');
        out.push_str(&atom.map_num.to_string());
    }

    out.push(']');
}
