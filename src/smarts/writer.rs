use petgraph::graph::NodeIndex;

use crate::atom::Chirality;
use crate::element::Element;
use crate::mol::Mol;

use super::query::{AtomExpr, BondExpr, MapClass};

/// Writes a query molecule as SMARTS.
///
/// Atoms are visited depth first in index order, so a pattern that was
/// parsed from a string is written back with the same atom order.
pub fn to_smarts(mol: &Mol<AtomExpr, BondExpr>) -> String {
    if mol.atom_count() == 0 {
        return String::new();
    }

    crate::graph_ops::connected_components(mol)
        .iter()
        .map(|component| write_component(mol, component))
        .collect::<Vec<_>>()
        .join(".")
}

struct Layout {
    children: Vec<Vec<NodeIndex>>,
    ring_opens: Vec<Vec<(usize, NodeIndex)>>,
    ring_closes: Vec<Vec<(usize, NodeIndex)>>,
}

fn write_component(mol: &Mol<AtomExpr, BondExpr>, component: &[NodeIndex]) -> String {
    let n = mol.atom_count();
    let Some(&start) = component.iter().min() else {
        return String::new();
    };

    let mut layout = Layout {
        children: vec![Vec::new(); n],
        ring_opens: vec![Vec::new(); n],
        ring_closes: vec![Vec::new(); n],
    };
    let mut visited = vec![false; n];
    let mut seen_bond = vec![false; mol.bond_count()];
    let mut next_ring_id: usize = 1;

    let neighbor_lists: Vec<Vec<NodeIndex>> = mol
        .atoms()
        .map(|atom| mol.sorted_neighbors(atom))
        .collect();

    let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
    visited[start.index()] = true;

    while let Some(&mut (node, ref mut ni)) = stack.last_mut() {
        let neighbors = &neighbor_lists[node.index()];
        let Some(&neighbor) = neighbors.get(*ni) else {
            stack.pop();
            continue;
        };
        *ni += 1;

        let Some(edge) = mol.bond_between(node, neighbor) else {
            continue;
        };
        if seen_bond[edge.index()] {
            continue;
        }
        seen_bond[edge.index()] = true;

        if visited[neighbor.index()] {
            layout.ring_opens[neighbor.index()].push((next_ring_id, node));
            layout.ring_closes[node.index()].push((next_ring_id, neighbor));
            next_ring_id += 1;
        } else {
            visited[neighbor.index()] = true;
            layout.children[node.index()].push(neighbor);
            stack.push((neighbor, 0));
        }
    }

    let mut out = String::new();
    write_node(mol, start, &layout, &mut out);
    out
}

fn write_node(mol: &Mol<AtomExpr, BondExpr>, node: NodeIndex, layout: &Layout, out: &mut String) {
    write_atom_expr(mol.atom(node), out);

    let rings = layout.ring_opens[node.index()]
        .iter()
        .chain(&layout.ring_closes[node.index()]);
    for &(ring_id, other) in rings {
        if let Some(edge) = mol.bond_between(node, other) {
            write_bond_expr(mol.bond(edge), true, out);
        }
        write_ring_digit(ring_id, out);
    }

    let kids = &layout.children[node.index()];
    let last = kids.len().saturating_sub(1);
    for (i, &child) in kids.iter().enumerate() {
        let is_branch = i < last;
        if is_branch {
            out.push('(');
        }
        if let Some(edge) = mol.bond_between(node, child) {
            write_bond_expr(mol.bond(edge), true, out);
        }
        write_node(mol, child, layout, out);
        if is_branch {
            out.push(')');
        }
    }
}

fn write_ring_digit(id: usize, out: &mut String) {
    if id <= 9 {
        out.push_str(&id.to_string());
    } else {
        out.push('%');
        out.push_str(&format!("{id:02}"));
    }
}

/// `top` is false inside a logical expression, where the implicit bond has
/// to be spelled out.
fn write_bond_expr(bond: &BondExpr, top: bool, out: &mut String) {
    match bond {
        BondExpr::SingleOrAromatic if top => {}
        BondExpr::SingleOrAromatic => out.push_str("-,:"),
        BondExpr::True => out.push('~'),
        BondExpr::Single => out.push('-'),
        BondExpr::Double => out.push('='),
        BondExpr::Triple => out.push('#'),
        BondExpr::Aromatic => out.push(':'),
        BondExpr::Ring => out.push('@'),
        BondExpr::Up => out.push('/'),
        BondExpr::Down => out.push('\\'),
        BondExpr::Not(inner) => {
            out.push('!');
            write_bond_expr(inner, false, out);
        }
        BondExpr::And(exprs) => {
            let low = exprs
                .iter()
                .any(|e| matches!(e, BondExpr::Or(_) | BondExpr::SingleOrAromatic));
            for (i, e) in exprs.iter().enumerate() {
                if i > 0 {
                    out.push(if low { ';' } else { '&' });
                }
                write_bond_expr(e, false, out);
            }
        }
        BondExpr::Or(exprs) => {
            for (i, e) in exprs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_bond_expr(e, false, out);
            }
        }
    }
}

fn write_atom_expr(expr: &AtomExpr, out: &mut String) {
    match expr {
        AtomExpr::True => out.push('*'),
        AtomExpr::Element {
            atomic_num,
            aromatic: Some(aromatic),
        } if can_write_bare(*atomic_num, *aromatic) => {
            write_element_symbol(*atomic_num, *aromatic, out);
        }
        _ => {
            let (body, map) = split_map_class(expr);
            out.push('[');
            match body {
                Some(body) => write_atom_expr_inner(&body, true, out),
                None => out.push('*'),
            }
            if let Some(map) = map {
                out.push(':');
                if map.optional {
                    out.push('?');
                }
                out.push_str(&map.number.to_string());
            }
            out.push(']');
        }
    }
}

/// Separates a trailing map class from the rest of a bracket expression.
fn split_map_class(expr: &AtomExpr) -> (Option<AtomExpr>, Option<MapClass>) {
    match expr {
        AtomExpr::AtomMapClass(map) => (None, Some(*map)),
        AtomExpr::And(parts) => {
            let map = expr.map_class();
            let rest: Vec<AtomExpr> = parts
                .iter()
                .filter(|p| !matches!(p, AtomExpr::AtomMapClass(_)))
                .cloned()
                .collect();
            let body = match rest.len() {
                0 => None,
                1 => rest.into_iter().next(),
                _ => Some(AtomExpr::And(rest)),
            };
            (body, map)
        }
        other => (Some(other.clone()), None),
    }
}

fn can_write_bare(atomic_num: u8, aromatic: bool) -> bool {
    match Element::from_atomic_num(atomic_num) {
        Some(_) if aromatic => matches!(atomic_num, 5 | 6 | 7 | 8 | 15 | 16),
        Some(elem) => elem.is_organic_subset(),
        None => false,
    }
}

fn write_element_symbol(atomic_num: u8, aromatic: bool, out: &mut String) {
    if let Some(elem) = Element::from_atomic_num(atomic_num) {
        let sym = elem.symbol();
        if aromatic {
            out.push_str(&sym.to_ascii_lowercase());
        } else {
            out.push_str(sym);
        }
    }
}

fn is_hydrogen_element(expr: &AtomExpr) -> bool {
    matches!(
        expr,
        AtomExpr::Element {
            atomic_num: 1,
            aromatic: Some(false)
        }
    )
}

/// Operator written between two conjunction parts. Charges and an element
/// after an isotope are juxtaposed (`[Na+]`, `[13C]`); juxtaposing anything
/// else could merge into a two-letter element symbol.
fn conjunction_joiner(low: bool, prev: &AtomExpr, next: &AtomExpr) -> &'static str {
    if low {
        ";"
    } else if matches!(next, AtomExpr::Charge(_))
        || (matches!(prev, AtomExpr::Isotope(_))
            && matches!(next, AtomExpr::Element { aromatic: Some(_), .. }))
    {
        ""
    } else {
        "&"
    }
}

/// `at_start` is true while only isotope digits precede the expression in
/// its bracket. A leading hydrogen element is then written as `H`, which
/// reads back as the element as long as an operator, charge or the end of
/// the bracket follows.
fn write_conjunction(parts: &[AtomExpr], at_start: bool, out: &mut String) {
    let low = parts.iter().any(|p| matches!(p, AtomExpr::Or(_)));
    let mut leading = at_start;
    for (i, e) in parts.iter().enumerate() {
        let joiner_after = parts
            .get(i + 1)
            .map(|next| conjunction_joiner(low, e, next));
        if is_hydrogen_element(e) {
            out.push_str(if leading && joiner_after != Some("&") { "H" } else { "#1" });
        } else {
            write_atom_expr_inner(e, leading, out);
        }
        leading = leading && matches!(e, AtomExpr::Isotope(_));
        if let Some(joiner) = joiner_after {
            out.push_str(joiner);
        }
    }
}

fn write_atom_expr_inner(expr: &AtomExpr, at_start: bool, out: &mut String) {
    match expr {
        AtomExpr::True => out.push('*'),
        AtomExpr::Element { .. } if at_start && is_hydrogen_element(expr) => out.push('H'),
        AtomExpr::Element {
            atomic_num,
            aromatic: Some(aromatic),
        } if *atomic_num != 1 => write_element_symbol(*atomic_num, *aromatic, out),
        AtomExpr::Element { atomic_num, .. } => {
            out.push('#');
            out.push_str(&atomic_num.to_string());
        }
        AtomExpr::Aromatic => out.push('a'),
        AtomExpr::Aliphatic => out.push('A'),
        AtomExpr::Isotope(iso) => out.push_str(&iso.to_string()),
        AtomExpr::Degree(d) => out.push_str(&format!("D{d}")),
        AtomExpr::NonHDegree(d) => out.push_str(&format!("d{d}")),
        AtomExpr::Valence(v) => out.push_str(&format!("v{v}")),
        AtomExpr::Connectivity(x) => out.push_str(&format!("X{x}")),
        AtomExpr::TotalHCount(h) => out.push_str(&format!("H{h}")),
        AtomExpr::ImplicitHCount(h) => out.push_str(&format!("h{h}")),
        AtomExpr::RingMembership(n) => out.push_str(&format!("R{n}")),
        AtomExpr::SmallestRingSize(r) => out.push_str(&format!("r{r}")),
        AtomExpr::RingBondCount(x) => out.push_str(&format!("x{x}")),
        AtomExpr::Chirality(Chirality::Ccw) => out.push('@'),
        AtomExpr::Chirality(Chirality::Cw) => out.push_str("@@"),
        AtomExpr::Chirality(Chirality::None) => out.push('*'),
        AtomExpr::Charge(1) => out.push('+'),
        AtomExpr::Charge(-1) => out.push('-'),
        AtomExpr::Charge(c) if *c >= 0 => out.push_str(&format!("+{c}")),
        AtomExpr::Charge(c) => out.push_str(&format!("-{}", c.unsigned_abs())),
        AtomExpr::InRing => out.push('R'),
        AtomExpr::NotInRing => out.push_str("R0"),
        AtomExpr::Recursive(inner) => {
            out.push_str("$(");
            out.push_str(&to_smarts(inner));
            out.push(')');
        }
        AtomExpr::AtomMapClass(_) => out.push('*'),
        AtomExpr::And(exprs) => write_conjunction(exprs, at_start, out),
        AtomExpr::Or(exprs) => {
            for (i, e) in exprs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_atom_expr_inner(e, at_start && i == 0, out);
            }
        }
        AtomExpr::Not(inner) => {
            out.push('!');
            write_atom_expr_inner(inner, false, out);
        }
    }
}
