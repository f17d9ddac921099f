use crate::atom::Atom;
use crate::bond::Bond;
use crate::mol::Mol;
use crate::smarts::{from_smarts, AtomExpr, BondExpr};
use crate::smiles::from_smiles;

use super::error::{ReactionSmartsError, ReactionSmilesError};
use super::{Reaction, Role};

/// The three `>`-separated sections of a reaction string.
struct Sections<'a> {
    reactants: &'a str,
    agents: &'a str,
    products: &'a str,
}

enum SplitError {
    MissingSeparator,
    TooManySeparators,
}

pub fn parse_reaction_smarts(s: &str) -> Result<Reaction<AtomExpr, BondExpr>, ReactionSmartsError> {
    let sections = split_reaction(s.trim()).map_err(|e| match e {
        SplitError::MissingSeparator => ReactionSmartsError::MissingSeparator,
        SplitError::TooManySeparators => ReactionSmartsError::TooManySeparators,
    })?;

    let reactants = parse_smarts_section(sections.reactants, Role::Reactant)?;
    if reactants.is_empty() {
        return Err(ReactionSmartsError::EmptyReactants);
    }
    let agents = parse_smarts_section(sections.agents, Role::Agent)?;
    let products = parse_smarts_section(sections.products, Role::Product)?;
    if products.is_empty() {
        return Err(ReactionSmartsError::EmptyProducts);
    }

    Ok(Reaction::new(reactants, agents, products))
}

/// Parses a reaction SMILES, returning the reaction and the contents of a
/// trailing ` |...|` extension block if one is present.
pub fn parse_reaction_smiles(
    s: &str,
) -> Result<(Reaction<Atom, Bond>, Option<&str>), ReactionSmilesError> {
    let (body, extension) = split_extension(s.trim())?;
    let sections = split_reaction(body).map_err(|e| match e {
        SplitError::MissingSeparator => ReactionSmilesError::MissingSeparator,
        SplitError::TooManySeparators => ReactionSmilesError::TooManySeparators,
    })?;

    let reactants = parse_smiles_section(sections.reactants, Role::Reactant)?;
    if reactants.is_empty() {
        return Err(ReactionSmilesError::EmptyReactants);
    }
    let agents = parse_smiles_section(sections.agents, Role::Agent)?;
    let products = parse_smiles_section(sections.products, Role::Product)?;
    if products.is_empty() {
        return Err(ReactionSmilesError::EmptyProducts);
    }

    Ok((Reaction::new(reactants, agents, products), extension))
}

/// Highlighted atom and bond positions read from an extension block such
/// as `ha:0,1,3,hb:0`.
pub fn parse_highlight_block(block: &str) -> Result<(Vec<usize>, Vec<usize>), ReactionSmilesError> {
    let mut atoms = Vec::new();
    let mut bonds = Vec::new();
    let mut current: Option<&mut Vec<usize>> = None;

    for field in block.split(',').filter(|f| !f.is_empty()) {
        let value = if let Some(rest) = field.strip_prefix("ha:") {
            current = Some(&mut atoms);
            rest
        } else if let Some(rest) = field.strip_prefix("hb:") {
            current = Some(&mut bonds);
            rest
        } else {
            field
        };
        let index: usize = value.parse().map_err(|_| ReactionSmilesError::InvalidExtension {
            reason: format!("unexpected field {field:?}"),
        })?;
        match current.as_deref_mut() {
            Some(list) => list.push(index),
            None => {
                return Err(ReactionSmilesError::InvalidExtension {
                    reason: format!("index {index} outside of an ha/hb list"),
                })
            }
        }
    }

    Ok((atoms, bonds))
}

fn split_extension(s: &str) -> Result<(&str, Option<&str>), ReactionSmilesError> {
    let Some(open) = s.find('|') else {
        return Ok((s, None));
    };
    let rest = &s[open + 1..];
    match rest.strip_suffix('|') {
        Some(block) if !block.contains('|') => Ok((s[..open].trim_end(), Some(block))),
        _ => Err(ReactionSmilesError::InvalidExtension {
            reason: "block must be a single trailing |...|".into(),
        }),
    }
}

fn split_reaction(s: &str) -> Result<Sections<'_>, SplitError> {
    let gt_positions = find_gt_positions(s);

    match gt_positions.as_slice() {
        [] | [_] => Err(SplitError::MissingSeparator),
        &[first, second] => Ok(Sections {
            reactants: &s[..first],
            agents: &s[first + 1..second],
            products: &s[second + 1..],
        }),
        _ => Err(SplitError::TooManySeparators),
    }
}

fn find_gt_positions(s: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut bracket_depth = 0u32;
    let mut paren_depth = 0u32;

    for (i, ch) in s.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '>' if bracket_depth == 0 && paren_depth == 0 => positions.push(i),
            _ => {}
        }
    }

    positions
}

fn split_on_dot(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0;
    let mut bracket_depth = 0u32;
    let mut paren_depth = 0u32;

    for (i, ch) in s.char_indices() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '.' if bracket_depth == 0 && paren_depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

/// Each dot-separated component is one template; a parenthesised group
/// `(A.B)` is a single template with several fragments.
fn parse_smarts_section(
    text: &str,
    role: Role,
) -> Result<Vec<Mol<AtomExpr, BondExpr>>, ReactionSmartsError> {
    split_on_dot(text)
        .into_iter()
        .enumerate()
        .map(|(index, comp)| {
            from_smarts(strip_component_group(comp.trim())).map_err(|source| {
                ReactionSmartsError::InvalidComponent {
                    role,
                    index,
                    source,
                }
            })
        })
        .collect()
}

fn parse_smiles_section(text: &str, role: Role) -> Result<Vec<Mol<Atom, Bond>>, ReactionSmilesError> {
    split_on_dot(text)
        .into_iter()
        .enumerate()
        .map(|(index, comp)| {
            from_smiles(comp).map_err(|source| ReactionSmilesError::InvalidComponent {
                role,
                index,
                source,
            })
        })
        .collect()
}

fn strip_component_group(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.first() == Some(&b'(') && bytes.last() == Some(&b')') {
        let mut depth = 0i32;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 && i < bytes.len() - 1 {
                        return s;
                    }
                }
                _ => {}
            }
        }
        if depth == 0 {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(s: &str) -> (&str, &str, &str) {
        match split_reaction(s) {
            Ok(sec) => (sec.reactants, sec.agents, sec.products),
            Err(_) => panic!("cannot split {s:?}"),
        }
    }

    #[test]
    fn split_simple_reaction() {
        assert_eq!(split("[C:1][Br:2]>>[C:1][OH]"), ("[C:1][Br:2]", "", "[C:1][OH]"));
    }

    #[test]
    fn split_with_agents() {
        assert_eq!(split("[C:1]=[C:2]>[Pd]>[C:1][C:2]"), ("[C:1]=[C:2]", "[Pd]", "[C:1][C:2]"));
    }

    #[test]
    fn separator_errors() {
        assert!(matches!(split_reaction("[C][Br]"), Err(SplitError::MissingSeparator)));
        assert!(matches!(split_reaction("[C]>[Br]"), Err(SplitError::MissingSeparator)));
        assert!(matches!(split_reaction("C>>C>C"), Err(SplitError::TooManySeparators)));
        // `>` inside a recursive pattern is not a separator.
        assert_eq!(split("[C;$(C>C)]>>C").1, "");
    }

    #[test]
    fn split_on_dot_respects_brackets_and_groups() {
        assert_eq!(split_on_dot("[C:1]Br.[N:2]"), vec!["[C:1]Br", "[N:2]"]);
        assert_eq!(split_on_dot("[C.C]").len(), 1);
        assert_eq!(split_on_dot("(C.O).N"), vec!["(C.O)", "N"]);
        assert!(split_on_dot("").is_empty());
    }

    #[test]
    fn strip_outer_parens() {
        assert_eq!(strip_component_group("(A.B)"), "A.B");
        assert_eq!(strip_component_group("A.B"), "A.B");
        assert_eq!(strip_component_group("(A(=O).B)"), "A(=O).B");
        assert_eq!(strip_component_group("(A)(B)"), "(A)(B)");
    }

    #[test]
    fn grouped_components_form_one_template() {
        let rxn = parse_reaction_smarts("([C:1]=O.[N:2])>>[C:1][N:2]").unwrap();
        assert_eq!(rxn.reactants().len(), 1);
        assert_eq!(rxn.reactants()[0].atom_count(), 3);
        let rxn = parse_reaction_smarts("[C:1]=O.[N:2]>>[C:1][N:2]").unwrap();
        assert_eq!(rxn.reactants().len(), 2);
    }

    #[test]
    fn extension_block() {
        let (body, block) = split_extension("CO>>[H]CO |ha:0,1,3,hb:0|").unwrap();
        assert_eq!(body, "CO>>[H]CO");
        assert_eq!(block, Some("ha:0,1,3,hb:0"));
        assert_eq!(parse_highlight_block("ha:0,1,3,hb:0").unwrap(), (vec![0, 1, 3], vec![0]));
        assert_eq!(parse_highlight_block("hb:2").unwrap(), (vec![], vec![2]));
        assert!(parse_highlight_block("0,1").is_err());
        assert!(parse_highlight_block("ha:x").is_err());
        assert!(split_extension("C>>C |ha:0").is_err());
        assert_eq!(split_extension("C>>C").unwrap(), ("C>>C", None));
    }

    #[test]
    fn smiles_component_errors_name_the_role() {
        let err = parse_reaction_smiles("C>>CX").unwrap_err();
        assert!(matches!(
            err,
            ReactionSmilesError::InvalidComponent {
                role: Role::Product,
                index: 0,
                ..
            }
        ));
    }
}
