use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::atom::Chirality;
use crate::element::Element;
use crate::mol::Mol;

use super::error::SmartsError;
use super::query::{AtomExpr, BondExpr, MapClass};

/// Characters that may follow a bracket-leading `H` for it to be read as
/// the hydrogen element rather than a hydrogen count.
const HYDROGEN_ELEMENT_FOLLOWERS: [char; 6] = [']', ',', ';', '+', '-', ':'];

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            input,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn expect(&mut self, ch: char) -> Result<(), SmartsError> {
        match self.advance() {
            Some(c) if c == ch => Ok(()),
            Some(c) => Err(SmartsError::UnexpectedChar { pos: self.pos - 1, ch: c }),
            None => Err(SmartsError::InvalidSmarts {
                pos: self.pos,
                msg: format!("expected '{ch}', got end of input"),
            }),
        }
    }

    fn parse_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos > start {
            let s: String = self.chars[start..self.pos].iter().collect();
            s.parse().ok()
        } else {
            None
        }
    }

    fn parse_count(&mut self, default: u8) -> u8 {
        self.parse_number()
            .map_or(default, |n| n.min(u8::MAX as u32) as u8)
    }

    fn parse_smarts(&mut self) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
        let mut mol = Mol::new();
        let mut stack: Vec<(NodeIndex, Option<BondExpr>, usize)> = Vec::new();
        let mut current: Option<NodeIndex> = None;
        let mut pending_bond: Option<BondExpr> = None;
        let mut ring_map: BTreeMap<u16, (NodeIndex, Option<BondExpr>)> = BTreeMap::new();

        while let Some(ch) = self.peek() {
            match ch {
                '(' => {
                    let Some(cur) = current else {
                        return Err(SmartsError::UnmatchedParen { pos: self.pos });
                    };
                    stack.push((cur, pending_bond.take(), self.pos));
                    self.pos += 1;
                }
                ')' => {
                    let Some((prev, saved_bond, _)) = stack.pop() else {
                        return Err(SmartsError::UnmatchedParen { pos: self.pos });
                    };
                    self.pos += 1;
                    current = Some(prev);
                    pending_bond = saved_bond;
                }
                '.' => {
                    self.pos += 1;
                    current = None;
                    pending_bond = None;
                }
                '-' | '=' | '#' | '~' | ':' | '/' | '\\' | '@' | '!' => {
                    if pending_bond.is_some() {
                        return Err(SmartsError::InvalidSmarts {
                            pos: self.pos,
                            msg: "consecutive bond expressions".into(),
                        });
                    }
                    pending_bond = Some(self.parse_bond_expr()?);
                }
                '0'..='9' | '%' => {
                    let start = self.pos;
                    let digit = self.parse_ring_closure()?;
                    let Some(cur) = current else {
                        return Err(SmartsError::InvalidSmarts {
                            pos: start,
                            msg: "ring closure without preceding atom".into(),
                        });
                    };
                    match ring_map.remove(&digit) {
                        Some((other, opening_bond)) => {
                            if other == cur || mol.bond_between(cur, other).is_some() {
                                return Err(SmartsError::InvalidSmarts {
                                    pos: start,
                                    msg: format!("ring closure {digit} duplicates a bond"),
                                });
                            }
                            let bond = pending_bond
                                .take()
                                .or(opening_bond)
                                .unwrap_or(BondExpr::SingleOrAromatic);
                            mol.add_bond(other, cur, bond);
                        }
                        None => {
                            ring_map.insert(digit, (cur, pending_bond.take()));
                        }
                    }
                }
                _ => {
                    let atom_expr = if ch == '[' {
                        self.parse_bracket_atom()?
                    } else {
                        self.parse_bare_atom()?
                    };
                    let idx = mol.add_atom(atom_expr);
                    if let Some(prev) = current {
                        let bond = pending_bond.take().unwrap_or(BondExpr::SingleOrAromatic);
                        mol.add_bond(prev, idx, bond);
                    } else if pending_bond.is_some() {
                        return Err(SmartsError::InvalidSmarts {
                            pos: self.pos,
                            msg: "bond without preceding atom".into(),
                        });
                    }
                    current = Some(idx);
                }
            }
        }

        if let Some(&(_, _, pos)) = stack.last() {
            return Err(SmartsError::UnmatchedParen { pos });
        }

        if let Some((&digit, _)) = ring_map.iter().next() {
            return Err(SmartsError::UnclosedRing { digit });
        }

        if pending_bond.is_some() {
            return Err(SmartsError::InvalidSmarts {
                pos: self.pos,
                msg: "dangling bond at end of pattern".into(),
            });
        }

        Ok(mol)
    }

    fn parse_ring_closure(&mut self) -> Result<u16, SmartsError> {
        let start = self.pos;
        if self.peek() == Some('%') {
            self.pos += 1;
            let digits: Option<(u32, u32)> = self
                .peek()
                .and_then(|c| c.to_digit(10))
                .zip(self.peek_at(1).and_then(|c| c.to_digit(10)));
            let Some((d1, d2)) = digits else {
                return Err(SmartsError::InvalidSmarts {
                    pos: start,
                    msg: "expected two digits after %".into(),
                });
            };
            self.pos += 2;
            Ok((d1 * 10 + d2) as u16)
        } else {
            let d = self
                .advance()
                .and_then(|c| c.to_digit(10))
                .ok_or(SmartsError::InvalidSmarts {
                    pos: start,
                    msg: "expected ring closure digit".into(),
                })?;
            Ok(d as u16)
        }
    }

    fn parse_bond_expr(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_or()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_bond_or()?);
        }
        Ok(bond_and(parts))
    }

    fn parse_bond_or(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_and()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_bond_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            BondExpr::Or(parts)
        })
    }

    fn parse_bond_and(&mut self) -> Result<BondExpr, SmartsError> {
        let mut parts = vec![self.parse_bond_not()?];
        loop {
            match self.peek() {
                Some('&') => {
                    self.pos += 1;
                    parts.push(self.parse_bond_not()?);
                }
                Some(c) if c == '!' || is_bond_primitive(c) => {
                    parts.push(self.parse_bond_not()?);
                }
                _ => break,
            }
        }
        Ok(bond_and(parts))
    }

    fn parse_bond_not(&mut self) -> Result<BondExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            let inner = self.parse_bond_not()?;
            return Ok(BondExpr::Not(Box::new(inner)));
        }
        let pos = self.pos;
        match self.advance() {
            Some('-') => Ok(BondExpr::Single),
            Some('=') => Ok(BondExpr::Double),
            Some('#') => Ok(BondExpr::Triple),
            Some('~') => Ok(BondExpr::True),
            Some(':') => Ok(BondExpr::Aromatic),
            Some('/') => Ok(BondExpr::Up),
            Some('\\') => Ok(BondExpr::Down),
            Some('@') => Ok(BondExpr::Ring),
            Some(ch) => Err(SmartsError::UnexpectedChar { pos, ch }),
            None => Err(SmartsError::InvalidSmarts {
                pos,
                msg: "expected bond primitive".into(),
            }),
        }
    }

    fn parse_bare_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Err(SmartsError::InvalidSmarts {
                pos: start,
                msg: "expected atom".into(),
            });
        };

        match ch {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::True)
            }
            'A' if !self.two_letter_element_ahead() => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'a' if self.peek_at(1) != Some('s') => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            _ => self
                .parse_element()
                .map_err(|_| SmartsError::UnexpectedChar { pos: start, ch }),
        }
    }

    fn parse_bracket_atom(&mut self) -> Result<AtomExpr, SmartsError> {
        let bracket_start = self.pos;
        self.expect('[')?;

        let mut expr = self.parse_semicolon_expr()?;

        if self.peek() == Some(':') {
            let map = self.parse_map_class()?;
            expr = match expr {
                AtomExpr::And(mut parts) => {
                    parts.push(map);
                    AtomExpr::And(parts)
                }
                other => AtomExpr::And(vec![other, map]),
            };
        }

        if self.peek() != Some(']') {
            return Err(SmartsError::UnclosedBracket { pos: bracket_start });
        }
        self.pos += 1;

        Ok(expr)
    }

    fn parse_map_class(&mut self) -> Result<AtomExpr, SmartsError> {
        let pos = self.pos;
        self.expect(':')?;
        let optional = self.peek() == Some('?');
        if optional {
            self.pos += 1;
        }
        let number = self
            .parse_number()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or(SmartsError::InvalidMapClass { pos })?;
        Ok(AtomExpr::AtomMapClass(MapClass { number, optional }))
    }

    fn parse_semicolon_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_comma_expr()?];
        while self.peek() == Some(';') {
            self.pos += 1;
            parts.push(self.parse_comma_expr()?);
        }
        Ok(flatten_and(parts))
    }

    fn parse_comma_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = vec![self.parse_high_and_expr()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            parts.push(self.parse_high_and_expr()?);
        }
        Ok(flatten_or(parts))
    }

    fn parse_high_and_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        let mut parts = Vec::new();
        while let Some(ch) = self.peek() {
            if matches!(ch, ']' | ',' | ';' | ':') {
                break;
            }
            if ch == '&' {
                self.pos += 1;
                continue;
            }
            parts.push(self.parse_not_expr()?);
        }
        if parts.is_empty() {
            Ok(AtomExpr::True)
        } else {
            Ok(flatten_and(parts))
        }
    }

    fn parse_not_expr(&mut self) -> Result<AtomExpr, SmartsError> {
        if self.peek() == Some('!') {
            self.pos += 1;
            let inner = self.parse_not_expr()?;
            Ok(AtomExpr::Not(Box::new(inner)))
        } else {
            self.parse_primitive()
        }
    }

    fn parse_primitive(&mut self) -> Result<AtomExpr, SmartsError> {
        let Some(ch) = self.peek() else {
            return Err(SmartsError::InvalidSmarts {
                pos: self.pos,
                msg: "expected atom primitive".into(),
            });
        };

        match ch {
            '*' => {
                self.pos += 1;
                Ok(AtomExpr::True)
            }
            'A' | 'D' | 'R' | 'X' if self.two_letter_element_ahead() => self.parse_element(),
            'A' => {
                self.pos += 1;
                Ok(AtomExpr::Aliphatic)
            }
            'a' if self.peek_at(1) != Some('s') => {
                self.pos += 1;
                Ok(AtomExpr::Aromatic)
            }
            '#' => {
                self.pos += 1;
                let num = self
                    .parse_number()
                    .ok_or(SmartsError::InvalidAtomicNum { pos: self.pos })?;
                let element = u8::try_from(num)
                    .ok()
                    .and_then(Element::from_atomic_num)
                    .ok_or(SmartsError::InvalidAtomicNum { pos: self.pos })?;
                Ok(AtomExpr::Element {
                    atomic_num: element.atomic_num(),
                    aromatic: None,
                })
            }
            'D' => {
                self.pos += 1;
                Ok(AtomExpr::Degree(self.parse_count(1)))
            }
            'd' => {
                self.pos += 1;
                Ok(AtomExpr::NonHDegree(self.parse_count(1)))
            }
            'v' => {
                self.pos += 1;
                Ok(AtomExpr::Valence(self.parse_count(1)))
            }
            'X' => {
                self.pos += 1;
                Ok(AtomExpr::Connectivity(self.parse_count(1)))
            }
            'H' if self.is_hydrogen_element_context() => self.parse_element(),
            'H' => {
                self.pos += 1;
                Ok(AtomExpr::TotalHCount(self.parse_count(1)))
            }
            'h' => {
                self.pos += 1;
                Ok(AtomExpr::ImplicitHCount(self.parse_count(1)))
            }
            'R' => {
                self.pos += 1;
                Ok(match self.parse_number() {
                    None => AtomExpr::InRing,
                    Some(0) => AtomExpr::NotInRing,
                    Some(n) => AtomExpr::RingMembership(n.min(u8::MAX as u32) as u8),
                })
            }
            'r' => {
                self.pos += 1;
                Ok(match self.parse_number() {
                    None => AtomExpr::InRing,
                    Some(0) => AtomExpr::NotInRing,
                    Some(n) => AtomExpr::SmallestRingSize(n.min(u8::MAX as u32) as u8),
                })
            }
            'x' => {
                self.pos += 1;
                Ok(AtomExpr::RingBondCount(self.parse_count(1)))
            }
            '@' => {
                self.pos += 1;
                if self.peek() == Some('@') {
                    self.pos += 1;
                    Ok(AtomExpr::Chirality(Chirality::Cw))
                } else {
                    Ok(AtomExpr::Chirality(Chirality::Ccw))
                }
            }
            '+' | '-' => self.parse_charge(ch),
            '$' => {
                self.pos += 1;
                if self.peek() != Some('(') {
                    return Err(SmartsError::UnclosedRecursive { pos: self.pos });
                }
                self.pos += 1;
                let inner = self.extract_balanced_parens()?;
                let inner_mol = parse(inner)?;
                Ok(AtomExpr::Recursive(inner_mol))
            }
            _ if ch.is_ascii_alphabetic() => self.parse_element(),
            _ if ch.is_ascii_digit() => {
                let n = self.parse_number().unwrap_or(0);
                Ok(AtomExpr::Isotope(n.min(u16::MAX as u32) as u16))
            }
            _ => Err(SmartsError::UnexpectedChar { pos: self.pos, ch }),
        }
    }

    /// `+`, `++`, `+2`, and the same for `-`.
    fn parse_charge(&mut self, sign: char) -> Result<AtomExpr, SmartsError> {
        let mut magnitude: u32 = 0;
        while self.peek() == Some(sign) {
            self.pos += 1;
            magnitude += 1;
        }
        if let Some(n) = self.parse_number() {
            magnitude = magnitude.saturating_sub(1) + n;
        }
        let magnitude = i8::try_from(magnitude).map_err(|_| SmartsError::InvalidSmarts {
            pos: self.pos,
            msg: "charge out of range".into(),
        })?;
        Ok(AtomExpr::Charge(if sign == '-' { -magnitude } else { magnitude }))
    }

    /// A leading `H` (optionally after an isotope) followed by the end of the
    /// bracket, an operator, a charge or a map class is the element.
    fn is_hydrogen_element_context(&self) -> bool {
        if self.peek() != Some('H') {
            return false;
        }
        let leading = self
            .bracket_content_before_pos()
            .iter()
            .all(|c| c.is_ascii_digit());
        leading
            && self
                .peek_at(1)
                .is_some_and(|next| HYDROGEN_ELEMENT_FOLLOWERS.contains(&next))
    }

    fn bracket_content_before_pos(&self) -> &[char] {
        let mut start = self.pos;
        while start > 0 && self.chars[start - 1] != '[' {
            start -= 1;
        }
        &self.chars[start..self.pos]
    }

    fn two_letter_element_ahead(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some(a), Some(b)) if b.is_ascii_lowercase() => {
                Element::from_symbol(&format!("{a}{b}")).is_some()
            }
            _ => false,
        }
    }

    fn parse_element(&mut self) -> Result<AtomExpr, SmartsError> {
        let start = self.pos;
        let Some(ch) = self.peek() else {
            return Err(SmartsError::InvalidSmarts {
                pos: start,
                msg: "expected element".into(),
            });
        };
        let aromatic = ch.is_ascii_lowercase();
        let lookup = |s: &str| {
            if aromatic {
                Element::from_aromatic_symbol(s)
            } else {
                Element::from_symbol(s)
            }
        };

        if let Some(next) = self.peek_at(1).filter(|c| c.is_ascii_lowercase()) {
            if let Some(elem) = lookup(&format!("{ch}{next}")) {
                self.pos += 2;
                return Ok(AtomExpr::Element {
                    atomic_num: elem.atomic_num(),
                    aromatic: Some(aromatic),
                });
            }
        }

        match lookup(&ch.to_string()) {
            Some(elem) => {
                self.pos += 1;
                Ok(AtomExpr::Element {
                    atomic_num: elem.atomic_num(),
                    aromatic: Some(aromatic),
                })
            }
            None => Err(SmartsError::UnexpectedChar { pos: start, ch }),
        }
    }

    fn extract_balanced_parens(&mut self) -> Result<&'a str, SmartsError> {
        let start_pos = self.pos;
        let mut depth = 1;
        let begin_byte: usize = self.chars[..self.pos].iter().map(|c| c.len_utf8()).sum();

        while let Some(ch) = self.peek() {
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let end_byte = begin_byte
                            + self.chars[start_pos..self.pos]
                                .iter()
                                .map(|c| c.len_utf8())
                                .sum::<usize>();
                        self.pos += 1;
                        let input = self.input;
                        return Ok(&input[begin_byte..end_byte]);
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }

        Err(SmartsError::UnclosedRecursive { pos: start_pos })
    }
}

fn is_bond_primitive(c: char) -> bool {
    matches!(c, '-' | '=' | '#' | '~' | ':' | '/' | '\\' | '@')
}

fn bond_and(mut parts: Vec<BondExpr>) -> BondExpr {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        BondExpr::And(parts)
    }
}

fn flatten_and(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flattened = Vec::new();
    for p in parts {
        match p {
            AtomExpr::And(inner) => flattened.extend(inner),
            other => flattened.push(other),
        }
    }
    if flattened.len() == 1 {
        flattened.remove(0)
    } else {
        AtomExpr::And(flattened)
    }
}

fn flatten_or(parts: Vec<AtomExpr>) -> AtomExpr {
    let mut flattened = Vec::new();
    for p in parts {
        match p {
            AtomExpr::Or(inner) => flattened.extend(inner),
            other => flattened.push(other),
        }
    }
    if flattened.len() == 1 {
        flattened.remove(0)
    } else {
        AtomExpr::Or(flattened)
    }
}

pub fn parse(input: &str) -> Result<Mol<AtomExpr, BondExpr>, SmartsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SmartsError::EmptyInput);
    }
    let mut parser = Parser::new(trimmed);
    parser.parse_smarts()
}
