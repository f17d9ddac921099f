use crate::element::Element;
use crate::smiles::error::SmilesError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(AtomToken),
    Bond(BondToken),
    RingClosure {
        bond: Option<BondToken>,
        digit: u16,
        pos: usize,
    },
    OpenParen(usize),
    CloseParen(usize),
    Dot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomToken {
    pub element: Element,
    pub is_aromatic: bool,
    pub isotope: u16,
    pub chirality: ChiralityToken,
    pub hcount: Option<u8>,
    pub charge: i8,
    pub atom_class: u16,
    pub is_bracket: bool,
    pub pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChiralityToken {
    None,
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondToken {
    Single,
    Double,
    Triple,
    Aromatic,
    Up,
    Down,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, SmilesError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\r' | '\n' => {
                i += 1;
            }
            '[' => {
                let (tok, next) = parse_bracket_atom(&chars, i)?;
                tokens.push(Token::Atom(tok));
                i = next;
            }
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' => {
                let (element, len) = match (chars[i], chars.get(i + 1)) {
                    ('B', Some('r')) => (Element::Br, 2),
                    ('C', Some('l')) => (Element::Cl, 2),
                    (c, _) => match Element::from_symbol(&c.to_string()) {
                        Some(e) => (e, 1),
                        None => return Err(SmilesError::UnexpectedChar { pos: i, ch: c }),
                    },
                };
                tokens.push(Token::Atom(bare_atom(element, false, i)));
                i += len;
            }
            c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's') => {
                let Some(element) = Element::from_aromatic_symbol(&c.to_string()) else {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: c });
                };
                tokens.push(Token::Atom(bare_atom(element, true, i)));
                i += 1;
            }
            '-' => {
                if looks_like_bond(&tokens) {
                    tokens.push(Token::Bond(BondToken::Single));
                    i += 1;
                } else {
                    return Err(SmilesError::UnexpectedChar { pos: i, ch: '-' });
                }
            }
            '=' => {
                tokens.push(Token::Bond(BondToken::Double));
                i += 1;
            }
            '#' => {
                tokens.push(Token::Bond(BondToken::Triple));
                i += 1;
            }
            ':' => {
                tokens.push(Token::Bond(BondToken::Aromatic));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Bond(BondToken::Up));
                i += 1;
            }
            '\\' => {
                tokens.push(Token::Bond(BondToken::Down));
                i += 1;
            }
            '(' => {
                tokens.push(Token::OpenParen(i));
                i += 1;
            }
            ')' => {
                tokens.push(Token::CloseParen(i));
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot(i));
                i += 1;
            }
            '%' => {
                let (digit, next) = parse_percent_ring(&chars, i)?;
                let pending_bond = try_consume_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond: pending_bond,
                    digit,
                    pos: i,
                });
                i = next;
            }
            d @ '0'..='9' => {
                let pending_bond = try_consume_pending_bond(&mut tokens);
                tokens.push(Token::RingClosure {
                    bond: pending_bond,
                    digit: (d as u16) - b'0' as u16,
                    pos: i,
                });
                i += 1;
            }
            ch => return Err(SmilesError::UnexpectedChar { pos: i, ch }),
        }
    }

    Ok(tokens)
}

fn bare_atom(element: Element, aromatic: bool, pos: usize) -> AtomToken {
    AtomToken {
        element,
        is_aromatic: aromatic,
        isotope: 0,
        chirality: ChiralityToken::None,
        hcount: None,
        charge: 0,
        atom_class: 0,
        is_bracket: false,
        pos,
    }
}

fn looks_like_bond(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        Some(Token::Atom(_))
            | Some(Token::RingClosure { .. })
            | Some(Token::CloseParen(_))
            | Some(Token::OpenParen(_))
            | None
    )
}

fn try_consume_pending_bond(tokens: &mut Vec<Token>) -> Option<BondToken> {
    if let Some(Token::Bond(_)) = tokens.last() {
        if let Some(Token::Bond(b)) = tokens.pop() {
            return Some(b);
        }
    }
    None
}

fn parse_percent_ring(chars: &[char], start: usize) -> Result<(u16, usize), SmilesError> {
    let i = start + 1;
    if i + 1 >= chars.len() || !chars[i].is_ascii_digit() || !chars[i + 1].is_ascii_digit() {
        return Err(SmilesError::UnexpectedChar {
            pos: start,
            ch: '%',
        });
    }
    let d1 = (chars[i] as u16) - b'0' as u16;
    let d2 = (chars[i + 1] as u16) - b'0' as u16;
    Ok((d1 * 10 + d2, i + 2))
}

fn parse_bracket_atom(chars: &[char], start: usize) -> Result<(AtomToken, usize), SmilesError> {
    let mut i = start + 1; // skip '['

    let isotope = parse_number(chars, &mut i)
        .map_err(|_| SmilesError::InvalidIsotope { pos: start })?
        .unwrap_or(0);

    let (element, is_aromatic) = parse_bracket_element(chars, &mut i, start)?;

    let chirality = parse_chirality(chars, &mut i);

    let hcount = parse_hcount(chars, &mut i);

    let charge = parse_charge(chars, &mut i, start)?;

    let atom_class = if i < chars.len() && chars[i] == ':' {
        i += 1;
        parse_number(chars, &mut i)
            .ok()
            .flatten()
            .ok_or(SmilesError::InvalidAtomClass { pos: start })?
    } else {
        0
    };

    if i >= chars.len() || chars[i] != ']' {
        return Err(SmilesError::UnclosedBracket { pos: start });
    }
    i += 1; // skip ']'

    Ok((
        AtomToken {
            element,
            is_aromatic,
            isotope,
            chirality,
            hcount: Some(hcount.unwrap_or(0)),
            charge,
            atom_class,
            is_bracket: true,
            pos: start,
        },
        i,
    ))
}

/// Reads an unsigned decimal. `Ok(None)` when no digit is present, `Err`
/// on `u16` overflow.
fn parse_number(chars: &[char], i: &mut usize) -> Result<Option<u16>, ()> {
    let mut val: Option<u16> = None;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        let digit = chars[*i] as u16 - b'0' as u16;
        val = Some(
            val.unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or(())?,
        );
        *i += 1;
    }
    Ok(val)
}

fn parse_bracket_element(
    chars: &[char],
    i: &mut usize,
    bracket_start: usize,
) -> Result<(Element, bool), SmilesError> {
    if *i >= chars.len() {
        return Err(SmilesError::UnclosedBracket {
            pos: bracket_start,
        });
    }

    for len in [2, 1] {
        if *i + len > chars.len() {
            continue;
        }
        let sym: String = chars[*i..*i + len].iter().collect();
        if chars[*i].is_ascii_lowercase() {
            if let Some(e) = Element::from_aromatic_symbol(&sym) {
                *i += len;
                return Ok((e, true));
            }
        } else if len == 1 || chars[*i + 1].is_ascii_lowercase() {
            if let Some(e) = Element::from_symbol(&sym) {
                *i += len;
                return Ok((e, false));
            }
        }
    }

    Err(SmilesError::InvalidElement {
        pos: *i,
        text: chars.get(*i).map(|c| c.to_string()).unwrap_or_default(),
    })
}

fn parse_chirality(chars: &[char], i: &mut usize) -> ChiralityToken {
    if *i < chars.len() && chars[*i] == '@' {
        *i += 1;
        if *i < chars.len() && chars[*i] == '@' {
            *i += 1;
            ChiralityToken::Clockwise
        } else {
            ChiralityToken::CounterClockwise
        }
    } else {
        ChiralityToken::None
    }
}

fn parse_hcount(chars: &[char], i: &mut usize) -> Option<u8> {
    if *i < chars.len() && chars[*i] == 'H' {
        *i += 1;
        let mut count: u8 = 1;
        if *i < chars.len() && chars[*i].is_ascii_digit() {
            count = chars[*i] as u8 - b'0';
            *i += 1;
        }
        Some(count)
    } else {
        None
    }
}

fn parse_charge(chars: &[char], i: &mut usize, bracket_start: usize) -> Result<i8, SmilesError> {
    let sign: i8 = match chars.get(*i) {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Ok(0),
    };
    let symbol = chars[*i];
    *i += 1;
    let invalid = SmilesError::InvalidCharge { pos: bracket_start };

    if *i < chars.len() && chars[*i] == symbol {
        let mut count: i8 = sign;
        while *i < chars.len() && chars[*i] == symbol {
            count = count.checked_add(sign).ok_or(invalid.clone())?;
            *i += 1;
        }
        Ok(count)
    } else if *i < chars.len() && chars[*i].is_ascii_digit() {
        let mut val: i8 = 0;
        while *i < chars.len() && chars[*i].is_ascii_digit() {
            val = val
                .checked_mul(10)
                .and_then(|v| v.checked_add((chars[*i] as i8) - b'0' as i8))
                .ok_or(invalid.clone())?;
            *i += 1;
        }
        Ok(sign * val)
    } else {
        Ok(sign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only_atom(s: &str) -> AtomToken {
        match tokenize(s).unwrap().as_slice() {
            [Token::Atom(a)] => a.clone(),
            other => panic!("expected a single atom, got {other:?}"),
        }
    }

    #[test]
    fn tokenize_methane() {
        let a = only_atom("C");
        assert_eq!(a.element, Element::C);
        assert!(!a.is_bracket);
        assert!(!a.is_aromatic);
    }

    #[test]
    fn two_letter_organic_atoms() {
        let tokens = tokenize("ClCBr").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(matches!(&tokens[0], Token::Atom(a) if a.element == Element::Cl));
        assert!(matches!(&tokens[2], Token::Atom(a) if a.element == Element::Br));
    }

    #[test]
    fn tokenize_bracket_atom() {
        let a = only_atom("[NH4+]");
        assert_eq!(a.element, Element::N);
        assert!(a.is_bracket);
        assert_eq!(a.hcount, Some(4));
        assert_eq!(a.charge, 1);
    }

    #[test]
    fn bracket_hydrogen() {
        let a = only_atom("[2H]");
        assert_eq!(a.element, Element::H);
        assert_eq!(a.isotope, 2);
        assert_eq!(a.hcount, Some(0));
    }

    #[test]
    fn ring_closures() {
        let tokens = tokenize("C1CC1").unwrap();
        assert_eq!(tokens.len(), 5);
        assert!(matches!(&tokens[1], Token::RingClosure { digit: 1, .. }));

        let tokens = tokenize("C=%10CC%10").unwrap();
        assert!(matches!(
            &tokens[1],
            Token::RingClosure {
                digit: 10,
                bond: Some(BondToken::Double),
                ..
            }
        ));
    }

    #[test]
    fn tokenize_chirality() {
        let a = only_atom("[C@@H]");
        assert_eq!(a.chirality, ChiralityToken::Clockwise);
        assert_eq!(a.hcount, Some(1));
    }

    #[test]
    fn bracket_aromatic_two_letter() {
        let a = only_atom("[se]");
        assert!(a.is_aromatic);
        assert_eq!(a.element, Element::Se);
    }

    #[test]
    fn charge_variants() {
        assert_eq!(only_atom("[O-]").charge, -1);
        assert_eq!(only_atom("[O-2]").charge, -2);
        assert_eq!(only_atom("[O--]").charge, -2);
        assert_eq!(only_atom("[Fe+++]").charge, 3);
    }

    #[test]
    fn atom_class() {
        assert_eq!(only_atom("[CH3:7]").atom_class, 7);
        assert_eq!(only_atom("[C]").atom_class, 0);
    }

    #[test]
    fn malformed_brackets() {
        assert_eq!(
            tokenize("[C:]").unwrap_err(),
            SmilesError::InvalidAtomClass { pos: 0 }
        );
        assert_eq!(
            tokenize("C[C").unwrap_err(),
            SmilesError::UnclosedBracket { pos: 1 }
        );
        assert!(matches!(
            tokenize("[Xx]").unwrap_err(),
            SmilesError::InvalidElement { .. }
        ));
        assert_eq!(
            tokenize("[99999C]").unwrap_err(),
            SmilesError::InvalidIsotope { pos: 0 }
        );
    }
}
