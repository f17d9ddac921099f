/// Tetrahedral chirality of a target atom, or a chirality requirement in a
/// SMARTS query.
///
/// On a target [`Atom`] the handedness is stored relative to the atom's
/// neighbor order in the graph, with an implicit hydrogen (if any) counted
/// first. The SMILES reader and writer translate to and from the order in
/// which neighbors appear in the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Chirality {
    /// Not a stereocentre.
    #[default]
    None,
    /// Clockwise (`@@`).
    Cw,
    /// Counterclockwise (`@`).
    Ccw,
}

impl Chirality {
    pub fn inverted(self) -> Self {
        match self {
            Chirality::Cw => Chirality::Ccw,
            Chirality::Ccw => Chirality::Cw,
            Chirality::None => Chirality::None,
        }
    }
}

/// A fully specified atom of a target molecule.
///
/// # Examples
///
/// ```
/// use rxnmatch::Atom;
///
/// let methyl = Atom {
///     atomic_num: 6,
///     hydrogen_count: 3,
///     map_num: 7,
///     ..Atom::default()
/// };
/// assert_eq!(methyl.map_num, 7);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Atom {
    /// Atomic number (1 = H, 6 = C, ...). `0` is a wildcard atom (`*`).
    pub atomic_num: u8,
    pub formal_charge: i8,
    /// Mass number. `0` means natural abundance.
    pub isotope: u16,
    /// Number of implicit hydrogens. Explicit hydrogen atoms are graph nodes
    /// and are not counted here.
    pub hydrogen_count: u8,
    /// Aromatic as written in the input.
    pub is_aromatic: bool,
    pub chirality: Chirality,
    /// Atom-to-atom mapping number from the input (`[CH3:7]`). `0` means the
    /// atom is unmapped.
    pub map_num: u16,
}

impl Atom {
    pub fn is_hydrogen(&self) -> bool {
        self.atomic_num == 1
    }
}
