// Tabla periódica mínima: símbolo -> número atómico.

const SYMBOLS: [&str; 118] = [
  "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg",
  "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr",
  "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
  "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
  "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
  "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf",
  "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po",
  "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
  "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs",
  "Mt", "Ds", "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

/// Símbolos de átomos "comodín" o pseudo-átomos que el formato MDL admite.
/// Se representan con número atómico 0.
const DUMMY_SYMBOLS: [&str; 15] = ["*", "A", "AH", "Q", "QH", "X", "XH", "M", "MH", "L", "LP", "R", "R#", "Pol", "Mod"];

/// Devuelve el número atómico de un símbolo MDL (`D` y `T` son isótopos del
/// hidrógeno). `None` si el símbolo no es reconocido.
pub fn atomic_number(symbol: &str) -> Option<u8> {
  let symbol = symbol.trim();
  if symbol == "D" || symbol == "T" {
    return Some(1);
  }
  if DUMMY_SYMBOLS.contains(&symbol) {
    return Some(0);
  }
  SYMBOLS.iter().position(|s| *s == symbol).map(|i| (i + 1) as u8)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn common_elements() {
    assert_eq!(atomic_number("H"), Some(1));
    assert_eq!(atomic_number("C"), Some(6));
    assert_eq!(atomic_number("Cl"), Some(17));
    assert_eq!(atomic_number("Og"), Some(118));
    assert_eq!(atomic_number("D"), Some(1));
    assert_eq!(atomic_number("R#"), Some(0));
    assert_eq!(atomic_number("*"), Some(0));
    assert_eq!(atomic_number("Q"), Some(0));
    assert_eq!(atomic_number("AH"), Some(0));
  }

  #[test]
  fn unknown_symbol() {
    assert_eq!(atomic_number("Xx"), None);
    assert_eq!(atomic_number("cl"), None);
  }
}
