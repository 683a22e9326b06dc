// Archivo: molfile.rs
// Propósito: modelo de estructura química y lectura/escritura del formato
// MDL molfile V2000 (el bloque que precede a las propiedades en un SDF).
use crate::elements::atomic_number;
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Orden de enlace tal como lo codifica el bloque de enlaces V2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondOrder {
  Single,
  Double,
  Triple,
  Aromatic,
  /// Tipos de consulta (5-8): sin orden definido.
  Query(u8),
}

impl BondOrder {
  fn from_code(code: u8) -> Result<Self, EngineError> {
    match code {
      1 => Ok(Self::Single),
      2 => Ok(Self::Double),
      3 => Ok(Self::Triple),
      4 => Ok(Self::Aromatic),
      5..=8 => Ok(Self::Query(code)),
      other => Err(EngineError::invalid(format!("tipo de enlace desconocido: {}", other))),
    }
  }

  fn code(&self) -> u8 {
    match self {
      Self::Single => 1,
      Self::Double => 2,
      Self::Triple => 3,
      Self::Aromatic => 4,
      Self::Query(c) => *c,
    }
  }

  /// Orden numérico: aromático = 1.5, consultas = 0.
  pub fn as_f64(&self) -> f64 {
    match self {
      Self::Single => 1.0,
      Self::Double => 2.0,
      Self::Triple => 3.0,
      Self::Aromatic => 1.5,
      Self::Query(_) => 0.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
  pub symbol: String,
  pub atomic_number: u8,
  pub position: [f64; 3],
  pub charge: i8,
  pub mass_difference: i8,
}

/// Enlace entre dos átomos (índices base 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
  pub begin: usize,
  pub end: usize,
  pub order: BondOrder,
  pub stereo: u8,
}

/// Estructura parseada de un bloque molfile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
  pub name: String,
  pub program_line: String,
  pub comment: String,
  pub atoms: Vec<Atom>,
  pub bonds: Vec<Bond>,
  /// Líneas `M  ...` distintas de `M  CHG` y `M  END`, conservadas tal cual.
  pub extra_properties: Vec<String>,
}

impl Structure {
  pub fn atom_count(&self) -> usize {
    self.atoms.len()
  }

  pub fn bond_count(&self) -> usize {
    self.bonds.len()
  }
}

/// Extrae el campo de columnas fijas `[start, end)` recortado, o `None` si la
/// línea es más corta.
fn column(line: &str, start: usize, end: usize) -> Option<&str> {
  let end = end.min(line.len());
  if start >= end {
    return None;
  }
  line.get(start..end).map(str::trim)
}

fn parse_counts(line: &str) -> Result<(usize, usize), EngineError> {
  if line.contains("V3000") {
    return Err(EngineError::invalid("formato V3000 no soportado"));
  }
  let fixed = column(line, 0, 3).and_then(|a| a.parse::<usize>().ok())
                                .zip(column(line, 3, 6).and_then(|b| b.parse::<usize>().ok()));
  if let Some(counts) = fixed {
    return Ok(counts);
  }
  let mut it = line.split_whitespace();
  let atoms = it.next().and_then(|s| s.parse::<usize>().ok());
  let bonds = it.next().and_then(|s| s.parse::<usize>().ok());
  match (atoms, bonds) {
    (Some(a), Some(b)) => Ok((a, b)),
    _ => Err(EngineError::invalid(format!("línea de conteos ilegible: '{}'", line))),
  }
}

fn charge_from_code(code: i32) -> i8 {
  match code {
    1 => 3,
    2 => 2,
    3 => 1,
    5 => -1,
    6 => -2,
    7 => -3,
    _ => 0,
  }
}

fn parse_atom(line: &str, index: usize) -> Result<Atom, EngineError> {
  let fixed = (|| {
    let x = column(line, 0, 10)?.parse::<f64>().ok()?;
    let y = column(line, 10, 20)?.parse::<f64>().ok()?;
    let z = column(line, 20, 30)?.parse::<f64>().ok()?;
    let symbol = column(line, 31, 34)?.to_string();
    if symbol.is_empty() {
      return None;
    }
    let mass = column(line, 34, 36).and_then(|s| s.parse::<i8>().ok()).unwrap_or(0);
    let charge = column(line, 36, 39).and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
    Some((x, y, z, symbol, mass, charge))
  })();
  let (x, y, z, symbol, mass, charge) = match fixed {
    Some(v) => v,
    None => {
      let fields: Vec<&str> = line.split_whitespace().collect();
      if fields.len() < 4 {
        return Err(EngineError::invalid(format!("átomo {} ilegible: '{}'", index + 1, line)));
      }
      let coord = |s: &str| {
        s.parse::<f64>()
         .map_err(|_| EngineError::invalid(format!("coordenada inválida en átomo {}: '{}'", index + 1, s)))
      };
      let mass = fields.get(4).and_then(|s| s.parse::<i8>().ok()).unwrap_or(0);
      let charge = fields.get(5).and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
      (coord(fields[0])?, coord(fields[1])?, coord(fields[2])?, fields[3].to_string(), mass, charge)
    }
  };
  let z_num = atomic_number(&symbol).ok_or_else(|| {
                                      EngineError::invalid(format!("símbolo atómico desconocido en átomo {}: '{}'",
                                                                   index + 1,
                                                                   symbol))
                                    })?;
  Ok(Atom { symbol,
            atomic_number: z_num,
            position: [x, y, z],
            charge: charge_from_code(charge),
            mass_difference: mass })
}

fn parse_bond(line: &str, index: usize, atom_count: usize) -> Result<Bond, EngineError> {
  let fixed = (|| {
    let a = column(line, 0, 3)?.parse::<usize>().ok()?;
    let b = column(line, 3, 6)?.parse::<usize>().ok()?;
    let t = column(line, 6, 9)?.parse::<u8>().ok()?;
    let s = column(line, 9, 12).and_then(|s| s.parse::<u8>().ok()).unwrap_or(0);
    Some((a, b, t, s))
  })();
  let (a, b, t, s) = match fixed {
    Some(v) => v,
    None => {
      let fields: Vec<usize> = line.split_whitespace().filter_map(|f| f.parse::<usize>().ok()).collect();
      if fields.len() < 3 {
        return Err(EngineError::invalid(format!("enlace {} ilegible: '{}'", index + 1, line)));
      }
      let code = |v: usize| {
        u8::try_from(v).map_err(|_| EngineError::invalid(format!("código fuera de rango en enlace {}: {}", index + 1, v)))
      };
      (fields[0], fields[1], code(fields[2])?, code(fields.get(3).copied().unwrap_or(0))?)
    }
  };
  if a == 0 || b == 0 || a > atom_count || b > atom_count {
    return Err(EngineError::invalid(format!("enlace {} referencia un átomo fuera de rango ({}-{})", index + 1, a, b)));
  }
  Ok(Bond { begin: a - 1, end: b - 1, order: BondOrder::from_code(t)?, stereo: s })
}

/// `M  CHG  n aaa vvv ...`: sobreescribe las cargas del bloque de átomos.
fn apply_charges(line: &str, atoms: &mut [Atom]) -> Result<(), EngineError> {
  let fields: Vec<&str> = line.split_whitespace().skip(2).collect();
  let n = fields.first()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| EngineError::invalid(format!("línea M  CHG ilegible: '{}'", line)))?;
  for pair in 0..n {
    let idx = fields.get(1 + pair * 2).and_then(|s| s.parse::<usize>().ok());
    let val = fields.get(2 + pair * 2).and_then(|s| s.parse::<i8>().ok());
    match (idx, val) {
      (Some(i), Some(v)) if i >= 1 && i <= atoms.len() => atoms[i - 1].charge = v,
      _ => return Err(EngineError::invalid(format!("línea M  CHG inconsistente: '{}'", line))),
    }
  }
  Ok(())
}

/// Parsea un bloque V2000. Las líneas posteriores a `M  END` (propiedades SDF)
/// se ignoran.
pub(crate) fn parse_block(block: &str) -> Result<Structure, EngineError> {
  let lines: Vec<&str> = block.lines().collect();
  if lines.len() < 4 {
    return Err(EngineError::invalid("bloque demasiado corto"));
  }
  let (atom_count, bond_count) = parse_counts(lines[3])?;
  let atoms_end = 4 + atom_count;
  let bonds_end = atoms_end + bond_count;
  if lines.len() < bonds_end {
    return Err(EngineError::invalid(format!("se esperaban {} átomos y {} enlaces, el bloque tiene {} líneas",
                                            atom_count,
                                            bond_count,
                                            lines.len())));
  }
  let mut atoms = lines[4..atoms_end].iter()
                                     .enumerate()
                                     .map(|(i, l)| parse_atom(l, i))
                                     .collect::<Result<Vec<_>, _>>()?;
  let bonds = lines[atoms_end..bonds_end].iter()
                                         .enumerate()
                                         .map(|(i, l)| parse_bond(l, i, atom_count))
                                         .collect::<Result<Vec<_>, _>>()?;
  let mut extra_properties = Vec::new();
  let mut charges_reset = false;
  let mut saw_end = false;
  for line in &lines[bonds_end..] {
    if line.starts_with("M  END") {
      saw_end = true;
      break;
    }
    if line.starts_with("M  CHG") {
      if !charges_reset {
        atoms.iter_mut().for_each(|a| a.charge = 0);
        charges_reset = true;
      }
      apply_charges(line, &mut atoms)?;
    } else if line.starts_with("M  ") {
      extra_properties.push(line.trim_end().to_string());
    }
  }
  if !saw_end {
    return Err(EngineError::invalid("falta la línea 'M  END'"));
  }
  Ok(Structure { name: lines[0].trim_end().to_string(),
                 program_line: lines[1].trim_end().to_string(),
                 comment: lines[2].trim_end().to_string(),
                 atoms,
                 bonds,
                 extra_properties })
}

/// Escribe la estructura en forma canónica V2000 (sin propiedades SDF).
pub(crate) fn write_block(structure: &Structure) -> Result<String, EngineError> {
  if structure.atoms.len() > 999 || structure.bonds.len() > 999 {
    return Err(EngineError::Serialization("V2000 admite como máximo 999 átomos/enlaces".into()));
  }
  let mut out = String::new();
  let fmt_err = |e: std::fmt::Error| EngineError::Serialization(e.to_string());
  writeln!(out, "{}", structure.name).map_err(fmt_err)?;
  writeln!(out, "{}", structure.program_line).map_err(fmt_err)?;
  writeln!(out, "{}", structure.comment).map_err(fmt_err)?;
  writeln!(out,
           "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
           structure.atoms.len(),
           structure.bonds.len()).map_err(fmt_err)?;
  for atom in &structure.atoms {
    let [x, y, z] = atom.position;
    writeln!(out,
             "{:>10.4}{:>10.4}{:>10.4} {:<3}{:>2}  0  0  0  0  0  0  0  0  0  0  0",
             x, y, z, atom.symbol, atom.mass_difference).map_err(fmt_err)?;
  }
  for bond in &structure.bonds {
    writeln!(out,
             "{:>3}{:>3}{:>3}{:>3}",
             bond.begin + 1,
             bond.end + 1,
             bond.order.code(),
             bond.stereo).map_err(fmt_err)?;
  }
  let charged: Vec<(usize, i8)> =
    structure.atoms.iter().enumerate().filter(|(_, a)| a.charge != 0).map(|(i, a)| (i + 1, a.charge)).collect();
  for chunk in charged.chunks(8) {
    let mut line = format!("M  CHG{:>3}", chunk.len());
    for (idx, charge) in chunk {
      write!(line, " {:>3} {:>3}", idx, charge).map_err(fmt_err)?;
    }
    writeln!(out, "{}", line).map_err(fmt_err)?;
  }
  for extra in &structure.extra_properties {
    writeln!(out, "{}", extra).map_err(fmt_err)?;
  }
  out.push_str("M  END\n");
  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  const FORMALDEHYDE: &str = "712
  -OEChem-01012500003D

  4  3  0     0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2050    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
   -0.5600    0.9400    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
   -0.5600   -0.9400    0.0000 H   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  2  0  0  0  0
  1  3  1  0  0  0  0
  1  4  1  0  0  0  0
M  END
";

  #[test]
  fn parses_fixed_columns() -> Result<(), EngineError> {
    let s = parse_block(FORMALDEHYDE)?;
    assert_eq!(s.name, "712");
    assert_eq!(s.atom_count(), 4);
    assert_eq!(s.bond_count(), 3);
    assert_eq!(s.atoms[1].symbol, "O");
    assert_eq!(s.atoms[1].atomic_number, 8);
    assert_eq!(s.atoms[2].position, [-0.56, 0.94, 0.0]);
    assert_eq!(s.bonds[0].order, BondOrder::Double);
    assert_eq!((s.bonds[2].begin, s.bonds[2].end), (0, 3));
    Ok(())
  }

  #[test]
  fn whitespace_fallback_for_loose_columns() -> Result<(), EngineError> {
    let block = "loose\n\n\n2 1\n0.0 0.0 0.0 C 0 0\n1.5 0 0 N 0 0\n1 2 3\nM  END\n";
    let s = parse_block(block)?;
    assert_eq!(s.atoms[1].atomic_number, 7);
    assert_eq!(s.bonds[0].order, BondOrder::Triple);
    Ok(())
  }

  #[test]
  fn charges_from_property_block_override_atom_block() -> Result<(), EngineError> {
    let block = "ion\n\n\n  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 N   0  3  0  0  0  0  0  0  0  0  0  0
    1.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  CHG  2   1   1   2  -1
M  END
";
    let s = parse_block(block)?;
    assert_eq!(s.atoms[0].charge, 1);
    assert_eq!(s.atoms[1].charge, -1);
    Ok(())
  }

  #[test]
  fn rejects_truncated_and_unknown_symbols() {
    let truncated = "x\n\n\n  3  0  0  0  0  0  0  0  0  0999 V2000\n    0.0 0.0 0.0 C\nM  END\n";
    assert!(parse_block(truncated).is_err());
    let bad_symbol = "x\n\n\n  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 Zz  0  0  0  0  0  0  0  0  0  0  0  0
M  END
";
    assert!(matches!(parse_block(bad_symbol), Err(EngineError::InvalidInput(_))));
    assert!(parse_block("x\n\n\n  1  0  0  0  0  0  0  0  0  0999 V3000\nM  END\n").is_err());
  }

  #[test]
  fn bond_out_of_range_is_invalid() {
    let block = "x\n\n\n  1  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
M  END
";
    assert!(parse_block(block).is_err());
  }

  #[test]
  fn oversized_bond_code_is_invalid() {
    let block = "x\n\n\n  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
1 2 260
M  END
";
    assert!(matches!(parse_block(block), Err(EngineError::InvalidInput(_))));
    // 260 no debe truncarse a 4 (aromático)
    let block = block.replace("1 2 260", "1 2 4");
    assert!(parse_block(&block).is_ok());
  }

  #[test]
  fn query_atoms_are_kept() -> Result<(), EngineError> {
    let block = "x\n\n\n  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 *   0  0  0  0  0  0  0  0  0  0  0  0
   -1.5000    0.0000    0.0000 R#  0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0
  1  3  1  0
M  END
";
    let s = parse_block(block)?;
    assert_eq!(s.atoms.iter().map(|a| a.symbol.as_str()).collect::<Vec<_>>(), vec!["C", "*", "R#"]);
    assert_eq!(s.atoms.iter().map(|a| a.atomic_number).collect::<Vec<_>>(), vec![6, 0, 0]);
    assert_eq!(parse_block(&write_block(&s)?)?, s);
    Ok(())
  }

  #[test]
  fn written_block_parses_back_identically() -> Result<(), EngineError> {
    let s = parse_block(FORMALDEHYDE)?;
    let text = write_block(&s)?;
    assert!(text.ends_with("M  END\n"));
    assert_eq!(parse_block(&text)?, s);
    Ok(())
  }
}
