//! Separación de archivos SDF en registros.
//!
//! Cada registro es un bloque molfile seguido de items de datos
//! (`> <TAG>` + líneas de valor + línea en blanco) y termina con `$$$$`.
use indexmap::IndexMap;

pub const RECORD_TERMINATOR: &str = "$$$$";

/// Un registro SDF: bloque estructural (hasta `M  END`) y sus propiedades en
/// el orden en que aparecen.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SdfRecord {
  pub block: String,
  pub properties: IndexMap<String, String>,
}

impl SdfRecord {
  /// Valor de una propiedad por nombre exacto.
  pub fn property(&self, name: &str) -> Option<&str> {
    self.properties.get(name).map(String::as_str)
  }

  pub fn has_property(&self, name: &str) -> bool {
    self.properties.contains_key(name)
  }

  fn from_lines(lines: &[&str]) -> Self {
    let end = lines.iter().position(|l| l.starts_with("M  END"));
    let (block_lines, data_lines) = match end {
      Some(i) => lines.split_at(i + 1),
      None => (lines, &[][..]),
    };
    let mut block = block_lines.join("\n");
    block.push('\n');
    Self { block, properties: parse_data_items(data_lines) }
  }
}

/// `> <PUBCHEM_COMPOUND_CID>` -> `PUBCHEM_COMPOUND_CID`
fn data_header_name(line: &str) -> Option<&str> {
  let rest = line.strip_prefix('>')?;
  let open = rest.find('<')?;
  let close = rest[open + 1..].find('>')?;
  Some(&rest[open + 1..open + 1 + close])
}

fn parse_data_items(lines: &[&str]) -> IndexMap<String, String> {
  let mut props = IndexMap::new();
  let mut current: Option<(String, Vec<&str>)> = None;
  for line in lines {
    if let Some(name) = data_header_name(line) {
      if let Some((k, v)) = current.take() {
        props.insert(k, v.join("\n"));
      }
      current = Some((name.to_string(), Vec::new()));
      continue;
    }
    if line.trim().is_empty() {
      if let Some((k, v)) = current.take() {
        props.insert(k, v.join("\n"));
      }
    } else if let Some((_, values)) = current.as_mut() {
      values.push(line.trim_end());
    }
  }
  if let Some((k, v)) = current.take() {
    props.insert(k, v.join("\n"));
  }
  props
}

/// Recorre el texto de un archivo SDF y devuelve sus registros. Un último
/// registro sin terminador se acepta sólo si contiene `M  END`.
pub fn split_records(text: &str) -> Vec<SdfRecord> {
  let mut records = Vec::new();
  let mut current: Vec<&str> = Vec::new();
  for line in text.lines() {
    if line.trim() == RECORD_TERMINATOR {
      records.push(SdfRecord::from_lines(&current));
      current.clear();
    } else {
      current.push(line);
    }
  }
  if current.iter().any(|l| l.starts_with("M  END")) {
    records.push(SdfRecord::from_lines(&current));
  } else if current.iter().any(|l| !l.trim().is_empty()) {
    log::debug!("registro SDF final sin terminador descartado ({} líneas)", current.len());
  }
  records
}

#[cfg(test)]
mod tests {
  use super::*;

  const TWO_RECORDS: &str = "first
  test

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
M  END
> <PUBCHEM_COMPOUND_CID>
297

> <PUBCHEM_COORDINATE_TYPE>
1
5
255

$$$$
second
  test

  1  0  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
M  END
>  <PUBCHEM_COMPOUND_CID>  (2)
962
$$$$
";

  #[test]
  fn splits_blocks_and_properties() {
    let records = split_records(TWO_RECORDS);
    assert_eq!(records.len(), 2);
    assert!(records[0].block.starts_with("first\n"));
    assert!(records[0].block.ends_with("M  END\n"));
    assert_eq!(records[0].property("PUBCHEM_COMPOUND_CID"), Some("297"));
    assert_eq!(records[0].property("PUBCHEM_COORDINATE_TYPE"), Some("1\n5\n255"));
    assert_eq!(records[1].property("PUBCHEM_COMPOUND_CID"), Some("962"));
    assert!(!records[1].has_property("PUBCHEM_COORDINATE_TYPE"));
  }

  #[test]
  fn trailing_record_without_terminator() {
    let text = TWO_RECORDS.trim_end().trim_end_matches(RECORD_TERMINATOR);
    assert_eq!(split_records(text).len(), 2);
    assert_eq!(split_records("garbage\nwithout end\n").len(), 0);
    assert!(split_records("").is_empty());
  }
}
