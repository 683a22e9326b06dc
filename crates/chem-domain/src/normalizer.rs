// normalizer.rs
// Normalización de filas del manifiesto (CSV) y de registros estructurales
// (SDF) a registros tipados. Las coerciones nunca fallan: un valor ilegible
// se convierte en `None`. Sólo el identificador químico decide si la unidad
// se descarta.
use crate::model::{DiscoveryMethod, DiscoverySeed, MoleculeRecord};
use crate::DomainError;
use chem_providers::{SdfRecord, StructureEngine};
use std::collections::HashMap;

pub const CID_COLUMN: &str = "PubChem_CID";

/// Columnas sin las cuales el manifiesto completo se rechaza.
pub const REQUIRED_COLUMNS: [&str; 8] = ["PubChem_CID",
                                         "SMILES",
                                         "InChIKey",
                                         "molecular_formula",
                                         "molecular_weight",
                                         "exact_mass",
                                         "discovery_method",
                                         "discovery_seed"];

/// Columnas sobre las que se calcula la cobertura de una corrida.
pub const COVERAGE_COLUMNS: [&str; 7] = ["PubChem_CID",
                                         "SMILES",
                                         "InChIKey",
                                         "molecular_formula",
                                         "molecular_weight",
                                         "discovery_method",
                                         "discovery_seed"];

/// Una fila cruda del manifiesto: celdas por nombre de columna.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestRow {
  cells: HashMap<String, String>,
}

impl ManifestRow {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
    self.cells.insert(column.into(), value.into());
  }

  /// Celda recortada; ausente o en blanco -> `None`.
  pub fn get(&self, column: &str) -> Option<&str> {
    self.cells.get(column).map(|v| v.trim()).filter(|v| !v.is_empty())
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ManifestRow {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self { cells: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
  }
}

pub fn coerce_text(raw: Option<&str>) -> Option<String> {
  raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Número de punto flotante finito; cualquier otra cosa -> `None`.
pub fn coerce_f64(raw: Option<&str>) -> Option<f64> {
  raw.and_then(|s| s.trim().parse::<f64>().ok()).filter(|v| v.is_finite())
}

/// Entero a partir de texto numérico (`"3.0"` -> 3, `"3.7"` -> 3).
pub fn coerce_i32(raw: Option<&str>) -> Option<i32> {
  coerce_f64(raw).map(f64::trunc).filter(|v| *v >= i32::MIN as f64 && *v <= i32::MAX as f64).map(|v| v as i32)
}

/// Identificador químico: entero positivo, se admite notación flotante sin
/// parte fraccionaria (`"2244.0"`).
pub fn parse_identifier(raw: Option<&str>) -> Result<i64, DomainError> {
  let text = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
                                                             DomainError::InputMalformed("identificador químico ausente"
                                                                                                                .into())
                                                           })?;
  let value = text.parse::<f64>()
                  .ok()
                  .filter(|v| v.is_finite() && v.fract() == 0.0 && *v >= 1.0 && *v < i64::MAX as f64)
                  .ok_or_else(|| DomainError::InputMalformed(format!("identificador químico inválido: '{}'", text)))?;
  Ok(value as i64)
}

/// Convierte una fila del manifiesto en `MoleculeRecord`.
pub fn normalize_manifest_row(dataset_id: &str,
                              run_id: Option<&str>,
                              row: &ManifestRow)
                              -> Result<MoleculeRecord, DomainError> {
  let cid = parse_identifier(row.get(CID_COLUMN))?;
  Ok(MoleculeRecord { dataset_id: dataset_id.to_string(),
                      cid,
                      smiles: coerce_text(row.get("SMILES")),
                      inchi_key: coerce_text(row.get("InChIKey")),
                      molecular_formula: coerce_text(row.get("molecular_formula")),
                      molecular_weight: coerce_f64(row.get("molecular_weight")),
                      exact_mass: coerce_f64(row.get("exact_mass")),
                      xlogp3: coerce_f64(row.get("XLogP3")),
                      tpsa: coerce_f64(row.get("TPSA")),
                      hba: coerce_i32(row.get("HBA")),
                      hbd: coerce_i32(row.get("HBD")),
                      rotatable_bonds: coerce_i32(row.get("rotatable_bonds")),
                      discovery_method: DiscoveryMethod::normalize(row.get("discovery_method")),
                      seed: DiscoverySeed::parse(row.get("discovery_seed")),
                      name: coerce_text(row.get("name")),
                      ingest_run_id: run_id.map(str::to_string) })
}

pub const CID_TAG: &str = "PUBCHEM_COMPOUND_CID";

/// Nivel de almacenamiento de una propiedad SDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  Hot,
  Cold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
  Float,
  Int,
  Text,
  Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
  pub tag: &'static str,
  pub column: &'static str,
  pub tier: Tier,
  pub kind: TagKind,
}

const fn tag(tag: &'static str, column: &'static str, tier: Tier, kind: TagKind) -> TagSpec {
  TagSpec { tag, column, tier, kind }
}

/// Propiedades SDF que se conservan: ocho escalares "hot" y cuatro payloads
/// "cold".
pub const GEOMETRY_TAGS: [TagSpec; 12] =
  [tag("PUBCHEM_CONFORMER_ID", "conformer_id", Tier::Hot, TagKind::Text),
   tag("PUBCHEM_MMFF94_ENERGY", "mmff94_energy", Tier::Hot, TagKind::Float),
   tag("PUBCHEM_CONFORMER_RMSD", "conformer_rmsd", Tier::Hot, TagKind::Float),
   tag("PUBCHEM_EFFECTIVE_ROTOR_COUNT", "effective_rotor_count", Tier::Hot, TagKind::Int),
   tag("PUBCHEM_SHAPE_VOLUME", "shape_volume", Tier::Hot, TagKind::Float),
   tag("PUBCHEM_SHAPE_SELFOVERLAP", "shape_selfoverlap", Tier::Hot, TagKind::Float),
   tag("PUBCHEM_HEAVY_ATOM_COUNT", "heavy_atom_count", Tier::Hot, TagKind::Int),
   tag("PUBCHEM_COMPONENT_COUNT", "component_count", Tier::Hot, TagKind::Int),
   tag("PUBCHEM_SHAPE_FINGERPRINT", "shape_fingerprint", Tier::Cold, TagKind::Bytes),
   tag("PUBCHEM_PHARMACOPHORE_FEATURES", "pharmacophore_features", Tier::Cold, TagKind::Bytes),
   tag("PUBCHEM_MMFF94_PARTIAL_CHARGES", "mmff94_partial_charges", Tier::Cold, TagKind::Bytes),
   tag("PUBCHEM_COORDINATE_TYPE", "coordinate_type", Tier::Cold, TagKind::Bytes)];

#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
  Float(Option<f64>),
  Int(Option<i32>),
  Text(Option<String>),
  Bytes(Option<Vec<u8>>),
}

impl TagValue {
  fn coerce(kind: TagKind, raw: Option<&str>) -> Self {
    match kind {
      TagKind::Float => Self::Float(coerce_f64(raw)),
      TagKind::Int => Self::Int(coerce_i32(raw)),
      TagKind::Text => Self::Text(raw.map(str::to_string)),
      TagKind::Bytes => Self::Bytes(raw.map(|s| s.as_bytes().to_vec())),
    }
  }
}

/// Registro estructural normalizado, aún sin dividir en hot/cold.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGeometry {
  pub dataset_id: String,
  pub cid: i64,
  /// Bloque re-serializado por el motor estructural.
  pub molblock: String,
  pub tags: Vec<(TagSpec, TagValue)>,
}

/// Normaliza un registro SDF: identificador, bloque canónico y las doce
/// propiedades de `GEOMETRY_TAGS`.
pub fn normalize_geometry(engine: &dyn StructureEngine,
                          dataset_id: &str,
                          record: &SdfRecord)
                          -> Result<NormalizedGeometry, DomainError> {
  let cid = parse_identifier(record.property(CID_TAG))?;
  let structure = engine.parse(&record.block)?;
  let molblock = engine.serialize(&structure)?;
  let tags = GEOMETRY_TAGS.iter().map(|spec| (*spec, TagValue::coerce(spec.kind, record.property(spec.tag)))).collect();
  Ok(NormalizedGeometry { dataset_id: dataset_id.to_string(), cid, molblock, tags })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chem_providers::{sdf, MolfileEngine};

  fn row(pairs: &[(&str, &str)]) -> ManifestRow {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
  }

  #[test]
  fn manifest_row_full() -> Result<(), DomainError> {
    let r = row(&[("PubChem_CID", "2244.0"),
                  ("SMILES", "  CC(=O)OC1=CC=CC=C1C(=O)O "),
                  ("InChIKey", "BSYNRYMUTXBXSQ-UHFFFAOYSA-N"),
                  ("molecular_formula", "C9H8O4"),
                  ("molecular_weight", "180.16"),
                  ("exact_mass", "180.042"),
                  ("XLogP3", "1.2"),
                  ("TPSA", "63.6"),
                  ("HBA", "4.0"),
                  ("HBD", "1"),
                  ("rotatable_bonds", "3"),
                  ("discovery_method", "Similarity"),
                  ("discovery_seed", "aspirin:CC(=O)OC1=CC=CC=C1C(=O)O"),
                  ("name", "Aspirin")]);
    let m = normalize_manifest_row("ds1", Some("run-1"), &r)?;
    assert_eq!(m.cid, 2244);
    assert_eq!(m.smiles.as_deref(), Some("CC(=O)OC1=CC=CC=C1C(=O)O"));
    assert_eq!(m.molecular_weight, Some(180.16));
    assert_eq!(m.hba, Some(4));
    assert_eq!(m.discovery_method, DiscoveryMethod::Sim2d);
    assert_eq!(m.seed.family(), Some("aspirin"));
    assert_eq!(m.ingest_run_id.as_deref(), Some("run-1"));
    Ok(())
  }

  #[test]
  fn blanks_and_garbage_become_null() -> Result<(), DomainError> {
    let r = row(&[("PubChem_CID", "7"), ("SMILES", "   "), ("molecular_weight", "n/a"), ("HBA", "")]);
    let m = normalize_manifest_row("ds1", None, &r)?;
    assert_eq!(m.smiles, None);
    assert_eq!(m.molecular_weight, None);
    assert_eq!(m.hba, None);
    assert_eq!(m.discovery_method, DiscoveryMethod::Substructure);
    assert_eq!(m.seed.raw(), None);
    Ok(())
  }

  #[test]
  fn unusable_identifiers_are_malformed() {
    for bad in ["", "abc", "12.5", "-3", "0", "inf"] {
      let r = row(&[("PubChem_CID", bad)]);
      assert!(matches!(normalize_manifest_row("ds", None, &r), Err(DomainError::InputMalformed(_))), "{}", bad);
    }
    assert!(normalize_manifest_row("ds", None, &ManifestRow::new()).is_err());
  }

  #[test]
  fn identifiers_beyond_i64_are_malformed() {
    // 2^63 no cabe en i64: no debe saturar a i64::MAX
    assert!(matches!(parse_identifier(Some("9223372036854775808")), Err(DomainError::InputMalformed(_))));
    assert!(parse_identifier(Some("1e19")).is_err());
    assert_eq!(parse_identifier(Some("4503599627370496")).ok(), Some(4_503_599_627_370_496));
    assert_eq!(parse_identifier(Some(" 962.0 ")).ok(), Some(962));
  }

  #[test]
  fn numeric_coercions() {
    assert_eq!(coerce_i32(Some("3.9")), Some(3));
    assert_eq!(coerce_i32(Some("1e12")), None);
    assert_eq!(coerce_f64(Some("NaN")), None);
    assert_eq!(coerce_f64(Some(" 2.5 ")), Some(2.5));
    assert_eq!(coerce_text(Some("  ")), None);
  }

  const RECORD: &str = "712
  -OEChem-01012500003D

  2  1  0     0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.2050    0.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  2  0  0  0  0
M  END
> <PUBCHEM_COMPOUND_CID>
712

> <PUBCHEM_CONFORMER_ID>
000002C800000001

> <PUBCHEM_MMFF94_ENERGY>
1.5

> <PUBCHEM_EFFECTIVE_ROTOR_COUNT>
4.4

> <PUBCHEM_SHAPE_VOLUME>
not-a-number

> <PUBCHEM_COORDINATE_TYPE>
1
5
255

$$$$
";

  #[test]
  fn geometry_tags_coerced_per_table() -> Result<(), DomainError> {
    let record = &sdf::split_records(RECORD)[0];
    let g = normalize_geometry(&MolfileEngine::new(), "ds", record)?;
    assert_eq!(g.cid, 712);
    assert!(g.molblock.ends_with("M  END\n"));
    let value = |column: &str| g.tags.iter().find(|(s, _)| s.column == column).map(|(_, v)| v.clone());
    assert_eq!(value("conformer_id"), Some(TagValue::Text(Some("000002C800000001".into()))));
    assert_eq!(value("mmff94_energy"), Some(TagValue::Float(Some(1.5))));
    assert_eq!(value("effective_rotor_count"), Some(TagValue::Int(Some(4))));
    assert_eq!(value("shape_volume"), Some(TagValue::Float(None)));
    assert_eq!(value("conformer_rmsd"), Some(TagValue::Float(None)));
    assert_eq!(value("coordinate_type"), Some(TagValue::Bytes(Some(b"1\n5\n255".to_vec()))));
    assert_eq!(value("shape_fingerprint"), Some(TagValue::Bytes(None)));
    Ok(())
  }

  #[test]
  fn geometry_without_identifier_or_structure_is_skipped() {
    let engine = MolfileEngine::new();
    let mut record = sdf::split_records(RECORD).remove(0);
    record.properties.shift_remove(CID_TAG);
    assert!(matches!(normalize_geometry(&engine, "ds", &record), Err(DomainError::InputMalformed(_))));

    let mut broken = sdf::split_records(RECORD).remove(0);
    broken.block = "broken\n".into();
    assert!(matches!(normalize_geometry(&engine, "ds", &broken), Err(DomainError::InputMalformed(_))));
  }
}
