// stats.rs
// Cobertura del manifiesto: filas totales y, por columna clave, celdas no
// vacías y su porcentaje.
use chem_domain::normalizer::COVERAGE_COLUMNS;
use chem_domain::{IngestStats, ManifestRow};
use indexmap::IndexMap;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageStats {
  pub total_rows: usize,
  pub non_blank: IndexMap<&'static str, usize>,
}

impl CoverageStats {
  pub fn from_rows(rows: &[ManifestRow]) -> Self {
    let non_blank = COVERAGE_COLUMNS.iter()
                                    .map(|col| (*col, rows.iter().filter(|r| r.get(col).is_some()).count()))
                                    .collect();
    Self { total_rows: rows.len(), non_blank }
  }

  fn pct(&self, count: usize) -> f64 {
    (10000.0 * count as f64 / self.total_rows as f64).round() / 100.0
  }

  /// `total_rows`, `<col>` y `<col>_pct` (sólo si hay filas).
  pub fn into_stats(self) -> IngestStats {
    let mut stats = IngestStats::new();
    stats.insert("total_rows".into(), json!(self.total_rows));
    for (col, count) in &self.non_blank {
      stats.insert(col.to_string(), json!(count));
      if self.total_rows > 0 {
        stats.insert(format!("{}_pct", col), json!(self.pct(*count)));
      }
    }
    stats
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn percentages_round_to_two_decimals() {
    let rows: Vec<ManifestRow> = vec![[("PubChem_CID", "1"), ("SMILES", "C")].into_iter().collect(),
                                      [("PubChem_CID", "2"), ("SMILES", " ")].into_iter().collect(),
                                      [("PubChem_CID", "x")].into_iter().collect()];
    let stats = CoverageStats::from_rows(&rows).into_stats();
    assert_eq!(stats["total_rows"], json!(3));
    assert_eq!(stats["PubChem_CID"], json!(3));
    assert_eq!(stats["SMILES"], json!(1));
    assert_eq!(stats["SMILES_pct"], json!(33.33));
    assert_eq!(stats["InChIKey_pct"], json!(0.0));
  }

  #[test]
  fn empty_manifest_has_no_percentages() {
    let stats = CoverageStats::from_rows(&[]).into_stats();
    assert_eq!(stats["total_rows"], json!(0));
    assert!(!stats.contains_key("SMILES_pct"));
  }
}
