// manifest.rs
// Carga del manifiesto CSV en filas crudas. La validación de columnas
// requeridas ocurre aquí, antes de cualquier escritura.
use crate::Result;
use chem_domain::normalizer::REQUIRED_COLUMNS;
use chem_domain::{DomainError, ManifestRow};
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Manifiesto leído: cabeceras, filas y huella del archivo de origen.
#[derive(Debug, Clone, Default)]
pub struct ManifestFile {
  pub headers: Vec<String>,
  pub rows: Vec<ManifestRow>,
  /// SHA-256 hex del contenido, si proviene de un archivo.
  pub source_sha256: Option<String>,
}

impl ManifestFile {
  pub fn missing_columns(&self) -> Vec<&'static str> {
    REQUIRED_COLUMNS.iter().copied().filter(|c| !self.headers.iter().any(|h| h == c)).collect()
  }
}

/// Lee un CSV con cabecera. Filas con menos celdas que cabeceras se admiten;
/// las celdas con UTF-8 inválido se decodifican con reemplazo.
pub fn read_manifest<R: Read>(reader: R) -> Result<ManifestFile> {
  let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
  let headers: Vec<String> = rdr.byte_headers()
                                .map_err(|e| DomainError::InputMalformed(format!("cabecera CSV: {}", e)))?
                                .iter()
                                .map(|h| String::from_utf8_lossy(h).trim().trim_start_matches('\u{feff}').to_string())
                                .collect();
  let mut rows: Vec<ManifestRow> = Vec::new();
  for (line, record) in rdr.byte_records().enumerate() {
    let record = match record {
      Ok(r) => r,
      Err(e) => {
        log::debug!("fila CSV {} descartada: {}", line + 2, e);
        continue;
      }
    };
    rows.push(headers.iter()
                     .zip(record.iter())
                     .map(|(h, v)| (h.clone(), String::from_utf8_lossy(v).into_owned()))
                     .collect());
  }
  let manifest = ManifestFile { headers, rows, source_sha256: None };
  let missing = manifest.missing_columns();
  if !missing.is_empty() {
    return Err(DomainError::InputMalformed(format!("faltan columnas requeridas: {}", missing.join(", "))));
  }
  Ok(manifest)
}

/// Lee el manifiesto desde disco y calcula su SHA-256.
pub fn load_manifest(path: &Path) -> Result<ManifestFile> {
  if !path.is_file() {
    return Err(DomainError::ResourceMissing(path.display().to_string()));
  }
  let bytes = std::fs::read(path).map_err(|e| DomainError::ResourceMissing(format!("{}: {}", path.display(), e)))?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  let mut manifest = read_manifest(bytes.as_slice())?;
  manifest.source_sha256 = Some(format!("{:x}", hasher.finalize()));
  Ok(manifest)
}

#[cfg(test)]
mod tests {
  use super::*;

  const HEADER: &str = "PubChem_CID,SMILES,InChIKey,molecular_formula,molecular_weight,exact_mass,discovery_method,discovery_seed";

  #[test]
  fn reads_rows_by_header() -> Result<()> {
    let text = format!("{HEADER},name\n2244,CCO,KEY,C2H6O,46.07,46.04,sim3d,ethanol,Ethanol\n962,O\n");
    let manifest = read_manifest(text.as_bytes())?;
    assert_eq!(manifest.rows.len(), 2);
    assert_eq!(manifest.rows[0].get("name"), Some("Ethanol"));
    assert_eq!(manifest.rows[1].get("SMILES"), Some("O"));
    assert_eq!(manifest.rows[1].get("InChIKey"), None);
    Ok(())
  }

  #[test]
  fn missing_required_columns_abort() {
    match read_manifest("PubChem_CID,SMILES\n1,C\n".as_bytes()) {
      Err(DomainError::InputMalformed(msg)) => assert!(msg.contains("InChIKey")),
      other => panic!("expected InputMalformed, got {:?}", other),
    }
  }

  #[test]
  fn file_digest_is_recorded() -> Result<()> {
    let dir = tempfile::tempdir().map_err(|e| DomainError::ResourceMissing(e.to_string()))?;
    let path = dir.path().join("m.csv");
    std::fs::write(&path, format!("{HEADER}\n")).map_err(|e| DomainError::ResourceMissing(e.to_string()))?;
    let manifest = load_manifest(&path)?;
    assert!(manifest.rows.is_empty());
    assert_eq!(manifest.source_sha256.map(|s| s.len()), Some(64));
    assert!(matches!(load_manifest(&dir.path().join("nope.csv")), Err(DomainError::ResourceMissing(_))));
    Ok(())
  }
}
