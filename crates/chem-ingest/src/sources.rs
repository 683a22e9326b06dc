// sources.rs
// Lectura de archivos estructurales: SDF plano o comprimido con gzip.
use crate::Result;
use chem_domain::DomainError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

fn is_gzip_source(path: &Path) -> bool {
  path.extension().map(|e| e.eq_ignore_ascii_case("gz")).unwrap_or(false)
}

/// Falla con `ResourceMissing` si alguna fuente no existe. Se llama antes de
/// cualquier escritura.
pub fn ensure_sources_exist<P: AsRef<Path>>(sources: &[P]) -> Result<()> {
  for source in sources {
    let path = source.as_ref();
    if !path.is_file() {
      return Err(DomainError::ResourceMissing(path.display().to_string()));
    }
  }
  Ok(())
}

/// Contenido de una fuente como texto; los bytes UTF-8 inválidos se
/// reemplazan.
pub fn read_source(path: &Path) -> Result<String> {
  let file = File::open(path).map_err(|e| DomainError::ResourceMissing(format!("{}: {}", path.display(), e)))?;
  let mut bytes = Vec::new();
  let read = if is_gzip_source(path) {
    GzDecoder::new(BufReader::new(file)).read_to_end(&mut bytes)
  } else {
    BufReader::new(file).read_to_end(&mut bytes)
  };
  read.map_err(|e| DomainError::InputMalformed(format!("no se pudo leer '{}': {}", path.display(), e)))?;
  Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use flate2::write::GzEncoder;
  use flate2::Compression;
  use std::io::Write;

  #[test]
  fn reads_plain_and_gzip() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("a.sdf");
    std::fs::write(&plain, b"hola\xff\n$$$$\n")?;
    assert_eq!(read_source(&plain)?, "hola\u{fffd}\n$$$$\n");

    let gz = dir.path().join("a.sdf.gz");
    let mut enc = GzEncoder::new(File::create(&gz)?, Compression::default());
    enc.write_all(b"comprimido\n")?;
    enc.finish()?;
    assert_eq!(read_source(&gz)?, "comprimido\n");
    Ok(())
  }

  #[test]
  fn missing_source_is_reported() {
    let err = ensure_sources_exist(&["/definitely/not/here.sdf"]).unwrap_err();
    assert_eq!(err.kind(), chem_domain::FailureKind::ServerFault);
    assert!(matches!(err, DomainError::ResourceMissing(_)));
  }
}
