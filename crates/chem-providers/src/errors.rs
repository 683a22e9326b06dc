use thiserror::Error;

/// Errores del motor estructural.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
  /// El bloque no respeta el formato MDL molfile.
  #[error("Bloque estructural inválido: {0}")]
  InvalidInput(String),
  /// La estructura no puede escribirse (por ejemplo, demasiados átomos para V2000).
  #[error("No se pudo serializar la estructura: {0}")]
  Serialization(String),
}

impl EngineError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidInput(msg.into())
  }
}
