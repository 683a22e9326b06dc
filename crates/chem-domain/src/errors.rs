// error.rs
use chem_providers::EngineError;
use thiserror::Error;

/// Taxonomía de errores del catálogo.
///
/// `InputMalformed` y `ReferentialViolation` son recuperables durante la
/// ingesta (la unidad se descarta y se cuenta); el resto son fatales para la
/// operación que los produce.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
  #[error("Entrada malformada: {0}")]
  InputMalformed(String),
  #[error("Identificador no presente en el manifiesto: {0}")]
  ReferentialViolation(String),
  #[error("Recurso inexistente: {0}")]
  ResourceMissing(String),
  #[error("Error de persistencia: {0}")]
  PersistenceFailure(String),
  #[error("No encontrado: {0}")]
  NotFound(String),
  #[error("Solicitud inválida: {0}")]
  BadRequest(String),
  #[error("Error de serialización: {0}")]
  SerializationError(String),
}

/// Clase de fallo visible para quien consume las consultas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
  NotFound,
  BadRequest,
  ServerFault,
}

impl DomainError {
  pub fn kind(&self) -> FailureKind {
    match self {
      Self::NotFound(_) => FailureKind::NotFound,
      Self::BadRequest(_) | Self::InputMalformed(_) | Self::ReferentialViolation(_) => FailureKind::BadRequest,
      Self::ResourceMissing(_) | Self::PersistenceFailure(_) | Self::SerializationError(_) => FailureKind::ServerFault,
    }
  }

  /// Errores que la ingesta absorbe contando la unidad como descartada.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::InputMalformed(_) | Self::ReferentialViolation(_))
  }
}

impl From<EngineError> for DomainError {
  fn from(e: EngineError) -> Self {
    Self::InputMalformed(e.to_string())
  }
}

impl From<serde_json::Error> for DomainError {
  fn from(e: serde_json::Error) -> Self {
    Self::SerializationError(e.to_string())
  }
}
