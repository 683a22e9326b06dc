//! Crate `chem-ingest`: ingesta del catálogo.
//!
//! `IngestionOrchestrator` carga primero el manifiesto CSV de un dataset y
//! después uno o más archivos SDF (planos o `.gz`) con geometrías. Las
//! unidades malformadas o con identificador desconocido se descartan y se
//! cuentan; los errores de persistencia y los archivos ausentes son fatales.
mod manifest;
mod orchestrator;
mod sources;
mod stats;

pub use manifest::{load_manifest, read_manifest, ManifestFile};
pub use orchestrator::{GeometryReport, IngestionOrchestrator, ManifestReport, PROGRESS_EVERY};
pub use sources::{ensure_sources_exist, read_source};
pub use stats::CoverageStats;

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, chem_domain::DomainError>;
