//! Crate `chem-domain`: modelo y reglas del catálogo de moléculas.
//!
//! Contiene los tipos del catálogo (datasets, corridas, filas del manifiesto
//! y el par de geometría hot/cold), la normalización de filas y registros
//! estructurales, el reconciliador de identificadores, el planificador de
//! consultas y el contrato `CatalogRepository` con su implementación en
//! memoria.
mod errors;
mod model;
pub mod normalizer;
pub mod query;
mod reconciler;
mod repository;
mod service;
mod splitter;

pub use errors::{DomainError, FailureKind};
pub use model::{new_run_id, Dataset, DatasetSummary, DiscoveryMethod, DiscoverySeed, GeometryCold, GeometryHot,
                GeometryRecord, IngestRun, IngestStats, MoleculeDetail, MoleculeRecord, RunStatus, SeedSummary};
pub use normalizer::{normalize_geometry, normalize_manifest_row, ManifestRow, NormalizedGeometry};
pub use query::{AggregateReport, FieldSummary, MoleculePage, Placeholder, QueryParam, QueryPlan, QueryPlanner,
                QueryRequest, UnknownFieldPolicy};
pub use reconciler::IdentifierReconciler;
pub use repository::{CatalogRepository, InMemoryCatalogRepository};
pub use service::{CatalogService, GeometryFormat, GeometryPayload};
pub use splitter::split_geometry;
