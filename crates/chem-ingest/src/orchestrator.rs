// Archivo: orchestrator.rs
// Propósito: secuenciar la ingesta de un dataset. Primero el manifiesto
// (crea/actualiza el dataset y registra una corrida), después las
// geometrías, que sólo se admiten para identificadores ya cargados.
use crate::manifest::{load_manifest, ManifestFile};
use crate::sources::{ensure_sources_exist, read_source};
use crate::stats::CoverageStats;
use crate::Result;
use chem_domain::{new_run_id, normalize_geometry, normalize_manifest_row, split_geometry, CatalogRepository,
                  DomainError, IdentifierReconciler, IngestRun, IngestStats, ManifestRow, MoleculeRecord, RunStatus};
use chem_providers::sdf::split_records;
use chem_providers::{MolfileEngine, SdfRecord, StructureEngine};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Cada cuántas geometrías escritas se registra el progreso.
pub const PROGRESS_EVERY: usize = 500;

/// Resultado de una ingesta de manifiesto.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestReport {
  pub dataset_id: String,
  pub run_id: String,
  pub molecules_upserted: usize,
  pub rows_skipped: usize,
  pub stats: IngestStats,
}

/// Resultado de una ingesta de geometrías.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeometryReport {
  pub dataset_id: String,
  pub run_id: String,
  pub written: usize,
  /// Registros cuyo identificador no está en el manifiesto.
  pub skipped_unknown: usize,
  /// Registros sin identificador válido o con bloque ilegible.
  pub skipped_malformed: usize,
}

/// Orquestador de ingesta sobre cualquier `CatalogRepository`.
pub struct IngestionOrchestrator<R>
  where R: CatalogRepository
{
  repo: Arc<R>,
  engine: Arc<dyn StructureEngine>,
}

impl<R> IngestionOrchestrator<R> where R: CatalogRepository
{
  pub fn new(repo: Arc<R>) -> Self {
    Self { repo, engine: Arc::new(MolfileEngine::new()) }
  }

  pub fn with_engine(mut self, engine: Arc<dyn StructureEngine>) -> Self {
    self.engine = engine;
    self
  }

  pub fn repository(&self) -> &Arc<R> {
    &self.repo
  }

  /// Lee el manifiesto desde disco y lo ingiere. Un archivo ausente o sin
  /// columnas requeridas falla antes de escribir nada.
  pub fn ingest_manifest_file(&self, dataset_id: &str, name: Option<&str>, path: &Path) -> Result<ManifestReport> {
    let ManifestFile { rows, source_sha256, .. } = load_manifest(path)?;
    let mut extra = IngestStats::new();
    if let Some(sha) = source_sha256 {
      extra.insert("source_sha256".into(), json!(sha));
    }
    extra.insert("source".into(), json!(path.display().to_string()));
    self.run_manifest(dataset_id, name, &rows, extra)
  }

  /// Ingiere filas ya leídas: upsert del dataset, corrida `running`,
  /// normalización y upsert de cada fila válida, corrida `completed` con la
  /// cobertura. Si falla la persistencia la corrida se marca `failed`.
  pub fn ingest_manifest(&self, dataset_id: &str, name: Option<&str>, rows: &[ManifestRow]) -> Result<ManifestReport> {
    self.run_manifest(dataset_id, name, rows, IngestStats::new())
  }

  fn run_manifest(&self,
                  dataset_id: &str,
                  name: Option<&str>,
                  rows: &[ManifestRow],
                  extra: IngestStats)
                  -> Result<ManifestReport> {
    let run = IngestRun::start(dataset_id);
    let display_name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or(dataset_id);
    log::info!("ingesta de manifiesto: dataset={} run={} filas={}", dataset_id, run.run_id, rows.len());
    self.repo.upsert_dataset(dataset_id, display_name, Some(&run.run_id))?;
    self.repo.start_run(&run)?;

    let mut records: Vec<MoleculeRecord> = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (i, row) in rows.iter().enumerate() {
      match normalize_manifest_row(dataset_id, Some(&run.run_id), row) {
        Ok(record) => records.push(record),
        Err(e) => {
          log::debug!("fila {} descartada: {}", i + 1, e);
          skipped += 1;
        }
      }
    }
    let distinct: HashSet<i64> = records.iter().map(|r| r.cid).collect();

    let mut stats = CoverageStats::from_rows(rows).into_stats();
    stats.extend(extra);
    let upserted = match self.repo.upsert_molecules(&records) {
      Ok(n) => n,
      Err(e) => {
        stats.insert("error".into(), json!(e.to_string()));
        if let Err(mark) = self.repo.finish_run(&run.run_id, RunStatus::Failed, &stats) {
          log::warn!("no se pudo marcar la corrida {} como fallida: {}", run.run_id, mark);
        } else {
          log::warn!("corrida {} fallida: {}", run.run_id, e);
        }
        return Err(e);
      }
    };
    stats.insert("molecules_upserted".into(), json!(upserted));
    stats.insert("rows_skipped".into(), json!(skipped));
    stats.insert("distinct_cids".into(), json!(distinct.len()));
    self.repo.finish_run(&run.run_id, RunStatus::Completed, &stats)?;
    log::info!("manifiesto listo: dataset={} run={} upserted={} skipped={}",
               dataset_id,
               run.run_id,
               upserted,
               skipped);
    Ok(ManifestReport { dataset_id: dataset_id.to_string(),
                        run_id: run.run_id,
                        molecules_upserted: upserted,
                        rows_skipped: skipped,
                        stats })
  }

  /// Ingiere uno o más archivos SDF (`.gz` admitido). Todas las fuentes
  /// deben existir antes de escribir. No abre ni cierra corridas: `run_id`
  /// sólo se registra como linaje; si falta se genera uno.
  pub fn ingest_geometry<P: AsRef<Path>>(&self,
                                         dataset_id: &str,
                                         run_id: Option<&str>,
                                         sources: &[P])
                                         -> Result<GeometryReport> {
    ensure_sources_exist(sources)?;
    let mut session = self.geometry_session(dataset_id, run_id)?;
    for source in sources {
      let path = source.as_ref();
      let text = read_source(path)?;
      let records = split_records(&text);
      log::info!("fuente {}: {} registros", path.display(), records.len());
      for record in &records {
        session.ingest(self, record)?;
      }
    }
    Ok(session.finish())
  }

  /// Igual que `ingest_geometry` pero con registros ya separados.
  pub fn ingest_geometry_records<'a, I>(&self, dataset_id: &str, run_id: Option<&str>, records: I) -> Result<GeometryReport>
    where I: IntoIterator<Item = &'a SdfRecord>
  {
    let mut session = self.geometry_session(dataset_id, run_id)?;
    for record in records {
      session.ingest(self, record)?;
    }
    Ok(session.finish())
  }

  fn geometry_session(&self, dataset_id: &str, run_id: Option<&str>) -> Result<GeometrySession> {
    let valid = self.repo.molecule_ids(dataset_id)?;
    let run_id = run_id.map(str::to_string).unwrap_or_else(new_run_id);
    log::info!("ingesta de geometrías: dataset={} run={} cids conocidos={}", dataset_id, run_id, valid.len());
    Ok(GeometrySession { dataset_id: dataset_id.to_string(),
                         run_id,
                         reconciler: IdentifierReconciler::new(valid),
                         written: 0,
                         malformed: 0,
                         orphaned: 0 })
  }
}

/// Estado de una ingesta de geometrías en curso.
struct GeometrySession {
  dataset_id: String,
  run_id: String,
  reconciler: IdentifierReconciler,
  written: usize,
  malformed: usize,
  orphaned: usize,
}

impl GeometrySession {
  fn ingest<R: CatalogRepository>(&mut self, owner: &IngestionOrchestrator<R>, record: &SdfRecord) -> Result<()> {
    let normalized = match normalize_geometry(owner.engine.as_ref(), &self.dataset_id, record) {
      Ok(n) => n,
      Err(e) if e.is_recoverable() => {
        log::debug!("registro estructural descartado: {}", e);
        self.malformed += 1;
        return Ok(());
      }
      Err(e) => return Err(e),
    };
    if let Err(e) = self.reconciler.admit(normalized.cid) {
      log::debug!("geometría descartada: {}", e);
      return Ok(());
    }
    match owner.repo.upsert_geometry(&self.run_id, &split_geometry(normalized)) {
      Ok(()) => {}
      Err(DomainError::ReferentialViolation(key)) => {
        // el manifiesto cambió durante la ingesta
        log::warn!("geometría sin fila de manifiesto: {}", key);
        self.orphaned += 1;
        return Ok(());
      }
      Err(e) => return Err(e),
    }
    self.written += 1;
    if self.written % PROGRESS_EVERY == 0 {
      log::info!("  geometrías escritas: {}", self.written);
    }
    Ok(())
  }

  fn finish(self) -> GeometryReport {
    let skipped_unknown = self.reconciler.rejected() + self.orphaned;
    log::info!("geometrías listas: dataset={} run={} escritas={} desconocidas={} malformadas={}",
               self.dataset_id,
               self.run_id,
               self.written,
               skipped_unknown,
               self.malformed);
    GeometryReport { dataset_id: self.dataset_id,
                     run_id: self.run_id,
                     written: self.written,
                     skipped_unknown,
                     skipped_malformed: self.malformed }
  }
}
