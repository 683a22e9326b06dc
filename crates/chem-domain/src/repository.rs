use crate::model::{Dataset, DatasetSummary, GeometryRecord, IngestRun, IngestStats, MoleculeDetail, MoleculeRecord,
                   RunStatus, SeedSummary};
use crate::query::{aggregated_fields, field_value, AggregateReport, FieldSummary, MoleculePage, QueryPlan};
use crate::DomainError;
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Operaciones de persistencia del catálogo. Todas las escrituras son
/// upserts por clave natural: repetirlas no crea duplicados.
pub trait CatalogRepository: Send + Sync {
  /// Crea el dataset o actualiza su nombre y su corrida de linaje.
  fn upsert_dataset(&self, dataset_id: &str, name: &str, run_id: Option<&str>) -> Result<(), DomainError>;

  /// Registra una corrida nueva (normalmente en estado `running`).
  fn start_run(&self, run: &IngestRun) -> Result<(), DomainError>;

  /// Cierra una corrida con su estado final y estadísticas.
  fn finish_run(&self, run_id: &str, status: RunStatus, stats: &IngestStats) -> Result<(), DomainError>;

  /// Upsert de filas del manifiesto (last-write-wins en todos los campos).
  /// Devuelve cuántas filas se escribieron.
  fn upsert_molecules(&self, rows: &[MoleculeRecord]) -> Result<usize, DomainError>;

  /// Identificadores del manifiesto ya cargados para un dataset.
  fn molecule_ids(&self, dataset_id: &str) -> Result<HashSet<i64>, DomainError>;

  /// Upsert del par hot/cold; ambas filas se escriben juntas o ninguna.
  fn upsert_geometry(&self, run_id: &str, record: &GeometryRecord) -> Result<(), DomainError>;

  /// Datasets con su número de moléculas, más recientes primero.
  fn list_datasets(&self) -> Result<Vec<DatasetSummary>, DomainError>;

  /// Familias de semilla distintas de un dataset, ordenadas.
  fn list_families(&self, dataset_id: &str) -> Result<Vec<String>, DomainError>;

  /// Semillas distintas, opcionalmente sólo las de una familia.
  fn list_seeds(&self, dataset_id: &str, family: Option<&str>) -> Result<Vec<SeedSummary>, DomainError>;

  /// Página de moléculas y total con el mismo predicado.
  fn query_molecules(&self, plan: &QueryPlan) -> Result<MoleculePage, DomainError>;

  /// Resumen (count, min, max) de cada campo agregado.
  fn aggregate(&self, plan: &QueryPlan) -> Result<AggregateReport, DomainError>;

  fn get_molecule(&self, dataset_id: &str, cid: i64) -> Result<Option<MoleculeDetail>, DomainError>;

  /// Bloque estructural guardado en la fila cold.
  fn get_geometry_block(&self, dataset_id: &str, cid: i64) -> Result<Option<String>, DomainError>;

  /// Corridas recientes, más nuevas primero.
  fn list_runs(&self, limit: usize) -> Result<Vec<IngestRun>, DomainError>;

  fn get_run(&self, run_id: &str) -> Result<Option<IngestRun>, DomainError>;
}

type Key = (String, i64);

/// Implementación en memoria para tests y desarrollo. Evalúa los planes con
/// `QueryPlan::matches`/`compare`, la misma semántica que el SQL.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
  datasets: Mutex<HashMap<String, Dataset>>,
  runs: Mutex<IndexMap<String, IngestRun>>,
  molecules: Mutex<BTreeMap<Key, MoleculeRecord>>,
  geometry: Mutex<HashMap<Key, GeometryRecord>>,
}

impl InMemoryCatalogRepository {
  pub fn new() -> Self {
    Self::default()
  }

  // Mapea un mutex envenenado a DomainError
  fn lock_map<'a, T>(&'a self, m: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>, DomainError> {
    m.lock().map_err(|e| DomainError::PersistenceFailure(format!("Mutex '{}' poisoned: {}", name, e)))
  }

  fn matching_rows<'a>(&self,
                       plan: &QueryPlan,
                       molecules: &'a BTreeMap<Key, MoleculeRecord>,
                       geometry: &'a HashMap<Key, GeometryRecord>)
                       -> Vec<(&'a MoleculeRecord, Option<&'a crate::model::GeometryHot>)> {
    molecules.range((plan.dataset_id.clone(), i64::MIN)..=(plan.dataset_id.clone(), i64::MAX))
             .map(|(key, m)| (m, geometry.get(key).map(GeometryRecord::hot)))
             .filter(|(m, g)| plan.matches(m, *g))
             .collect()
  }
}

impl CatalogRepository for InMemoryCatalogRepository {
  fn upsert_dataset(&self, dataset_id: &str, name: &str, run_id: Option<&str>) -> Result<(), DomainError> {
    let mut datasets = self.lock_map(&self.datasets, "datasets")?;
    let entry = datasets.entry(dataset_id.to_string()).or_insert_with(|| Dataset { dataset_id: dataset_id.to_string(),
                                                                                   name: name.to_string(),
                                                                                   ingest_run_id: None,
                                                                                   created_at: Utc::now() });
    entry.name = name.to_string();
    entry.ingest_run_id = run_id.map(str::to_string);
    Ok(())
  }

  fn start_run(&self, run: &IngestRun) -> Result<(), DomainError> {
    let mut runs = self.lock_map(&self.runs, "runs")?;
    runs.insert(run.run_id.clone(), run.clone());
    Ok(())
  }

  fn finish_run(&self, run_id: &str, status: RunStatus, stats: &IngestStats) -> Result<(), DomainError> {
    let mut runs = self.lock_map(&self.runs, "runs")?;
    let run = runs.get_mut(run_id).ok_or_else(|| DomainError::NotFound(format!("corrida {}", run_id)))?;
    run.status = status;
    run.stats = stats.clone();
    run.finished_at = Some(Utc::now());
    Ok(())
  }

  fn upsert_molecules(&self, rows: &[MoleculeRecord]) -> Result<usize, DomainError> {
    let mut molecules = self.lock_map(&self.molecules, "molecules")?;
    for row in rows {
      molecules.insert((row.dataset_id.clone(), row.cid), row.clone());
    }
    Ok(rows.len())
  }

  fn molecule_ids(&self, dataset_id: &str) -> Result<HashSet<i64>, DomainError> {
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    Ok(molecules.keys().filter(|(d, _)| d == dataset_id).map(|(_, cid)| *cid).collect())
  }

  fn upsert_geometry(&self, _run_id: &str, record: &GeometryRecord) -> Result<(), DomainError> {
    let key = (record.dataset_id().to_string(), record.cid());
    if !self.lock_map(&self.molecules, "molecules")?.contains_key(&key) {
      return Err(DomainError::ReferentialViolation(format!("{}/{}", key.0, key.1)));
    }
    let mut geometry = self.lock_map(&self.geometry, "geometry")?;
    geometry.insert(key, record.clone());
    Ok(())
  }

  fn list_datasets(&self) -> Result<Vec<DatasetSummary>, DomainError> {
    let datasets = self.lock_map(&self.datasets, "datasets")?;
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let mut out: Vec<DatasetSummary> =
      datasets.values()
              .map(|d| DatasetSummary { dataset_id: d.dataset_id.clone(),
                                        name: d.name.clone(),
                                        created_at: d.created_at,
                                        molecule_count: molecules.keys().filter(|(id, _)| id == &d.dataset_id).count()
                                                        as i64 })
              .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.dataset_id.cmp(&b.dataset_id)));
    Ok(out)
  }

  fn list_families(&self, dataset_id: &str) -> Result<Vec<String>, DomainError> {
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let families: BTreeSet<String> = molecules.values()
                                              .filter(|m| m.dataset_id == dataset_id)
                                              .filter_map(|m| m.seed.family().map(str::to_string))
                                              .collect();
    Ok(families.into_iter().collect())
  }

  fn list_seeds(&self, dataset_id: &str, family: Option<&str>) -> Result<Vec<SeedSummary>, DomainError> {
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let seeds: BTreeSet<(Option<String>, Option<String>, Option<String>)> =
      molecules.values()
               .filter(|m| m.dataset_id == dataset_id && m.seed.raw().is_some())
               .filter(|m| family.map_or(true, |f| m.seed.family() == Some(f)))
               .map(|m| {
                 (m.seed.family().map(str::to_string),
                  m.seed.raw().map(str::to_string),
                  m.seed.encoding().map(str::to_string))
               })
               .collect();
    Ok(seeds.into_iter()
            .map(|(seed_name, discovery_seed, seed_smiles)| SeedSummary { discovery_seed, seed_name, seed_smiles })
            .collect())
  }

  fn query_molecules(&self, plan: &QueryPlan) -> Result<MoleculePage, DomainError> {
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let geometry = self.lock_map(&self.geometry, "geometry")?;
    let mut rows = self.matching_rows(plan, &molecules, &geometry);
    rows.sort_by(|a, b| plan.compare(*a, *b));
    let total = rows.len() as i64;
    let page = rows.into_iter()
                   .skip(plan.offset as usize)
                   .take(plan.limit as usize)
                   .map(|(m, _)| m.clone())
                   .collect();
    Ok(MoleculePage::new(plan, page, total))
  }

  fn aggregate(&self, plan: &QueryPlan) -> Result<AggregateReport, DomainError> {
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let geometry = self.lock_map(&self.geometry, "geometry")?;
    let rows = self.matching_rows(plan, &molecules, &geometry);
    let mut aggregates = IndexMap::new();
    for spec in aggregated_fields() {
      let values = rows.iter().filter_map(|(m, g)| match field_value(spec, m, *g) {
                                crate::query::FieldValue::Int(v) => Some(v as f64),
                                crate::query::FieldValue::Float(v) => Some(v),
                                _ => None,
                              });
      if let Some(summary) = FieldSummary::from_values(values) {
        aggregates.insert(spec.name.to_string(), summary);
      }
    }
    Ok(AggregateReport { dataset_id: plan.dataset_id.clone(), aggregates })
  }

  fn get_molecule(&self, dataset_id: &str, cid: i64) -> Result<Option<MoleculeDetail>, DomainError> {
    let key = (dataset_id.to_string(), cid);
    let molecules = self.lock_map(&self.molecules, "molecules")?;
    let geometry = self.lock_map(&self.geometry, "geometry")?;
    Ok(molecules.get(&key).map(|m| MoleculeDetail { molecule: m.clone(),
                                                    geometry: geometry.get(&key).map(|g| g.hot().clone()) }))
  }

  fn get_geometry_block(&self, dataset_id: &str, cid: i64) -> Result<Option<String>, DomainError> {
    let geometry = self.lock_map(&self.geometry, "geometry")?;
    Ok(geometry.get(&(dataset_id.to_string(), cid)).map(|g| g.cold().molblock.clone()))
  }

  fn list_runs(&self, limit: usize) -> Result<Vec<IngestRun>, DomainError> {
    let runs = self.lock_map(&self.runs, "runs")?;
    let mut out: Vec<IngestRun> = runs.values().cloned().collect();
    out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    out.truncate(limit);
    Ok(out)
  }

  fn get_run(&self, run_id: &str) -> Result<Option<IngestRun>, DomainError> {
    let runs = self.lock_map(&self.runs, "runs")?;
    Ok(runs.get(run_id).cloned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::{QueryPlanner, QueryRequest};
  use crate::DiscoverySeed;
  use serde_json::json;

  fn molecule(cid: i64, mw: Option<f64>, family: &str) -> MoleculeRecord {
    let mut m = MoleculeRecord::new("ds", cid);
    m.molecular_weight = mw;
    m.seed = DiscoverySeed::parse(Some(&format!("{}:C", family)));
    m
  }

  fn seeded() -> Result<InMemoryCatalogRepository, DomainError> {
    let repo = InMemoryCatalogRepository::new();
    repo.upsert_dataset("ds", "Demo", None)?;
    let rows: Vec<MoleculeRecord> =
      (1..=23).map(|cid| molecule(cid, if cid % 5 == 0 { None } else { Some(cid as f64 * 10.0) }, "aspirin"))
              .collect();
    repo.upsert_molecules(&rows)?;
    repo.upsert_molecules(&[molecule(100, Some(55.0), "caffeine")])?;
    Ok(repo)
  }

  #[test]
  fn upsert_is_last_write_wins() -> Result<(), DomainError> {
    let repo = seeded()?;
    let mut updated = molecule(3, Some(999.0), "caffeine");
    updated.name = Some("renamed".into());
    repo.upsert_molecules(&[updated.clone()])?;
    assert_eq!(repo.molecule_ids("ds")?.len(), 24);
    let detail = repo.get_molecule("ds", 3)?.expect("cid 3");
    assert_eq!(detail.molecule, updated);
    assert!(detail.geometry.is_none());
    Ok(())
  }

  #[test]
  fn paging_covers_every_row_once() -> Result<(), DomainError> {
    let repo = seeded()?;
    let req: QueryRequest = serde_json::from_value(json!({
      "seedFamily": "aspirin",
      "sort": [{"field": "molecular_weight", "dir": "desc"}]
    }))?;
    let mut seen = Vec::new();
    let mut total = None;
    for offset in (0..40).step_by(7) {
      let mut paged = req.clone();
      paged.page = Some(crate::query::Page { limit: 7, offset });
      let plan = QueryPlanner::default().plan("ds", &paged)?;
      let page = repo.query_molecules(&plan)?;
      total = Some(page.total);
      seen.extend(page.molecules.iter().map(|m| m.cid));
    }
    assert_eq!(total, Some(23));
    assert_eq!(seen.len(), 23);
    let unique: HashSet<i64> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 23);
    // NULLs primero en descendente
    assert_eq!(&seen[..4], &[5, 10, 15, 20]);
    Ok(())
  }

  #[test]
  fn aggregates_omit_empty_fields() -> Result<(), DomainError> {
    let repo = seeded()?;
    let plan = QueryPlanner::default().plan("ds", &QueryRequest::default())?;
    let report = repo.aggregate(&plan)?;
    let mw = report.aggregates.get("molecular_weight").expect("molecular_weight");
    assert_eq!(mw.count, 20);
    assert!(mw.min <= mw.max);
    assert_eq!((mw.min, mw.max), (10.0, 230.0));
    assert!(!report.aggregates.contains_key("TPSA"));
    assert!(!report.aggregates.contains_key("mmff94_energy"));
    Ok(())
  }

  #[test]
  fn families_and_seeds() -> Result<(), DomainError> {
    let repo = seeded()?;
    assert_eq!(repo.list_families("ds")?, vec!["aspirin", "caffeine"]);
    let seeds = repo.list_seeds("ds", Some("caffeine"))?;
    assert_eq!(seeds.len(), 1);
    assert_eq!(seeds[0].seed_smiles.as_deref(), Some("C"));
    assert!(repo.list_families("other")?.is_empty());
    Ok(())
  }

  #[test]
  fn runs_lifecycle() -> Result<(), DomainError> {
    let repo = InMemoryCatalogRepository::new();
    let run = IngestRun::start("ds");
    repo.start_run(&run)?;
    let mut stats = IngestStats::new();
    stats.insert("total_rows".into(), json!(3));
    repo.finish_run(&run.run_id, RunStatus::Completed, &stats)?;
    let stored = repo.get_run(&run.run_id)?.expect("run");
    assert_eq!(stored.status, RunStatus::Completed);
    assert!(stored.finished_at.is_some());
    assert_eq!(repo.list_runs(10)?.len(), 1);
    assert!(repo.finish_run("missing", RunStatus::Failed, &stats).is_err());
    Ok(())
  }
}
