// service.rs
// Fachada de lectura del catálogo: planifica consultas, delega en el
// repositorio y convierte bloques estructurales en escenas.
use crate::model::{DatasetSummary, IngestRun, MoleculeDetail, SeedSummary};
use crate::query::{AggregateReport, MoleculePage, QueryPlanner, QueryRequest};
use crate::repository::CatalogRepository;
use crate::DomainError;
use chem_providers::{MolfileEngine, SceneDescription, StructureEngine};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_RUN_LIMIT: usize = 100;

/// Formato de salida de la geometría de una molécula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryFormat {
  /// Texto molfile tal como se guardó.
  #[default]
  Molblock,
  /// Descripción lista para el renderer.
  Scene,
}

impl FromStr for GeometryFormat {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "molblock" | "mol" => Ok(Self::Molblock),
      "scene" | "json" => Ok(Self::Scene),
      other => Err(DomainError::BadRequest(format!("formato de geometría desconocido: {}", other))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeometryPayload {
  Molblock { dataset_id: String, cid: i64, molblock: String },
  Scene(SceneDescription),
}

pub struct CatalogService<R: CatalogRepository> {
  repo: Arc<R>,
  planner: QueryPlanner,
  engine: Arc<dyn StructureEngine>,
}

impl<R: CatalogRepository> CatalogService<R> {
  pub fn new(repo: Arc<R>) -> Self {
    Self { repo, planner: QueryPlanner::default(), engine: Arc::new(MolfileEngine::new()) }
  }

  pub fn with_planner(mut self, planner: QueryPlanner) -> Self {
    self.planner = planner;
    self
  }

  pub fn with_engine(mut self, engine: Arc<dyn StructureEngine>) -> Self {
    self.engine = engine;
    self
  }

  pub fn repository(&self) -> &Arc<R> {
    &self.repo
  }

  pub fn query(&self, dataset_id: &str, request: &QueryRequest) -> Result<MoleculePage, DomainError> {
    let plan = self.planner.plan(dataset_id, request)?;
    log::debug!("consulta dataset={} join={} condiciones={}",
                dataset_id,
                plan.join_geometry,
                plan.conditions.len());
    self.repo.query_molecules(&plan)
  }

  /// Agregados con el mismo filtro que `query`; orden y página no aplican.
  pub fn aggregates(&self, dataset_id: &str, request: &QueryRequest) -> Result<AggregateReport, DomainError> {
    let plan = self.planner.plan(dataset_id, request)?;
    self.repo.aggregate(&plan)
  }

  pub fn molecule(&self, dataset_id: &str, cid: i64) -> Result<MoleculeDetail, DomainError> {
    self.repo
        .get_molecule(dataset_id, cid)?
        .ok_or_else(|| DomainError::NotFound(format!("molécula {}/{}", dataset_id, cid)))
  }

  /// Geometría guardada. Un bloque que no se puede convertir en escena es un
  /// `BadRequest`, no un fallo del servidor.
  pub fn geometry(&self, dataset_id: &str, cid: i64, format: GeometryFormat) -> Result<GeometryPayload, DomainError> {
    let molblock = self.repo
                       .get_geometry_block(dataset_id, cid)?
                       .ok_or_else(|| DomainError::NotFound(format!("geometría {}/{}", dataset_id, cid)))?;
    match format {
      GeometryFormat::Molblock => Ok(GeometryPayload::Molblock { dataset_id: dataset_id.to_string(), cid, molblock }),
      GeometryFormat::Scene => {
        let structure = self.engine
                            .parse(&molblock)
                            .map_err(|e| DomainError::BadRequest(format!("bloque guardado inválido: {}", e)))?;
        Ok(GeometryPayload::Scene(self.engine.to_scene(&structure)))
      }
    }
  }

  pub fn datasets(&self) -> Result<Vec<DatasetSummary>, DomainError> {
    self.repo.list_datasets()
  }

  pub fn families(&self, dataset_id: &str) -> Result<Vec<String>, DomainError> {
    self.repo.list_families(dataset_id)
  }

  pub fn seeds(&self, dataset_id: &str, family: Option<&str>) -> Result<Vec<SeedSummary>, DomainError> {
    self.repo.list_seeds(dataset_id, family.map(str::trim).filter(|f| !f.is_empty()))
  }

  pub fn runs(&self) -> Result<Vec<IngestRun>, DomainError> {
    self.repo.list_runs(DEFAULT_RUN_LIMIT)
  }

  pub fn run(&self, run_id: &str) -> Result<IngestRun, DomainError> {
    self.repo.get_run(run_id)?.ok_or_else(|| DomainError::NotFound(format!("corrida {}", run_id)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::normalizer::{normalize_geometry, CID_TAG};
  use crate::repository::InMemoryCatalogRepository;
  use crate::splitter::split_geometry;
  use crate::{FailureKind, MoleculeRecord};
  use chem_providers::{SceneBondOrder, SdfRecord};

  const BENZENE_RING: &str = "ring
  test

  2  1  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.4000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  4  0  0  0  0
M  END
";

  fn service_with_geometry() -> Result<CatalogService<InMemoryCatalogRepository>, DomainError> {
    let repo = Arc::new(InMemoryCatalogRepository::new());
    repo.upsert_molecules(&[MoleculeRecord::new("ds", 7), MoleculeRecord::new("ds", 8)])?;
    let mut record = SdfRecord { block: BENZENE_RING.to_string(), ..Default::default() };
    record.properties.insert(CID_TAG.to_string(), "7".to_string());
    let normalized = normalize_geometry(&MolfileEngine::new(), "ds", &record)?;
    repo.upsert_geometry("run", &split_geometry(normalized))?;
    Ok(CatalogService::new(repo))
  }

  #[test]
  fn scene_keeps_aromatic_order() -> Result<(), DomainError> {
    let service = service_with_geometry()?;
    match service.geometry("ds", 7, GeometryFormat::Scene)? {
      GeometryPayload::Scene(scene) => {
        assert_eq!(scene.atoms.count, 2);
        assert_eq!(scene.bonds.orders, vec![SceneBondOrder::Fractional(1.5)]);
      }
      other => panic!("expected scene, got {:?}", other),
    }
    Ok(())
  }

  #[test]
  fn missing_rows_are_not_found() -> Result<(), DomainError> {
    let service = service_with_geometry()?;
    assert!(service.molecule("ds", 8)?.geometry.is_none());
    assert_eq!(service.molecule("ds", 9).map_err(|e| e.kind()), Err(FailureKind::NotFound));
    assert_eq!(service.geometry("ds", 8, GeometryFormat::Molblock).map_err(|e| e.kind()),
               Err(FailureKind::NotFound));
    Ok(())
  }

  #[test]
  fn format_parsing() {
    assert_eq!("Scene".parse::<GeometryFormat>(), Ok(GeometryFormat::Scene));
    assert!("svg".parse::<GeometryFormat>().is_err());
  }
}
