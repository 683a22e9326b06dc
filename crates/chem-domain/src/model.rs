// model.rs
// Tipos del catálogo: datasets, corridas de ingesta, filas del manifiesto y
// el par de filas de geometría (hot/cold).
use crate::DomainError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estadísticas libres de una corrida (string -> número/string).
pub type IngestStats = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
  pub dataset_id: String,
  pub name: String,
  pub ingest_run_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
  pub dataset_id: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
  pub molecule_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
  Running,
  Completed,
  Failed,
}

impl RunStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Running => "running",
      Self::Completed => "completed",
      Self::Failed => "failed",
    }
  }
}

impl FromStr for RunStatus {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "running" => Ok(Self::Running),
      "completed" => Ok(Self::Completed),
      "failed" => Ok(Self::Failed),
      other => Err(DomainError::SerializationError(format!("estado de corrida desconocido: {}", other))),
    }
  }
}

impl fmt::Display for RunStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Un intento de ingesta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRun {
  pub run_id: String,
  pub dataset_id: String,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub status: RunStatus,
  pub stats: IngestStats,
}

impl IngestRun {
  /// Crea una corrida en estado `running` con un id generado.
  pub fn start(dataset_id: &str) -> Self {
    Self { run_id: new_run_id(),
           dataset_id: dataset_id.to_string(),
           started_at: Utc::now(),
           finished_at: None,
           status: RunStatus::Running,
           stats: IngestStats::new() }
  }
}

pub fn new_run_id() -> String {
  Uuid::new_v4().to_string()
}

/// Método con el que se descubrió la molécula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiscoveryMethod {
  Substructure,
  Sim2d,
  Sim3d,
  /// Valores no reconocidos se conservan tal cual.
  Other(String),
}

impl DiscoveryMethod {
  /// Normaliza el valor crudo del manifiesto: minúsculas y sin espacios,
  /// `similarity` -> `sim2d`, vacío -> `substructure`.
  pub fn normalize(raw: Option<&str>) -> Self {
    let m = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    match m.as_str() {
      "" | "substructure" => Self::Substructure,
      "sim2d" | "similarity" => Self::Sim2d,
      "sim3d" => Self::Sim3d,
      _ => Self::Other(m),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Substructure => "substructure",
      Self::Sim2d => "sim2d",
      Self::Sim3d => "sim3d",
      Self::Other(s) => s,
    }
  }
}

impl Default for DiscoveryMethod {
  fn default() -> Self {
    Self::Substructure
  }
}

impl fmt::Display for DiscoveryMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl Serialize for DiscoveryMethod {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for DiscoveryMethod {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(Self::normalize(raw.as_deref()))
  }
}

/// Semilla de descubrimiento y sus dos campos derivados. Sólo se construye
/// mediante `parse`, de modo que familia y SMILES de la semilla siempre
/// provienen del mismo valor crudo.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DiscoverySeed {
  #[serde(rename = "discovery_seed")]
  raw: Option<String>,
  #[serde(rename = "seed_name")]
  family: Option<String>,
  #[serde(rename = "seed_smiles")]
  encoding: Option<String>,
}

impl DiscoverySeed {
  /// Divide en el primer `:`: antes = familia, después = SMILES de la semilla.
  /// Sin `:` todo el texto es la familia.
  pub fn parse(raw: Option<&str>) -> Self {
    let raw = match raw.map(str::trim).filter(|s| !s.is_empty()) {
      Some(s) => s,
      None => return Self::default(),
    };
    let (family, encoding) = match raw.split_once(':') {
      Some((name, rest)) => (non_blank(name), non_blank(rest)),
      None => (Some(raw.to_string()), None),
    };
    Self { raw: Some(raw.to_string()), family, encoding }
  }

  pub fn raw(&self) -> Option<&str> {
    self.raw.as_deref()
  }

  pub fn family(&self) -> Option<&str> {
    self.family.as_deref()
  }

  pub fn encoding(&self) -> Option<&str> {
    self.encoding.as_deref()
  }
}

fn non_blank(s: &str) -> Option<String> {
  let t = s.trim();
  if t.is_empty() {
    None
  } else {
    Some(t.to_string())
  }
}

/// Fila "hot" del manifiesto, clave (dataset, cid).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculeRecord {
  pub dataset_id: String,
  pub cid: i64,
  pub smiles: Option<String>,
  pub inchi_key: Option<String>,
  pub molecular_formula: Option<String>,
  pub molecular_weight: Option<f64>,
  pub exact_mass: Option<f64>,
  pub xlogp3: Option<f64>,
  pub tpsa: Option<f64>,
  pub hba: Option<i32>,
  pub hbd: Option<i32>,
  pub rotatable_bonds: Option<i32>,
  pub discovery_method: DiscoveryMethod,
  #[serde(flatten)]
  pub seed: DiscoverySeed,
  pub name: Option<String>,
  pub ingest_run_id: Option<String>,
}

impl MoleculeRecord {
  /// Registro vacío para un identificador; útil para construir filas en tests
  /// y al reconstruir desde la base de datos.
  pub fn new(dataset_id: &str, cid: i64) -> Self {
    Self { dataset_id: dataset_id.to_string(),
           cid,
           smiles: None,
           inchi_key: None,
           molecular_formula: None,
           molecular_weight: None,
           exact_mass: None,
           xlogp3: None,
           tpsa: None,
           hba: None,
           hbd: None,
           rotatable_bonds: None,
           discovery_method: DiscoveryMethod::default(),
           seed: DiscoverySeed::default(),
           name: None,
           ingest_run_id: None }
  }
}

/// Escalares de geometría consultables (tabla `molecule_geometry`).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct GeometryHot {
  #[serde(skip_serializing)]
  pub dataset_id: String,
  #[serde(skip_serializing)]
  pub cid: i64,
  pub conformer_id: Option<String>,
  pub mmff94_energy: Option<f64>,
  pub conformer_rmsd: Option<f64>,
  pub effective_rotor_count: Option<i32>,
  pub shape_volume: Option<f64>,
  pub shape_selfoverlap: Option<f64>,
  pub heavy_atom_count: Option<i32>,
  pub component_count: Option<i32>,
}

/// Bloque estructural y payloads opacos (tabla `molecule_geometry_cold`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeometryCold {
  pub dataset_id: String,
  pub cid: i64,
  pub molblock: String,
  pub shape_fingerprint: Option<Vec<u8>>,
  pub pharmacophore_features: Option<Vec<u8>>,
  pub mmff94_partial_charges: Option<Vec<u8>>,
  pub coordinate_type: Option<Vec<u8>>,
}

/// Par hot/cold de una molécula. Sólo lo construye el splitter, por lo que
/// ambas mitades comparten siempre la misma clave.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
  hot: GeometryHot,
  cold: GeometryCold,
}

impl GeometryRecord {
  pub(crate) fn from_split(hot: GeometryHot, cold: GeometryCold) -> Self {
    debug_assert_eq!((&hot.dataset_id, hot.cid), (&cold.dataset_id, cold.cid));
    Self { hot, cold }
  }

  pub fn cid(&self) -> i64 {
    self.hot.cid
  }

  pub fn dataset_id(&self) -> &str {
    &self.hot.dataset_id
  }

  pub fn hot(&self) -> &GeometryHot {
    &self.hot
  }

  pub fn cold(&self) -> &GeometryCold {
    &self.cold
  }
}

/// Vista de detalle: fila del manifiesto + geometría si existe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculeDetail {
  #[serde(flatten)]
  pub molecule: MoleculeRecord,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub geometry: Option<GeometryHot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
  pub discovery_seed: Option<String>,
  pub seed_name: Option<String>,
  pub seed_smiles: Option<String>,
}
