//! Consultas dinámicas sobre el catálogo.
//!
//! Una `QueryRequest` declarativa (familia de semilla, métodos, rangos,
//! orden y página) se traduce con `QueryPlanner` en un `QueryPlan`: lista de
//! condiciones, indicador de join con `molecule_geometry`, claves de orden y
//! página. El plan sabe producir SQL parametrizado (placeholders `$n` para
//! Postgres, `?n` para SQLite) y también evaluarse en memoria, de forma que
//! ambos repositorios comparten exactamente el mismo predicado.
//!
//! Los nombres de columna sólo salen de la tabla estática `FIELDS`; ningún
//! texto del llamador se interpola en el SQL.
use crate::model::{GeometryHot, MoleculeRecord};
use crate::DomainError;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
  /// `discovered_molecule m`
  Manifest,
  /// `molecule_geometry g`
  Geometry,
}

impl Table {
  pub fn alias(&self) -> &'static str {
    match self {
      Self::Manifest => "m",
      Self::Geometry => "g",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
  Int,
  Float,
  Text,
}

/// Entrada de la lista permitida de campos de filtro/orden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  /// Nombre público del campo en las solicitudes.
  pub name: &'static str,
  pub table: Table,
  pub column: &'static str,
  pub kind: ValueKind,
  /// Admite filtro de rango.
  pub filterable: bool,
  /// Participa en el resumen de agregados.
  pub aggregated: bool,
}

impl FieldSpec {
  pub fn qualified(&self) -> String {
    format!("{}.{}", self.table.alias(), self.column)
  }

  pub fn is_geometry(&self) -> bool {
    self.table == Table::Geometry
  }
}

const fn field(name: &'static str,
               table: Table,
               column: &'static str,
               kind: ValueKind,
               filterable: bool)
               -> FieldSpec {
  FieldSpec { name, table, column, kind, filterable, aggregated: filterable }
}

pub static FIELDS: [FieldSpec; 15] =
  [field("cid", Table::Manifest, "cid", ValueKind::Int, false),
   field("molecular_weight", Table::Manifest, "molecular_weight", ValueKind::Float, true),
   field("TPSA", Table::Manifest, "tpsa", ValueKind::Float, true),
   field("XLogP3", Table::Manifest, "xlogp3", ValueKind::Float, true),
   field("HBA", Table::Manifest, "hba", ValueKind::Int, true),
   field("HBD", Table::Manifest, "hbd", ValueKind::Int, true),
   field("rotatable_bonds", Table::Manifest, "rotatable_bonds", ValueKind::Int, true),
   field("exact_mass", Table::Manifest, "exact_mass", ValueKind::Float, false),
   field("discovery_method", Table::Manifest, "discovery_method", ValueKind::Text, false),
   field("seed_name", Table::Manifest, "seed_name", ValueKind::Text, false),
   field("name", Table::Manifest, "name", ValueKind::Text, false),
   field("mmff94_energy", Table::Geometry, "mmff94_energy", ValueKind::Float, true),
   field("shape_volume", Table::Geometry, "shape_volume", ValueKind::Float, true),
   field("conformer_rmsd", Table::Geometry, "conformer_rmsd", ValueKind::Float, false),
   field("heavy_atom_count", Table::Geometry, "heavy_atom_count", ValueKind::Int, false)];

static FIELD_INDEX: Lazy<HashMap<String, &'static FieldSpec>> = Lazy::new(|| {
  let mut index = HashMap::new();
  for spec in FIELDS.iter() {
    index.insert(spec.name.to_lowercase(), spec);
    index.insert(spec.column.to_string(), spec);
  }
  index
});

/// Busca un campo por nombre público o columna, sin distinguir mayúsculas.
pub fn lookup_field(name: &str) -> Option<&'static FieldSpec> {
  FIELD_INDEX.get(&name.trim().to_lowercase()).copied()
}

/// Campos resumidos por el ejecutor de agregados, en orden de salida.
pub fn aggregated_fields() -> impl Iterator<Item = &'static FieldSpec> {
  FIELDS.iter().filter(|f| f.aggregated)
}

fn cid_field() -> &'static FieldSpec {
  &FIELDS[0]
}

/// Valor de un campo para una fila (evaluación en memoria).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
  Null,
  Int(i64),
  Float(f64),
  Text(&'a str),
}

impl FieldValue<'_> {
  fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Int(v) => Some(*v as f64),
      Self::Float(v) => Some(*v),
      _ => None,
    }
  }

  /// Orden total con NULL como el mayor valor (NULLS LAST en ascendente).
  fn cmp_nulls_last(&self, other: &Self) -> Ordering {
    match (self, other) {
      (Self::Null, Self::Null) => Ordering::Equal,
      (Self::Null, _) => Ordering::Greater,
      (_, Self::Null) => Ordering::Less,
      (Self::Text(a), Self::Text(b)) => a.cmp(b),
      (a, b) => match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => Ordering::Equal,
      },
    }
  }
}

fn opt_f<'a>(v: Option<f64>) -> FieldValue<'a> {
  v.map(FieldValue::Float).unwrap_or(FieldValue::Null)
}

fn opt_i<'a>(v: Option<i32>) -> FieldValue<'a> {
  v.map(|x| FieldValue::Int(x as i64)).unwrap_or(FieldValue::Null)
}

fn opt_t(v: Option<&str>) -> FieldValue<'_> {
  v.map(FieldValue::Text).unwrap_or(FieldValue::Null)
}

pub fn field_value<'a>(spec: &FieldSpec, m: &'a MoleculeRecord, g: Option<&'a GeometryHot>) -> FieldValue<'a> {
  match (spec.table, spec.column) {
    (Table::Manifest, "cid") => FieldValue::Int(m.cid),
    (Table::Manifest, "molecular_weight") => opt_f(m.molecular_weight),
    (Table::Manifest, "tpsa") => opt_f(m.tpsa),
    (Table::Manifest, "xlogp3") => opt_f(m.xlogp3),
    (Table::Manifest, "hba") => opt_i(m.hba),
    (Table::Manifest, "hbd") => opt_i(m.hbd),
    (Table::Manifest, "rotatable_bonds") => opt_i(m.rotatable_bonds),
    (Table::Manifest, "exact_mass") => opt_f(m.exact_mass),
    (Table::Manifest, "discovery_method") => FieldValue::Text(m.discovery_method.as_str()),
    (Table::Manifest, "seed_name") => opt_t(m.seed.family()),
    (Table::Manifest, "name") => opt_t(m.name.as_deref()),
    (Table::Geometry, "mmff94_energy") => opt_f(g.and_then(|g| g.mmff94_energy)),
    (Table::Geometry, "shape_volume") => opt_f(g.and_then(|g| g.shape_volume)),
    (Table::Geometry, "conformer_rmsd") => opt_f(g.and_then(|g| g.conformer_rmsd)),
    (Table::Geometry, "heavy_atom_count") => opt_i(g.and_then(|g| g.heavy_atom_count)),
    _ => FieldValue::Null,
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  #[default]
  Asc,
  Desc,
}

impl<'de> Deserialize<'de> for SortDirection {
  /// `asc` (sin distinguir mayúsculas) es ascendente; cualquier otro valor,
  /// descendente.
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(if raw.trim().eq_ignore_ascii_case("asc") { Self::Asc } else { Self::Desc })
  }
}

impl SortDirection {
  fn sql(&self) -> &'static str {
    match self {
      Self::Asc => "ASC NULLS LAST",
      Self::Desc => "DESC NULLS FIRST",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
  pub field: String,
  #[serde(default)]
  pub dir: SortDirection,
}

fn default_limit() -> i64 {
  DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
  #[serde(default = "default_limit")]
  pub limit: i64,
  #[serde(default)]
  pub offset: i64,
}

impl Default for Page {
  fn default() -> Self {
    Self { limit: DEFAULT_PAGE_LIMIT, offset: 0 }
  }
}

/// Solicitud declarativa de consulta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
  #[serde(default, alias = "seedFamily", alias = "seed_family")]
  pub seed_name: Option<String>,
  #[serde(default)]
  pub methods: Option<Vec<String>>,
  #[serde(default)]
  pub ranges: Option<IndexMap<String, Vec<f64>>>,
  #[serde(default)]
  pub sort: Option<Vec<SortItem>>,
  #[serde(default)]
  pub page: Option<Page>,
}

/// Qué hacer con nombres de campo que no están en `FIELDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
  /// Se descartan, se registran en el log y se devuelven en `ignored_fields`.
  #[default]
  Ignore,
  /// La solicitud se rechaza con `BadRequest`.
  Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
  DatasetIs(String),
  SeedFamilyIs(String),
  MethodIn(Vec<String>),
  /// Rango inclusivo; excluye filas con el campo nulo.
  InRange { field: &'static FieldSpec, lo: f64, hi: f64 },
}

impl Condition {
  fn matches(&self, m: &MoleculeRecord, g: Option<&GeometryHot>) -> bool {
    match self {
      Self::DatasetIs(id) => &m.dataset_id == id,
      Self::SeedFamilyIs(family) => m.seed.family() == Some(family.as_str()),
      Self::MethodIn(methods) => methods.iter().any(|x| x == m.discovery_method.as_str()),
      Self::InRange { field, lo, hi } => {
        field_value(field, m, g).as_f64().map(|v| v >= *lo && v <= *hi).unwrap_or(false)
      }
    }
  }
}

/// Parámetro posicional de una sentencia.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
  Text(String),
  Float(f64),
  Int(i64),
}

/// Estilo de placeholder del backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
  /// `$1, $2, ...` (Postgres)
  Dollar,
  /// `?1, ?2, ...` (SQLite)
  Question,
}

/// Acumula parámetros y devuelve el placeholder del siguiente.
struct Binder {
  style: Placeholder,
  params: Vec<QueryParam>,
}

impl Binder {
  fn new(style: Placeholder) -> Self {
    Self { style, params: Vec::new() }
  }

  fn bind(&mut self, param: QueryParam) -> String {
    self.params.push(param);
    match self.style {
      Placeholder::Dollar => format!("${}", self.params.len()),
      Placeholder::Question => format!("?{}", self.params.len()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortKey {
  pub field: &'static FieldSpec,
  pub direction: SortDirection,
}

/// Columnas de la vista de lista (sólo manifiesto).
pub const MOLECULE_COLUMNS: &str = "m.dataset_id AS dataset_id, m.cid AS cid, m.smiles AS smiles, \
                                    m.inchi_key AS inchi_key, m.molecular_formula AS molecular_formula, \
                                    m.molecular_weight AS molecular_weight, m.exact_mass AS exact_mass, \
                                    m.xlogp3 AS xlogp3, m.tpsa AS tpsa, m.hba AS hba, m.hbd AS hbd, \
                                    m.rotatable_bonds AS rotatable_bonds, m.discovery_method AS discovery_method, \
                                    m.discovery_seed AS discovery_seed, m.seed_name AS seed_name, \
                                    m.seed_smiles AS seed_smiles, m.name AS name, m.ingest_run_id AS ingest_run_id";

const GEOMETRY_JOIN: &str = "LEFT JOIN molecule_geometry g ON g.dataset_id = m.dataset_id AND g.cid = m.cid";

/// Resultado del planificador.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
  pub dataset_id: String,
  pub conditions: Vec<Condition>,
  /// `true` si algún rango u orden referencia un campo de geometría.
  pub join_geometry: bool,
  /// Claves de orden; siempre terminan en `cid` para que la paginación sea
  /// un orden total.
  pub order_by: Vec<SortKey>,
  pub limit: i64,
  pub offset: i64,
  pub ignored_fields: Vec<String>,
}

impl QueryPlan {
  /// Predicado `WHERE` y sus parámetros en orden de enlace.
  pub fn predicate(&self, style: Placeholder) -> (String, Vec<QueryParam>) {
    let mut binder = Binder::new(style);
    let sql = self.predicate_with(&mut binder);
    (sql, binder.params)
  }

  fn predicate_with(&self, binder: &mut Binder) -> String {
    let mut parts = Vec::with_capacity(self.conditions.len());
    for cond in &self.conditions {
      let part = match cond {
        Condition::DatasetIs(id) => format!("m.dataset_id = {}", binder.bind(QueryParam::Text(id.clone()))),
        Condition::SeedFamilyIs(f) => format!("m.seed_name = {}", binder.bind(QueryParam::Text(f.clone()))),
        Condition::MethodIn(methods) => {
          let slots: Vec<String> = methods.iter().map(|x| binder.bind(QueryParam::Text(x.clone()))).collect();
          format!("m.discovery_method IN ({})", slots.join(", "))
        }
        Condition::InRange { field, lo, hi } => {
          let col = field.qualified();
          let lo_p = binder.bind(QueryParam::Float(*lo));
          let hi_p = binder.bind(QueryParam::Float(*hi));
          format!("({col} IS NOT NULL AND {col} >= {lo_p} AND {col} <= {hi_p})")
        }
      };
      parts.push(part);
    }
    parts.join(" AND ")
  }

  pub fn from_clause(&self, force_join: bool) -> String {
    if self.join_geometry || force_join {
      format!("FROM discovered_molecule m {}", GEOMETRY_JOIN)
    } else {
      "FROM discovered_molecule m".to_string()
    }
  }

  pub fn order_by_sql(&self) -> String {
    self.order_by
        .iter()
        .map(|k| format!("{} {}", k.field.qualified(), k.direction.sql()))
        .collect::<Vec<_>>()
        .join(", ")
  }

  /// Sentencia de la página: columnas del manifiesto, orden, LIMIT y OFFSET.
  pub fn page_sql(&self, style: Placeholder) -> (String, Vec<QueryParam>) {
    let mut binder = Binder::new(style);
    let predicate = self.predicate_with(&mut binder);
    let limit = binder.bind(QueryParam::Int(self.limit));
    let offset = binder.bind(QueryParam::Int(self.offset));
    let sql = format!("SELECT {} {} WHERE {} ORDER BY {} LIMIT {} OFFSET {}",
                      MOLECULE_COLUMNS,
                      self.from_clause(false),
                      predicate,
                      self.order_by_sql(),
                      limit,
                      offset);
    (sql, binder.params)
  }

  /// Conteo total con el mismo predicado que la página.
  pub fn count_sql(&self, style: Placeholder) -> (String, Vec<QueryParam>) {
    let (predicate, params) = self.predicate(style);
    (format!("SELECT COUNT(*) AS total {} WHERE {}", self.from_clause(false), predicate), params)
  }

  /// `(count, min, max)` de un campo sobre las filas que cumplen el predicado
  /// y tienen el campo no nulo. Siempre con join de geometría.
  pub fn aggregate_sql(&self, field: &FieldSpec, style: Placeholder) -> (String, Vec<QueryParam>) {
    let (predicate, params) = self.predicate(style);
    let col = field.qualified();
    let sql = format!("SELECT COUNT(*) AS n, CAST(MIN({col}) AS DOUBLE PRECISION) AS lo, \
                       CAST(MAX({col}) AS DOUBLE PRECISION) AS hi {} WHERE {} AND {col} IS NOT NULL",
                      self.from_clause(true),
                      predicate);
    (sql, params)
  }

  /// Evaluación en memoria del predicado.
  pub fn matches(&self, m: &MoleculeRecord, g: Option<&GeometryHot>) -> bool {
    self.conditions.iter().all(|c| c.matches(m, g))
  }

  /// Comparación de dos filas según `order_by` (misma semántica que el SQL).
  pub fn compare(&self,
                 a: (&MoleculeRecord, Option<&GeometryHot>),
                 b: (&MoleculeRecord, Option<&GeometryHot>))
                 -> Ordering {
    for key in &self.order_by {
      let va = field_value(key.field, a.0, a.1);
      let vb = field_value(key.field, b.0, b.1);
      let ord = match key.direction {
        SortDirection::Asc => va.cmp_nulls_last(&vb),
        SortDirection::Desc => vb.cmp_nulls_last(&va),
      };
      if ord != Ordering::Equal {
        return ord;
      }
    }
    Ordering::Equal
  }
}

/// Traduce solicitudes en planes.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryPlanner {
  policy: UnknownFieldPolicy,
}

impl QueryPlanner {
  pub fn new(policy: UnknownFieldPolicy) -> Self {
    Self { policy }
  }

  pub fn strict() -> Self {
    Self::new(UnknownFieldPolicy::Reject)
  }

  pub fn policy(&self) -> UnknownFieldPolicy {
    self.policy
  }

  fn unknown(&self, what: &str, name: &str, ignored: &mut Vec<String>) -> Result<(), DomainError> {
    match self.policy {
      UnknownFieldPolicy::Reject => Err(DomainError::BadRequest(format!("campo de {} desconocido: '{}'", what, name))),
      UnknownFieldPolicy::Ignore => {
        log::warn!("campo de {} desconocido ignorado: '{}'", what, name);
        ignored.push(name.to_string());
        Ok(())
      }
    }
  }

  pub fn plan(&self, dataset_id: &str, request: &QueryRequest) -> Result<QueryPlan, DomainError> {
    let mut conditions = vec![Condition::DatasetIs(dataset_id.to_string())];
    let mut ignored = Vec::new();
    let mut join_geometry = false;

    if let Some(family) = request.seed_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
      conditions.push(Condition::SeedFamilyIs(family.to_string()));
    }
    let methods: Vec<String> = request.methods
                                      .iter()
                                      .flatten()
                                      .map(|m| m.trim())
                                      .filter(|m| !m.is_empty())
                                      .map(|m| crate::model::DiscoveryMethod::normalize(Some(m)).as_str().to_string())
                                      .collect();
    if !methods.is_empty() {
      conditions.push(Condition::MethodIn(methods));
    }
    for (name, bounds) in request.ranges.iter().flatten() {
      let spec = match lookup_field(name).filter(|f| f.filterable) {
        Some(spec) => spec,
        None => {
          self.unknown("filtro", name, &mut ignored)?;
          continue;
        }
      };
      if bounds.len() < 2 {
        log::debug!("rango con menos de dos límites ignorado: '{}'", name);
        continue;
      }
      join_geometry |= spec.is_geometry();
      conditions.push(Condition::InRange { field: spec, lo: bounds[0], hi: bounds[1] });
    }

    let mut order_by = Vec::new();
    for item in request.sort.iter().flatten() {
      match lookup_field(&item.field) {
        Some(spec) => {
          join_geometry |= spec.is_geometry();
          order_by.push(SortKey { field: spec, direction: item.dir });
        }
        None => self.unknown("orden", &item.field, &mut ignored)?,
      }
    }
    if !order_by.iter().any(|k| k.field == cid_field()) {
      order_by.push(SortKey { field: cid_field(), direction: SortDirection::Asc });
    }

    let page = request.page.unwrap_or_default();
    if page.limit < 0 || page.offset < 0 {
      return Err(DomainError::BadRequest(format!("página inválida: limit={} offset={}", page.limit, page.offset)));
    }
    Ok(QueryPlan { dataset_id: dataset_id.to_string(),
                   conditions,
                   join_geometry,
                   order_by,
                   limit: page.limit.min(MAX_PAGE_LIMIT),
                   offset: page.offset,
                   ignored_fields: ignored })
  }
}

/// Página de resultados de la consulta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoleculePage {
  pub molecules: Vec<MoleculeRecord>,
  pub total: i64,
  pub limit: i64,
  pub offset: i64,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub ignored_fields: Vec<String>,
}

impl MoleculePage {
  pub fn new(plan: &QueryPlan, molecules: Vec<MoleculeRecord>, total: i64) -> Self {
    Self { molecules, total, limit: plan.limit, offset: plan.offset, ignored_fields: plan.ignored_fields.clone() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
  pub count: i64,
  pub min: f64,
  pub max: f64,
}

impl FieldSummary {
  /// Resume una serie de valores; `None` si no hay ninguno.
  pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
    values.into_iter().fold(None, |acc, v| match acc {
                        None => Some(Self { count: 1, min: v, max: v }),
                        Some(s) => Some(Self { count: s.count + 1, min: s.min.min(v), max: s.max.max(v) }),
                      })
  }
}

/// Resumen por campo; los campos sin valores no aparecen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
  pub dataset_id: String,
  pub aggregates: IndexMap<String, FieldSummary>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn request(v: serde_json::Value) -> QueryRequest {
    serde_json::from_value(v).expect("request json")
  }

  #[test]
  fn manifest_range_does_not_join() -> Result<(), DomainError> {
    let plan = QueryPlanner::default().plan("ds", &request(json!({"ranges": {"molecular_weight": [100, 200]}})))?;
    assert!(!plan.join_geometry);
    let (sql, params) = plan.predicate(Placeholder::Dollar);
    assert_eq!(sql,
               "m.dataset_id = $1 AND (m.molecular_weight IS NOT NULL AND m.molecular_weight >= $2 AND \
                m.molecular_weight <= $3)");
    assert_eq!(params,
               vec![QueryParam::Text("ds".into()), QueryParam::Float(100.0), QueryParam::Float(200.0)]);
    assert_eq!(plan.order_by_sql(), "m.cid ASC NULLS LAST");
    Ok(())
  }

  #[test]
  fn geometry_sort_forces_join() -> Result<(), DomainError> {
    let req = request(json!({
      "ranges": {"molecular_weight": [100, 200]},
      "sort": [{"field": "mmff94_energy", "dir": "desc"}]
    }));
    let plan = QueryPlanner::default().plan("ds", &req)?;
    assert!(plan.join_geometry);
    assert!(plan.from_clause(false).contains("LEFT JOIN molecule_geometry g"));
    assert_eq!(plan.order_by_sql(), "g.mmff94_energy DESC NULLS FIRST, m.cid ASC NULLS LAST");
    Ok(())
  }

  #[test]
  fn geometry_range_forces_join() -> Result<(), DomainError> {
    let plan = QueryPlanner::default().plan("ds", &request(json!({"ranges": {"shape_volume": [1, 2]}})))?;
    assert!(plan.join_geometry);
    Ok(())
  }

  #[test]
  fn parameters_follow_binding_order() -> Result<(), DomainError> {
    let req = request(json!({
      "seedFamily": "aspirin",
      "methods": ["Similarity", "sim3d", " "],
      "ranges": {"TPSA": [10, 90], "HBD": [0, 2]},
      "page": {"limit": 25, "offset": 50}
    }));
    let plan = QueryPlanner::default().plan("ds", &req)?;
    let (sql, params) = plan.page_sql(Placeholder::Question);
    assert!(sql.contains("m.seed_name = ?2"));
    assert!(sql.contains("m.discovery_method IN (?3, ?4)"));
    assert!(sql.contains("m.tpsa >= ?5 AND m.tpsa <= ?6"));
    assert!(sql.contains("m.hbd >= ?7 AND m.hbd <= ?8"));
    assert!(sql.ends_with("LIMIT ?9 OFFSET ?10"));
    assert_eq!(params[2], QueryParam::Text("sim2d".into()));
    assert_eq!(&params[8..], &[QueryParam::Int(25), QueryParam::Int(50)]);

    let (count_sql, count_params) = plan.count_sql(Placeholder::Question);
    assert!(count_sql.starts_with("SELECT COUNT(*) AS total FROM discovered_molecule m WHERE"));
    assert_eq!(count_params.len(), 8);
    Ok(())
  }

  #[test]
  fn short_ranges_and_unknown_fields_are_ignored() -> Result<(), DomainError> {
    let req = request(json!({
      "ranges": {"molecular_weight": [100], "molecular_wieght": [1, 2], "cid": [1, 5]},
      "sort": [{"field": "bogus"}]
    }));
    let plan = QueryPlanner::default().plan("ds", &req)?;
    assert_eq!(plan.conditions.len(), 1);
    assert_eq!(plan.ignored_fields, vec!["molecular_wieght", "cid", "bogus"]);
    Ok(())
  }

  #[test]
  fn strict_planner_rejects_unknown_fields() {
    let req = request(json!({"ranges": {"molecular_wieght": [1, 2]}}));
    match QueryPlanner::strict().plan("ds", &req) {
      Err(e) => assert_eq!(e.kind(), crate::FailureKind::BadRequest),
      Ok(p) => panic!("expected rejection, got {:?}", p),
    }
  }

  #[test]
  fn page_defaults_and_limits() -> Result<(), DomainError> {
    let plan = QueryPlanner::default().plan("ds", &QueryRequest::default())?;
    assert_eq!((plan.limit, plan.offset), (DEFAULT_PAGE_LIMIT, 0));
    let big = QueryPlanner::default().plan("ds", &request(json!({"page": {"limit": 50000}})))?;
    assert_eq!(big.limit, MAX_PAGE_LIMIT);
    assert!(QueryPlanner::default().plan("ds", &request(json!({"page": {"limit": -1}}))).is_err());
    Ok(())
  }

  #[test]
  fn field_lookup_is_case_insensitive() {
    assert_eq!(lookup_field("tpsa").map(|f| f.name), Some("TPSA"));
    assert_eq!(lookup_field("XLOGP3").map(|f| f.column), Some("xlogp3"));
    assert!(lookup_field("m.cid; DROP TABLE dataset").is_none());
    assert_eq!(aggregated_fields().count(), 8);
  }

  #[test]
  fn aggregate_sql_always_joins() -> Result<(), DomainError> {
    let plan = QueryPlanner::default().plan("ds", &QueryRequest::default())?;
    let hba = lookup_field("HBA").expect("HBA");
    let (sql, params) = plan.aggregate_sql(hba, Placeholder::Dollar);
    assert!(sql.contains("LEFT JOIN molecule_geometry g"));
    assert!(sql.ends_with("m.dataset_id = $1 AND m.hba IS NOT NULL"));
    assert_eq!(params.len(), 1);
    Ok(())
  }

  #[test]
  fn in_memory_ordering_puts_nulls_last_ascending() -> Result<(), DomainError> {
    let plan = QueryPlanner::default().plan("ds", &request(json!({"sort": [{"field": "TPSA", "dir": "asc"}]})))?;
    let mut a = MoleculeRecord::new("ds", 1);
    a.tpsa = None;
    let mut b = MoleculeRecord::new("ds", 2);
    b.tpsa = Some(5.0);
    assert_eq!(plan.compare((&a, None), (&b, None)), Ordering::Greater);
    let desc = QueryPlanner::default().plan("ds", &request(json!({"sort": [{"field": "TPSA", "dir": "DESC"}]})))?;
    assert_eq!(desc.compare((&a, None), (&b, None)), Ordering::Less);
    Ok(())
  }

  #[test]
  fn summary_of_values() {
    assert_eq!(FieldSummary::from_values(Vec::<f64>::new()), None);
    let s = FieldSummary::from_values(vec![3.0, 1.0, 2.0]).unwrap();
    assert_eq!((s.count, s.min, s.max), (3, 1.0, 3.0));
  }
}
