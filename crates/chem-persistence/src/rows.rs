// Filas Diesel del catálogo y su conversión desde/hacia el dominio.
use crate::schema::{dataset, discovered_molecule, ingest_run, molecule_geometry, molecule_geometry_cold};
use chem_domain::{DatasetSummary, DiscoveryMethod, DiscoverySeed, DomainError, GeometryHot, GeometryRecord, IngestRun,
                  IngestStats, MoleculeRecord, RunStatus};
use chrono::{DateTime, TimeZone, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, Double, Text};

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
  ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, DomainError> {
  Utc.timestamp_millis_opt(ms)
     .single()
     .ok_or_else(|| DomainError::SerializationError(format!("timestamp fuera de rango: {}", ms)))
}

#[derive(Debug, Insertable)]
#[diesel(table_name = dataset)]
pub(crate) struct NewDatasetRow<'a> {
  pub dataset_id: &'a str,
  pub name: &'a str,
  pub ingest_run_id: Option<&'a str>,
  pub created_at_ts: i64,
}

#[derive(Debug, QueryableByName)]
pub(crate) struct DatasetSummaryRow {
  #[diesel(sql_type = Text)]
  pub dataset_id: String,
  #[diesel(sql_type = Text)]
  pub name: String,
  #[diesel(sql_type = BigInt)]
  pub created_at_ts: i64,
  #[diesel(sql_type = BigInt)]
  pub molecule_count: i64,
}

impl DatasetSummaryRow {
  pub fn into_domain(self) -> Result<DatasetSummary, DomainError> {
    Ok(DatasetSummary { dataset_id: self.dataset_id,
                        name: self.name,
                        created_at: from_millis(self.created_at_ts)?,
                        molecule_count: self.molecule_count })
  }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = ingest_run)]
pub(crate) struct RunRow {
  pub run_id: String,
  pub dataset_id: String,
  pub started_at_ts: i64,
  pub finished_at_ts: Option<i64>,
  pub status: String,
  pub stats: String,
}

impl RunRow {
  pub fn from_domain(run: &IngestRun) -> Result<Self, DomainError> {
    Ok(Self { run_id: run.run_id.clone(),
              dataset_id: run.dataset_id.clone(),
              started_at_ts: to_millis(run.started_at),
              finished_at_ts: run.finished_at.map(to_millis),
              status: run.status.as_str().to_string(),
              stats: serde_json::to_string(&run.stats)? })
  }

  pub fn into_domain(self) -> Result<IngestRun, DomainError> {
    let stats: IngestStats = serde_json::from_str(&self.stats)?;
    Ok(IngestRun { run_id: self.run_id,
                   dataset_id: self.dataset_id,
                   started_at: from_millis(self.started_at_ts)?,
                   finished_at: self.finished_at_ts.map(from_millis).transpose()?,
                   status: self.status.parse::<RunStatus>()?,
                   stats })
  }
}

/// Fila del manifiesto tal como se lee (lista, detalle y SQL dinámico).
#[derive(Debug, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = discovered_molecule)]
pub(crate) struct MoleculeRow {
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
  pub discovery_method: String,
  pub discovery_seed: Option<String>,
  pub seed_name: Option<String>,
  pub seed_smiles: Option<String>,
  pub name: Option<String>,
  pub ingest_run_id: Option<String>,
}

impl From<MoleculeRow> for MoleculeRecord {
  fn from(r: MoleculeRow) -> Self {
    // familia y SMILES de la semilla se derivan siempre de discovery_seed
    Self { dataset_id: r.dataset_id,
           cid: r.cid,
           smiles: r.smiles,
           inchi_key: r.inchi_key,
           molecular_formula: r.molecular_formula,
           molecular_weight: r.molecular_weight,
           exact_mass: r.exact_mass,
           xlogp3: r.xlogp3,
           tpsa: r.tpsa,
           hba: r.hba,
           hbd: r.hbd,
           rotatable_bonds: r.rotatable_bonds,
           discovery_method: DiscoveryMethod::normalize(Some(&r.discovery_method)),
           seed: DiscoverySeed::parse(r.discovery_seed.as_deref()),
           name: r.name,
           ingest_run_id: r.ingest_run_id }
  }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = discovered_molecule)]
pub(crate) struct NewMoleculeRow<'a> {
  pub dataset_id: &'a str,
  pub cid: i64,
  pub smiles: Option<&'a str>,
  pub inchi_key: Option<&'a str>,
  pub molecular_formula: Option<&'a str>,
  pub molecular_weight: Option<f64>,
  pub exact_mass: Option<f64>,
  pub xlogp3: Option<f64>,
  pub tpsa: Option<f64>,
  pub hba: Option<i32>,
  pub hbd: Option<i32>,
  pub rotatable_bonds: Option<i32>,
  pub discovery_method: &'a str,
  pub discovery_seed: Option<&'a str>,
  pub seed_name: Option<&'a str>,
  pub seed_smiles: Option<&'a str>,
  pub name: Option<&'a str>,
  pub ingest_run_id: Option<&'a str>,
  pub created_at_ts: i64,
}

impl<'a> NewMoleculeRow<'a> {
  pub fn from_domain(m: &'a MoleculeRecord, now: i64) -> Self {
    Self { dataset_id: &m.dataset_id,
           cid: m.cid,
           smiles: m.smiles.as_deref(),
           inchi_key: m.inchi_key.as_deref(),
           molecular_formula: m.molecular_formula.as_deref(),
           molecular_weight: m.molecular_weight,
           exact_mass: m.exact_mass,
           xlogp3: m.xlogp3,
           tpsa: m.tpsa,
           hba: m.hba,
           hbd: m.hbd,
           rotatable_bonds: m.rotatable_bonds,
           discovery_method: m.discovery_method.as_str(),
           discovery_seed: m.seed.raw(),
           seed_name: m.seed.family(),
           seed_smiles: m.seed.encoding(),
           name: m.name.as_deref(),
           ingest_run_id: m.ingest_run_id.as_deref(),
           created_at_ts: now }
  }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = molecule_geometry)]
pub(crate) struct GeometryHotRow {
  pub dataset_id: String,
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

impl From<GeometryHotRow> for GeometryHot {
  fn from(r: GeometryHotRow) -> Self {
    Self { dataset_id: r.dataset_id,
           cid: r.cid,
           conformer_id: r.conformer_id,
           mmff94_energy: r.mmff94_energy,
           conformer_rmsd: r.conformer_rmsd,
           effective_rotor_count: r.effective_rotor_count,
           shape_volume: r.shape_volume,
           shape_selfoverlap: r.shape_selfoverlap,
           heavy_atom_count: r.heavy_atom_count,
           component_count: r.component_count }
  }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = molecule_geometry)]
pub(crate) struct NewGeometryRow<'a> {
  pub dataset_id: &'a str,
  pub cid: i64,
  pub conformer_id: Option<&'a str>,
  pub mmff94_energy: Option<f64>,
  pub conformer_rmsd: Option<f64>,
  pub effective_rotor_count: Option<i32>,
  pub shape_volume: Option<f64>,
  pub shape_selfoverlap: Option<f64>,
  pub heavy_atom_count: Option<i32>,
  pub component_count: Option<i32>,
  pub ingest_run_id: Option<&'a str>,
  pub created_at_ts: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = molecule_geometry_cold)]
pub(crate) struct NewGeometryColdRow<'a> {
  pub dataset_id: &'a str,
  pub cid: i64,
  pub molblock: &'a str,
  pub shape_fingerprint: Option<&'a [u8]>,
  pub pharmacophore_features: Option<&'a [u8]>,
  pub mmff94_partial_charges: Option<&'a [u8]>,
  pub coordinate_type: Option<&'a [u8]>,
  pub created_at_ts: i64,
}

/// Par de filas (hot, cold) de un registro de geometría.
pub(crate) fn geometry_rows<'a>(record: &'a GeometryRecord,
                                run_id: &'a str,
                                now: i64)
                                -> (NewGeometryRow<'a>, NewGeometryColdRow<'a>) {
  let (hot, cold) = (record.hot(), record.cold());
  (NewGeometryRow { dataset_id: record.dataset_id(),
                    cid: record.cid(),
                    conformer_id: hot.conformer_id.as_deref(),
                    mmff94_energy: hot.mmff94_energy,
                    conformer_rmsd: hot.conformer_rmsd,
                    effective_rotor_count: hot.effective_rotor_count,
                    shape_volume: hot.shape_volume,
                    shape_selfoverlap: hot.shape_selfoverlap,
                    heavy_atom_count: hot.heavy_atom_count,
                    component_count: hot.component_count,
                    ingest_run_id: Some(run_id),
                    created_at_ts: now },
   NewGeometryColdRow { dataset_id: record.dataset_id(),
                        cid: record.cid(),
                        molblock: &cold.molblock,
                        shape_fingerprint: cold.shape_fingerprint.as_deref(),
                        pharmacophore_features: cold.pharmacophore_features.as_deref(),
                        mmff94_partial_charges: cold.mmff94_partial_charges.as_deref(),
                        coordinate_type: cold.coordinate_type.as_deref(),
                        created_at_ts: now })
}

#[derive(Debug, QueryableByName)]
pub(crate) struct CountRow {
  #[diesel(sql_type = BigInt)]
  pub total: i64,
}

#[derive(Debug, QueryableByName)]
pub(crate) struct AggregateRow {
  #[diesel(sql_type = BigInt)]
  pub n: i64,
  #[diesel(sql_type = Nullable<Double>)]
  pub lo: Option<f64>,
  #[diesel(sql_type = Nullable<Double>)]
  pub hi: Option<f64>,
}
