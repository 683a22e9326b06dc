use crate::config::StoreConfig;
use crate::rows::{geometry_rows, to_millis, AggregateRow, CountRow, DatasetSummaryRow, GeometryHotRow, MoleculeRow,
                  NewDatasetRow, NewMoleculeRow, RunRow};
use crate::schema;
use chem_domain::query::{aggregated_fields, FieldSpec};
use chem_domain::{AggregateReport, CatalogRepository, DatasetSummary, DomainError, FieldSummary, GeometryRecord,
                  IngestRun, IngestStats, MoleculeDetail, MoleculePage, MoleculeRecord, Placeholder, QueryParam,
                  QueryPlan, RunStatus, SeedSummary};
use chrono::Utc;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::ConnectionManager;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Double, Text};
use diesel::upsert::excluded;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use indexmap::IndexMap;
use r2d2::{Pool, PooledConnection};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(feature = "pg")]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/postgres");
#[cfg(not(feature = "pg"))]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/sqlite");

#[cfg(feature = "pg")]
pub type DbConn = diesel::pg::PgConnection;
#[cfg(not(feature = "pg"))]
pub type DbConn = diesel::sqlite::SqliteConnection;
type Db = <DbConn as Connection>::Backend;
type DbPool = Pool<ConnectionManager<DbConn>>;
type PooledConn = PooledConnection<ConnectionManager<DbConn>>;

#[cfg(feature = "pg")]
const PLACEHOLDER: Placeholder = Placeholder::Dollar;
#[cfg(not(feature = "pg"))]
const PLACEHOLDER: Placeholder = Placeholder::Question;

/// Pragmas por conexión: espera ante bloqueos y claves foráneas activas.
#[cfg(not(feature = "pg"))]
#[derive(Debug)]
struct SqlitePragmas;

#[cfg(not(feature = "pg"))]
impl r2d2::CustomizeConnection<DbConn, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut DbConn) -> Result<(), diesel::r2d2::Error> {
    use diesel::connection::SimpleConnection;
    conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
        .map_err(diesel::r2d2::Error::QueryError)
  }
}

fn map_db_err(e: DieselError) -> DomainError {
  match e {
    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
      DomainError::ReferentialViolation(info.message().to_string())
    }
    other => DomainError::PersistenceFailure(format!("db: {}", other)),
  }
}

/// Almacén relacional del catálogo. Es dueño del pool de conexiones; se crea
/// una vez al arrancar y se cierra con `close` (o al soltarlo).
#[derive(Clone)]
pub struct CatalogStore {
  pool: Arc<DbPool>,
}

impl CatalogStore {
  pub fn connect(config: &StoreConfig) -> Result<Self, DomainError> {
    let manager = ConnectionManager::<DbConn>::new(config.database_url.as_str());
    let builder = Pool::builder().max_size(config.pool_size).connection_timeout(config.connect_timeout);
    #[cfg(not(feature = "pg"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager)
                      .map_err(|e| DomainError::PersistenceFailure(format!("no se pudo crear el pool: {}", e)))?;
    let store = Self { pool: Arc::new(pool) };
    #[cfg(not(feature = "pg"))]
    {
      use diesel::connection::SimpleConnection;
      let mut c = store.conn()?;
      if let Err(e) = c.batch_execute("PRAGMA journal_mode = WAL;") {
        log::debug!("journal_mode WAL no disponible: {}", e);
      }
    }
    log::info!("pool de conexiones listo (max {})", config.pool_size);
    Ok(store)
  }

  /// `connect` con la configuración del entorno.
  pub fn from_env() -> Result<Self, DomainError> {
    Self::connect(&StoreConfig::from_env())
  }

  /// Aplica las migraciones pendientes; devuelve cuántas se aplicaron.
  pub fn run_migrations(&self) -> Result<usize, DomainError> {
    let mut conn = self.conn()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)
                      .map_err(|e| DomainError::PersistenceFailure(format!("migraciones: {}", e)))?;
    for version in &applied {
      log::info!("migración aplicada: {}", version);
    }
    Ok(applied.len())
  }

  /// Suelta este manejador. Si era el último clon, destruye el pool y cierra
  /// sus conexiones (devuelve `true`); si quedan clones el pool sigue vivo.
  pub fn close(self) -> bool {
    match Arc::try_unwrap(self.pool) {
      Ok(pool) => {
        let state = pool.state();
        log::info!("cerrando pool ({} conexiones, {} libres)", state.connections, state.idle_connections);
        drop(pool);
        true
      }
      Err(shared) => {
        log::debug!("pool compartido por {} manejadores, sigue abierto", Arc::strong_count(&shared) - 1);
        false
      }
    }
  }

  fn conn(&self) -> Result<PooledConn, DomainError> {
    self.pool.get().map_err(|e| DomainError::PersistenceFailure(format!("pool: {}", e)))
  }

  fn dynamic(sql: String, params: Vec<QueryParam>) -> BoxedSqlQuery<'static, Db, SqlQuery> {
    params.into_iter().fold(diesel::sql_query(sql).into_boxed::<Db>(), |q, p| match p {
                        QueryParam::Text(v) => q.bind::<Text, _>(v),
                        QueryParam::Float(v) => q.bind::<Double, _>(v),
                        QueryParam::Int(v) => q.bind::<BigInt, _>(v),
                      })
  }

  fn aggregate_field(&self, plan: &QueryPlan, field: &FieldSpec) -> Result<Option<FieldSummary>, DomainError> {
    let mut conn = self.conn()?;
    let (sql, params) = plan.aggregate_sql(field, PLACEHOLDER);
    let row: AggregateRow = Self::dynamic(sql, params).get_result(&mut conn).map_err(map_db_err)?;
    Ok(match (row.n, row.lo, row.hi) {
      (n, Some(min), Some(max)) if n > 0 => Some(FieldSummary { count: n, min, max }),
      _ => None,
    })
  }
}

impl CatalogRepository for CatalogStore {
  fn upsert_dataset(&self, dataset_id: &str, name: &str, run_id: Option<&str>) -> Result<(), DomainError> {
    use schema::dataset::dsl as d;
    let mut conn = self.conn()?;
    let row = NewDatasetRow { dataset_id, name, ingest_run_id: run_id, created_at_ts: to_millis(Utc::now()) };
    diesel::insert_into(d::dataset).values(&row)
                                   .on_conflict(d::dataset_id)
                                   .do_update()
                                   .set((d::name.eq(excluded(d::name)), d::ingest_run_id.eq(excluded(d::ingest_run_id))))
                                   .execute(&mut conn)
                                   .map_err(map_db_err)?;
    Ok(())
  }

  fn start_run(&self, run: &IngestRun) -> Result<(), DomainError> {
    let mut conn = self.conn()?;
    let row = RunRow::from_domain(run)?;
    diesel::insert_into(schema::ingest_run::table).values(&row).execute(&mut conn).map_err(map_db_err)?;
    Ok(())
  }

  fn finish_run(&self, run_id: &str, status: RunStatus, stats: &IngestStats) -> Result<(), DomainError> {
    use schema::ingest_run::dsl as r;
    let mut conn = self.conn()?;
    let stats_json = serde_json::to_string(stats)?;
    let updated = diesel::update(r::ingest_run.find(run_id)).set((r::status.eq(status.as_str()),
                                                                   r::finished_at_ts.eq(Some(to_millis(Utc::now()))),
                                                                   r::stats.eq(stats_json)))
                                                              .execute(&mut conn)
                                                              .map_err(map_db_err)?;
    if updated == 0 {
      return Err(DomainError::NotFound(format!("corrida {}", run_id)));
    }
    Ok(())
  }

  fn upsert_molecules(&self, rows: &[MoleculeRecord]) -> Result<usize, DomainError> {
    use schema::discovered_molecule::dsl as m;
    let mut conn = self.conn()?;
    let now = to_millis(Utc::now());
    // una sentencia por fila: los cid repetidos en el lote se resuelven en orden
    conn.transaction::<_, DieselError, _>(|conn| {
          for record in rows {
            let row = NewMoleculeRow::from_domain(record, now);
            diesel::insert_into(m::discovered_molecule).values(&row)
                                                       .on_conflict((m::dataset_id, m::cid))
                                                       .do_update()
                                                       .set((m::smiles.eq(excluded(m::smiles)),
                                                             m::inchi_key.eq(excluded(m::inchi_key)),
                                                             m::molecular_formula.eq(excluded(m::molecular_formula)),
                                                             m::molecular_weight.eq(excluded(m::molecular_weight)),
                                                             m::exact_mass.eq(excluded(m::exact_mass)),
                                                             m::xlogp3.eq(excluded(m::xlogp3)),
                                                             m::tpsa.eq(excluded(m::tpsa)),
                                                             m::hba.eq(excluded(m::hba)),
                                                             m::hbd.eq(excluded(m::hbd)),
                                                             m::rotatable_bonds.eq(excluded(m::rotatable_bonds)),
                                                             m::discovery_method.eq(excluded(m::discovery_method)),
                                                             m::discovery_seed.eq(excluded(m::discovery_seed)),
                                                             m::seed_name.eq(excluded(m::seed_name)),
                                                             m::seed_smiles.eq(excluded(m::seed_smiles)),
                                                             m::name.eq(excluded(m::name)),
                                                             m::ingest_run_id.eq(excluded(m::ingest_run_id))))
                                                       .execute(conn)?;
          }
          Ok(())
        })
        .map_err(map_db_err)?;
    Ok(rows.len())
  }

  fn molecule_ids(&self, dataset_id: &str) -> Result<HashSet<i64>, DomainError> {
    use schema::discovered_molecule::dsl as m;
    let mut conn = self.conn()?;
    let ids = m::discovered_molecule.filter(m::dataset_id.eq(dataset_id))
                                    .select(m::cid)
                                    .load::<i64>(&mut conn)
                                    .map_err(map_db_err)?;
    Ok(ids.into_iter().collect())
  }

  fn upsert_geometry(&self, run_id: &str, record: &GeometryRecord) -> Result<(), DomainError> {
    use schema::molecule_geometry::dsl as g;
    use schema::molecule_geometry_cold::dsl as c;
    let mut conn = self.conn()?;
    let (hot, cold) = geometry_rows(record, run_id, to_millis(Utc::now()));
    conn.transaction::<_, DieselError, _>(|conn| {
          diesel::insert_into(g::molecule_geometry).values(&hot)
                                                   .on_conflict((g::dataset_id, g::cid))
                                                   .do_update()
                                                   .set((g::conformer_id.eq(excluded(g::conformer_id)),
                                                         g::mmff94_energy.eq(excluded(g::mmff94_energy)),
                                                         g::conformer_rmsd.eq(excluded(g::conformer_rmsd)),
                                                         g::effective_rotor_count.eq(excluded(g::effective_rotor_count)),
                                                         g::shape_volume.eq(excluded(g::shape_volume)),
                                                         g::shape_selfoverlap.eq(excluded(g::shape_selfoverlap)),
                                                         g::heavy_atom_count.eq(excluded(g::heavy_atom_count)),
                                                         g::component_count.eq(excluded(g::component_count)),
                                                         g::ingest_run_id.eq(excluded(g::ingest_run_id))))
                                                   .execute(conn)?;
          diesel::insert_into(c::molecule_geometry_cold).values(&cold)
                                                        .on_conflict((c::dataset_id, c::cid))
                                                        .do_update()
                                                        .set((c::molblock.eq(excluded(c::molblock)),
                                                              c::shape_fingerprint.eq(excluded(c::shape_fingerprint)),
                                                              c::pharmacophore_features
                                                                .eq(excluded(c::pharmacophore_features)),
                                                              c::mmff94_partial_charges
                                                                .eq(excluded(c::mmff94_partial_charges)),
                                                              c::coordinate_type.eq(excluded(c::coordinate_type))))
                                                        .execute(conn)?;
          Ok(())
        })
        .map_err(map_db_err)
  }

  fn list_datasets(&self) -> Result<Vec<DatasetSummary>, DomainError> {
    let mut conn = self.conn()?;
    let rows = diesel::sql_query("SELECT d.dataset_id AS dataset_id, d.name AS name, d.created_at_ts AS created_at_ts, \
                                  COUNT(m.cid) AS molecule_count FROM dataset d LEFT JOIN discovered_molecule m ON \
                                  m.dataset_id = d.dataset_id GROUP BY d.dataset_id, d.name, d.created_at_ts ORDER BY \
                                  d.created_at_ts DESC, d.dataset_id ASC").load::<DatasetSummaryRow>(&mut conn)
                                                                         .map_err(map_db_err)?;
    rows.into_iter().map(DatasetSummaryRow::into_domain).collect()
  }

  fn list_families(&self, dataset_id: &str) -> Result<Vec<String>, DomainError> {
    use schema::discovered_molecule::dsl as m;
    let mut conn = self.conn()?;
    let families = m::discovered_molecule.filter(m::dataset_id.eq(dataset_id))
                                         .filter(m::seed_name.is_not_null())
                                         .select(m::seed_name)
                                         .distinct()
                                         .order(m::seed_name.asc())
                                         .load::<Option<String>>(&mut conn)
                                         .map_err(map_db_err)?;
    Ok(families.into_iter().flatten().collect())
  }

  fn list_seeds(&self, dataset_id: &str, family: Option<&str>) -> Result<Vec<SeedSummary>, DomainError> {
    use schema::discovered_molecule::dsl as m;
    let mut conn = self.conn()?;
    let mut query = m::discovered_molecule.filter(m::dataset_id.eq(dataset_id))
                                          .filter(m::discovery_seed.is_not_null())
                                          .select((m::discovery_seed, m::seed_name, m::seed_smiles))
                                          .distinct()
                                          .into_boxed();
    if let Some(f) = family {
      query = query.filter(m::seed_name.eq(f));
    }
    let rows = query.order((m::seed_name.asc(), m::discovery_seed.asc()))
                    .load::<(Option<String>, Option<String>, Option<String>)>(&mut conn)
                    .map_err(map_db_err)?;
    Ok(rows.into_iter()
           .map(|(discovery_seed, seed_name, seed_smiles)| SeedSummary { discovery_seed, seed_name, seed_smiles })
           .collect())
  }

  fn query_molecules(&self, plan: &QueryPlan) -> Result<MoleculePage, DomainError> {
    let mut conn = self.conn()?;
    let (page_sql, page_params) = plan.page_sql(PLACEHOLDER);
    let (count_sql, count_params) = plan.count_sql(PLACEHOLDER);
    log::debug!("consulta: {}", page_sql);
    let rows: Vec<MoleculeRow> = Self::dynamic(page_sql, page_params).load(&mut conn).map_err(map_db_err)?;
    let count: CountRow = Self::dynamic(count_sql, count_params).get_result(&mut conn).map_err(map_db_err)?;
    Ok(MoleculePage::new(plan, rows.into_iter().map(MoleculeRecord::from).collect(), count.total))
  }

  /// Un pase independiente por campo, en paralelo, cada uno con su conexión.
  fn aggregate(&self, plan: &QueryPlan) -> Result<AggregateReport, DomainError> {
    let fields: Vec<&'static FieldSpec> = aggregated_fields().collect();
    let summaries = fields.par_iter()
                          .map(|field| self.aggregate_field(plan, field).map(|s| (field.name, s)))
                          .collect::<Result<Vec<_>, DomainError>>()?;
    let aggregates: IndexMap<String, FieldSummary> =
      summaries.into_iter().filter_map(|(name, s)| s.map(|s| (name.to_string(), s))).collect();
    Ok(AggregateReport { dataset_id: plan.dataset_id.clone(), aggregates })
  }

  fn get_molecule(&self, dataset_id: &str, cid: i64) -> Result<Option<MoleculeDetail>, DomainError> {
    use schema::discovered_molecule::dsl as m;
    use schema::molecule_geometry::dsl as g;
    let mut conn = self.conn()?;
    let molecule = m::discovered_molecule.filter(m::dataset_id.eq(dataset_id))
                                         .filter(m::cid.eq(cid))
                                         .select(MoleculeRow::as_select())
                                         .first(&mut conn)
                                         .optional()
                                         .map_err(map_db_err)?;
    let molecule = match molecule {
      Some(row) => MoleculeRecord::from(row),
      None => return Ok(None),
    };
    let geometry = g::molecule_geometry.filter(g::dataset_id.eq(dataset_id))
                                       .filter(g::cid.eq(cid))
                                       .select(GeometryHotRow::as_select())
                                       .first(&mut conn)
                                       .optional()
                                       .map_err(map_db_err)?;
    Ok(Some(MoleculeDetail { molecule, geometry: geometry.map(Into::into) }))
  }

  fn get_geometry_block(&self, dataset_id: &str, cid: i64) -> Result<Option<String>, DomainError> {
    use schema::molecule_geometry_cold::dsl as c;
    let mut conn = self.conn()?;
    c::molecule_geometry_cold.filter(c::dataset_id.eq(dataset_id))
                             .filter(c::cid.eq(cid))
                             .select(c::molblock)
                             .first::<String>(&mut conn)
                             .optional()
                             .map_err(map_db_err)
  }

  fn list_runs(&self, limit: usize) -> Result<Vec<IngestRun>, DomainError> {
    use schema::ingest_run::dsl as r;
    let mut conn = self.conn()?;
    let rows = r::ingest_run.order((r::started_at_ts.desc(), r::run_id.asc()))
                            .limit(limit as i64)
                            .select(RunRow::as_select())
                            .load(&mut conn)
                            .map_err(map_db_err)?;
    rows.into_iter().map(RunRow::into_domain).collect()
  }

  fn get_run(&self, run_id: &str) -> Result<Option<IngestRun>, DomainError> {
    use schema::ingest_run::dsl as r;
    let mut conn = self.conn()?;
    let row = r::ingest_run.find(run_id)
                           .select(RunRow::as_select())
                           .first(&mut conn)
                           .optional()
                           .map_err(map_db_err)?;
    row.map(RunRow::into_domain).transpose()
  }
}
