// main.rs
// Línea de comandos del catálogo: migraciones, ingesta (manifiesto CSV y
// geometrías SDF) y consultas. Todas las salidas son JSON por stdout.
use anyhow::Context;
use chem_domain::{CatalogService, DomainError, FailureKind, GeometryFormat, QueryPlanner, QueryRequest};
use chem_ingest::IngestionOrchestrator;
use chem_persistence::{CatalogStore, StoreConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "molecule-explorer")]
#[command(about = "Catálogo de moléculas descubiertas: ingesta y consultas", long_about = None)]
struct Args {
  /// URL de la base de datos; sustituye a CATALOG_DB_URL / DATABASE_URL.
  #[arg(long, global = true)]
  database_url: Option<String>,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Aplica las migraciones pendientes.
  Migrate,
  /// Ingiere el manifiesto CSV de un dataset.
  Csv {
    #[arg(long)]
    dataset_id: String,
    /// Nombre visible del dataset (por defecto el identificador).
    #[arg(long)]
    name: Option<String>,
    path: PathBuf,
  },
  /// Ingiere uno o más archivos SDF (o .sdf.gz) de un dataset ya cargado.
  Sdf {
    #[arg(long)]
    dataset_id: String,
    /// Corrida a la que se atribuyen las geometrías.
    #[arg(long)]
    run_id: Option<String>,
    #[arg(required = true)]
    paths: Vec<PathBuf>,
  },
  /// Lista los datasets con su número de moléculas.
  Datasets,
  /// Familias de semillas de un dataset.
  Families {
    #[arg(long)]
    dataset_id: String,
  },
  /// Semillas de un dataset, opcionalmente de una familia.
  Seeds {
    #[arg(long)]
    dataset_id: String,
    #[arg(long)]
    family: Option<String>,
  },
  /// Página de moléculas filtrada y ordenada.
  Query {
    #[arg(long)]
    dataset_id: String,
    #[command(flatten)]
    request: RequestArgs,
  },
  /// Resumen (count, min, max) por campo numérico bajo el mismo filtro.
  Aggregates {
    #[arg(long)]
    dataset_id: String,
    #[command(flatten)]
    request: RequestArgs,
  },
  /// Detalle de una molécula con su geometría escalar.
  Molecule {
    #[arg(long)]
    dataset_id: String,
    #[arg(long)]
    cid: i64,
  },
  /// Geometría guardada como molblock o escena.
  Geometry {
    #[arg(long)]
    dataset_id: String,
    #[arg(long)]
    cid: i64,
    #[arg(long, default_value = "molblock")]
    format: String,
  },
  /// Corridas de ingesta recientes, o una sola con --run-id.
  Runs {
    #[arg(long)]
    run_id: Option<String>,
  },
}

#[derive(clap::Args)]
struct RequestArgs {
  /// Archivo JSON con la consulta.
  #[arg(long, conflicts_with = "body")]
  request: Option<PathBuf>,
  /// Consulta JSON en línea.
  #[arg(long)]
  body: Option<String>,
  /// Rechaza campos desconocidos en lugar de ignorarlos.
  #[arg(long, default_value_t = false)]
  strict: bool,
}

impl RequestArgs {
  fn load(&self) -> anyhow::Result<QueryRequest> {
    let raw = match (&self.request, &self.body) {
      (Some(path), _) => std::fs::read_to_string(path).with_context(|| format!("leyendo {}", path.display()))?,
      (None, Some(body)) => body.clone(),
      (None, None) => return Ok(QueryRequest::default()),
    };
    serde_json::from_str(&raw).map_err(|e| DomainError::BadRequest(format!("consulta JSON inválida: {}", e)).into())
  }

  fn planner(&self) -> QueryPlanner {
    if self.strict {
      QueryPlanner::strict()
    } else {
      QueryPlanner::default()
    }
  }
}

#[derive(Serialize)]
struct MigrateOutput {
  applied: usize,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
  let mut config = StoreConfig::from_env();
  if let Some(url) = args.database_url {
    config = StoreConfig { connect_timeout: config.connect_timeout,
                           ..StoreConfig::new(url).with_pool_size(config.pool_size) };
  }
  let store = Arc::new(CatalogStore::connect(&config)?);
  let service = || CatalogService::new(store.clone());

  match args.command {
    Command::Migrate => {
      let applied = store.run_migrations()?;
      tracing::info!("migraciones aplicadas: {}", applied);
      print_json(&MigrateOutput { applied })?;
    }
    Command::Csv { dataset_id, name, path } => {
      let orch = IngestionOrchestrator::new(store.clone());
      let report = orch.ingest_manifest_file(&dataset_id, name.as_deref(), &path)?;
      print_json(&report)?;
    }
    Command::Sdf { dataset_id, run_id, paths } => {
      let orch = IngestionOrchestrator::new(store.clone());
      let report = orch.ingest_geometry(&dataset_id, run_id.as_deref(), &paths)?;
      print_json(&report)?;
    }
    Command::Datasets => print_json(&service().datasets()?)?,
    Command::Families { dataset_id } => print_json(&service().families(&dataset_id)?)?,
    Command::Seeds { dataset_id, family } => print_json(&service().seeds(&dataset_id, family.as_deref())?)?,
    Command::Query { dataset_id, request } => {
      let service = service().with_planner(request.planner());
      print_json(&service.query(&dataset_id, &request.load()?)?)?;
    }
    Command::Aggregates { dataset_id, request } => {
      let service = service().with_planner(request.planner());
      print_json(&service.aggregates(&dataset_id, &request.load()?)?)?;
    }
    Command::Molecule { dataset_id, cid } => print_json(&service().molecule(&dataset_id, cid)?)?,
    Command::Geometry { dataset_id, cid, format } => {
      let format: GeometryFormat = format.parse()?;
      print_json(&service().geometry(&dataset_id, cid, format)?)?;
    }
    Command::Runs { run_id: Some(id) } => print_json(&service().run(&id)?)?,
    Command::Runs { run_id: None } => print_json(&service().runs()?)?,
  }
  if let Ok(store) = Arc::try_unwrap(store) {
    store.close();
  }
  Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
  match err.downcast_ref::<DomainError>().map(DomainError::kind) {
    Some(FailureKind::NotFound) => 2,
    Some(FailureKind::BadRequest) => 3,
    Some(FailureKind::ServerFault) | None => 1,
  }
}

fn main() -> ExitCode {
  tracing_subscriber::fmt().with_writer(std::io::stderr)
                           .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env()
                             .unwrap_or_else(|_| "info".into()))
                           .init();
  match run(Args::parse()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      tracing::error!("{:#}", e);
      ExitCode::from(exit_code(&e))
    }
  }
}
