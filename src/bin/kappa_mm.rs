use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use kappa_map_manager::config::ConfigLoader;
use kappa_map_manager::domain::{LensModel, MapSpecifier};
use kappa_map_manager::drive::{DriveHttpClient, StaticTokenProvider};
use kappa_map_manager::error::KappaError;
use kappa_map_manager::fetcher::{DEFAULT_DRIVE_ROOT_ID, Fetcher};
use kappa_map_manager::frontier::FrontierHttpClient;
use kappa_map_manager::maps;
use kappa_map_manager::output::JsonOutput;
use kappa_map_manager::store::Store;

#[derive(Parser)]
#[command(name = "kappa-mm")]
#[command(about = "Convergence-map fetcher for simulated and Frontier Fields lensing maps")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    data_root: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    index_root: Option<Utf8PathBuf>,

    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build the remote map index side-store")]
    Index(IndexArgs),
    #[command(about = "Ensure one map is downloaded")]
    Fetch(FetchArgs),
    #[command(about = "Ensure a whole (realization, redshift, projection) range is downloaded")]
    FetchRange(FetchRangeArgs),
    #[command(about = "Show whether a map is downloaded")]
    Status(SpecifierArgs),
    #[command(about = "Load a downloaded map and print its angular extent and stats")]
    Inspect(SpecifierArgs),
    #[command(about = "List known Frontier Fields lens models")]
    Models,
    #[command(about = "List realization numbers available in the map index")]
    Realizations(IndexArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Target the archive index for this model instead of the simulated one
    #[arg(long)]
    model: Option<LensModel>,
}

#[derive(Args)]
struct FetchArgs {
    specifier: MapSpecifier,

    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct FetchRangeArgs {
    #[arg(long, value_delimiter = ',', required = true)]
    realizations: Vec<u32>,

    #[arg(long, value_delimiter = ',', required = true)]
    redshifts: Vec<f64>,

    #[arg(long, value_delimiter = ',', required = true)]
    projections: Vec<u32>,

    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct SpecifierArgs {
    specifier: MapSpecifier,
}

#[derive(Serialize)]
struct IndexResult {
    target: String,
    rows: usize,
}

#[derive(Serialize)]
struct StatusResult {
    specifier: String,
    path: String,
    downloaded: bool,
}

#[derive(Serialize)]
struct InspectResult {
    specifier: String,
    path: String,
    angle_arcsec: f64,
    side: usize,
    pixel_scale_arcsec: f64,
    mean: f64,
    min: f64,
    max: f64,
}

#[derive(Serialize)]
struct ModelsResult {
    models: Vec<String>,
}

#[derive(Serialize)]
struct RealizationsResult {
    target: String,
    realizations: Vec<u32>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kappa) = report.downcast_ref::<KappaError>() {
            return ExitCode::from(map_exit_code(kappa));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KappaError) -> u8 {
    match error {
        KappaError::MapNotFound(_)
        | KappaError::IndexUnavailable(_)
        | KappaError::MissingConfig => 2,
        KappaError::Auth(_)
        | KappaError::DriveHttp(_)
        | KappaError::DriveStatus { .. }
        | KappaError::ArchiveHttp(_)
        | KappaError::ArchiveStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The config file is optional unless named explicitly.
    let config = match ConfigLoader::resolve(cli.config.as_deref()) {
        Ok(config) => Some(config),
        Err(KappaError::MissingConfig) => None,
        Err(err) => return Err(err.into()),
    };

    let default_store = Store::new().into_diagnostic()?;
    let data_root = cli
        .data_root
        .or_else(|| config.as_ref().and_then(|c| c.data_root.clone()))
        .unwrap_or_else(|| default_store.data_root().to_path_buf());
    let index_root = cli
        .index_root
        .or_else(|| config.as_ref().and_then(|c| c.index_root.clone()))
        .unwrap_or_else(|| default_store.index_root().to_path_buf());
    let store = Store::new_with_paths(data_root, index_root);

    let drive_root_id = config
        .as_ref()
        .map(|c| c.drive_root_id.clone())
        .unwrap_or_else(|| DEFAULT_DRIVE_ROOT_ID.to_string());
    let token = cli
        .token
        .or_else(|| config.as_ref().and_then(|c| c.drive_token.clone()));
    let credentials = StaticTokenProvider::from_env_or(token);
    let drive = DriveHttpClient::new(Box::new(credentials)).into_diagnostic()?;
    let frontier = FrontierHttpClient::new().into_diagnostic()?;
    let fetcher = Fetcher::new(store, drive, frontier, &drive_root_id);

    match cli.command {
        Commands::Index(args) => {
            let result = match args.model {
                Some(model) => {
                    let index = fetcher.build_frontier_index(&model)?;
                    IndexResult {
                        target: model.to_string(),
                        rows: index.entries().len(),
                    }
                }
                None => {
                    let rows = fetcher.build_sim_index()?;
                    IndexResult {
                        target: "sim".to_string(),
                        rows,
                    }
                }
            };
            JsonOutput::print_json(&result).into_diagnostic()
        }
        Commands::Fetch(args) => {
            let outcome = match &args.specifier {
                MapSpecifier::Sim(key) => fetcher.ensure_sim(key, args.overwrite, &JsonOutput)?,
                MapSpecifier::Frontier(key) => {
                    fetcher.ensure_frontier(key, args.overwrite, &JsonOutput)?
                }
            };
            JsonOutput::print_json(&outcome).into_diagnostic()
        }
        Commands::FetchRange(args) => {
            let report = fetcher.ensure_sim_range(
                &args.realizations,
                &args.redshifts,
                &args.projections,
                args.overwrite,
                &JsonOutput,
            );
            JsonOutput::print_json(&report).into_diagnostic()
        }
        Commands::Status(args) => {
            let path = specifier_path(&fetcher, &args.specifier);
            let result = StatusResult {
                specifier: args.specifier.to_string(),
                downloaded: fetcher.store().is_downloaded(&path),
                path: path.to_string(),
            };
            JsonOutput::print_json(&result).into_diagnostic()
        }
        Commands::Inspect(args) => {
            let path = specifier_path(&fetcher, &args.specifier);
            let map = match &args.specifier {
                MapSpecifier::Sim(_) => maps::load_sim_map(&path)?,
                MapSpecifier::Frontier(_) => maps::load_frontier_map(&path)?,
            };
            let result = InspectResult {
                specifier: args.specifier.to_string(),
                path: path.to_string(),
                angle_arcsec: map.angle_arcsec(),
                side: map.side(),
                pixel_scale_arcsec: map.pixel_scale_arcsec(),
                mean: map.mean(),
                min: map.min(),
                max: map.max(),
            };
            JsonOutput::print_json(&result).into_diagnostic()
        }
        Commands::Models => {
            let result = ModelsResult {
                models: LensModel::known_models()
                    .iter()
                    .map(|model| model.to_string())
                    .collect(),
            };
            JsonOutput::print_json(&result).into_diagnostic()
        }
        Commands::Realizations(args) => {
            let result = match args.model {
                Some(model) => RealizationsResult {
                    realizations: fetcher.frontier_index(&model)?.realizations(),
                    target: model.to_string(),
                },
                None => RealizationsResult {
                    target: "sim".to_string(),
                    realizations: fetcher.sim_realizations()?,
                },
            };
            JsonOutput::print_json(&result).into_diagnostic()
        }
    }
}

fn specifier_path(
    fetcher: &Fetcher<DriveHttpClient, FrontierHttpClient>,
    specifier: &MapSpecifier,
) -> Utf8PathBuf {
    match specifier {
        MapSpecifier::Sim(key) => fetcher.store().sim_map_path(key),
        MapSpecifier::Frontier(key) => fetcher.store().frontier_map_path(key),
    }
}
