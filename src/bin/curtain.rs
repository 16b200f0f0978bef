use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use curtain_core::app::{App, ImportOptions};
use curtain_core::catalog::{FilterListHttpClient, sync_filter_lists};
use curtain_core::config::{ConfigLoader, ResolvedConfig};
use curtain_core::domain::{LinkId, SearchType};
use curtain_core::error::CurtainError;
use curtain_core::output::{JsonOutput, OutputMode, progress_sink};
use curtain_core::payload::DatasetPayload;
use curtain_core::progress::CancelToken;
use curtain_core::session::DatasetSession;

#[derive(Parser)]
#[command(name = "curtain")]
#[command(about = "Local store and analysis core for Curtain proteomics datasets")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Import a dataset payload into the local stores")]
    Import(ImportArgs),
    #[command(about = "Resolve an identifier or gene name to primary ids")]
    Resolve(ResolveArgs),
    #[command(about = "Resolve search terms and save them as a search list")]
    Search(SearchArgs),
    #[command(about = "Print the visible volcano points of a dataset")]
    Points(PointsArgs),
    #[command(about = "Find points near a position or another point")]
    Nearby(NearbyArgs),
    #[command(about = "Delete a dataset's stores and user records")]
    Remove(LinkArgs),
    #[command(about = "Manage settings variants")]
    Variant(VariantArgs),
    #[command(about = "Manage curated filter lists")]
    Filters(FiltersArgs),
}

#[derive(Args)]
struct ImportArgs {
    payload: PathBuf,

    #[arg(long)]
    link_id: String,

    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct LinkArgs {
    link_id: String,
}

#[derive(Args)]
struct ResolveArgs {
    link_id: String,

    #[arg(long, conflicts_with = "gene")]
    split_id: Option<String>,

    #[arg(long)]
    gene: Option<String>,
}

#[derive(Args)]
struct SearchArgs {
    link_id: String,

    #[arg(long)]
    name: String,

    #[arg(long = "type", value_enum, default_value_t = SearchType::Batch)]
    search_type: SearchType,

    #[arg(required = true)]
    terms: Vec<String>,
}

#[derive(Args)]
struct PointsArgs {
    link_id: String,

    #[arg(long)]
    payload: Option<PathBuf>,
}

#[derive(Args)]
struct NearbyArgs {
    link_id: String,

    #[arg(long, conflicts_with_all = ["x", "y"])]
    point: Option<String>,

    #[arg(long, allow_hyphen_values = true, requires = "y")]
    x: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "x")]
    y: Option<f64>,

    #[arg(long)]
    cutoff: Option<f64>,

    #[arg(long)]
    payload: Option<PathBuf>,
}

#[derive(Args)]
struct VariantArgs {
    #[command(subcommand)]
    command: VariantCommand,
}

#[derive(Subcommand)]
enum VariantCommand {
    #[command(about = "Capture the current settings as a variant")]
    Save(VariantSaveArgs),
    #[command(about = "Print the settings produced by applying a variant")]
    Apply(VariantRefArgs),
    #[command(about = "Make a variant the dataset's default")]
    Default(VariantRefArgs),
    #[command(about = "List a dataset's variants")]
    List(LinkArgs),
    #[command(about = "Delete a variant")]
    Delete(VariantIdArgs),
}

#[derive(Args)]
struct VariantSaveArgs {
    link_id: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    payload: Option<PathBuf>,

    #[arg(long)]
    with_selection: bool,

    #[arg(long = "default")]
    make_default: bool,
}

#[derive(Args)]
struct VariantRefArgs {
    link_id: String,
    variant_id: String,
}

#[derive(Args)]
struct VariantIdArgs {
    variant_id: String,
}

#[derive(Args)]
struct FiltersArgs {
    #[command(subcommand)]
    command: FiltersCommand,
}

#[derive(Subcommand)]
enum FiltersCommand {
    #[command(about = "Download the filter-list catalog")]
    Sync,
    #[command(about = "List stored filter lists")]
    List(FiltersListArgs),
    #[command(about = "List filter-list categories")]
    Categories,
    #[command(about = "Resolve a filter list against a dataset and save it as a search list")]
    Import(FiltersImportArgs),
}

#[derive(Args)]
struct FiltersImportArgs {
    link_id: String,
    filter_id: String,

    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct FiltersListArgs {
    #[arg(long)]
    category: Option<String>,
}

#[derive(Serialize)]
struct DeleteResult {
    id: String,
    deleted: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(curtain) = report.downcast_ref::<CurtainError>() {
            return ExitCode::from(map_exit_code(curtain));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CurtainError) -> u8 {
    match error {
        CurtainError::InvalidLinkId(_)
        | CurtainError::ConfigRead(_)
        | CurtainError::ConfigParse(_)
        | CurtainError::VariantNotFound(_)
        | CurtainError::FilterListNotFound(_) => 2,
        CurtainError::CatalogHttp(_) | CurtainError::CatalogStatus { .. } => 3,
        CurtainError::Cancelled => 130,
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
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(config.layout()?)?.with_palette(config.palette.clone());
    let result = run_command(cli.command, &app, &config, output_mode);
    app.close_all();
    result
}

fn run_command(
    command: Commands,
    app: &App,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let cancel = CancelToken::new();
    match command {
        Commands::Import(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let payload = DatasetPayload::from_path(&args.payload)?;
            let options = ImportOptions { force: args.force };
            let result = app.import_dataset(
                &link_id,
                &payload,
                &options,
                &cancel,
                progress_sink(output_mode),
            )?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Resolve(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let result = match (args.split_id, args.gene) {
                (Some(split_id), _) => app.resolve_split_id(&link_id, &split_id),
                (None, Some(gene)) => app.resolve_gene_name(&link_id, &gene),
                (None, None) => {
                    return Err(miette::Report::msg("either --split-id or --gene is required"));
                }
            };
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Search(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let result = app.create_search_list(&link_id, &args.name, &args.terms, args.search_type)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Points(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let session = open_session(app, &link_id, args.payload.as_deref())?;
            JsonOutput::print(&session.visible_points()).into_diagnostic()
        }
        Commands::Nearby(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let session = open_session(app, &link_id, args.payload.as_deref())?;
            let cutoff = args.cutoff.unwrap_or(config.nearby_cutoff);
            let nearby = match (args.point, args.x, args.y) {
                (Some(point), _, _) => session.nearby(&point, cutoff),
                (None, Some(x), Some(y)) => session.nearby_at(x, y, cutoff),
                _ => return Err(miette::Report::msg("either --point or --x/--y is required")),
            };
            JsonOutput::print(&nearby).into_diagnostic()
        }
        Commands::Remove(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let result = app.remove_dataset(&link_id)?;
            JsonOutput::print(&result).into_diagnostic()
        }
        Commands::Variant(args) => run_variant(args.command, app),
        Commands::Filters(args) => run_filters(args.command, app, config, output_mode, &cancel),
    }
}

fn run_variant(command: VariantCommand, app: &App) -> miette::Result<()> {
    let store = app.user_data();
    match command {
        VariantCommand::Save(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let session = open_session(app, &link_id, args.payload.as_deref())?;
            let mut variant = session.capture_variant(
                &args.name,
                args.description.as_deref(),
                args.with_selection,
            );
            variant.is_default = args.make_default;
            store.save_variant(&variant)?;
            JsonOutput::print(&variant).into_diagnostic()
        }
        VariantCommand::Apply(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let variant = store
                .variant(&args.variant_id)?
                .ok_or_else(|| CurtainError::VariantNotFound(args.variant_id.clone()))?;
            let mut session = open_session(app, &link_id, None)?;
            session.apply_variant(&variant);
            JsonOutput::print(session.settings()).into_diagnostic()
        }
        VariantCommand::Default(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            store.set_default_variant(&link_id, &args.variant_id)?;
            let variant = store.default_variant(&link_id)?;
            JsonOutput::print(&variant).into_diagnostic()
        }
        VariantCommand::List(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            JsonOutput::print(&store.variants(&link_id)?).into_diagnostic()
        }
        VariantCommand::Delete(args) => {
            let deleted = store.delete_variant(&args.variant_id)?;
            JsonOutput::print(&DeleteResult {
                id: args.variant_id,
                deleted,
            })
            .into_diagnostic()
        }
    }
}

fn run_filters(
    command: FiltersCommand,
    app: &App,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    cancel: &CancelToken,
) -> miette::Result<()> {
    let store = app.user_data();
    match command {
        FiltersCommand::Sync => {
            let client = FilterListHttpClient::new(&config.catalog_url)?;
            let result = sync_filter_lists(
                &client,
                store,
                config.page_size,
                cancel,
                progress_sink(output_mode),
            )?;
            JsonOutput::print(&result).into_diagnostic()
        }
        FiltersCommand::List(args) => {
            let lists = store.filter_lists(args.category.as_deref())?;
            JsonOutput::print(&lists).into_diagnostic()
        }
        FiltersCommand::Categories => {
            JsonOutput::print(&store.filter_list_categories()?).into_diagnostic()
        }
        FiltersCommand::Import(args) => {
            let link_id: LinkId = args.link_id.parse()?;
            let result = app.import_filter_list(&link_id, &args.filter_id, args.name.as_deref())?;
            JsonOutput::print(&result).into_diagnostic()
        }
    }
}

fn open_session(
    app: &App,
    link_id: &LinkId,
    payload: Option<&std::path::Path>,
) -> Result<DatasetSession, CurtainError> {
    match payload {
        Some(path) => app.open_session(link_id, &DatasetPayload::from_path(path)?),
        None => app.open_stored_session(link_id),
    }
}
