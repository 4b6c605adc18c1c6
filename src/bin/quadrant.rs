#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use quadrant_oracle::gateway::{OracleGateway, TracingUsageSink};
use quadrant_oracle::map::QuadrantMap;
use quadrant_oracle::occupancy;
use quadrant_oracle::pipeline::{self, EnrichRequest, PipelineConfig, MODEL_ENV};
use quadrant_oracle::prompts::{build_prompt, Intent, IntentKind};
use quadrant_oracle::QuadrantError;

#[derive(Parser)]
#[command(name = "quadrant", version, about = "Quadrant map oracle CLI")]
struct Cli {
    /// Pipeline config JSON (models, token limits, project title)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MapArgs {
    /// Map file (JSON)
    #[arg(long)]
    map: PathBuf,
    /// Constraint the answer must satisfy (repeatable)
    #[arg(long = "constraint")]
    constraints: Vec<String>,
    /// Attribute to request for the item (repeatable)
    #[arg(long = "attribute")]
    attributes: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Count items per quadrant on the active axes (offline)
    Occupancy {
        #[arg(long)]
        map: PathBuf,
    },
    /// Render the prompt an intent would send (offline)
    Prompt {
        #[command(flatten)]
        args: MapArgs,
        /// position | enrich | suggest
        #[arg(long)]
        intent: String,
        #[arg(long)]
        item: Option<String>,
    },
    /// Estimate an item's position
    Estimate {
        #[command(flatten)]
        args: MapArgs,
        #[arg(long)]
        item: String,
        /// Write the result back into the map file
        #[arg(long)]
        write: bool,
    },
    /// Position plus highlights, attributes and domain for an item
    Enrich {
        #[command(flatten)]
        args: MapArgs,
        #[arg(long)]
        item: String,
        #[arg(long)]
        write: bool,
    },
    /// Suggest a real competitor for the emptiest quadrant
    Suggest {
        #[command(flatten)]
        args: MapArgs,
        #[arg(long)]
        write: bool,
    },
    /// Enrich every item on the map, one at a time (Ctrl-C stops after the current item)
    Refresh {
        #[command(flatten)]
        args: MapArgs,
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Occupancy { map } => {
            let map = load_map(&map)?;
            let (x_axis, y_axis) = map.active_axes().map_err(QuadrantError::from)?;
            let occ = occupancy::analyze(&map.items, x_axis, y_axis);
            println!("{}", serde_json::to_string_pretty(&occ)?);
        }
        Commands::Prompt { args, intent, item } => {
            let kind: IntentKind = intent.parse().map_err(QuadrantError::from)?;
            let map = load_map(&args.map)?;
            let intent = build_intent(&cfg, &map, kind, item.as_deref(), &args)?;
            let prompt = build_prompt(&intent);
            println!(
                "# {}\n\n## system\n{}\n\n## user\n{}",
                prompt.template_slug, prompt.system, prompt.user
            );
        }
        Commands::Estimate { args, item, write } => {
            let mut map = load_map(&args.map)?;
            let gateway = OracleGateway::from_env(Arc::new(TracingUsageSink))?;
            let (x_axis, y_axis) = map.active_axes().map_err(QuadrantError::from)?;
            let peers = map.peers()?;
            let result =
                pipeline::estimate_position(&gateway, &cfg, &item, x_axis, y_axis, &peers).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if write {
                let id = item_id_or_insert(&mut map, &item);
                map.apply_result(&id, &result)?;
                save_map(&args.map, &map)?;
            }
        }
        Commands::Enrich { args, item, write } => {
            let mut map = load_map(&args.map)?;
            let gateway = OracleGateway::from_env(Arc::new(TracingUsageSink))?;
            let req = enrich_request(&map, &item, &args)?;
            let result = pipeline::enrich_item(&gateway, &cfg, req).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if write {
                let id = item_id_or_insert(&mut map, &item);
                map.apply_result(&id, &result)?;
                save_map(&args.map, &map)?;
            }
        }
        Commands::Suggest { args, write } => {
            let mut map = load_map(&args.map)?;
            let gateway = OracleGateway::from_env(Arc::new(TracingUsageSink))?;
            let (x_axis, y_axis) = map.active_axes().map_err(QuadrantError::from)?;
            let result = pipeline::suggest_competitor(
                &gateway,
                &cfg,
                &map.items,
                x_axis,
                y_axis,
                &args.constraints,
                &args.attributes,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if write {
                let name = result.name.as_deref().unwrap_or_default();
                if let Some(existing) = pipeline::near_duplicate(name, &map.items) {
                    return Err(format!(
                        "not writing suggestion \"{name}\": map already has \"{}\"",
                        existing.name
                    )
                    .into());
                }
                let id = map.insert_suggestion(&result)?;
                save_map(&args.map, &map)?;
                eprintln!("[suggest] added {name} ({id})");
            }
        }
        Commands::Refresh { args, write } => {
            let mut map = load_map(&args.map)?;
            let gateway = OracleGateway::from_env(Arc::new(TracingUsageSink))?;

            let cancel = Arc::new(AtomicBool::new(false));
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::Relaxed);
                }
            });

            let report = pipeline::refresh_all(
                &gateway,
                &cfg,
                &map,
                &args.constraints,
                &args.attributes,
                Some(cancel.as_ref()),
            )
            .await?;

            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(r) => println!("ok    {}  x={} y={}", outcome.item_name, r.x, r.y),
                    Err(e) => println!("fail  {}  {e}", outcome.item_name),
                }
            }
            println!(
                "{} succeeded, {} failed{}",
                report.succeeded(),
                report.failed(),
                if report.cancelled { " (cancelled)" } else { "" }
            );

            if write {
                let applied = report.apply_to(&mut map)?;
                save_map(&args.map, &map)?;
                eprintln!("[refresh] applied {applied} results to {}", args.map.display());
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let model = std::env::var(MODEL_ENV).ok();
    let cfg = match path {
        Some(path) => PipelineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    Ok(cfg.with_model_override(model.as_deref()))
}

fn load_map(path: &Path) -> Result<QuadrantMap, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(QuadrantMap::from_json(&raw)?)
}

fn save_map(path: &Path, map: &QuadrantMap) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, map.to_json_pretty()? + "\n")?;
    Ok(())
}

fn item_id_or_insert(map: &mut QuadrantMap, name: &str) -> String {
    match map.item_by_name(name) {
        Some(item) => item.id.clone(),
        None => map.add_item(name),
    }
}

fn enrich_request(
    map: &QuadrantMap,
    item: &str,
    args: &MapArgs,
) -> Result<EnrichRequest, QuadrantError> {
    let (x_axis, y_axis) = map.active_axes()?;
    Ok(EnrichRequest {
        item_name: item.to_string(),
        domain_hint: map.item_by_name(item).and_then(|i| i.domain.clone()),
        x_axis: x_axis.clone(),
        y_axis: y_axis.clone(),
        peers: map.peers()?,
        constraints: args.constraints.clone(),
        requested_attributes: args.attributes.clone(),
    })
}

fn build_intent(
    cfg: &PipelineConfig,
    map: &QuadrantMap,
    kind: IntentKind,
    item: Option<&str>,
    args: &MapArgs,
) -> Result<Intent, Box<dyn std::error::Error>> {
    let (x_axis, y_axis) = map.active_axes().map_err(QuadrantError::from)?;
    let require_item =
        || item.ok_or_else(|| format!("--item is required for the {} intent", kind.as_str()));

    Ok(match kind {
        IntentKind::PositionEstimate => {
            pipeline::position_intent(cfg, require_item()?, x_axis, y_axis, &map.peers()?)
        }
        IntentKind::Enrich => {
            pipeline::enrich_intent(cfg, enrich_request(map, require_item()?, args)?)
        }
        IntentKind::SuggestCompetitor => pipeline::suggest_intent(
            cfg,
            &map.items,
            x_axis,
            y_axis,
            &args.constraints,
            &args.attributes,
        ),
    })
}
