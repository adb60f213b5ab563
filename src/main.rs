mod api_types;
mod budget;
mod composer;
mod compress;
mod config;
mod corpus;
mod embeddings;
mod error;
mod lock;
mod models;
mod orchestrator;
mod out_models;
mod parse;
mod prompts;
mod queue;
mod render;
mod seeds;
mod selector;
mod similarity;
mod store;

use anyhow::Result;
use awful_aj::{config as aj_config, template};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::compress::AwfulJadeProvider;
use crate::config::{load_planner_config, PlannerConfig};
use crate::corpus::{CorpusProvider, DirectoryCorpus};
use crate::embeddings::HttpEmbeddings;
use crate::error::PlannerError;
use crate::lock::SchedulerLock;
use crate::orchestrator::Planner;
use crate::queue::{QueueMutation, QueueStateMachine};
use crate::render::{render_draft_markdown, render_outcome_markdown, render_queue_markdown};
use crate::selector::SelectOptions;
use crate::store::FileQueueRepository;

/// Channel Planner - plans a weekly post queue from channel history
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to awful_aj config file (overrides AJ_CONFIG environment variable)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Path to planner tuning YAML (weights, caps, timezone, embedding model)
    #[arg(long, global = true)]
    planner_config: Option<PathBuf>,

    /// Corpus root containing own/ and similar/ JSON exports
    #[arg(long, global = true, default_value = "data/posts")]
    posts: PathBuf,

    /// Where the latest queue is persisted
    #[arg(long, global = true, default_value = "out/queue.json")]
    queue_file: PathBuf,

    /// Advisory lock held while regenerating
    #[arg(long, global = true, default_value = "out/planner.lock")]
    lock_file: PathBuf,

    /// Print JSON instead of markdown
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug, Default)]
struct GenerationArgs {
    /// Do not exclude the current queue's topics
    #[arg(long)]
    no_avoid: bool,

    /// Extra topics to avoid
    #[arg(long = "avoid")]
    avoid: Vec<String>,

    /// Evidence must mention at least one of these
    #[arg(long = "must-have")]
    must_have: Vec<String>,

    /// Evidence mentioning any of these is dropped
    #[arg(long = "exclude")]
    exclude: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate the queue and persist it
    Generate(GenerationArgs),
    /// Preview a regenerated queue without saving
    Suggest(GenerationArgs),
    /// Print the current queue
    Show,
    /// Replace the queue topics (list of args, or one JSON/newline-separated arg)
    Replace { topics: Vec<String> },
    /// Swap two 1-based positions
    Swap { from: usize, to: usize },
    /// Remove one 1-based position
    Remove { index: usize },
    /// Draft the post for a 1-based position
    Draft { rank: usize },
}

fn resolve_paths() -> Result<(PathBuf, PathBuf, PathBuf)> {
    // 1) Base config dir — prefer env override, else awful_aj::config_dir()
    let base_dir = if let Ok(dir) = std::env::var("AJ_CONFIG_DIR") {
        PathBuf::from(dir)
    } else {
        awful_aj::config_dir().map_err(|e| anyhow::anyhow!(e.to_string()))?
    };

    // 2) Config file — prefer AJ_CONFIG, else <base>/config.yaml
    let cfg_path = if let Ok(p) = std::env::var("AJ_CONFIG") {
        PathBuf::from(p)
    } else {
        base_dir.join("config.yaml")
    };

    // 3) Template dir — prefer AJ_TEMPLATE_DIR, else <base>/templates
    let tpl_dir = if let Ok(p) = std::env::var("AJ_TEMPLATE_DIR") {
        PathBuf::from(p)
    } else {
        let d = base_dir.join("templates");
        // make it visible to awful_aj::template loader
        std::env::set_var("AJ_TEMPLATE_DIR", &d);
        d
    };

    Ok((base_dir, cfg_path, tpl_dir))
}

fn fail(e: PlannerError) -> anyhow::Error {
    error!("Operation failed - code={}, retryable={}, error={}", e.code(), e.is_retryable(), e);
    anyhow::anyhow!("{}: {}", e.code(), e)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_planner(args: &Args, planner_cfg: &PlannerConfig, state: Arc<QueueStateMachine>) -> Result<Planner> {
    let cfg_path = if let Some(ref config_path) = args.config {
        debug!("Using config file from --config argument: {}", config_path);
        PathBuf::from(config_path)
    } else {
        let (_base_dir, cfg_path, _tpl_dir) = resolve_paths()?;
        debug!("Using config file from environment/default: {}", cfg_path.display());
        cfg_path
    };

    // Friendlier error if missing
    if !cfg_path.exists() {
        return Err(anyhow::anyhow!(
            "awful_aj config not found at {}\n\
             Use --config to specify a config file, or set AJ_CONFIG environment variable.\n\
             Example config.yaml:\n\
             api_key: \"YOUR_KEY\"\napi_base: \"http://localhost:5001/v1\"\nmodel: \"qwen3_30b_a3\"\n",
            cfg_path.display()
        ));
    }

    let cfg = aj_config::load_config(
        cfg_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
    )
    .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if cfg.api_key.trim().is_empty() {
        return Err(fail(PlannerError::MissingApiKey));
    }

    let tpl_name = std::env::var("AJ_TEMPLATE_PLANNER").unwrap_or_else(|_| "channel_planner".to_string());
    let tpl = template::load_template(&tpl_name)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let embeddings = HttpEmbeddings::new(&cfg.api_base, &cfg.api_key, &planner_cfg.embeddings)?;
    let posts = DirectoryCorpus::new(&args.posts).load_posts().map_err(fail)?;
    let generator = Arc::new(AwfulJadeProvider::new(cfg, tpl));

    Ok(Planner::new(posts, planner_cfg, generator, Arc::new(embeddings), state))
}

fn select_options(g: &GenerationArgs) -> SelectOptions {
    SelectOptions {
        must_have_keywords: g.must_have.clone(),
        exclude_keywords: g.exclude.clone(),
        ..SelectOptions::default()
    }
}

async fn avoid_list(planner: &Planner, g: &GenerationArgs) -> Vec<String> {
    let mut avoid = if g.no_avoid { Vec::new() } else { planner.current_topics().await };
    avoid.extend(g.avoid.iter().cloned());
    avoid
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("Starting channel_planner - queue_file={}", args.queue_file.display());

    let planner_cfg = load_planner_config(args.planner_config.as_deref())?;
    let repo = Arc::new(FileQueueRepository::new(&args.queue_file));
    let state = Arc::new(QueueStateMachine::new(repo, planner_cfg.queue.clone())?);

    match &args.command {
        Command::Generate(g) => {
            let _lock = SchedulerLock::acquire(&args.lock_file)?;
            let planner = build_planner(&args, &planner_cfg, state.clone())
                .await?
                .with_select_options(select_options(g));
            let avoid = avoid_list(&planner, g).await;
            let out = planner.generate_and_save(&avoid).await.map_err(fail)?;
            if args.json { print_json(&out)? } else { print!("{}", render_outcome_markdown(&out)) }
        }
        Command::Suggest(g) => {
            let planner = build_planner(&args, &planner_cfg, state.clone())
                .await?
                .with_select_options(select_options(g));
            let avoid = avoid_list(&planner, g).await;
            let out = planner.suggest(&avoid).await.map_err(fail)?;
            if args.json { print_json(&out)? } else { print!("{}", render_outcome_markdown(&out)) }
        }
        Command::Draft { rank } => {
            let planner = build_planner(&args, &planner_cfg, state.clone()).await?;
            let draft = planner.draft(*rank).await.map_err(fail)?;
            if args.json { print_json(&draft)? } else { print!("{}", render_draft_markdown(&draft)) }
        }
        Command::Show => {
            let q = state.load().await.map_err(fail)?;
            if args.json { print_json(&q)? } else { print!("{}", render_queue_markdown(&q)) }
        }
        Command::Replace { topics } => {
            let q = match topics.as_slice() {
                [single] => state.replace_text(single).await,
                many => state.apply(QueueMutation::Replace(many.to_vec())).await,
            }
            .map_err(fail)?;
            if args.json { print_json(&q)? } else { print!("{}", render_queue_markdown(&q)) }
        }
        Command::Swap { from, to } => {
            let q = state.apply(QueueMutation::Swap { from: *from, to: *to }).await.map_err(fail)?;
            if args.json { print_json(&q)? } else { print!("{}", render_queue_markdown(&q)) }
        }
        Command::Remove { index } => {
            let q = state.apply(QueueMutation::Remove { index: *index }).await.map_err(fail)?;
            if args.json { print_json(&q)? } else { print!("{}", render_queue_markdown(&q)) }
        }
    }

    Ok(())
}
