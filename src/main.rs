use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use track_recommender::catalog::DEFAULT_TABLE;
use track_recommender::models::{ErrorResponse, RecommendResponse};
use track_recommender::neighbors::IndexKind;
use track_recommender::progress::{format_duration, set_log_only};
use track_recommender::{Mood, RecommendError, RecommendRequest, Recommendation, Recommender, RecommenderConfig};

#[derive(Parser)]
#[command(name = "track-recommender")]
#[command(about = "Recommend tracks from a feature catalog by similarity or mood")]
struct Args {
    /// Track dataset (.csv, or .sqlite/.sqlite3/.db)
    dataset: PathBuf,

    /// Table to read from SQLite datasets
    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// TOML file with recommender settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and log progress lines instead
    #[arg(long)]
    log_only: bool,

    /// Write catalog load statistics as JSON
    #[arg(long)]
    stats_out: Option<PathBuf>,

    #[arg(long)]
    index: Option<IndexArg>,

    #[arg(long)]
    candidates: Option<usize>,

    #[arg(long)]
    max_results: Option<usize>,

    #[arg(long)]
    popularity_threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tracks similar to the given liked / recently played ids
    Similar {
        /// Liked track ids (comma-separated or repeated)
        #[arg(long, value_delimiter = ',')]
        top: Vec<String>,

        /// Recently played track ids (comma-separated or repeated)
        #[arg(long, value_delimiter = ',')]
        recent: Vec<String>,
    },
    /// Tracks matching a mood
    Mood { mood: String },
    /// List supported moods and their feature targets
    Moods,
    /// Answer newline-delimited JSON requests from stdin
    ServeStdin,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexArg {
    BallTree,
    BruteForce,
}

impl From<IndexArg> for IndexKind {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::BallTree => IndexKind::BallTree,
            IndexArg::BruteForce => IndexKind::BruteForce,
        }
    }
}

#[derive(Serialize)]
struct MoodListing {
    mood: Mood,
    targets: Vec<(&'static str, f64)>,
}

fn build_config(args: &Args) -> Result<RecommenderConfig> {
    let mut config = match &args.config {
        Some(path) => RecommenderConfig::load(path)?,
        None => RecommenderConfig::default(),
    };
    if let Some(index) = args.index {
        config.index = index.into();
    }
    if let Some(candidates) = args.candidates {
        config.candidate_count = candidates;
    }
    if let Some(max_results) = args.max_results {
        config.max_results = max_results;
    }
    if let Some(threshold) = args.popularity_threshold {
        config.popularity_threshold = threshold;
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn print_outcome(outcome: &Result<Recommendation, RecommendError>) -> Result<()> {
    match outcome {
        Ok(rec) => print_json(&RecommendResponse::from(rec.clone())),
        Err(e) => print_json(&ErrorResponse::from(e)),
    }
}

fn print_moods() -> Result<()> {
    let listing: Vec<MoodListing> = Mood::ALL
        .iter()
        .map(|&mood| MoodListing {
            mood,
            targets: mood.profile().to_vec(),
        })
        .collect();
    print_json(&listing)
}

fn serve_stdin(recommender: &Recommender) -> Result<()> {
    let stdin = std::io::stdin();
    let mut served = 0usize;
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RecommendRequest>(&line) {
            Ok(request) => print_outcome(&recommender.handle(&request))?,
            Err(e) => print_json(&ErrorResponse {
                error: format!("malformed request: {}", e),
                code: "invalid_request",
            })?,
        }
        served += 1;
    }
    info!("Served {} requests", served);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let config = build_config(&args)?;

    if matches!(args.command, Command::Moods) {
        return print_moods();
    }

    let start = Instant::now();
    let (recommender, stats) = Recommender::load(&args.dataset, &args.table, config);
    if let Some(stats) = &stats {
        if args.log_only {
            stats.log_phase("load");
        }
        if let Some(path) = &args.stats_out {
            stats
                .write_to_file(path)
                .with_context(|| format!("Failed to write stats to {:?}", path))?;
        }
        info!(
            "Loaded {} of {} rows ({:.1}%) in {}",
            stats.tracks_kept,
            stats.rows_read,
            stats.keep_rate(),
            format_duration(start.elapsed())
        );
    }

    let outcome = match &args.command {
        Command::Similar { top, recent } => {
            recommender.recommend_by_similarity(top.as_slice(), recent.as_slice())
        }
        Command::Mood { mood } => recommender.recommend_by_mood(mood),
        Command::ServeStdin => return serve_stdin(&recommender),
        Command::Moods => return print_moods(),
    };

    print_outcome(&outcome)?;
    if outcome.is_err() {
        std::process::exit(1);
    }
    Ok(())
}
