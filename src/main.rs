//! CLI entry point for segment_curves.
//!
//! Provides subcommands for harvesting segment efforts from Strava,
//! validating them into cached datasets, and drawing grade/speed charts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use segment_curves::analyzers::aggregate::{CurvePlan, segment_curves};
use segment_curves::analyzers::analyzer::load_or_build;
use segment_curves::analyzers::cache;
use segment_curves::analyzers::smoothing::Curve;
use segment_curves::analyzers::types::PercentileBand;
use segment_curves::config::SegmentCatalog;
use segment_curves::infra::store::RawStore;
use segment_curves::infra::strava::{DEFAULT_THROTTLE, Harvester, MAX_PER_PAGE, StravaClient};
use segment_curves::output::{append_record, print_json, print_pretty, write_curve_csv};
use segment_curves::render::{Series, band_title, render_curves, render_diagnostics, rgb};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "segment_curves")]
#[command(about = "Grade/speed curves from Strava segment efforts", long_about = None)]
struct Cli {
    /// Segment catalog JSON (defaults to the built-in catalog)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download effort summaries and streams for a segment
    Fetch {
        /// Segment id
        segment: u64,

        /// Directory holding raw API payloads
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Efforts per summary page
        #[arg(long, default_value_t = MAX_PER_PAGE)]
        per_page: u64,

        /// Pause after every request, in seconds
        #[arg(long, default_value_t = DEFAULT_THROTTLE.as_secs_f64())]
        throttle_secs: f64,

        /// Access token (falls back to STRAVA_ACCESS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Validate fetched efforts into a cached dataset
    Prepare {
        /// Segment id (all configured segments when omitted)
        segment: Option<u64>,

        /// Directory holding raw API payloads
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory for the gzip CSV dataset cache
        #[arg(short, long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Only consider the first N effort summaries
        #[arg(long)]
        max_efforts: Option<usize>,

        /// CSV file to append ingest statistics to
        #[arg(short, long, default_value = "ingest_stats.csv")]
        stats: PathBuf,

        /// Rebuild even if a cache exists
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Draw per-segment and joint charts for every percentile band
    Charts {
        /// Directory holding raw API payloads
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory for the gzip CSV dataset cache
        #[arg(short, long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Directory to write charts and curve CSVs to
        #[arg(short, long, default_value = "charts")]
        out_dir: PathBuf,

        /// Kernel bandwidth, in percent grade
        #[arg(long, default_value_t = 1.0)]
        sigma: f64,

        /// Width of each percentile band
        #[arg(long, default_value_t = 10)]
        band_step: u8,

        /// Also draw the grade histogram and scatter per segment
        #[arg(long, default_value_t = false)]
        diagnostics: bool,
    },
    /// List configured segments
    Segments,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/segment_curves.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("segment_curves.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let catalog = match &cli.config {
        Some(path) => SegmentCatalog::load(path)?,
        None => SegmentCatalog::builtin()?,
    };

    match cli.command {
        Commands::Fetch {
            segment,
            data_dir,
            per_page,
            throttle_secs,
            token,
        } => {
            let token = match token {
                Some(token) => token,
                None => std::env::var("STRAVA_ACCESS_TOKEN")
                    .context("STRAVA_ACCESS_TOKEN must be set or --token given")?,
            };
            let throttle = Duration::try_from_secs_f64(throttle_secs)
                .with_context(|| format!("invalid throttle {throttle_secs}"))?;

            let api = StravaClient::new(&token)?;
            let store = RawStore::new(data_dir);
            let report = Harvester::new(&api, &store)
                .per_page(per_page)
                .throttle(throttle)
                .harvest(segment)
                .await?;

            if report.page_failures > 0 || report.stream_failures > 0 {
                warn!(
                    page_failures = report.page_failures,
                    stream_failures = report.stream_failures,
                    "Some requests failed; rerun to fill the gaps"
                );
            }
        }
        Commands::Prepare {
            segment,
            data_dir,
            cache_dir,
            max_efforts,
            stats,
            refresh,
        } => {
            let store = RawStore::new(data_dir);
            let segment_ids: Vec<u64> = match segment {
                Some(id) => vec![id],
                None => catalog.iter().map(|(id, _)| id).collect(),
            };

            for segment_id in segment_ids {
                let profile = catalog.get(segment_id)?;
                let (dataset, ingest) = load_or_build(
                    &store,
                    &cache_dir,
                    segment_id,
                    &profile.characteristics,
                    max_efforts,
                    refresh,
                )?;

                match ingest {
                    Some(ingest) => {
                        print_pretty(&ingest);
                        print_json(&ingest)?;
                        append_record(&stats, &ingest)?;
                    }
                    None => info!(
                        segment_id,
                        efforts = dataset.n_efforts(),
                        rows = dataset.len(),
                        "Dataset already cached; pass --refresh to rebuild"
                    ),
                }
            }
        }
        Commands::Charts {
            data_dir,
            cache_dir,
            out_dir,
            sigma,
            band_step,
            diagnostics,
        } => {
            let plan = CurvePlan {
                bands: PercentileBand::steps(band_step, 90),
                sigma,
                ..CurvePlan::default()
            };
            let store = RawStore::new(data_dir);
            draw_charts(&catalog, &store, &cache_dir, &out_dir, &plan, diagnostics)?;
        }
        Commands::Segments => {
            info!(total = catalog.len(), "Configured segments");
            for (segment_id, profile) in catalog.iter() {
                let c = &profile.characteristics;
                info!(
                    segment_id,
                    title = %profile.title,
                    color = %profile.color,
                    min_effort_rows = c.min_effort_rows,
                    min_avg_speed_kph = c.min_avg_speed_kph,
                    max_avg_speed_kph = c.max_avg_speed_kph,
                    max_censoring = c.max_censoring,
                    "Segment"
                );
            }
        }
    }

    Ok(())
}

/// Smooths every configured segment that has data and writes, per band, one
/// chart and curve CSV per segment plus a joint chart of all of them.
#[tracing::instrument(skip(catalog, store, plan), fields(bands = plan.bands.len(), sigma = plan.sigma))]
fn draw_charts(
    catalog: &SegmentCatalog,
    store: &RawStore,
    cache_dir: &Path,
    out_dir: &Path,
    plan: &CurvePlan,
    diagnostics: bool,
) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let mut curves: BTreeMap<u64, Vec<(PercentileBand, Curve)>> = BTreeMap::new();
    for (segment_id, profile) in catalog.iter() {
        let span = tracing::info_span!("segment", segment_id, title = %profile.title);
        let _enter = span.enter();

        if !cache::exists(cache_dir, segment_id) && !store.has_summaries(segment_id) {
            warn!("No cached dataset and no fetched efforts, skipping segment");
            continue;
        }

        let (dataset, ingest) = match load_or_build(
            store,
            cache_dir,
            segment_id,
            &profile.characteristics,
            None,
            false,
        ) {
            Ok(loaded) => loaded,
            Err(e) => {
                error!(error = %e, "Failed to load dataset");
                continue;
            }
        };
        if let Some(ingest) = ingest {
            print_json(&ingest)?;
        }
        if dataset.is_empty() {
            warn!("Dataset is empty, curves will be blank");
        }

        if diagnostics {
            let path = out_dir.join(format!("histogram_and_scatter.{segment_id}.svg"));
            render_diagnostics(&path, &profile.title, dataset.rows(), rgb(profile.rgb()?))?;
        }

        info!(efforts = dataset.n_efforts(), rows = dataset.len(), "Smoothing bands");
        curves.insert(segment_id, segment_curves(&dataset, plan));
    }

    if curves.is_empty() {
        warn!("No segment had data; nothing to draw");
        return Ok(());
    }

    for (k, band) in plan.bands.iter().enumerate() {
        let mut joint = Vec::with_capacity(curves.len());

        for (&segment_id, segment) in &curves {
            let profile = catalog.get(segment_id)?;
            let (_, curve) = &segment[k];
            let series = Series {
                label: &profile.title,
                curve,
                color: rgb(profile.rgb()?),
            };

            let stem = format!("grade_velocity_line.{band}.{segment_id}");
            write_curve_csv(&out_dir.join(format!("{stem}.csv")), curve)?;
            render_curves(
                &out_dir.join(format!("{stem}.svg")),
                &band_title(&[profile.title.as_str()], *band),
                std::slice::from_ref(&series),
            )?;
            joint.push(series);
        }

        let names: Vec<&str> = joint.iter().map(|s| s.label).collect();
        render_curves(
            &out_dir.join(format!("grade_velocity_line.{band}.all.svg")),
            &band_title(&names, *band),
            &joint,
        )?;
        info!(%band, "Band charts written");
    }

    info!(out_dir = %out_dir.display(), "Finished drawing charts");
    Ok(())
}
