use anyhow::{bail, Context, Result};
use clap::Parser;
use onestop::graph::EntityGraph;
use onestop::ingest::{ingest_feed, FeedRecord, IngestOptions, Ingested};
use onestop::serialize::Profile;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

mod output;

use output::{is_done, mark_done, write_feed_documents};

#[derive(Parser, Debug)]
#[command(
    name = "onestop-summary",
    author,
    version,
    about = "Build Onestop documents for a transit feed",
    long_about = "Reads a feed's stop, route and operator records (JSON), assigns Onestop \
                  identifiers to every entity, and writes the feed summary plus one \
                  document per operator, named by Onestop id.\n\n\
                  Stops sharing an identifier are merged; routes of one operator whose \
                  identifiers collide are given a ~N suffix."
)]
struct Args {
    /// Input feed record file (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for the feed and operator documents
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Feed name (defaults to the name in the input file)
    #[arg(long)]
    feed_name: Option<String>,

    /// Retrieval location recorded on the feed
    #[arg(long)]
    url: Option<String>,

    /// Write flat storage objects instead of GeoJSON interchange documents
    #[arg(long)]
    storage: bool,

    /// Leave relation arrays out of storage objects
    #[arg(long, requires = "storage")]
    without_relations: bool,

    /// Rebuild even if the output directory is already marked done
    #[arg(long)]
    force: bool,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn profile(&self) -> Profile {
        if self.storage {
            Profile::Storage {
                relations: !self.without_relations,
            }
        } else {
            Profile::Interchange
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    log::info!("=== Onestop Summary ===");
    log::info!("Input: {}", args.input.display());
    log::info!("Output: {}", args.output_dir.display());

    run(&args)
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        bail!("Input file does not exist: {}", args.input.display());
    }
    if is_done(&args.output_dir) && !args.force {
        log::info!("Output already marked done, skipping (use --force to rebuild)");
        return Ok(());
    }
    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory {}", args.output_dir.display())
    })?;

    // Phase 1: Read records
    log::info!("");
    log::info!("Phase 1: Reading feed records...");
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mut record: FeedRecord =
        serde_json::from_slice(&bytes).context("Failed to parse feed records")?;
    if let Some(name) = &args.feed_name {
        record.name = name.clone();
    }
    if record.content_hash.is_none() {
        record.content_hash = Some(hex::encode(Sha256::digest(&bytes)));
    }
    log::info!(
        "  {} stops, {} operators, {} routes",
        record.stops.len(),
        record.operators.len(),
        record.operators.iter().map(|o| o.routes.len()).sum::<usize>()
    );

    // Phase 2: Build the entity graph
    log::info!("");
    log::info!("Phase 2: Assigning Onestop identifiers...");
    let options = IngestOptions {
        url: args.url.clone(),
        ..IngestOptions::default()
    };
    let mut graph = EntityGraph::new();
    let Ingested { feed, report } =
        ingest_feed(&mut graph, &record, &options).context("Failed to build feed graph")?;

    log::info!(
        "  {} stops ({} merged), {} routes ({} disambiguated), {} operators",
        report.stops_created,
        report.stops_merged,
        report.routes_created,
        report.routes_disambiguated,
        report.operators_created
    );
    for skipped in &report.skipped {
        log::warn!("  Skipped {} {}: {}", skipped.kind, skipped.source, skipped.reason);
    }
    let Some(feed) = feed else {
        bail!("No operator in {} could be located", args.input.display());
    };

    // Phase 3: Write documents
    log::info!("");
    log::info!("Phase 3: Writing documents...");
    let written = write_feed_documents(&graph, feed, args.profile(), &args.output_dir)
        .context("Failed to write feed documents")?;
    mark_done(&args.output_dir)?;

    log::info!("");
    log::info!("Feed: {}", graph.onestop(feed)?);
    for operator in graph.operators(feed) {
        log::info!("  {} {}", graph.get(operator).name(), graph.onestop(operator)?);
    }
    log::info!("Wrote {} documents. Done!", written.len());

    Ok(())
}
