// modcurator CLI: curate, inspect, audit, and download

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mod_curator::curator::{
    audit, AuditEntry, CachedCuration, CancelFlag, CuratedMod, CurationCache, CurationConfig,
    CurationEngine, CuratorError, DownloadStatus, OriginFlag,
};
use mod_curator::sources::{PlainHttpSession, RestCatalogSource, ScrapedCatalogSource, SourceSet};

#[derive(Parser, Debug)]
#[clap(
    name = "modcurator",
    about = "Curates top mods across catalogs, resolves dependencies, downloads artifacts",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Log filter, e.g. "info" or "mod_curator=debug" (RUST_LOG also works)
    #[clap(long, global = true)]
    log: Option<String>,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Target platform version, e.g. 1.21.1
    #[clap(long)]
    game_version: String,

    /// Target loader, e.g. fabric
    #[clap(long)]
    loader: String,

    /// Cache directory (defaults to the platform cache dir)
    #[clap(long)]
    cache_dir: Option<PathBuf>,
}

impl TargetArgs {
    fn cache(&self) -> CurationCache {
        CurationCache::new(
            self.cache_dir
                .clone()
                .unwrap_or_else(CurationCache::default_dir),
        )
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full curation pass and cache the result
    Curate {
        #[clap(flatten)]
        target: TargetArgs,

        /// Size of the curated list
        #[clap(long, default_value_t = 100)]
        limit: usize,

        /// Scan this multiple of --limit per source before merging
        #[clap(long, default_value_t = 5)]
        scan_multiplier: usize,

        /// Required-dependency resolution depth
        #[clap(long, default_value_t = 3)]
        max_depth: u8,

        /// Skip the shared-optional-dependency audit
        #[clap(long)]
        no_optional_audit: bool,

        /// Base URL of the scraped catalog; omit to curate from the REST
        /// catalog alone
        #[clap(long)]
        scraped_url: Option<String>,
    },

    /// Print the cached curation for a version + loader
    Show {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Print shared optional dependencies from the cached audit
    Audit {
        #[clap(flatten)]
        target: TargetArgs,
    },

    /// Download the cached curation's artifacts
    Download {
        #[clap(flatten)]
        target: TargetArgs,

        /// Destination directory
        #[clap(long)]
        dest: PathBuf,

        /// Per-artifact size ceiling in megabytes
        #[clap(long, default_value_t = 50)]
        max_artifact_mb: u64,

        /// Concurrent fetches
        #[clap(long, default_value_t = 4)]
        concurrency: usize,

        #[clap(long)]
        scraped_url: Option<String>,
    },
}

fn init_tracing(log: Option<&str>) {
    let filter = match log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_sources(scraped_url: Option<&str>) -> SourceSet {
    let client = reqwest::Client::new();
    let mut sources = SourceSet::default();
    sources.push(Arc::new(RestCatalogSource::new(client.clone())));
    if let Some(url) = scraped_url {
        let session = Arc::new(PlainHttpSession::new(client));
        sources.push(Arc::new(ScrapedCatalogSource::new(session, url)));
    }
    sources
}

/// Cancel the flag on the first ctrl-c
fn watch_for_interrupt(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight work");
            cancel.cancel();
        }
    });
}

fn origin_label(origin: OriginFlag) -> &'static str {
    match origin {
        OriginFlag::TopDownloaded => "top",
        OriginFlag::RequiredDependency => "required",
        OriginFlag::Both => "both",
    }
}

fn print_mods(mods: &[CuratedMod]) {
    for (rank, entry) in mods.iter().enumerate() {
        println!(
            "{:>4}. {:<40} {:>12}  [{}]",
            rank + 1,
            entry.name,
            entry.downloads,
            origin_label(entry.origin)
        );
        if !entry.required_deps.is_empty() {
            let deps: Vec<&str> = entry.required_deps.iter().map(String::as_str).collect();
            println!("      requires: {}", deps.join(", "));
        }
    }
}

/// Cached curation and audit map for a target, read in one pass, or a
/// hint to run `curate` first
fn load_cached(
    target: &TargetArgs,
) -> Result<(CachedCuration, BTreeMap<String, AuditEntry>), CuratorError> {
    let (cached, audit_map) = target.cache().load(&target.game_version, &target.loader)?;
    let cached = cached.ok_or_else(|| {
        CuratorError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!(
                "no cached curation for {} / {}; run `modcurator curate` first",
                target.game_version, target.loader
            ),
        ))
    })?;
    Ok((cached, audit_map.unwrap_or_default()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    if let Err(e) = run(cli.command).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), CuratorError> {
    match command {
        Command::Curate {
            target,
            limit,
            scan_multiplier,
            max_depth,
            no_optional_audit,
            scraped_url,
        } => {
            let mut config =
                CurationConfig::new(target.game_version.as_str(), target.loader.as_str());
            config.limit = limit;
            config.scan_multiplier = scan_multiplier;
            config.max_depth = max_depth;
            config.include_optional_audit = !no_optional_audit;

            let engine = CurationEngine::new(
                build_sources(scraped_url.as_deref()),
                target.cache(),
                config,
            );
            watch_for_interrupt(engine.cancel_flag());

            let outcome = engine.curate().await?;

            for (kind, detail) in &outcome.source_failures {
                warn!(source = %kind, detail = %detail, "source failed during the scan");
            }
            if let Some(detail) = &outcome.cache_write_error {
                warn!(detail = %detail, "result was not cached");
            }
            print_mods(&outcome.mods);
            info!(
                mods = outcome.mods.len(),
                required = outcome.required_dep_count,
                skipped_libraries = outcome.skipped_libraries,
                "curation finished"
            );
            if !outcome.findings.is_empty() {
                println!("\nshared optional dependencies:");
                for finding in &outcome.findings {
                    println!(
                        "  {} (wanted by {} selected mods)",
                        finding.dependency_id, finding.selected_requesters
                    );
                }
            }
        }

        Command::Show { target } => {
            let (cached, _) = load_cached(&target)?;
            println!(
                "curated {} for {} / {} at {}",
                cached.mods.len(),
                cached.game_version,
                cached.loader,
                cached.generated_at
            );
            print_mods(&cached.mods);
        }

        Command::Audit { target } => {
            let (cached, audit_map) = load_cached(&target)?;
            let selected = cached
                .mods
                .iter()
                .filter_map(|m| m.primary_id().map(|(_, id)| id.to_string()))
                .collect();

            let findings = audit::audit(&audit_map, &selected);
            if findings.is_empty() {
                println!("no optional dependency is shared by two selected mods");
            }
            for finding in findings {
                println!(
                    "{} wanted by {} of: {}",
                    finding.dependency_id,
                    finding.selected_requesters,
                    finding.requested_by.join(", ")
                );
            }
        }

        Command::Download {
            target,
            dest,
            max_artifact_mb,
            concurrency,
            scraped_url,
        } => {
            let (cached, _) = load_cached(&target)?;
            let engine = CurationEngine::new(
                build_sources(scraped_url.as_deref()),
                target.cache(),
                CurationConfig::new(target.game_version.as_str(), target.loader.as_str()),
            );
            watch_for_interrupt(engine.cancel_flag());

            let outcomes = engine
                .download(&cached.mods, &dest, max_artifact_mb, concurrency)
                .await?;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.status {
                    DownloadStatus::Downloaded { path, bytes } => {
                        println!("ok   {:<40} {} ({} bytes)", outcome.name, path.display(), bytes)
                    }
                    DownloadStatus::Failed(reason) => {
                        failed += 1;
                        println!("fail {:<40} {}", outcome.name, reason);
                    }
                    DownloadStatus::Skipped => println!("skip {:<40} cancelled", outcome.name),
                }
            }
            info!(
                total = outcomes.len(),
                failed,
                dest = %dest.display(),
                "download finished"
            );
        }
    }
    Ok(())
}
