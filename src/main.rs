use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use prospect_metrics::cache::PayloadCache;
use prospect_metrics::config::MetricsConfig;
use prospect_metrics::export::ExportFormat;
use prospect_metrics::models::{ProspectStatus, ProspectUpdate};
use prospect_metrics::reports::{self, Dataset, ReportContext, ReportKind};
use prospect_metrics::source::{self, PayloadKind, Payloads, ReportFilters};
use prospect_metrics::timeseries::Granularity;
use prospect_metrics::{db, export, listing, markdown};

#[derive(Parser)]
#[command(name = "prospect-metrics")]
#[command(about = "Enrollment pipeline metrics for prospect dashboards", long_about = None)]
struct Cli {
    /// TOML file overriding report sizes, thresholds and cache TTLs
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo prospects, interactions, tests and advisories
    Seed,
    /// Import prospects from a CSV file, updating existing emails
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List prospects
    List {
        /// Case-insensitive match on name, document number or email
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        files: PayloadFiles,
    },
    /// Edit a prospect's contact details or pipeline status
    Update {
        id: Uuid,
        /// Any funnel status, in Spanish or English spelling
        #[arg(long)]
        status: Option<ProspectStatus>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Show one prospect's interactions, tests and advisories
    History {
        id: Uuid,
        #[command(flatten)]
        files: PayloadFiles,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
    /// Build a metrics report
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Bucket size for the trends report
        #[arg(long, value_enum, default_value_t = Granularity::Month)]
        granularity: Granularity,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        files: PayloadFiles,
    },
    /// Write a raw report payload from the database to disk as JSON or CSV
    Export {
        #[arg(value_enum)]
        kind: PayloadKind,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Refresh a report on an interval until interrupted
    Watch {
        #[arg(value_enum, default_value_t = ReportKind::Kpis)]
        kind: ReportKind,
        /// Seconds between refreshes; defaults to the configured interval
        #[arg(long)]
        every: Option<u64>,
        #[arg(long, value_enum, default_value_t = Granularity::Month)]
        granularity: Granularity,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        files: PayloadFiles,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

#[derive(Args, Clone, Debug, Default)]
struct FilterArgs {
    /// Only records from the last N days
    #[arg(long, conflicts_with = "start_date")]
    since_days: Option<i64>,
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    end_date: Option<NaiveDate>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    channel: Option<String>,
    #[arg(long)]
    status: Option<String>,
}

impl FilterArgs {
    fn to_filters(&self, today: NaiveDate) -> ReportFilters {
        ReportFilters {
            start_date: self.start_date,
            end_date: self.end_date,
            city: self.city.clone(),
            channel: self.channel.clone(),
            status: self.status.clone(),
            prospect_id: None,
        }
        .with_since_days(self.since_days, today)
    }
}

/// Saved payload files. Any payload without a file is read from the
/// database.
#[derive(Args, Clone, Debug, Default)]
struct PayloadFiles {
    #[arg(long, value_name = "FILE")]
    prospects: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    interactions: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    tests: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    advisories: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    channels: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    cities: Option<PathBuf>,
    #[arg(long, value_name = "FILE")]
    conversions: Option<PathBuf>,
}

impl PayloadFiles {
    fn path(&self, kind: PayloadKind) -> Option<&Path> {
        match kind {
            PayloadKind::Prospects => self.prospects.as_deref(),
            PayloadKind::Interactions => self.interactions.as_deref(),
            PayloadKind::Tests => self.tests.as_deref(),
            PayloadKind::Advisories => self.advisories.as_deref(),
            PayloadKind::Channels => self.channels.as_deref(),
            PayloadKind::Geographic => self.cities.as_deref(),
            PayloadKind::Conversions => self.conversions.as_deref(),
        }
    }
}

async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Resolves payloads from files first, then from the database. The pool is
/// opened on first use so file-only runs never need one.
struct PayloadSource {
    files: PayloadFiles,
    database_url: Option<String>,
    pool: Option<PgPool>,
}

impl PayloadSource {
    fn new(files: PayloadFiles, database_url: Option<String>) -> Self {
        Self {
            files,
            database_url,
            pool: None,
        }
    }

    async fn pool(&mut self) -> anyhow::Result<&PgPool> {
        if self.pool.is_none() {
            let url = self
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set, or pass payload files")?;
            self.pool = Some(connect(url).await?);
        }
        self.pool.as_ref().context("database pool unavailable")
    }

    async fn fetch(
        &mut self,
        kinds: &[PayloadKind],
        filters: &ReportFilters,
        generated_at: NaiveDateTime,
    ) -> anyhow::Result<Payloads> {
        let mut payloads = Payloads::default();
        for &kind in kinds {
            if let Some(path) = self.files.path(kind) {
                payloads.insert(kind, source::load_payload(path, kind)?);
            } else if kind.is_record_level() {
                let pool = self.pool().await?;
                let payload = db::fetch_payload(pool, kind, filters, generated_at)
                    .await
                    .with_context(|| format!("failed to load {} payload", kind.report_type()))?;
                payloads.insert(kind, payload);
            }
        }
        info!(kinds = payloads.kinds().count(), "payloads loaded");
        Ok(payloads)
    }
}

/// Attribute filters tie activity back to prospects, so those need loading
/// even for reports that never show them.
fn report_payloads(kind: ReportKind, filters: &ReportFilters) -> Vec<PayloadKind> {
    let mut kinds = kind.required_payloads().to_vec();
    if filters.narrows_prospects() && !kinds.contains(&PayloadKind::Prospects) {
        kinds.push(PayloadKind::Prospects);
    }
    kinds.extend(kind.aggregate_payload());
    kinds
}

fn render_overview(
    overview: &reports::Overview,
    format: OutputFormat,
    filters: &ReportFilters,
    generated_at: NaiveDateTime,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(overview).context("failed to serialize report")
        }
        OutputFormat::Markdown => Ok(markdown::render(overview, filters, generated_at)),
    }
}

fn emit(output: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => println!("{output}"),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug,sqlx=warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = MetricsConfig::load_or_default(cli.config.as_deref())?;
    let generated_at = Utc::now().naive_utc();
    let today = generated_at.date();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(require_url(cli.database_url.as_deref())?).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(require_url(cli.database_url.as_deref())?).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(require_url(cli.database_url.as_deref())?).await?;
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} prospects from {}.", csv.display());
        }
        Commands::List {
            search,
            page,
            limit,
            filters,
            files,
        } => {
            let filters = filters.to_filters(today);
            let mut source = PayloadSource::new(files, cli.database_url);
            let payloads = source
                .fetch(&[PayloadKind::Prospects], &filters, generated_at)
                .await?;
            let dataset = Dataset::from_payloads(&payloads).filtered(&filters);
            let result = listing::page(&dataset.prospects, search.as_deref(), page, limit);

            if result.total == 0 {
                println!("No prospects match these filters.");
                return Ok(());
            }

            println!(
                "{} prospects (page {} of {}):",
                result.total, result.page, result.total_pages
            );
            for prospect in &result.prospects {
                println!(
                    "- {} <{}> {} / {}: {} (registered {})",
                    prospect.name.as_deref().unwrap_or("Unnamed"),
                    prospect.email.as_deref().unwrap_or("no email"),
                    prospect.city,
                    prospect.channel,
                    prospect.status_label,
                    prospect
                        .registered_at
                        .map(|at| at.date().to_string())
                        .unwrap_or_else(|| "unknown".to_string())
                );
            }
        }
        Commands::Update {
            id,
            status,
            name,
            email,
            phone,
            city,
            channel,
        } => {
            let update = ProspectUpdate {
                name,
                email,
                phone,
                city,
                channel,
                status,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update: pass --status or a contact field");
            }
            let pool = connect(require_url(cli.database_url.as_deref())?).await?;
            if db::update_prospect(&pool, id, &update).await? {
                println!("Prospect {id} updated.");
            } else {
                anyhow::bail!("no prospect with id {id}");
            }
        }
        Commands::History { id, files, format } => {
            let filters = ReportFilters {
                prospect_id: Some(id),
                ..Default::default()
            };
            let mut source = PayloadSource::new(files, cli.database_url);
            let payloads = source
                .fetch(
                    ReportKind::Kpis.required_payloads(),
                    &filters,
                    generated_at,
                )
                .await?;
            let dataset = Dataset::from_payloads(&payloads);
            let history = reports::history::build(
                &id.to_string(),
                &dataset.prospects,
                &dataset.interactions,
                &dataset.tests,
                &dataset.advisories,
            );

            let output = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&history)?,
                OutputFormat::Markdown => markdown::render_history(&history),
            };
            println!("{output}");
        }
        Commands::Report {
            kind,
            format,
            out,
            granularity,
            filters,
            files,
        } => {
            let filters = filters.to_filters(today);
            let mut source = PayloadSource::new(files, cli.database_url);
            let payloads = source
                .fetch(&report_payloads(kind, &filters), &filters, generated_at)
                .await?;
            let dataset = Dataset::from_payloads(&payloads).filtered(&filters);
            let overview = reports::build(
                kind,
                &dataset,
                &config,
                ReportContext { today, granularity },
            );
            let output = render_overview(&overview, format, &filters, generated_at)?;
            emit(&output, out.as_deref())?;
        }
        Commands::Export {
            kind,
            format,
            out,
            filters,
        } => {
            let filters = filters.to_filters(today);
            let pool = connect(require_url(cli.database_url.as_deref())?).await?;
            let payload = db::fetch_payload(&pool, kind, &filters, generated_at).await?;
            let path =
                out.unwrap_or_else(|| export::default_file_name(kind, format, generated_at));
            let records = export::write(&path, &payload, format)?;
            println!("Exported {records} records to {}.", path.display());
        }
        Commands::Watch {
            kind,
            every,
            granularity,
            filters,
            files,
        } => {
            let filters = filters.to_filters(today);
            let period = every
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.refresh_interval());
            let mut source = PayloadSource::new(files, cli.database_url);
            watch(kind, granularity, &filters, period, &config, &mut source).await;
        }
    }

    Ok(())
}

fn require_url(database_url: Option<&str>) -> anyhow::Result<&str> {
    database_url.context("DATABASE_URL must be set to a Postgres instance")
}

async fn refresh(
    kind: ReportKind,
    granularity: Granularity,
    filters: &ReportFilters,
    config: &MetricsConfig,
    source: &mut PayloadSource,
    cache: &mut PayloadCache,
) -> anyhow::Result<String> {
    let now = Instant::now();
    let generated_at = Utc::now().naive_utc();
    cache.evict_stale(now);

    let payloads = match cache.get(kind, filters, now) {
        Some(payloads) => payloads.clone(),
        None => {
            let fetched = source
                .fetch(&report_payloads(kind, filters), filters, generated_at)
                .await?;
            cache.insert(kind, filters.clone(), fetched.clone(), now);
            fetched
        }
    };

    let dataset = Dataset::from_payloads(&payloads).filtered(filters);
    let context = ReportContext {
        today: generated_at.date(),
        granularity,
    };
    let overview = reports::build(kind, &dataset, config, context);
    Ok(markdown::render(&overview, filters, generated_at))
}

async fn watch(
    kind: ReportKind,
    granularity: Granularity,
    filters: &ReportFilters,
    period: Duration,
    config: &MetricsConfig,
    source: &mut PayloadSource,
) {
    info!(report = kind.as_str(), seconds = period.as_secs(), "watching report");
    let mut cache = PayloadCache::new(config.cache.clone());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match refresh(kind, granularity, filters, config, source, &mut cache).await {
                    Ok(output) => println!("{output}"),
                    Err(err) => warn!("refresh failed: {err:#}"),
                }
            }
            _ = &mut shutdown => {
                info!("stopping watch");
                break;
            }
        }
    }
}
