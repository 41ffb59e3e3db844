use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use robotadvisor_core::domain::filter::FilterSelection;
use robotadvisor_core::ingest::provider::{HttpJsonMetricsProvider, MetricsProvider};
use robotadvisor_core::CoreError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod ingest;
mod universe;

#[derive(Debug, Parser)]
#[command(name = "robotadvisor_worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load stock metrics into the catalog.
    Ingest {
        /// Read metrics from a JSON file instead of the configured HTTP provider.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Validate the payload without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Screen the universe by fundamental buckets and print matches as JSON.
    Screen {
        /// Screen a JSON metrics file instead of the database catalog.
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Rank candidate stocks for a portfolio and print them as JSON.
    Recommend {
        /// Stored portfolio to recommend for.
        #[arg(long, conflicts_with = "holdings")]
        portfolio_id: Option<Uuid>,

        /// Comma-separated symbols forming an ad-hoc portfolio.
        #[arg(long)]
        holdings: Option<String>,

        /// Rank against a JSON metrics file instead of the database catalog.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Number of entries to print.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long, default_value = "Any")]
    market_cap: String,
    #[arg(long, default_value = "Any")]
    sma200: String,
    #[arg(long, default_value = "Any")]
    ps: String,
    #[arg(long, default_value = "Any")]
    gross_margin: String,
    #[arg(long, default_value = "Any")]
    profit_margin: String,
    #[arg(long, default_value = "Any")]
    operating_margin: String,
}

impl From<FilterArgs> for FilterSelection {
    fn from(a: FilterArgs) -> Self {
        FilterSelection {
            market_cap: a.market_cap,
            sma200: a.sma200,
            ps: a.ps,
            gross_margin: a.gross_margin,
            profit_margin: a.profit_margin,
            operating_margin: a.operating_margin,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = robotadvisor_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let res = run(cli.command, &settings).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "worker command failed");
    }
    res
}

async fn run(
    command: Command,
    settings: &robotadvisor_core::config::Settings,
) -> anyhow::Result<()> {
    match command {
        Command::Ingest { file, dry_run } => {
            let (source, rows) = match file {
                Some(path) => {
                    let rows = universe::read_rows_file(&path).await?;
                    (format!("file:{}", path.display()), rows)
                }
                None => {
                    let provider = HttpJsonMetricsProvider::from_settings(settings)?;
                    let (resp, _raw) = provider.fetch_stock_metrics().await?;
                    (provider.provider_name().to_string(), resp.items)
                }
            };

            if dry_run {
                tracing::info!(%source, rows = rows.len(), dry_run = true, "validated stock metrics");
                return Ok(());
            }

            let pool = universe::connect(settings).await?;
            ingest::ingest_rows(&pool, &source, &rows).await?;
        }
        Command::Screen { file, filters } => {
            let service = match file {
                Some(path) => universe::from_file(&path).await?,
                None => universe::from_db(settings).await?,
            };
            let selection = FilterSelection::from(filters);
            let matches = service.screen(&selection).await?;
            print_json(&matches)?;
        }
        Command::Recommend {
            portfolio_id,
            holdings,
            file,
            limit,
        } => {
            let service = match file {
                Some(path) => universe::from_file(&path).await?,
                None => universe::from_db(settings).await?,
            };

            let result = match (portfolio_id, holdings) {
                (Some(id), _) => service.recommend(id).await?,
                (None, Some(holdings)) => {
                    let mut portfolio = robotadvisor_core::domain::portfolio::Portfolio::new(
                        Uuid::new_v4(),
                        "cli",
                        "ad-hoc",
                    );
                    for symbol in universe::parse_holdings(&holdings) {
                        let stock = match service.stock(&symbol).await {
                            Ok(stock) => Some(stock),
                            Err(CoreError::StockNotFound(_)) => None,
                            Err(err) => return Err(err.into()),
                        };
                        if !portfolio.add_stock(stock.as_ref()) {
                            tracing::warn!(%symbol, "holding not in catalog; ignored");
                        }
                    }
                    service.recommend_for(&portfolio).await?
                }
                (None, None) => anyhow::bail!("either --portfolio-id or --holdings is required"),
            };
            print_json(&result.top(limit))?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn init_sentry(settings: &robotadvisor_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
