use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tipline::config::AppConfig;
use tipline::error::{Result, TiplineError};
use tipline::evaluation::{EvaluationScope, EvaluationService};
use tipline::ports::{LogAuditSink, NoopInvalidator};
use tipline::store::PostgresStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// League scoring administration
#[derive(Parser, Debug)]
#[command(name = "tipline")]
#[command(author, version, about = "Prediction-league scoring core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations
    Migrate,

    /// Evaluate a finished event and persist point totals
    Evaluate {
        /// Event kind
        #[arg(long, value_enum)]
        kind: EventKindArg,
        /// Event id
        #[arg(long)]
        event: i64,
        /// Administrator user id triggering the run
        #[arg(long)]
        actor: i64,
        /// Re-evaluate a single member only
        #[arg(long)]
        member: Option<i64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EventKindArg {
    Match,
    Series,
    Special,
    Question,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        return Err(TiplineError::Internal("invalid configuration".to_string()));
    }

    init_logging(&config);

    let store = PostgresStore::new(
        &config.database.url,
        config.database.max_connections,
        config.transaction.clone(),
    )
    .await?;

    match cli.command {
        Commands::Migrate => {
            store.migrate().await?;
            println!("migrations applied");
        }
        Commands::Evaluate {
            kind,
            event,
            actor,
            member,
        } => {
            let membership = Arc::new(store.clone());
            let service = EvaluationService::new(
                store,
                membership,
                Arc::new(LogAuditSink),
                Arc::new(NoopInvalidator),
            );
            let scope = member.map_or(EvaluationScope::AllMembers, EvaluationScope::Member);

            let report = match kind {
                EventKindArg::Match => service.evaluate_match(actor, event, scope).await?,
                EventKindArg::Series => service.evaluate_series(actor, event, scope).await?,
                EventKindArg::Special => service.evaluate_special(actor, event, scope).await?,
                EventKindArg::Question => service.evaluate_question(actor, event, scope).await?,
            };

            println!(
                "{} bets processed, {} total points ({} ms)",
                report.total_users_evaluated, report.total_points, report.duration_ms
            );
            for member in &report.members {
                let fired: Vec<String> = member
                    .awards
                    .iter()
                    .map(|award| format!("{} {:+}", award.rule, award.points))
                    .collect();
                println!(
                    "  member {}: {} [{}]",
                    member.league_user_id,
                    member.total_points,
                    fired.join(", ")
                );
            }
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Logging initialized");
}
