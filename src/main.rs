use chrono::Utc;
use clap::Parser;
use musicelo_engine::{
    args::{passive_details, Args, Command},
    database::{db::DbClient, db_structs::DbError},
    model::{clock::SystemClock, comparison_service::ComparisonService, error::RatingError, glicko}
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Rating(#[from] RatingError),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut client = match DbClient::connect(&args.connection_string).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            error!("Application cannot start without a valid database connection");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args, &mut client).await {
        error!("{}", e);
        if matches!(&e, AppError::Rating(r) if r.is_retryable()) {
            warn!("The items are busy, the command can be retried");
        }
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
}

/// Runs one command while holding the state lock, so concurrent invocations
/// apply one after another.
async fn run(args: &Args, client: &mut DbClient) -> Result<(), AppError> {
    client.lock_state().await?;
    let result = run_locked(args, client).await;
    let unlocked = client.unlock_state().await;

    result?;
    unlocked?;
    Ok(())
}

async fn run_locked(args: &Args, client: &mut DbClient) -> Result<(), AppError> {
    client.ensure_schema().await?;
    let snapshot = client.load_snapshot().await?;

    let seeded = snapshot.is_empty();
    let service = if seeded {
        info!("No stored state, seeding parameters from configuration");
        ComparisonService::new(args.engine_config(), args.seed_parameters())?
    } else {
        ComparisonService::from_snapshot(snapshot, args.engine_config(), SystemClock)?
    };

    let output = execute(&service, &args.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    if seeded || args.command.mutates() {
        client.save_snapshot(&service.snapshot()?).await?;
    }

    Ok(())
}

fn execute(service: &ComparisonService, command: &Command) -> Result<Value, AppError> {
    match command.clone() {
        Command::AddItem { id, title } => render(service.register_item(id, &title)?),
        Command::Compare {
            item_a,
            item_b,
            outcome,
            context
        } => render(service.record_comparison(item_a, item_b, outcome, context.into())?),
        Command::Undo { comparison_id } => render(service.undo(comparison_id, Utc::now())?),
        Command::Revote {
            comparison_id,
            outcome,
            context
        } => render(service.revote(comparison_id, outcome, context.into())?),
        Command::Passive {
            item,
            kind,
            listened_ms,
            position_ms,
            context
        } => render(service.record_passive_event(item, passive_details(kind, listened_ms, position_ms, context))?),
        Command::Rating { item } => {
            let rating = service.get_rating(item)?;
            let (low, high) = rating.state.confidence_interval();
            let mut value = serde_json::to_value(&rating)?;
            value["confidence_interval"] = serde_json::json!([low, high]);
            value["confidence"] = serde_json::to_value(glicko::confidence(rating.state.deviation))?;
            Ok(value)
        }
        Command::History { item, all } => render(service.get_comparison_history(item, all)?),
        Command::Alias { alias, canonical } => {
            service.link_as_canonical_alias(alias, canonical)?;
            render(service.get_item(alias)?)
        }
        Command::Relate { item_a, item_b, kind } => render(service.link_other_relationship(item_a, item_b, kind)?),
        Command::RotateParams { reason, overrides } => {
            let values = overrides.apply(service.active_parameters()?.values);
            render(service.rotate_parameters(values, &reason)?)
        }
        Command::Params => render(service.parameter_history()?),
        Command::Preview { item_a, item_b } => render(service.preview_comparison(item_a, item_b)?),
        Command::Leaderboard { limit, min_comparisons } => {
            let mut leaderboard = service.leaderboard(min_comparisons)?;
            if let Some(limit) = limit {
                leaderboard.truncate(limit);
            }
            render(leaderboard)
        }
        Command::Verify => render(service.verify()?)
    }
}

fn render<T: Serialize>(value: T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}
