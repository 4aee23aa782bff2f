//! Namedrop escrow service entry point
//!
//! Wiring:
//!
//! ```text
//! ┌────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Config │──▶│ PgStore   │──▶│ Coordinator │──▶│ Gateway      │
//! │ (YAML) │   │ (sqlx)    │   │ + Sweeper   │   │ (axum)       │
//! └────────┘   └───────────┘   └─────────────┘   └──────────────┘
//!                                    │
//!                                    └──▶ SweepWorker (interval loop)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use namedrop::auth::TokenVerifier;
use namedrop::config::AppConfig;
use namedrop::db::connect_pool;
use namedrop::escrow::adapters::{PaypalPayouts, StripeProcessor};
use namedrop::escrow::coordinator::{EscrowCoordinator, EscrowPolicy};
use namedrop::escrow::db::{EscrowStore, PgStore};
use namedrop::escrow::payout::PayoutRouter;
use namedrop::escrow::sweeper::DeadlineSweeper;
use namedrop::escrow::worker::{SweepWorker, WorkerConfig};
use namedrop::gateway;
use namedrop::gateway::state::{AppState, DisputeRateQuota};
use namedrop::logging::init_logging;
use namedrop::notify::{HttpMailer, Mailer, NoopMailer};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--env" && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "default".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&config);

    info!(env = %env, "Starting namedrop escrow service");

    let pool = connect_pool(&config.postgres_url).await?;
    let store: Arc<dyn EscrowStore> = Arc::new(PgStore::new(pool));

    let processor = Arc::new(StripeProcessor::new(
        config.providers.stripe_secret_key.clone(),
    )?);
    let network = if config.providers.paypal_api_base.is_empty() {
        Arc::new(PaypalPayouts::new(
            config.providers.paypal_client_id.clone(),
            config.providers.paypal_client_secret.clone(),
        )?)
    } else {
        Arc::new(PaypalPayouts::with_api_base(
            config.providers.paypal_client_id.clone(),
            config.providers.paypal_client_secret.clone(),
            config.providers.paypal_api_base.clone(),
        )?)
    };

    let mailer: Arc<dyn Mailer> = if config.mailer.enabled {
        Arc::new(HttpMailer::new(
            config.mailer.endpoint.clone(),
            config.mailer.api_key.clone(),
            config.mailer.from_address.clone(),
        )?)
    } else {
        info!("Mailer disabled, notifications are dropped");
        Arc::new(NoopMailer)
    };

    let router = PayoutRouter::new(store.clone(), processor.clone(), network);
    let coordinator = Arc::new(EscrowCoordinator::new(
        store.clone(),
        processor,
        router,
        mailer,
        EscrowPolicy {
            seller_window_hours: config.escrow.seller_window_hours,
            buyer_window_days: config.escrow.buyer_window_days,
            dispute_penalty: config.escrow.dispute_penalty,
        },
    ));

    let sweeper = Arc::new(DeadlineSweeper::new(
        coordinator.clone(),
        config.sweep.batch_size,
    ));

    if config.sweep.enabled {
        let worker = SweepWorker::new(
            sweeper.clone(),
            WorkerConfig {
                scan_interval: Duration::from_secs(config.sweep.scan_interval_secs),
            },
        );
        tokio::spawn(async move { worker.run().await });
    }

    let state = Arc::new(AppState {
        coordinator,
        sweeper,
        store,
        verifier: Arc::new(TokenVerifier::new(&config.auth.jwt_secret)),
        internal_secret: config.auth.internal_secret.clone(),
        dispute_quota: DisputeRateQuota {
            limit: config.escrow.dispute_rate_limit,
            window_minutes: config.escrow.dispute_rate_window_minutes,
        },
    });

    gateway::run_server(config.gateway.port, state).await
}
