use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use estatelink::config::AppConfig;
use estatelink::matching::MatchEngine;
use estatelink::notify::{
    BuiltinCatalog, InstantMatchFanout, Notifier, ScheduledMatchSweeps,
};
use estatelink::telemetry;
use estatelink::validation::{SweepScheduler, ValidationLifecycle, ValidationRouterState};

use crate::cli::ServeArgs;
use crate::demo::demo_users;
use crate::error::ApiError;
use crate::infra::{
    AppState, InMemoryListings, InMemoryNotificationLog, InMemoryRequirements, InMemoryUsers,
    LoggingMailer,
};
use crate::routes::{build_router, MarketContext};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), ApiError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let listings = Arc::new(InMemoryListings::default());
    let requirements = Arc::new(InMemoryRequirements::default());
    let users = Arc::new(InMemoryUsers::default());
    users.seed(demo_users());
    let notifications = Arc::new(InMemoryNotificationLog::default());

    let notifier = Notifier::new(
        users.clone(),
        notifications.clone(),
        Arc::new(BuiltinCatalog),
    )
    .with_mailer(Arc::new(LoggingMailer));

    let listing_lifecycle = Arc::new(ValidationLifecycle::new(
        listings.clone(),
        notifier.clone(),
        config.engine.validation,
    ));
    let requirement_lifecycle = Arc::new(ValidationLifecycle::new(
        requirements.clone(),
        notifier.clone(),
        config.engine.validation,
    ));
    let sweeps = Arc::new(ScheduledMatchSweeps::new(
        listings.clone(),
        requirements.clone(),
        notifier.clone(),
        config.engine.matching,
    ));

    let scheduler = Arc::new(SweepScheduler::new(
        listing_lifecycle.clone(),
        requirement_lifecycle.clone(),
        sweeps,
        config.engine.schedule,
    ));
    scheduler.start();

    let market = Arc::new(MarketContext {
        listings: listings.clone(),
        requirements: requirements.clone(),
        notifications,
        instant: InstantMatchFanout::new(
            listings,
            requirements,
            notifier,
            config.engine.matching,
        ),
        engine: MatchEngine::new(config.engine.matching.min_score),
    });
    let validation_state = Arc::new(ValidationRouterState {
        listings: listing_lifecycle,
        requirements: requirement_lifecycle,
    });

    let app = build_router(market, validation_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "estatelink marketplace core ready");

    axum::serve(listener, app).await?;
    scheduler.stop();
    Ok(())
}
