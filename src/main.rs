use anyhow::{Context, Result};
use perch::api::{create_app, AssociationsAppState, ContextAppState, WsAppState};
use perch::association::{AssociationStore, AssociationsManager, SqliteAssociationStore};
use perch::config::{load_config, PerchConfig};
use perch::context::ContextManager;
use perch::live::LiveStateEngine;
use perch::nats::{AssociationPublisher, NatsClient};
use perch::subscription::{BroadcastPusher, SubscriptionRouter};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perch=info".into()),
        )
        .init();

    info!("Perch starting...");

    let config = match std::env::var("PERCH_CONFIG") {
        Ok(path) => load_config(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path, e))?,
        Err(_) => {
            info!("PERCH_CONFIG not set, using defaults");
            PerchConfig::default()
        }
    };

    // Association store
    let store: Arc<dyn AssociationStore> = Arc::new(SqliteAssociationStore::new(&config.store.path)?);
    info!(path = %config.store.path, "Association store ready");

    // NATS
    let nats = NatsClient::connect(config.nats.clone()).await?;

    let mut associations = AssociationsManager::new(Arc::clone(&store));
    if let Some(subject) = &config.nats.associations_subject {
        info!(subject = %subject, "Publishing association changes");
        associations = associations.with_observer(Arc::new(AssociationPublisher::new(
            nats.client().clone(),
            subject.clone(),
        )));
    }

    // Live state engines
    let primary = Arc::new(LiveStateEngine::new("primary", config.live.event_capacity));
    let mut context = ContextManager::new(Arc::clone(&store)).with_primary(primary.clone());

    let primary_task = tokio::spawn(
        Arc::clone(&primary).run_subscriber(nats.client().clone(), config.nats.live_subject.clone()),
    );

    let mut complementary = None;
    if let Some(subject) = &config.nats.complementary_subject {
        let engine = Arc::new(LiveStateEngine::new("complementary", config.live.event_capacity));
        context = context.with_complementary(engine.clone());

        let client = nats.client().clone();
        let subject = subject.clone();
        let subscriber = Arc::clone(&engine);
        tokio::spawn(async move {
            if let Err(e) = subscriber.run_subscriber(client, subject).await {
                error!(error = %e, "Complementary live subscriber failed");
            }
        });
        complementary = Some(engine);
    }

    let context = Arc::new(context);

    // Subscription router
    let pusher = BroadcastPusher::new(config.live.event_capacity);
    let router = Arc::new(SubscriptionRouter::new(
        Arc::clone(&context),
        Arc::new(pusher.clone()),
    ));
    tokio::spawn(Arc::clone(&router).run(primary.subscribe()));
    if let Some(engine) = &complementary {
        tokio::spawn(Arc::clone(&router).run(engine.subscribe()));
    }

    // HTTP server
    let app = create_app(
        Arc::new(AssociationsAppState {
            associations: Arc::new(associations),
        }),
        Arc::new(ContextAppState { context }),
        Arc::new(WsAppState { router, pusher }),
    );

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind_addr))?;
    info!(addr = %config.api.bind_addr, "Perch listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("HTTP server failed")?;
        }
        result = primary_task => {
            match result {
                Ok(Ok(())) => warn!("Primary live subscriber ended"),
                Ok(Err(e)) => error!(error = %e, "Primary live subscriber failed"),
                Err(e) => error!(error = %e, "Primary live subscriber panicked"),
            }
        }
    }

    Ok(())
}
