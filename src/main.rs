use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, warn};

use current_location_rs::{
    auth::TokenVerifier,
    create_app, init_observability, location_state,
    models::StorageBackend,
    repositories::{
        DynamoDbLocationRepository, DynamoDbMemberRepository, InMemoryLocationRepository,
        InMemoryMemberRepository, LocationRepository, MemberRepository, TableManager,
    },
    shutdown_observability, Config, HttpLimits, Metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_environment()
        .await
        .context("Failed to load configuration")?;

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref(),
        &config.observability.log_level,
        config.observability.enable_json_logging,
    )
    .context("Failed to initialize observability")?;

    info!(
        "Starting {} v{}",
        config.observability.service_name, config.observability.service_version
    );

    let metrics = Arc::new(Metrics::new().context("Failed to initialize metrics")?);

    let secret = config
        .jwt_secret()
        .await
        .context("Failed to resolve JWT secret")?;
    let verifier = Arc::new(TokenVerifier::new(
        secret.as_bytes(),
        config.auth.jwt_leeway_seconds,
    ));

    let (locations, members) = build_repositories(&config).await?;
    let state = location_state(locations, members, metrics.clone());

    let app = create_app(
        metrics,
        state,
        verifier,
        HttpLimits {
            request_timeout: config.server.request_timeout(),
            max_request_size: config.server.max_request_size,
        },
    );

    let addr = SocketAddr::new(
        config
            .server
            .host
            .parse()
            .with_context(|| format!("Invalid listen host: {}", config.server.host))?,
        config.server.port,
    );
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn build_repositories(
    config: &Config,
) -> anyhow::Result<(Arc<dyn LocationRepository>, Arc<dyn MemberRepository>)> {
    match config.database.backend()? {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Ok((
                Arc::new(InMemoryLocationRepository::new()),
                Arc::new(InMemoryMemberRepository::new()),
            ))
        }
        StorageBackend::DynamoDb => {
            let client = Arc::new(config.aws.dynamodb_client.clone());

            if config.database.auto_create_tables {
                TableManager::new(client.clone())
                    .create_all_tables(
                        &config.database.locations_table_name,
                        &config.database.members_table_name,
                    )
                    .await
                    .context("Failed to create DynamoDB tables")?;
            }

            info!(
                "DynamoDB tables: locations={}, members={}",
                config.database.locations_table_name, config.database.members_table_name
            );

            Ok((
                Arc::new(DynamoDbLocationRepository::new(
                    client.clone(),
                    config.database.locations_table_name.clone(),
                    config.aws.region.clone(),
                )),
                Arc::new(DynamoDbMemberRepository::new(
                    client,
                    config.database.members_table_name.clone(),
                    config.aws.region.clone(),
                )),
            ))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
    shutdown_observability().await;
}
