use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use deployment_store::{
    ArangoStore, ColdStorage, DocumentStore, GatewayColdStorage, MemoryColdStorage,
    MemoryDocumentStore,
};
use log::{error, info, warn};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
#[cfg(feature = "ui")]
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{get_deployment, get_deployments, new_deployment};
use crate::{ApiDoc, AppState, DatabaseBackend, ServiceConfig};

const OPENAPI_PATH: &str = "/api-docs/openapi.json";

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::ACCEPT]);

    let router = Router::new()
        .route(
            "/msapi/deployment",
            get(get_deployments).post(new_deployment),
        )
        .route(
            "/msapi/deployment/",
            get(get_deployments).post(new_deployment),
        )
        .route("/msapi/deployment/{key}", get(get_deployment));

    #[cfg(feature = "ui")]
    let router = router.merge(SwaggerUi::new("/swagger").url(OPENAPI_PATH, ApiDoc::openapi()));

    #[cfg(not(feature = "ui"))]
    let router = router.route(
        OPENAPI_PATH,
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router.layer(cors).with_state(state)
}

/// Connects the collaborators named by `config`.
pub async fn build_state(config: &ServiceConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn DocumentStore> = match config.database {
        DatabaseBackend::ArangoDb => {
            let store = ArangoStore::new(config.arango.clone())?;
            // The service still starts so it can answer from cold storage
            if let Err(e) = store.ensure_collection().await {
                error!("Failed to initialize the database: {:?}", e);
            }
            Arc::new(store)
        }
        DatabaseBackend::Memory => {
            warn!("Using the in-memory database, nothing is persisted across restarts");
            Arc::new(MemoryDocumentStore::new(
                &config.arango.database,
                &config.arango.collection,
            ))
        }
    };

    let cold_storage: Arc<dyn ColdStorage> = match &config.cold_storage_url {
        Some(url) => Arc::new(GatewayColdStorage::new(url)?),
        None => {
            warn!("COLD_STORAGE_URL is not set, cold storage lookups will always miss");
            Arc::new(MemoryColdStorage::new())
        }
    };

    Ok(AppState {
        store,
        cold_storage,
        error_policy: config.error_policy,
    })
}

pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;

    let address = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed get the microservice running: {:?}", e);
            return Err(e).context(format!("Failed to bind {}", address));
        }
    };

    run_server_with_listener(listener, state).await?;
    Ok(())
}

pub async fn run_server_with_listener(
    listener: TcpListener,
    state: AppState,
) -> std::io::Result<()> {
    if let Ok(address) = listener.local_addr() {
        info!("Deployment microservice listening on http://{}", address);
    }

    axum::serve(listener, create_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down gracefully");
}
