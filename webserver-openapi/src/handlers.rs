use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use deployment_defs::{Deployment, OBJTYPE_DEPLOYMENT};
use deployment_store::{ColdStorage, CreateOutcome, DocumentCursor, DocumentQuery, DocumentStore};
use log::{debug, error, info};
use serde_json::{json, Value};
use utoipa::OpenApi;

use crate::ErrorPolicy;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Deployment Microservice",
        version = "11.0.0",
        description = "RestAPI for the Deployment Object",
        license(name = "Apache 2.0", url = "http://www.apache.org/licenses/LICENSE-2.0.html")
    ),
    paths(get_deployments, get_deployment, new_deployment),
    components(schemas(Deployment)),
    tags(
        (name = "deployment", description = "Create and retrieve deployments")
    )
)]
pub struct ApiDoc;

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cold_storage: Arc<dyn ColdStorage>,
    pub error_policy: ErrorPolicy,
}

fn error_response(e: &anyhow::Error) -> Response {
    let error_json = json!({"error": format!("{:?}", e)});
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error_json)).into_response()
}

async fn close_cursor(mut cursor: Box<dyn DocumentCursor>) {
    if let Err(e) = cursor.close().await {
        error!("Failed to close cursor: {:?}", e);
    }
}

fn decode_document(document: Value) -> anyhow::Result<Deployment> {
    Deployment::from_document(document).context("Failed to decode document")
}

#[utoipa::path(
    get,
    path = "/msapi/deployment",
    responses(
        (status = 200, description = "Get a list of deployments", body = Vec<Deployment>)
    ),
    tag = "deployment",
    description = "Get a list of deployments"
)]
pub async fn get_deployments(State(state): State<AppState>) -> Response {
    let query = DocumentQuery::by_objtype(OBJTYPE_DEPLOYMENT);

    let mut cursor = match state.store.query(&query).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Failed to run query: {:?}", e);
            return match state.error_policy {
                ErrorPolicy::Strict => error_response(&e),
                ErrorPolicy::Degrade => Json(Vec::<Deployment>::new()).into_response(),
            };
        }
    };

    let mut deployments: Vec<Deployment> = vec![];

    while let Some(document) = cursor.read_document().await {
        let deployment = match document.context("Failed to read document").and_then(decode_document) {
            Ok(deployment) => deployment,
            Err(e) => {
                error!("{:?}", e);
                if state.error_policy == ErrorPolicy::Strict {
                    close_cursor(cursor).await;
                    return error_response(&e);
                }
                continue;
            }
        };
        if !deployment.is_deployment() {
            continue;
        }
        info!(
            "Got doc with key '{}' from query",
            deployment.key.as_deref().unwrap_or_default()
        );
        deployments.push(deployment);
    }

    close_cursor(cursor).await;
    Json(deployments).into_response()
}

async fn find_in_database(state: &AppState, key: &str) -> anyhow::Result<Option<Deployment>> {
    let query = DocumentQuery::by_name_or_key(OBJTYPE_DEPLOYMENT, key);
    let mut cursor = state
        .store
        .query(&query)
        .await
        .context("Failed to run query")?;

    let found = match cursor.read_document().await {
        Some(document) => Some(
            document
                .context("Failed to read document")
                .and_then(decode_document),
        ),
        None => None,
    };

    close_cursor(cursor).await;
    found.transpose()
}

async fn find_in_cold_storage(state: &AppState, key: &str) -> Deployment {
    let json = match state.cold_storage.lookup(key).await {
        Ok(Some(json)) => json,
        Ok(None) => {
            debug!("'{}' not found in cold storage", key);
            return Deployment::new();
        }
        Err(e) => {
            error!("Failed to look up '{}' in cold storage: {:?}", key, e);
            return Deployment::new();
        }
    };

    match serde_json::from_str::<Deployment>(&json) {
        Ok(deployment) => deployment,
        Err(e) => {
            error!("Failed to unmarshal '{}' from cold storage: {:?}", key, e);
            Deployment::new()
        }
    }
}

#[utoipa::path(
    get,
    path = "/msapi/deployment/{key}",
    responses(
        (status = 200, description = "The deployment, or an empty deployment when nothing matches", body = Deployment)
    ),
    params(
        ("key" = String, Path, description = "Key or name of the deployment"),
    ),
    tag = "deployment",
    description = "Get a deployment based on the _key or name"
)]
pub async fn get_deployment(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match find_in_database(&state, &key).await {
        Ok(Some(deployment)) => {
            info!(
                "Got doc with key '{}' from query",
                deployment.key.as_deref().unwrap_or_default()
            );
            return Json(deployment).into_response();
        }
        Ok(None) => debug!("'{}' not found in the database", key),
        Err(e) => {
            error!("{:?}", e);
            if state.error_policy == ErrorPolicy::Strict {
                return error_response(&e);
            }
        }
    }

    Json(find_in_cold_storage(&state, &key).await).into_response()
}

#[utoipa::path(
    post,
    path = "/msapi/deployment",
    request_body = Deployment,
    responses(
        (status = 200, description = "The stored deployment including its key", body = Deployment),
        (status = 503, description = "The request body could not be parsed", body = String)
    ),
    tag = "deployment",
    description = "Create a new Deployment and persist it"
)]
pub async fn new_deployment(
    State(state): State<AppState>,
    payload: Result<Json<Deployment>, JsonRejection>,
) -> Response {
    let Json(mut deployment) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (StatusCode::SERVICE_UNAVAILABLE, rejection.body_text()).into_response();
        }
    };
    deployment.mark_as_deployment();

    let address = deployment
        .content()
        .context("Failed to serialize deployment")
        .and_then(|content| state.cold_storage.normalize(&content));
    match address {
        Ok(address) => info!("{}={}", address.cid, address.json),
        Err(e) => error!("Failed to normalize deployment: {:?}", e),
    }

    let document = match serde_json::to_value(&deployment) {
        Ok(document) => document,
        Err(e) => {
            let e = anyhow::Error::from(e).context("Failed to serialize deployment");
            error!("{:?}", e);
            return match state.error_policy {
                ErrorPolicy::Strict => error_response(&e),
                ErrorPolicy::Degrade => Json(deployment).into_response(),
            };
        }
    };

    // A conflict means an identical record is already stored
    match state.store.create_document(&document).await {
        Ok(CreateOutcome::Created(key)) => {
            info!(
                "Created document in collection '{}' in db '{}' key='{}'",
                state.store.collection_name(),
                state.store.database_name(),
                key
            );
            deployment.key = Some(key);
        }
        Ok(CreateOutcome::AlreadyExists) => info!(
            "Document already exists in collection '{}' in db '{}'",
            state.store.collection_name(),
            state.store.database_name()
        ),
        Err(e) => {
            error!("Failed to create document: {:?}", e);
            if state.error_policy == ErrorPolicy::Strict {
                return error_response(&e);
            }
        }
    }

    Json(deployment).into_response()
}
