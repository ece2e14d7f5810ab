use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tradelog_core::imports::{ImportResult, ParseConfig};
use tradelog_core::trades::Trade;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Parts of an upload form: the file and an optional JSON `config` part.
struct Upload {
    file: Vec<u8>,
    config: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut file_content: Option<Vec<u8>> = None;
    let mut config: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| {
                            ApiError::BadRequest(format!("Failed to read file content: {}", e))
                        })?
                        .to_vec(),
                );
            }
            "config" => {
                let config_bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read config: {}", e))
                })?;
                config = Some(config_bytes.to_vec());
            }
            _ => {}
        }
    }

    let file = file_content.ok_or_else(|| {
        ApiError::BadRequest("Missing file in multipart request".to_string())
    })?;
    Ok(Upload { file, config })
}

async fn list_trades(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Trade>>> {
    let trades = state.trade_service.list_trades()?;
    Ok(Json(trades))
}

async fn get_trade(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Trade>> {
    let trade = state.trade_service.get_trade(&id)?;
    Ok(Json(trade))
}

async fn delete_trade(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    match state.trade_service.delete_trade(id).await? {
        0 => Err(ApiError::NotFound),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

async fn import_csv(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<ImportResult>> {
    let upload = read_upload(multipart).await?;
    let config: ParseConfig = match upload.config {
        Some(raw) => serde_json::from_slice(&raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid config JSON: {}", e)))?,
        None => ParseConfig::default(),
    };

    let result = state.trade_service.import_csv(&upload.file, config).await?;
    Ok(Json(result))
}

/// Accepts either a multipart upload with a `file` part or the JSON document
/// as the raw request body.
async fn import_json(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> ApiResult<Json<ImportResult>> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let content = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        read_upload(multipart).await?.file
    } else {
        Bytes::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?
            .to_vec()
    };

    let result = state.trade_service.import_json(&content).await?;
    Ok(Json(result))
}

async fn export_trades(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let body = state.trade_service.export_json()?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"trades.json\"",
            ),
        ],
        body,
    ))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trades", get(list_trades))
        .route("/trades/export", get(export_trades))
        .route("/trades/import/csv", post(import_csv))
        .route("/trades/import/json", post(import_json))
        .route("/trades/{id}", get(get_trade).delete(delete_trade))
}
