use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::model::{Stop, move_stop, schedule};
use crate::AppState;
use crate::collab::payload::ServerEvent;
use crate::routes::trip::model::Trip;
use crate::utils::{Claims, error_codes, error_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub trip_id: String,
    pub from_index: usize,
    pub to_index: usize,
}

#[axum::debug_handler]
pub async fn reorder_stops(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReorderRequest>,
) -> impl IntoResponse {
    match Trip::is_member(&state.pool, &req.trip_id, &claims.sub).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                error_to_api_response(
                    error_codes::PERMISSION_DENIED,
                    "用户不是该行程成员".to_string(),
                ),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    }

    let stops = match Stop::list_for_trip(&state.pool, &req.trip_id).await {
        Ok(stops) => stops,
        Err(e) => {
            tracing::error!("Failed to load stops for trip {}: {}", req.trip_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    if req.from_index >= stops.len() || req.to_index >= stops.len() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(error_codes::VALIDATION_ERROR, "站点序号越界".to_string()),
        );
    }

    let reordered = move_stop(stops, req.from_index, req.to_index);
    let scheduled = schedule(&reordered);

    // 新顺序先广播给房间（乐观更新），落库异步进行
    state
        .rooms
        .broadcast(
            &req.trip_id,
            ServerEvent::Reorder {
                stops: scheduled.clone(),
            },
            None,
        )
        .await;

    let pool = state.pool.clone();
    let trip_id = req.trip_id.clone();
    let order = scheduled.clone();
    tokio::spawn(async move {
        // 持久化失败仅记录，不回滚已展示的顺序
        if let Err(e) = Stop::persist_order(&pool, &trip_id, &order).await {
            tracing::error!("Failed to persist stop order for trip {}: {}", trip_id, e);
        }
    });

    (StatusCode::OK, success_to_api_response(scheduled))
}
