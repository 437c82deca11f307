use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::model::Trip;
use crate::AppState;
use crate::geo::distance::{round_km, total_distance_km};
use crate::routes::stop::model::Stop;
use crate::utils::{Claims, error_codes, error_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
pub struct RouteDistanceQuery {
    pub trip_id: String,
}

#[derive(Debug, Serialize)]
pub struct RouteDistanceResponse {
    pub total_km: Option<f64>,
    pub resolved_count: usize,
    pub skipped: Vec<String>,
}

#[axum::debug_handler]
pub async fn get_route_distance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RouteDistanceQuery>,
) -> impl IntoResponse {
    match Trip::is_member(&state.pool, &query.trip_id, &claims.sub).await {
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

    let stops = match Stop::list_for_trip(&state.pool, &query.trip_id).await {
        Ok(stops) => stops,
        Err(e) => {
            tracing::error!("Failed to load stops for trip {}: {}", query.trip_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    };

    // 解析不出坐标的城市整体跳过，总里程允许偏少
    let mut coords = Vec::new();
    let mut skipped = Vec::new();
    for stop in &stops {
        match state.geo.resolve(&stop.name).await {
            Some(coord) => coords.push(coord),
            None => skipped.push(stop.name.clone()),
        }
    }

    let total_km = total_distance_km(&coords).map(round_km);

    (
        StatusCode::OK,
        success_to_api_response(RouteDistanceResponse {
            total_km,
            resolved_count: coords.len(),
            skipped,
        }),
    )
}
