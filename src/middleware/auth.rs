use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState,
    utils::{error_codes, error_to_api_response, verify_token},
};

// 校验 Bearer 令牌并把 Claims 注入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return unauthorized("缺少认证令牌".to_string());
    };

    match verify_token(bearer.token(), &state.config) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            unauthorized("认证令牌无效或已过期".to_string())
        }
    }
}

fn unauthorized(msg: String) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        error_to_api_response::<()>(error_codes::AUTH_FAILED, msg),
    )
        .into_response()
}
