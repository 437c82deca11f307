use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    collab::payload::{ClientPayload, ServerEvent, parse_client_payload},
    routes::message::model::ChatMessage,
    routes::trip::model::Trip,
    utils::{Claims, verify_token},
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub trip_id: String,
    pub token: String,
}

#[axum::debug_handler]
pub async fn collab_ws(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    // 浏览器的WebSocket不能带自定义请求头，令牌走查询参数
    let claims = match verify_token(&query.token, &state.config) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("WebSocket token rejected: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    // 入房间复用REST边界同一套成员校验
    match Trip::is_member(&state.pool, &query.trip_id, &claims.sub).await {
        Ok(true) => {}
        Ok(false) => return StatusCode::FORBIDDEN.into_response(),
        Err(e) => {
            tracing::error!("Membership check failed for trip {}: {}", query.trip_id, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, query.trip_id, claims))
}

async fn handle_socket(socket: WebSocket, state: AppState, trip_id: String, claims: Claims) {
    let conn_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();

    // 出站事件由单个转发任务串行写出，保证连接内顺序
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let members = state.rooms.join(&trip_id, &conn_id, tx.clone()).await;
    let _ = tx.send(ServerEvent::Members { members });
    tracing::debug!("Connection {} joined trip room {}", conn_id, trip_id);

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_payload(text.as_str(), &state, &trip_id, &conn_id, &claims).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("WebSocket error on {}: {}", conn_id, e);
                break;
            }
        }
    }

    state.rooms.leave(&trip_id, &conn_id).await;
    send_task.abort();
    tracing::debug!("Connection {} left trip room {}", conn_id, trip_id);
}

async fn handle_payload(raw: &str, state: &AppState, trip_id: &str, conn_id: &str, claims: &Claims) {
    // 形态不合法的包静默丢弃，不中断接收循环
    let Some(payload) = parse_client_payload(raw) else {
        tracing::debug!("Dropping malformed payload on trip {}", trip_id);
        return;
    };

    match payload {
        ClientPayload::Presence { user, .. } => {
            let is_new = state.rooms.heartbeat(trip_id, user.clone()).await;
            state
                .rooms
                .broadcast(
                    trip_id,
                    ServerEvent::Presence {
                        presence: true,
                        user,
                    },
                    Some(conn_id),
                )
                .await;

            if is_new {
                let members = state.rooms.members(trip_id).await;
                state
                    .rooms
                    .broadcast(trip_id, ServerEvent::Members { members }, None)
                    .await;
            }
        }
        ClientPayload::Chat { text, user, ts } => {
            // 展示用昵称取客户端包，落库作者身份取令牌，防止冒名写入
            let event = ServerEvent::Chat {
                id: Uuid::new_v4().to_string(),
                text: text.clone(),
                user,
                ts,
            };
            state.rooms.broadcast(trip_id, event, Some(conn_id)).await;

            // 落库不阻塞广播，失败仅记录
            let pool = state.pool.clone();
            let redis = state.redis.clone();
            let trip_id = trip_id.to_string();
            let user_id = claims.sub.clone();
            tokio::spawn(async move {
                if let Err(e) = ChatMessage::create(&pool, &redis, &trip_id, &text, &user_id).await
                {
                    tracing::error!("Failed to persist chat message for trip {}: {}", trip_id, e);
                }
            });
        }
    }
}
