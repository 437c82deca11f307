use serde::{Deserialize, Serialize};

use super::presence::PresenceUser;
use crate::routes::stop::model::ScheduledStop;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

// 客户端入站包：按字段形态区分心跳和聊天两种
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClientPayload {
    Presence { presence: bool, user: PresenceUser },
    Chat { text: String, user: ChatUser, ts: i64 },
}

/// 解析失败或形态不合法的包返回 None，由调用方静默丢弃
pub fn parse_client_payload(raw: &str) -> Option<ClientPayload> {
    match serde_json::from_str::<ClientPayload>(raw) {
        Ok(ClientPayload::Presence { presence: true, user }) => Some(ClientPayload::Presence {
            presence: true,
            user,
        }),
        Ok(ClientPayload::Presence { .. }) => None,
        Ok(chat @ ClientPayload::Chat { .. }) => Some(chat),
        Err(_) => None,
    }
}

// 服务端出站事件，聊天消息的 id 由服务端分配，客户端时间戳仅用于展示
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerEvent {
    Presence {
        presence: bool,
        user: PresenceUser,
    },
    Chat {
        id: String,
        text: String,
        user: ChatUser,
        ts: i64,
    },
    Members {
        members: Vec<PresenceUser>,
    },
    Reorder {
        stops: Vec<ScheduledStop>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_presence_payload() {
        let raw = r#"{"presence":true,"user":{"id":"u1","name":"Ann","color":"#f00"}}"#;
        match parse_client_payload(raw) {
            Some(ClientPayload::Presence { user, .. }) => {
                assert_eq!(user.id, "u1");
                assert_eq!(user.color, "#f00");
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn parses_chat_payload() {
        let raw = r#"{"text":"hello","user":{"id":"u1","name":"Ann"},"ts":1712000000000}"#;
        match parse_client_payload(raw) {
            Some(ClientPayload::Chat { text, user, ts }) => {
                assert_eq!(text, "hello");
                assert_eq!(user.name, "Ann");
                assert_eq!(ts, 1712000000000);
            }
            other => panic!("unexpected parse result: {:?}", other),
        }
    }

    #[test]
    fn chat_without_text_is_dropped() {
        let raw = r#"{"user":{"id":"u1","name":"Ann"},"ts":1712000000000}"#;
        assert!(parse_client_payload(raw).is_none());
    }

    #[test]
    fn presence_false_is_dropped() {
        let raw = r#"{"presence":false,"user":{"id":"u1","name":"Ann"}}"#;
        assert!(parse_client_payload(raw).is_none());
    }

    #[test]
    fn garbage_is_dropped() {
        assert!(parse_client_payload("not json").is_none());
        assert!(parse_client_payload("{}").is_none());
        assert!(parse_client_payload(r#"{"text":42}"#).is_none());
    }

    #[test]
    fn chat_event_serializes_with_server_id() {
        let event = ServerEvent::Chat {
            id: "m-1".into(),
            text: "hi".into(),
            user: ChatUser {
                id: "u1".into(),
                name: "Ann".into(),
            },
            ts: 1712000000000,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""id":"m-1""#));
        assert!(json.contains(r#""text":"hi""#));
    }
}
