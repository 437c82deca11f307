use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{RwLock, mpsc};

use super::payload::ServerEvent;
use super::presence::{PresenceSet, PresenceUser};

struct TripRoom {
    conns: HashMap<String, mpsc::UnboundedSender<ServerEvent>>,
    presence: PresenceSet,
}

impl TripRoom {
    fn new() -> Self {
        Self {
            conns: HashMap::new(),
            presence: PresenceSet::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.conns.is_empty() && self.presence.is_empty()
    }
}

/// 按行程划分的广播房间注册表，单进程内存扇出
pub struct TripRooms {
    rooms: RwLock<HashMap<String, TripRoom>>,
    presence_timeout: Duration,
}

impl TripRooms {
    pub fn new(presence_timeout_secs: u64) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            presence_timeout: Duration::seconds(presence_timeout_secs as i64),
        }
    }

    // 首次加入时隐式建房，返回当前在线成员快照
    pub async fn join(
        &self,
        trip_id: &str,
        conn_id: &str,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Vec<PresenceUser> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(trip_id.to_string())
            .or_insert_with(TripRoom::new);
        room.conns.insert(conn_id.to_string(), tx);
        room.presence.snapshot()
    }

    pub async fn leave(&self, trip_id: &str, conn_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(trip_id) {
            room.conns.remove(conn_id);
            // 在线条目留给周期清理老化，连接清空且无在线成员时房间回收
            if room.is_empty() {
                rooms.remove(trip_id);
            }
        }
    }

    pub async fn heartbeat(&self, trip_id: &str, user: PresenceUser) -> bool {
        self.heartbeat_at(trip_id, user, Utc::now()).await
    }

    pub async fn heartbeat_at(
        &self,
        trip_id: &str,
        user: PresenceUser,
        now: DateTime<Utc>,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(trip_id.to_string())
            .or_insert_with(TripRoom::new);
        room.presence.touch(user, now)
    }

    pub async fn members(&self, trip_id: &str) -> Vec<PresenceUser> {
        let rooms = self.rooms.read().await;
        rooms
            .get(trip_id)
            .map(|room| room.presence.snapshot())
            .unwrap_or_default()
    }

    /// 房间内广播，except 用于跳过发送方自身的连接
    pub async fn broadcast(&self, trip_id: &str, event: ServerEvent, except: Option<&str>) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(trip_id) else {
            return;
        };

        for (conn_id, tx) in &room.conns {
            if Some(conn_id.as_str()) == except {
                continue;
            }
            // 接收端已关闭的发送失败直接忽略，连接清理走 leave
            let _ = tx.send(event.clone());
        }
    }

    pub async fn sweep(&self) -> usize {
        self.sweep_at(Utc::now()).await
    }

    // 周期清理：老化过期成员、推送成员快照、回收空房间
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut removed_total = 0;

        for (trip_id, room) in rooms.iter_mut() {
            let removed = room.presence.sweep(now, self.presence_timeout);
            if removed.is_empty() {
                continue;
            }
            removed_total += removed.len();
            tracing::debug!(
                "Swept {} stale member(s) from trip room {}",
                removed.len(),
                trip_id
            );

            let members = room.presence.snapshot();
            for tx in room.conns.values() {
                let _ = tx.send(ServerEvent::Members {
                    members: members.clone(),
                });
            }
        }

        rooms.retain(|_, room| !room.is_empty());
        removed_total
    }
}
