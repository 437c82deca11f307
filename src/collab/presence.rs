use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub user: PresenceUser,
    pub last_heartbeat_at: DateTime<Utc>,
}

/// 单个房间的在线成员集合，按心跳时间老化
#[derive(Debug, Default)]
pub struct PresenceSet {
    entries: HashMap<String, PresenceEntry>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    // 加入和心跳是同一个操作：重复调用只刷新时间戳
    pub fn touch(&mut self, user: PresenceUser, now: DateTime<Utc>) -> bool {
        let is_new = !self.entries.contains_key(&user.id);
        self.entries.insert(
            user.id.clone(),
            PresenceEntry {
                user,
                last_heartbeat_at: now,
            },
        );
        is_new
    }

    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<PresenceUser> {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.signed_duration_since(entry.last_heartbeat_at) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.entries.remove(&id))
            .map(|entry| entry.user)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PresenceUser> {
        let mut members: Vec<PresenceUser> =
            self.entries.values().map(|e| e.user.clone()).collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
