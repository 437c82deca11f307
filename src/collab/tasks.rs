use std::sync::Arc;

use tokio::time::interval;

use crate::collab::room::TripRooms;
use crate::config::Config;

// 周期扫描所有房间，老化静默成员
pub fn spawn_presence_sweeper(rooms: Arc<TripRooms>, config: &Config) {
    let period = config.presence_sweep_interval();
    tokio::spawn(async move {
        let mut tick = interval(period);
        loop {
            tick.tick().await;
            let removed = rooms.sweep().await;
            if removed > 0 {
                tracing::debug!("Presence sweep removed {} stale member(s)", removed);
            }
        }
    });
}
