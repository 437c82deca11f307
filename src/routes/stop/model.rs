use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stop {
    pub stop_id: String,
    pub trip_id: String,
    pub name: String,
    pub position: i32,
    pub days: i32,
}

// 排期视图：start_day 是推导值，不落库
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledStop {
    pub stop_id: String,
    pub name: String,
    pub position: i32,
    pub days: i32,
    pub start_day: i32,
}

/// 标准的列表拼接语义：取出 from 处元素插到 to 处，其余相对顺序不变
pub fn move_stop<T>(mut stops: Vec<T>, from: usize, to: usize) -> Vec<T> {
    if from >= stops.len() {
        return stops;
    }
    let stop = stops.remove(from);
    let to = to.min(stops.len());
    stops.insert(to, stop);
    stops
}

// 顺序变动后重算起始日：首站第1天，后站=前站起始日+前站天数
pub fn schedule(stops: &[Stop]) -> Vec<ScheduledStop> {
    let mut start_day = 1;
    stops
        .iter()
        .enumerate()
        .map(|(idx, stop)| {
            let scheduled = ScheduledStop {
                stop_id: stop.stop_id.clone(),
                name: stop.name.clone(),
                position: idx as i32,
                days: stop.days,
                start_day,
            };
            start_day += stop.days;
            scheduled
        })
        .collect()
}

impl Stop {
    pub async fn list_for_trip(pool: &PgPool, trip_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Stop>(
            r#"
            SELECT stop_id, trip_id, name, position, days
            FROM stops
            WHERE trip_id = $1
            ORDER BY position
            "#,
        )
        .bind(trip_id)
        .fetch_all(pool)
        .await
    }

    // 整批写回新顺序，最后写入者胜出
    pub async fn persist_order(
        pool: &PgPool,
        trip_id: &str,
        order: &[ScheduledStop],
    ) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for stop in order {
            sqlx::query(
                r#"
                UPDATE stops
                SET position = $1
                WHERE stop_id = $2 AND trip_id = $3
                "#,
            )
            .bind(stop.position)
            .bind(&stop.stop_id)
            .bind(trip_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops(days: &[i32]) -> Vec<Stop> {
        days.iter()
            .enumerate()
            .map(|(idx, days)| Stop {
                stop_id: format!("s{}", idx),
                trip_id: "trip-1".into(),
                name: format!("city-{}", idx),
                position: idx as i32,
                days: *days,
            })
            .collect()
    }

    fn ids(stops: &[Stop]) -> Vec<&str> {
        stops.iter().map(|s| s.stop_id.as_str()).collect()
    }

    #[test]
    fn move_forward_keeps_relative_order() {
        let moved = move_stop(stops(&[1, 1, 1, 1]), 0, 2);
        assert_eq!(ids(&moved), vec!["s1", "s2", "s0", "s3"]);
    }

    #[test]
    fn move_backward_keeps_relative_order() {
        let moved = move_stop(stops(&[1, 1, 1, 1]), 3, 1);
        assert_eq!(ids(&moved), vec!["s0", "s3", "s1", "s2"]);
    }

    #[test]
    fn move_is_a_permutation() {
        let original = stops(&[1, 2, 3, 4, 5]);
        let moved = move_stop(original.clone(), 1, 4);

        assert_eq!(moved.len(), original.len());
        let mut moved_ids: Vec<_> = ids(&moved);
        moved_ids.sort();
        let mut original_ids: Vec<_> = ids(&original);
        original_ids.sort();
        assert_eq!(moved_ids, original_ids);
        assert_eq!(moved[4].stop_id, "s1");
    }

    #[test]
    fn move_to_same_index_is_a_noop() {
        let moved = move_stop(stops(&[1, 1, 1]), 1, 1);
        assert_eq!(ids(&moved), vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn out_of_range_source_leaves_order_unchanged() {
        let moved = move_stop(stops(&[1, 1, 1]), 7, 0);
        assert_eq!(ids(&moved), vec!["s0", "s1", "s2"]);
    }

    #[test]
    fn start_days_accumulate_over_stay_lengths() {
        let scheduled = schedule(&stops(&[2, 3, 1]));
        let starts: Vec<i32> = scheduled.iter().map(|s| s.start_day).collect();
        assert_eq!(starts, vec![1, 3, 6]);
    }

    #[test]
    fn start_days_follow_a_reorder() {
        // [2,3,1] 的第三站挪到最前后是 [1,2,3]
        let moved = move_stop(stops(&[2, 3, 1]), 2, 0);
        let scheduled = schedule(&moved);

        let days: Vec<i32> = scheduled.iter().map(|s| s.days).collect();
        assert_eq!(days, vec![1, 2, 3]);
        let starts: Vec<i32> = scheduled.iter().map(|s| s.start_day).collect();
        assert_eq!(starts, vec![1, 2, 4]);
    }

    #[test]
    fn schedule_renumbers_positions() {
        let moved = move_stop(stops(&[1, 1, 1]), 2, 0);
        let scheduled = schedule(&moved);
        let positions: Vec<i32> = scheduled.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
