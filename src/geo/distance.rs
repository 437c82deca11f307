use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

const EARTH_RADIUS_KM: f64 = 6371.0;

// Haversine球面距离，输入角度
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let delta_phi = (b.lat - a.lat).to_radians();
    let delta_lambda = (b.lon - a.lon).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// 空路线返回 None（无距离），单点返回 0
pub fn total_distance_km(coords: &[Coordinate]) -> Option<f64> {
    if coords.is_empty() {
        return None;
    }
    Some(
        coords
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum(),
    )
}

// 仅用于展示，内部计算保留全精度
pub fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARIS: Coordinate = Coordinate {
        lat: 48.8566,
        lon: 2.3522,
    };
    const ROME: Coordinate = Coordinate {
        lat: 41.9028,
        lon: 12.4964,
    };

    #[test]
    fn paris_to_rome_is_about_1105_km() {
        let km = haversine_km(PARIS, ROME);
        assert!((km - 1105.0).abs() < 5.0, "got {} km", km);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = haversine_km(PARIS, ROME);
        let back = haversine_km(ROME, PARIS);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn empty_route_has_no_distance() {
        assert_eq!(total_distance_km(&[]), None);
    }

    #[test]
    fn single_point_route_is_zero() {
        assert_eq!(total_distance_km(&[PARIS]), Some(0.0));
    }

    #[test]
    fn total_sums_consecutive_legs() {
        let berlin = Coordinate {
            lat: 52.52,
            lon: 13.405,
        };
        let legs = haversine_km(PARIS, berlin) + haversine_km(berlin, ROME);
        let total = total_distance_km(&[PARIS, berlin, ROME]).unwrap();
        assert!((total - legs).abs() < 1e-9);
    }

    #[test]
    fn unresolved_cities_are_skipped_not_zeroed() {
        // 中间站解析失败时整体跳过，不能按(0,0)参与计算
        let resolved = [Some(PARIS), None, Some(ROME)];
        let coords: Vec<Coordinate> = resolved.iter().copied().flatten().collect();

        let total = total_distance_km(&coords).unwrap();
        assert!((total - haversine_km(PARIS, ROME)).abs() < 1e-9);
    }

    #[test]
    fn rounding_is_display_only() {
        assert_eq!(round_km(1105.2499), 1105.2);
        assert_eq!(round_km(1105.25), 1105.3);
        assert_eq!(round_km(0.0), 0.0);
    }
}
