use serde::Deserialize;

use super::distance::Coordinate;

// 上游返回的经纬度是字符串
#[derive(Debug, Deserialize)]
struct GeocodeResult {
    lat: String,
    lon: String,
}

#[derive(Clone)]
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("tripline-backend")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http, base_url }
    }

    /// 单次不透明正向编码：无结果、响应不可读、经纬度不合法都视为失败
    pub async fn forward_geocode(&self, city: &str) -> Option<Coordinate> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .send()
            .await;

        let results: Vec<GeocodeResult> = match resp {
            Ok(resp) => match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!("Geocode response for '{}' unreadable: {}", city, e);
                    return None;
                }
            },
            Err(e) => {
                tracing::debug!("Geocode request for '{}' failed: {}", city, e);
                return None;
            }
        };

        let first = results.into_iter().next()?;
        let lat = first.lat.parse::<f64>().ok()?;
        let lon = first.lon.parse::<f64>().ok()?;
        Some(Coordinate { lat, lon })
    }
}
