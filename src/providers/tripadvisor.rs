//! TripAdvisor 兴趣点客户端
//!
//! location/search 按城市名检索，过滤掉缺少坐标的条目；类别与评分缺失时取保守默认。
//! API key 取自环境变量 TRIPADVISOR_API_KEY。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{PoiCategory, PointOfInterest, PoiProvider, PoiQuery, ProviderError};

pub struct TripAdvisorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TripAdvisorClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("wayfarer/0.1")
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn from_env(base_url: &str, timeout_secs: u64) -> Option<Self> {
        let api_key = std::env::var("TRIPADVISOR_API_KEY").ok()?;
        Some(Self::new(base_url, &api_key, timeout_secs))
    }

    fn category_from_json(item: &Value) -> PoiCategory {
        let name = item
            .pointer("/category/name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();
        if name.contains("restaurant") || name.contains("food") {
            PoiCategory::Restaurant
        } else if name.contains("activity") || name.contains("tour") {
            PoiCategory::Activity
        } else {
            PoiCategory::Attraction
        }
    }

    fn poi_from_json(item: &Value) -> Option<PointOfInterest> {
        // 缺坐标的条目对路线规划无用，直接丢弃
        let latitude = item.get("latitude")?;
        let longitude = item.get("longitude")?;
        let parse = |v: &Value| -> Option<f64> {
            match v {
                Value::String(s) => s.parse().ok(),
                Value::Number(n) => n.as_f64(),
                _ => None,
            }
        };
        Some(PointOfInterest {
            id: item
                .get("location_id")
                .and_then(|v| v.as_str())
                .unwrap_or("?")
                .to_string(),
            name: item
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("Unnamed")
                .to_string(),
            latitude: parse(latitude)?,
            longitude: parse(longitude)?,
            category: Self::category_from_json(item),
            rating: item
                .get("rating")
                .and_then(|v| match v {
                    Value::String(s) => s.parse().ok(),
                    Value::Number(n) => n.as_f64(),
                    _ => None,
                })
                .unwrap_or(3.0),
        })
    }
}

#[async_trait]
impl PoiProvider for TripAdvisorClient {
    fn name(&self) -> &str {
        "tripadvisor"
    }

    async fn fetch_pois(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError> {
        let url = format!("{}/location/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("searchQuery", query.city.as_str()),
                ("language", "en"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ProviderError::Transient(e.to_string())
                } else {
                    ProviderError::Permanent(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(ProviderError::Transient(format!("HTTP {}", status)))
            } else {
                Err(ProviderError::Permanent(format!("HTTP {}", status)))
            };
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(e.to_string()))?;

        let pois = body
            .get("data")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(Self::poi_from_json)
                    .take(query.limit)
                    .collect()
            })
            .unwrap_or_default();
        Ok(pois)
    }
}
