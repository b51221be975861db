//! 外部供应商接口与数据类型
//!
//! 机票 / 酒店 / 兴趣点三类供应商各自一个 trait，具体实现有 Amadeus、TripAdvisor 与测试用 Mock；
//! 工具层一律经由 fallback 模块的回退重试包装访问，不直接持有具体客户端。

pub mod amadeus;
pub mod fallback;
pub mod mock;
pub mod tripadvisor;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use amadeus::AmadeusClient;
pub use fallback::{FlightFailover, HotelFailover, PoiFailover, QueryCache};
pub use mock::{MockFlightProvider, MockHotelProvider, MockPoiProvider};
pub use tripadvisor::TripAdvisorClient;

/// 供应商调用错误；Transient 允许立即重试一次
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider rejected request: {0}")]
    Permanent(String),
}

/// 航班查询参数（IATA 代码 + ISO 日期）
#[derive(Debug, Clone)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub departure: NaiveDate,
    pub return_date: NaiveDate,
    pub adults: u32,
    pub max: usize,
}

impl FlightQuery {
    /// 缓存键：同参查询命中同一条缓存
    pub fn cache_key(&self) -> String {
        format!(
            "flight:{}-{}:{}:{}:{}",
            self.origin, self.destination, self.departure, self.return_date, self.adults
        )
    }
}

/// 酒店查询参数
#[derive(Debug, Clone)]
pub struct HotelQuery {
    pub city_code: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: u32,
    pub max: usize,
}

impl HotelQuery {
    pub fn cache_key(&self) -> String {
        format!(
            "hotel:{}:{}:{}:{}",
            self.city_code, self.check_in, self.check_out, self.adults
        )
    }
}

/// 兴趣点查询参数
#[derive(Debug, Clone)]
pub struct PoiQuery {
    pub city: String,
    pub limit: usize,
}

impl PoiQuery {
    pub fn cache_key(&self) -> String {
        format!("poi:{}", self.city.to_lowercase())
    }
}

/// 航班报价候选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOffer {
    pub id: String,
    pub carrier: String,
    /// 出发段描述，如 "DEL 2024-12-20 09:15"
    pub departure: String,
    pub arrival: String,
    pub price: f64,
    pub currency: String,
}

/// 酒店报价候选
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelOffer {
    pub id: String,
    pub hotel_name: String,
    pub price: f64,
    pub currency: String,
}

/// 预订确认：仅在显式确认步骤产生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub order_id: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
}

/// 兴趣点类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiCategory {
    Attraction,
    Restaurant,
    Activity,
}

/// 兴趣点：外部供应商返回，优化器只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: PoiCategory,
    /// 0.0 - 5.0，容量超限时低分先被舍弃
    pub rating: f64,
}

/// 机票供应商：检索候选报价并预订所选报价
#[async_trait]
pub trait FlightProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError>;

    async fn book(
        &self,
        offer: &FlightOffer,
        travelers: u32,
    ) -> Result<BookingConfirmation, ProviderError>;
}

/// 酒店供应商
#[async_trait]
pub trait HotelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError>;

    async fn book(
        &self,
        offer: &HotelOffer,
        guests: u32,
    ) -> Result<BookingConfirmation, ProviderError>;
}

/// 兴趣点供应商
#[async_trait]
pub trait PoiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_pois(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError>;
}
