//! 意图层：识别用户查询的高层目标，抽取槽位参数，并路由到工具队列

pub mod classify;
pub mod extract;
pub mod router;

use serde::{Deserialize, Serialize};

pub use classify::{IntentClassifier, LlmIntentClassifier};
pub use extract::{LlmSlotExtractor, SlotExtractor};
pub use router::route;

/// 识别出的意图类型（封闭集合，每个会话只分类一次）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 只订机票
    Flights,
    /// 只订酒店
    Hotels,
    /// 只做行程规划
    Itinerary,
    /// 完整行程：机票 + 酒店 + 行程规划
    FullTrip,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Flights => write!(f, "flights"),
            Intent::Hotels => write!(f, "hotels"),
            Intent::Itinerary => write!(f, "itinerary"),
            Intent::FullTrip => write!(f, "full_trip"),
        }
    }
}
