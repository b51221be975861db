//! 工具层：分步协议与三个预订工具
//!
//! 工具由意图路由一次性选定，按队列顺序激活；共享依赖（抽取器、带回退的供应商、
//! 优化器参数）打包在 ToolDeps 里，由引擎构造后注入。

pub mod flight;
pub mod hotel;
pub mod itinerary;
pub mod protocol;

use std::sync::Arc;

use crate::intent::SlotExtractor;
use crate::optimizer::OptimizerConfig;
use crate::providers::{FlightFailover, HotelFailover, PoiFailover};

pub use flight::FlightTool;
pub use hotel::HotelTool;
pub use itinerary::ItineraryTool;
pub use protocol::{parse_selection, InputField, StepOutcome, ToolKind, TripTool};

/// 工具共享依赖
pub struct ToolDeps {
    pub extractor: Arc<dyn SlotExtractor>,
    pub flights: Arc<FlightFailover>,
    pub hotels: Arc<HotelFailover>,
    pub pois: Arc<PoiFailover>,
    pub optimizer: OptimizerConfig,
    /// 向用户展示的候选报价上限
    pub max_offers: usize,
    /// 行程规划抓取的兴趣点上限
    pub max_pois: usize,
}

/// 按类别实例化工具
pub fn build_tool(kind: ToolKind, deps: &Arc<ToolDeps>) -> Box<dyn TripTool> {
    match kind {
        ToolKind::Flight => Box::new(FlightTool::new(deps.clone())),
        ToolKind::Hotel => Box::new(HotelTool::new(deps.clone())),
        ToolKind::Itinerary => Box::new(ItineraryTool::new(deps.clone())),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::intent::LlmSlotExtractor;
    use crate::llm::MockLlmClient;
    use crate::providers::{MockFlightProvider, MockHotelProvider, MockPoiProvider};
    use std::time::Duration;

    /// 测试用依赖：Mock 供应商 + 回显 LLM
    pub(crate) fn test_deps(flights: usize, hotels: usize, pois: usize) -> Arc<ToolDeps> {
        let ttl = Duration::from_secs(60);
        Arc::new(ToolDeps {
            extractor: Arc::new(LlmSlotExtractor::new(Arc::new(MockLlmClient::new()))),
            flights: Arc::new(FlightFailover::new(
                Arc::new(MockFlightProvider::with_offers(flights)),
                None,
                ttl,
            )),
            hotels: Arc::new(HotelFailover::new(
                Arc::new(MockHotelProvider::with_offers(hotels)),
                None,
                ttl,
            )),
            pois: Arc::new(PoiFailover::new(
                Arc::new(MockPoiProvider::with_pois(pois)),
                None,
                ttl,
            )),
            optimizer: OptimizerConfig::default(),
            max_offers: 5,
            max_pois: 30,
        })
    }
}
