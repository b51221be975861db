//! 意图路由：确定性的查表，把意图映射为有序工具队列
//!
//! 完整行程固定为 机票 → 酒店 → 行程规划，先行工具收集的参数向后传递。

use std::collections::VecDeque;

use crate::intent::Intent;
use crate::tools::ToolKind;

pub fn route(intent: Intent) -> VecDeque<ToolKind> {
    match intent {
        Intent::Flights => VecDeque::from([ToolKind::Flight]),
        Intent::Hotels => VecDeque::from([ToolKind::Hotel]),
        Intent::Itinerary => VecDeque::from([ToolKind::Itinerary]),
        Intent::FullTrip => {
            VecDeque::from([ToolKind::Flight, ToolKind::Hotel, ToolKind::Itinerary])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_intents_route_to_one_tool() {
        assert_eq!(route(Intent::Flights), VecDeque::from([ToolKind::Flight]));
        assert_eq!(route(Intent::Hotels), VecDeque::from([ToolKind::Hotel]));
        assert_eq!(
            route(Intent::Itinerary),
            VecDeque::from([ToolKind::Itinerary])
        );
    }

    #[test]
    fn test_full_trip_order_is_fixed() {
        assert_eq!(
            route(Intent::FullTrip),
            VecDeque::from([ToolKind::Flight, ToolKind::Hotel, ToolKind::Itinerary])
        );
    }
}
