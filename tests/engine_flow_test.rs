//! 引擎端到端集成测试：Mock 供应商 + 规则意图匹配驱动完整会话

use std::sync::Arc;
use std::time::Duration;

use wayfarer::config::AppConfig;
use wayfarer::core::{BookingEngine, EngineError, ResponseKind};
use wayfarer::intent::{IntentClassifier, LlmIntentClassifier, LlmSlotExtractor};
use wayfarer::llm::MockLlmClient;
use wayfarer::optimizer::OptimizerConfig;
use wayfarer::providers::{
    FlightFailover, HotelFailover, MockFlightProvider, MockHotelProvider, MockPoiProvider,
    PoiFailover,
};
use wayfarer::tools::ToolDeps;

fn engine_with(
    flights: MockFlightProvider,
    hotels: MockHotelProvider,
    pois: MockPoiProvider,
) -> BookingEngine {
    let cfg = AppConfig::default();
    let llm = Arc::new(MockLlmClient::new());
    let classifier: Arc<dyn IntentClassifier> = Arc::new(LlmIntentClassifier::new(llm.clone()));
    let ttl = Duration::from_secs(60);
    let deps = Arc::new(ToolDeps {
        extractor: Arc::new(LlmSlotExtractor::new(llm)),
        flights: Arc::new(FlightFailover::new(Arc::new(flights), None, ttl)),
        hotels: Arc::new(HotelFailover::new(Arc::new(hotels), None, ttl)),
        pois: Arc::new(PoiFailover::new(Arc::new(pois), None, ttl)),
        optimizer: OptimizerConfig::default(),
        max_offers: 5,
        max_pois: 30,
    });
    BookingEngine::new(&cfg, classifier, deps)
}

fn default_engine() -> BookingEngine {
    engine_with(
        MockFlightProvider::with_offers(3),
        MockHotelProvider::with_offers(3),
        MockPoiProvider::with_pois(9),
    )
}

#[tokio::test]
async fn test_flight_booking_conversation() {
    let engine = default_engine();

    // 查询已含出发地、目的地与日期，只缺人数
    let first = engine
        .initiate("Book a flight from New Delhi to New York, departing Dec 20 2024, returning Jan 5 2025")
        .await;
    assert_eq!(first.kind, ResponseKind::Prompt);
    assert!(!first.done);
    assert!(first.content.contains("How many adult travelers"));

    let second = engine
        .continue_session(&first.session_id, "2")
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert!(second.content.contains("flight offers"));
    assert!(second.content.contains("1."));
    assert_eq!(second.kind, ResponseKind::Prompt);

    let third = engine
        .continue_session(&first.session_id, "1")
        .await
        .unwrap();
    assert!(third.done);
    assert!(third.content.contains("Flight booked"));
    assert!(third.content.contains("completes your flights request"));

    // 终态会话已退役
    let err = engine
        .continue_session(&first.session_id, "thanks")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn test_full_trip_runs_tools_in_order_without_reasking() {
    let engine = default_engine();

    let first = engine
        .initiate("Book me a trip to New York from New Delhi, departing Dec 20 2024, returning Jan 5 2025, for 2 adults")
        .await;
    // 槽位齐全，直接进入机票候选
    assert!(first.content.contains("flight offers"));

    let second = engine
        .continue_session(&first.session_id, "1")
        .await
        .unwrap();
    // 机票订完立即进入酒店候选；目的地与日期不再重复追问
    assert!(second.content.contains("Flight booked"));
    assert!(second.content.contains("hotel offers"));
    assert!(!second.content.contains("Where are you traveling"));
    assert!(!second.content.contains("departure date?"));

    let third = engine
        .continue_session(&first.session_id, "2")
        .await
        .unwrap();
    // 酒店订完，行程规划无须输入直接完成，整个会话终止
    assert!(third.done);
    assert!(third.content.contains("Hotel booked"));
    assert!(third.content.contains("Day 1:"));
    // 终态附带单行摘要：机票确认已是两轮之前的输出
    assert!(third.content.contains("Trip summary:"));
    assert!(third.content.contains("completes your full_trip request"));
}

#[tokio::test]
async fn test_unknown_session_id_rejected() {
    let engine = default_engine();
    let live = engine.initiate("Book a flight to Paris").await;

    let err = engine
        .continue_session("session_does_not_exist", "2")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound(_)));

    // 其它会话不受影响，仍可继续
    assert_eq!(engine.active_sessions().await, 1);
    let next = engine.continue_session(&live.session_id, "DEL").await;
    assert!(next.is_ok());
}

#[tokio::test]
async fn test_session_id_minted_once_and_stable() {
    let engine = default_engine();

    let first = engine.initiate("Book a flight to Paris").await;
    assert!(first.session_id.starts_with("session_"));

    let second = engine
        .continue_session(&first.session_id, "DEL")
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);

    let other = engine.initiate("Book a flight to Rome").await;
    assert_ne!(other.session_id, first.session_id);
}

#[tokio::test]
async fn test_malformed_reply_reissues_single_prompt() {
    let engine = default_engine();

    let first = engine.initiate("Book a flight to Paris").await;
    assert_eq!(first.kind, ResponseKind::Prompt);
    assert!(first.content.contains("depart from"));

    // 读不懂的回复重发同一个问题，一次只挂起一个提问
    let retry = engine
        .continue_session(&first.session_id, "???")
        .await
        .unwrap();
    assert_eq!(retry.kind, ResponseKind::Prompt);
    assert!(!retry.done);
    assert!(retry.content.contains("depart from"));
    assert_eq!(retry.content.matches("depart from").count(), 1);
}

#[tokio::test]
async fn test_hotel_leg_failure_skips_to_itinerary() {
    let failing_hotels = MockHotelProvider::with_offers(2);
    failing_hotels.fail_from_now_on();
    let engine = engine_with(
        MockFlightProvider::with_offers(3),
        failing_hotels,
        MockPoiProvider::with_pois(9),
    );

    let first = engine
        .initiate("Book me a trip to New York from New Delhi, departing Dec 20 2024, returning Jan 5 2025, for 2 adults")
        .await;
    assert!(first.content.contains("flight offers"));

    let second = engine
        .continue_session(&first.session_id, "1")
        .await
        .unwrap();
    // 酒店段道歉后跳过，行程规划照常完成
    assert!(second.done);
    assert!(second.content.contains("Flight booked"));
    assert!(second.content.contains("hotel_booking service is unavailable"));
    assert!(second.content.contains("Skipping this step"));
    assert!(second.content.contains("Day 1:"));
}

#[tokio::test]
async fn test_ambiguous_intent_prompts_for_clarification() {
    let cfg = AppConfig::default();
    // 快速匹配命不中，LLM 也说 unclear → 澄清提问；第二次输入重新分类成功
    let llm = Arc::new(MockLlmClient::scripted(["unclear"]));
    let classifier: Arc<dyn IntentClassifier> = Arc::new(LlmIntentClassifier::new(llm));
    let ttl = Duration::from_secs(60);
    let deps = Arc::new(ToolDeps {
        extractor: Arc::new(LlmSlotExtractor::new(Arc::new(MockLlmClient::new()))),
        flights: Arc::new(FlightFailover::new(
            Arc::new(MockFlightProvider::with_offers(3)),
            None,
            ttl,
        )),
        hotels: Arc::new(HotelFailover::new(
            Arc::new(MockHotelProvider::with_offers(3)),
            None,
            ttl,
        )),
        pois: Arc::new(PoiFailover::new(
            Arc::new(MockPoiProvider::with_pois(9)),
            None,
            ttl,
        )),
        optimizer: OptimizerConfig::default(),
        max_offers: 5,
        max_pois: 30,
    });
    let engine = BookingEngine::new(&cfg, classifier, deps);

    let first = engine.initiate("help").await;
    assert_eq!(first.kind, ResponseKind::Prompt);
    assert!(!first.done);
    assert!(first.content.contains("flights, hotels, itineraries"));

    let second = engine
        .continue_session(&first.session_id, "I need a hotel in Paris")
        .await
        .unwrap();
    assert_eq!(second.kind, ResponseKind::Prompt);
    // 意图澄清后路由到酒店工具，开始收集缺失槽位
    assert!(second.content.contains("departure date") || second.content.contains("check-in"));
}

#[tokio::test]
async fn test_itinerary_only_intent() {
    let engine = default_engine();

    let first = engine
        .initiate("What are the best places to visit in Paris from 2025-05-01 to 2025-05-04?")
        .await;
    assert!(first.done);
    assert!(first.content.contains("Day 1:"));
    assert!(first.content.contains("Day 3:"));
    assert!(first.content.contains("completes your itinerary request"));
}
