//! 意图识别
//!
//! 先做关键词快速匹配（不调用 LLM），多类命中视为完整行程；
//! 无法判断时走 LLM 分类，仍不明确则返回 IntentAmbiguous，由上层向用户澄清。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::EngineError;
use crate::intent::Intent;
use crate::llm::{LlmClient, Message};

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<Intent, EngineError>;
}

/// 规则快速匹配 + LLM 兜底的识别器
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmClient>,
    /// 启用快速规则匹配（不调用 LLM）
    enable_fast_match: bool,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            enable_fast_match: true,
        }
    }

    /// 快速规则匹配（不调用 LLM）
    fn fast_match(&self, query: &str) -> Option<Intent> {
        let q = query.to_lowercase();

        let wants_flight = ["flight", "fly ", "flying", "airfare", "plane ticket"]
            .iter()
            .any(|kw| q.contains(kw));
        let wants_hotel = ["hotel", "accommodation", "place to stay", "room"]
            .iter()
            .any(|kw| q.contains(kw));
        let wants_itinerary = [
            "itinerary",
            "things to do",
            "sightsee",
            "places to visit",
            "day plan",
            "plan my days",
        ]
        .iter()
        .any(|kw| q.contains(kw));

        let hits =
            usize::from(wants_flight) + usize::from(wants_hotel) + usize::from(wants_itinerary);
        if hits >= 2 {
            return Some(Intent::FullTrip);
        }
        if wants_flight {
            return Some(Intent::Flights);
        }
        if wants_hotel {
            return Some(Intent::Hotels);
        }
        if wants_itinerary {
            return Some(Intent::Itinerary);
        }

        // 「订个旅程」类说法没有点名任何单项，视为完整行程
        if ["trip", "vacation", "holiday", "getaway"]
            .iter()
            .any(|kw| q.contains(kw))
        {
            return Some(Intent::FullTrip);
        }

        None
    }

    async fn llm_classify(&self, query: &str) -> Result<Intent, EngineError> {
        let system_prompt = r#"You are an intent classifier for a travel booking assistant.
Classify the user's query into exactly one intent.

Output ONLY one of these intent types (no explanation):
- flights: booking or searching flights only
- hotels: booking or searching hotels only
- itinerary: planning what to do or visit at a destination
- full_trip: booking a whole trip (flight and hotel, usually with an itinerary)
- unclear: cannot determine intent

Output format: just the intent type, nothing else."#;

        let messages = vec![
            Message::system(system_prompt),
            Message::user(format!("User query: {}", query)),
        ];

        let response = self
            .llm
            .complete(&messages)
            .await
            .map_err(EngineError::Llm)?;

        match response.trim().to_lowercase().as_str() {
            "flights" => Ok(Intent::Flights),
            "hotels" => Ok(Intent::Hotels),
            "itinerary" => Ok(Intent::Itinerary),
            "full_trip" => Ok(Intent::FullTrip),
            other => Err(EngineError::IntentAmbiguous(other.to_string())),
        }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, query: &str) -> Result<Intent, EngineError> {
        if self.enable_fast_match {
            if let Some(intent) = self.fast_match(query) {
                tracing::debug!(%intent, "intent fast-matched");
                return Ok(intent);
            }
        }
        self.llm_classify(query).await
    }
}
