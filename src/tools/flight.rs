//! 机票预订工具
//!
//! 槽位优先级：出发地 → 目的地 → 出发日期 → 返程日期 → 人数。
//! 集齐后经回退层检索报价，展示候选，校验用户选择，再显式下单。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::FailureKind;
use crate::providers::{FlightOffer, FlightQuery};
use crate::session::{SlotKey, TripSlots};
use crate::tools::protocol::{parse_selection, InputField, StepOutcome, ToolKind, TripTool};
use crate::tools::ToolDeps;

const REQUIRED: [SlotKey; 5] = [
    SlotKey::Origin,
    SlotKey::Destination,
    SlotKey::DepartureDate,
    SlotKey::ReturnDate,
    SlotKey::Travelers,
];

enum Stage {
    Collect,
    AwaitSelection,
}

pub struct FlightTool {
    deps: Arc<ToolDeps>,
    stage: Stage,
    /// 正在等待回复的槽位
    pending: Option<SlotKey>,
    offers: Vec<FlightOffer>,
}

impl FlightTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self {
            deps,
            stage: Stage::Collect,
            pending: None,
            offers: Vec::new(),
        }
    }

    fn render_offers(&self) -> String {
        let mut out = format!("Found {} flight offers:\n", self.offers.len());
        for (i, offer) in self.offers.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} {} -> {} ({:.2} {})\n",
                i + 1,
                offer.carrier,
                offer.departure,
                offer.arrival,
                offer.price,
                offer.currency
            ));
        }
        out
    }

    fn selection_prompt(&self) -> String {
        format!(
            "Reply with the number of the flight to book (1-{}).",
            self.offers.len()
        )
    }

    async fn collect_step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome {
        if let (Some(key), Some(text)) = (self.pending, input) {
            if self.deps.extractor.extract_single(key, text, slots).await {
                self.pending = None;
            } else {
                // 解析失败重发同一提问
                return StepOutcome::NeedsInput {
                    prompt: format!("Sorry, I could not read that. {}", key.prompt()),
                    field: InputField::Slot(key),
                };
            }
        }

        if let Some(key) = slots.first_missing(&REQUIRED) {
            self.pending = Some(key);
            return StepOutcome::NeedsInput {
                prompt: key.prompt().to_string(),
                field: InputField::Slot(key),
            };
        }

        let query = match (&slots.origin, &slots.destination, slots.departure_date, slots.return_date) {
            (Some(origin), Some(destination), Some(departure), Some(return_date)) => FlightQuery {
                origin: origin.iata.clone(),
                destination: destination.iata.clone(),
                departure,
                return_date,
                adults: slots.travelers.unwrap_or(1),
                max: self.deps.max_offers,
            },
            _ => {
                return StepOutcome::Failed {
                    kind: FailureKind::Fatal,
                    message: "flight slots vanished mid-collection".to_string(),
                }
            }
        };

        match self.deps.flights.search(&query).await {
            Ok(offers) if offers.is_empty() => {
                // 可换参数重查：清掉日期重新追问
                slots.departure_date = None;
                slots.return_date = None;
                self.pending = Some(SlotKey::DepartureDate);
                StepOutcome::NeedsInput {
                    prompt: "No flight offers found for those dates. Let's try different ones - what departure date? (YYYY-MM-DD)".to_string(),
                    field: InputField::Slot(SlotKey::DepartureDate),
                }
            }
            Ok(offers) => {
                self.offers = offers;
                self.stage = Stage::AwaitSelection;
                StepOutcome::Progress(self.render_offers())
            }
            Err(e) => StepOutcome::Failed {
                kind: FailureKind::ExternalProvider,
                message: e.to_string(),
            },
        }
    }

    async fn selection_step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome {
        let text = match input {
            Some(text) => text,
            None => {
                return StepOutcome::NeedsInput {
                    prompt: self.selection_prompt(),
                    field: InputField::Selection,
                }
            }
        };

        let choice = match parse_selection(text, self.offers.len()) {
            Some(n) => n,
            None => {
                return StepOutcome::NeedsInput {
                    prompt: format!("That is not a valid choice. {}", self.selection_prompt()),
                    field: InputField::Selection,
                }
            }
        };

        let offer = self.offers[choice - 1].clone();
        let travelers = slots.travelers.unwrap_or(1);
        tracing::info!(offer = %offer.id, travelers, "booking flight");

        match self.deps.flights.book(&offer, travelers).await {
            Ok(confirmation) => StepOutcome::Done(format!(
                "Flight booked: {} (order {}), total {:.2} {}.",
                confirmation.description,
                confirmation.order_id,
                confirmation.price,
                confirmation.currency
            )),
            Err(e) => StepOutcome::Failed {
                kind: FailureKind::ExternalProvider,
                message: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl TripTool for FlightTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Flight
    }

    async fn step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome {
        match self.stage {
            Stage::Collect => self.collect_step(slots, input).await,
            Stage::AwaitSelection => self.selection_step(slots, input).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tests::test_deps;
    use chrono::NaiveDate;

    fn filled_slots() -> TripSlots {
        TripSlots {
            origin: Some(crate::session::Place {
                name: "New Delhi".into(),
                iata: "DEL".into(),
            }),
            destination: Some(crate::session::Place {
                name: "New York".into(),
                iata: "JFK".into(),
            }),
            departure_date: NaiveDate::from_ymd_opt(2024, 12, 20),
            return_date: NaiveDate::from_ymd_opt(2025, 1, 5),
            travelers: Some(2),
            preference: None,
        }
    }

    #[tokio::test]
    async fn test_slots_asked_in_priority_order() {
        let mut tool = FlightTool::new(test_deps(3, 3, 9));
        let mut slots = TripSlots::default();

        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::NeedsInput { field, .. } => {
                assert_eq!(field, InputField::Slot(SlotKey::Origin));
            }
            other => panic!("expected NeedsInput, got {:?}", other),
        }

        let outcome = tool.step(&mut slots, Some("DEL")).await;
        match outcome {
            StepOutcome::NeedsInput { field, .. } => {
                assert_eq!(field, InputField::Slot(SlotKey::Destination));
            }
            other => panic!("expected NeedsInput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_reply_reasks_same_slot() {
        let mut tool = FlightTool::new(test_deps(3, 3, 9));
        let mut slots = TripSlots::default();

        let _ = tool.step(&mut slots, None).await;
        let outcome = tool.step(&mut slots, Some("???")).await;
        match outcome {
            StepOutcome::NeedsInput { field, .. } => {
                assert_eq!(field, InputField::Slot(SlotKey::Origin));
            }
            other => panic!("expected NeedsInput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_select_book() {
        let mut tool = FlightTool::new(test_deps(3, 3, 9));
        let mut slots = filled_slots();

        // 槽位齐全 → 展示候选
        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Progress(text) => assert!(text.contains("3 flight offers")),
            other => panic!("expected Progress, got {:?}", other),
        }

        // 下一步要求选择
        let outcome = tool.step(&mut slots, None).await;
        assert!(matches!(
            outcome,
            StepOutcome::NeedsInput {
                field: InputField::Selection,
                ..
            }
        ));

        // 非法选择重问，不默认
        let outcome = tool.step(&mut slots, Some("9")).await;
        assert!(matches!(
            outcome,
            StepOutcome::NeedsInput {
                field: InputField::Selection,
                ..
            }
        ));

        let outcome = tool.step(&mut slots, Some("1")).await;
        match outcome {
            StepOutcome::Done(text) => assert!(text.contains("Flight booked")),
            other => panic!("expected Done, got {:?}", other),
        }
    }
}
