//! 酒店预订工具
//!
//! 只需要目的地、日期与人数；这些在完整行程里通常已被机票工具收集，不再重复追问。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::FailureKind;
use crate::providers::{HotelOffer, HotelQuery};
use crate::session::{SlotKey, TripSlots};
use crate::tools::protocol::{parse_selection, InputField, StepOutcome, ToolKind, TripTool};
use crate::tools::ToolDeps;

const REQUIRED: [SlotKey; 4] = [
    SlotKey::Destination,
    SlotKey::DepartureDate,
    SlotKey::ReturnDate,
    SlotKey::Travelers,
];

enum Stage {
    Collect,
    AwaitSelection,
}

pub struct HotelTool {
    deps: Arc<ToolDeps>,
    stage: Stage,
    pending: Option<SlotKey>,
    offers: Vec<HotelOffer>,
}

impl HotelTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self {
            deps,
            stage: Stage::Collect,
            pending: None,
            offers: Vec::new(),
        }
    }

    fn render_offers(&self) -> String {
        let mut out = format!("Found {} hotel offers:\n", self.offers.len());
        for (i, offer) in self.offers.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} ({:.2} {} per stay)\n",
                i + 1,
                offer.hotel_name,
                offer.price,
                offer.currency
            ));
        }
        out
    }

    fn selection_prompt(&self) -> String {
        format!(
            "Reply with the number of the hotel to book (1-{}).",
            self.offers.len()
        )
    }

    async fn collect_step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome {
        if let (Some(key), Some(text)) = (self.pending, input) {
            if self.deps.extractor.extract_single(key, text, slots).await {
                self.pending = None;
            } else {
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

        let query = match (&slots.destination, slots.departure_date, slots.return_date) {
            (Some(destination), Some(check_in), Some(check_out)) => HotelQuery {
                city_code: destination.iata.clone(),
                check_in,
                check_out,
                adults: slots.travelers.unwrap_or(1),
                max: self.deps.max_offers,
            },
            _ => {
                return StepOutcome::Failed {
                    kind: FailureKind::Fatal,
                    message: "hotel slots vanished mid-collection".to_string(),
                }
            }
        };

        match self.deps.hotels.search(&query).await {
            Ok(offers) if offers.is_empty() => {
                slots.departure_date = None;
                slots.return_date = None;
                self.pending = Some(SlotKey::DepartureDate);
                StepOutcome::NeedsInput {
                    prompt: "No hotels available for those dates. Let's try different ones - what check-in date? (YYYY-MM-DD)".to_string(),
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
        let guests = slots.travelers.unwrap_or(1);
        tracing::info!(offer = %offer.id, guests, "booking hotel");

        match self.deps.hotels.book(&offer, guests).await {
            Ok(confirmation) => StepOutcome::Done(format!(
                "Hotel booked: {} (order {}), {:.2} {}.",
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
impl TripTool for HotelTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Hotel
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
    use crate::session::Place;
    use crate::tools::tests::test_deps;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_carried_forward_slots_skip_questions() {
        let mut tool = HotelTool::new(test_deps(3, 2, 9));
        // 机票工具已收集的参数直接复用，酒店工具不应再提问
        let mut slots = TripSlots {
            origin: Some(Place {
                name: "New Delhi".into(),
                iata: "DEL".into(),
            }),
            destination: Some(Place {
                name: "New York".into(),
                iata: "JFK".into(),
            }),
            departure_date: NaiveDate::from_ymd_opt(2024, 12, 20),
            return_date: NaiveDate::from_ymd_opt(2025, 1, 5),
            travelers: Some(2),
            preference: None,
        };

        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Progress(text) => assert!(text.contains("hotel offers")),
            other => panic!("expected Progress, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_destination_asked_first() {
        let mut tool = HotelTool::new(test_deps(3, 2, 9));
        let mut slots = TripSlots::default();

        let outcome = tool.step(&mut slots, None).await;
        assert!(matches!(
            outcome,
            StepOutcome::NeedsInput {
                field: InputField::Slot(SlotKey::Destination),
                ..
            }
        ));
    }
}
