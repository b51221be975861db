//! 行程规划工具
//!
//! 收齐目的地与日期后抓取兴趣点，交给优化器做按天分组与路线排序，渲染为逐日计划。
//! 零兴趣点或零天数属于退化输入：返回明确的「无法规划」结果而非报错。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::FailureKind;
use crate::optimizer::{plan_itinerary, ItineraryPlan, OptimizerConfig};
use crate::providers::PoiQuery;
use crate::session::{SlotKey, TripSlots};
use crate::tools::protocol::{InputField, StepOutcome, ToolKind, TripTool};
use crate::tools::ToolDeps;

const REQUIRED: [SlotKey; 3] = [
    SlotKey::Destination,
    SlotKey::DepartureDate,
    SlotKey::ReturnDate,
];

pub struct ItineraryTool {
    deps: Arc<ToolDeps>,
    pending: Option<SlotKey>,
}

impl ItineraryTool {
    pub fn new(deps: Arc<ToolDeps>) -> Self {
        Self {
            deps,
            pending: None,
        }
    }

    /// 按偏好调整每日容量：relaxed 少排，packed 多排
    fn daily_capacity(&self, slots: &TripSlots) -> usize {
        let base = self.deps.optimizer.daily_capacity.max(1);
        match slots.preference.as_deref() {
            Some("relaxed") => (base - 1).max(1),
            Some("packed") => base + 1,
            _ => base,
        }
    }

    fn render_plan(city: &str, plan: &ItineraryPlan, poi_count: usize) -> String {
        let mut out = format!(
            "Here is your day-by-day plan for {} ({} places considered):\n",
            city, poi_count
        );
        for day in &plan.days {
            if day.is_free_day() {
                out.push_str(&format!("  Day {}: free day\n", day.day));
            } else {
                let stops: Vec<&str> = day.route.iter().map(|p| p.name.as_str()).collect();
                out.push_str(&format!("  Day {}: {}\n", day.day, stops.join(" -> ")));
            }
        }
        if plan.omitted > 0 {
            out.push_str(&format!(
                "Note: {} lower-rated places were left out to fit the daily capacity.\n",
                plan.omitted
            ));
        }
        out
    }
}

#[async_trait]
impl TripTool for ItineraryTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Itinerary
    }

    async fn step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome {
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

        let city = match &slots.destination {
            Some(place) => place.name.clone(),
            None => {
                return StepOutcome::Failed {
                    kind: FailureKind::Fatal,
                    message: "itinerary slots vanished mid-collection".to_string(),
                }
            }
        };

        let trip_days = slots.trip_days().unwrap_or(0);
        if trip_days <= 0 {
            return StepOutcome::Done(
                "Departure and return fall on the same day - there is no full day to plan, so no itinerary is possible.".to_string(),
            );
        }

        let query = PoiQuery {
            city: city.clone(),
            limit: self.deps.max_pois,
        };
        let pois = match self.deps.pois.fetch_pois(&query).await {
            Ok(pois) => pois,
            Err(e) => {
                return StepOutcome::Failed {
                    kind: FailureKind::ExternalProvider,
                    message: e.to_string(),
                }
            }
        };

        if pois.is_empty() {
            return StepOutcome::Done(format!(
                "I could not find any points of interest for {} - no itinerary is possible.",
                city
            ));
        }

        let cfg = OptimizerConfig {
            daily_capacity: self.daily_capacity(slots),
            ..self.deps.optimizer.clone()
        };
        let plan = plan_itinerary(&pois, trip_days as usize, &cfg);
        tracing::info!(
            city = %city,
            days = plan.days.len(),
            pois = plan.total_pois(),
            omitted = plan.omitted,
            "itinerary planned"
        );

        StepOutcome::Done(Self::render_plan(&city, &plan, pois.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Place;
    use crate::tools::tests::test_deps;
    use chrono::NaiveDate;

    fn slots_for(city: &str, days: u64) -> TripSlots {
        let departure = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        TripSlots {
            origin: None,
            destination: Some(Place {
                name: city.to_string(),
                iata: "JFK".into(),
            }),
            departure_date: Some(departure),
            return_date: Some(departure + chrono::Days::new(days)),
            travelers: Some(1),
            preference: None,
        }
    }

    #[tokio::test]
    async fn test_renders_day_by_day_plan() {
        let mut tool = ItineraryTool::new(test_deps(3, 3, 9));
        let mut slots = slots_for("New York", 3);

        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Done(text) => {
                assert!(text.contains("Day 1:"));
                assert!(text.contains("Day 3:"));
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_day_trip_degrades_gracefully() {
        let mut tool = ItineraryTool::new(test_deps(3, 3, 9));
        let mut slots = slots_for("New York", 0);

        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Done(text) => assert!(text.contains("no itinerary is possible")),
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_pois_degrades_gracefully() {
        let mut tool = ItineraryTool::new(test_deps(3, 3, 0));
        let mut slots = slots_for("Nowhereville", 3);

        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Done(text) => assert!(text.contains("no itinerary is possible")),
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relaxed_preference_lowers_capacity() {
        let mut tool = ItineraryTool::new(test_deps(3, 3, 9));
        let mut slots = slots_for("New York", 3);
        slots.preference = Some("relaxed".to_string());

        // 9 个兴趣点，3 天 x 容量 2 = 6 个名额，应报告 3 个被舍弃
        let outcome = tool.step(&mut slots, None).await;
        match outcome {
            StepOutcome::Done(text) => assert!(text.contains("3 lower-rated places")),
            other => panic!("expected Done, got {:?}", other),
        }
    }
}
