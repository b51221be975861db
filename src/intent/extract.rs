//! 槽位抽取
//!
//! 正则快速路径（日期 / IATA 代码 / 人数 / 常见城市）优先，抽不到的再走 LLM；
//! LLM 输出为 JSON，解析失败只是不填充，由工具层继续追问。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;

use crate::llm::{LlmClient, Message};
use crate::session::{Place, SlotKey, TripSlots};

/// 常见城市到主机场 IATA 代码的映射（快速路径；覆盖不到的交给 LLM）
const CITY_CODES: &[(&str, &str)] = &[
    ("new york", "JFK"),
    ("new delhi", "DEL"),
    ("delhi", "DEL"),
    ("london", "LHR"),
    ("paris", "CDG"),
    ("tokyo", "HND"),
    ("san francisco", "SFO"),
    ("los angeles", "LAX"),
    ("chicago", "ORD"),
    ("mumbai", "BOM"),
    ("singapore", "SIN"),
    ("dubai", "DXB"),
    ("sydney", "SYD"),
    ("rome", "FCO"),
    ("madrid", "MAD"),
    ("berlin", "BER"),
    ("amsterdam", "AMS"),
    ("bangkok", "BKK"),
];

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap())
}

fn month_day_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b",
        )
        .unwrap()
    })
}

fn day_month_year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?,?\s+(\d{4})\b",
        )
        .unwrap()
    })
}

fn travelers_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s*(?:adult|traveler|traveller|person|people|pax|guest)s?\b")
            .unwrap()
    })
}

fn month_number(prefix: &str) -> Option<u32> {
    let months = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    months
        .iter()
        .position(|m| prefix.to_lowercase().starts_with(m))
        .map(|p| p as u32 + 1)
}

/// 按出现顺序返回文本中的所有日期
fn find_dates(text: &str) -> Vec<NaiveDate> {
    let mut found: Vec<(usize, NaiveDate)> = Vec::new();

    for cap in iso_date_re().captures_iter(text) {
        if let (Some(m), Ok(y), Ok(mo), Ok(d)) = (
            cap.get(0),
            cap[1].parse::<i32>(),
            cap[2].parse::<u32>(),
            cap[3].parse::<u32>(),
        ) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, mo, d) {
                found.push((m.start(), date));
            }
        }
    }
    for cap in month_day_year_re().captures_iter(text) {
        if let (Some(m), Some(mo), Ok(d), Ok(y)) = (
            cap.get(0),
            month_number(&cap[1]),
            cap[2].parse::<u32>(),
            cap[3].parse::<i32>(),
        ) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, mo, d) {
                found.push((m.start(), date));
            }
        }
    }
    for cap in day_month_year_re().captures_iter(text) {
        if let (Some(m), Ok(d), Some(mo), Ok(y)) = (
            cap.get(0),
            cap[1].parse::<u32>(),
            month_number(&cap[2]),
            cap[3].parse::<i32>(),
        ) {
            if let Some(date) = NaiveDate::from_ymd_opt(y, mo, d) {
                found.push((m.start(), date));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.dedup_by_key(|(_, date)| *date);
    found.into_iter().map(|(_, date)| date).collect()
}

/// 解析单条日期输入（用户直接回复一个日期时）
fn parse_single_date(input: &str) -> Option<NaiveDate> {
    find_dates(input).into_iter().next()
}

/// 在文本中查找已知城市及其角色（出发地 / 目的地），按介词判断
fn find_places(text: &str) -> (Option<Place>, Option<Place>) {
    let lower = text.to_lowercase();
    let mut origin = None;
    let mut destination = None;
    let mut unassigned = None;

    for (name, code) in CITY_CODES {
        if let Some(pos) = lower.find(name) {
            let place = Place {
                name: title_case(name),
                iata: (*code).to_string(),
            };
            let before = lower[..pos].trim_end();
            if before.ends_with("from") {
                origin.get_or_insert(place);
            } else if before.ends_with("to") || before.ends_with("in") || before.ends_with("at") {
                destination.get_or_insert(place);
            } else {
                unassigned.get_or_insert(place);
            }
        }
    }

    // 只提到一个城市且无介词时，当作目的地
    if destination.is_none() {
        destination = unassigned;
    }
    (origin, destination)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_preference(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    ["relaxed", "packed", "food", "culture", "adventure", "shopping", "tourism"]
        .iter()
        .find(|kw| lower.contains(*kw))
        .map(|kw| (*kw).to_string())
}

/// 槽位抽取器：从首条查询批量抽取，或针对单个追问解析用户回复
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    /// 从自由文本中尽可能填充缺失槽位
    async fn extract_query(&self, text: &str, slots: &mut TripSlots);

    /// 针对单个槽位解析用户回复；返回 false 表示无法解析，调用方重新提问
    async fn extract_single(&self, key: SlotKey, input: &str, slots: &mut TripSlots) -> bool;
}

/// 正则快速路径 + LLM 兜底的抽取器
pub struct LlmSlotExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmSlotExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn apply_fast_paths(text: &str, slots: &mut TripSlots) {
        let dates = find_dates(text);
        if slots.departure_date.is_none() {
            slots.departure_date = dates.first().copied();
        }
        if slots.return_date.is_none() {
            slots.return_date = dates.get(1).copied();
        }

        let (origin, destination) = find_places(text);
        if slots.origin.is_none() {
            slots.origin = origin;
        }
        if slots.destination.is_none() {
            slots.destination = destination;
        }

        if slots.travelers.is_none() {
            slots.travelers = travelers_re()
                .captures(text)
                .and_then(|cap| cap[1].parse::<u32>().ok())
                .filter(|&n| n >= 1);
        }

        if slots.preference.is_none() {
            slots.preference = find_preference(text);
        }
    }

    /// LLM 兜底：让模型输出 JSON，只填充仍缺失的键
    async fn extract_with_llm(&self, text: &str, slots: &mut TripSlots) {
        let system_prompt = r#"You are an expert at extracting structured parameters for a travel booking function.
Extract parameter values from the user query and strictly do not make up any information.

Guidelines:
1. Use exact IATA codes for locations. If city names are given, use the main airport code
2. Use YYYY-MM-DD format for dates. If the year is not given, assume the current year
3. Do not make up any information and omit a key if unsure

Return a valid JSON object with any of these keys you can extract:
originLocationCode, originCity, destinationLocationCode, destinationCity,
departureDate, returnDate, adults, travelPlanPreference"#;

        let messages = vec![Message::system(system_prompt), Message::user(text)];
        let response = match self.llm.complete(&messages).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "slot extraction LLM call failed");
                return;
            }
        };

        let cleaned = response
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let parsed: serde_json::Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(_) => {
                tracing::debug!("slot extraction response was not JSON, ignoring");
                return;
            }
        };

        let text_of = |key: &str| -> Option<String> {
            parsed
                .get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if slots.origin.is_none() {
            if let Some(code) = text_of("originLocationCode") {
                slots.origin = Some(Place {
                    name: text_of("originCity").unwrap_or_else(|| code.clone()),
                    iata: code.to_uppercase(),
                });
            }
        }
        if slots.destination.is_none() {
            if let Some(code) = text_of("destinationLocationCode") {
                slots.destination = Some(Place {
                    name: text_of("destinationCity").unwrap_or_else(|| code.clone()),
                    iata: code.to_uppercase(),
                });
            }
        }
        if slots.departure_date.is_none() {
            slots.departure_date = text_of("departureDate").and_then(|s| parse_single_date(&s));
        }
        if slots.return_date.is_none() {
            slots.return_date = text_of("returnDate").and_then(|s| parse_single_date(&s));
        }
        if slots.travelers.is_none() {
            slots.travelers = parsed
                .get("adults")
                .and_then(|v| v.as_u64())
                .map(|n| n as u32)
                .filter(|&n| n >= 1);
        }
        if slots.preference.is_none() {
            slots.preference = text_of("travelPlanPreference");
        }
    }

    fn parse_place(input: &str) -> Option<Place> {
        let trimmed = input.trim();
        // 直接给出三字码
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            let code = trimmed.to_uppercase();
            return Some(Place {
                name: code.clone(),
                iata: code,
            });
        }
        let (origin, destination) = find_places(trimmed);
        origin.or(destination)
    }
}

#[async_trait]
impl SlotExtractor for LlmSlotExtractor {
    async fn extract_query(&self, text: &str, slots: &mut TripSlots) {
        Self::apply_fast_paths(text, slots);

        // 快速路径补不齐关键槽位时才动用 LLM
        let core_missing = slots.first_missing(&[
            SlotKey::Origin,
            SlotKey::Destination,
            SlotKey::DepartureDate,
            SlotKey::ReturnDate,
        ]);
        if core_missing.is_some() {
            self.extract_with_llm(text, slots).await;
        }
    }

    async fn extract_single(&self, key: SlotKey, input: &str, slots: &mut TripSlots) -> bool {
        match key {
            SlotKey::Origin => {
                if let Some(place) = Self::parse_place(input) {
                    slots.origin = Some(place);
                    return true;
                }
                let mut probe = TripSlots::default();
                self.extract_with_llm(&format!("Departing from: {}", input), &mut probe)
                    .await;
                if probe.origin.is_some() {
                    slots.origin = probe.origin;
                    return true;
                }
                false
            }
            SlotKey::Destination => {
                if let Some(place) = Self::parse_place(input) {
                    slots.destination = Some(place);
                    return true;
                }
                let mut probe = TripSlots::default();
                self.extract_with_llm(&format!("Traveling to: {}", input), &mut probe)
                    .await;
                if probe.destination.is_some() {
                    slots.destination = probe.destination;
                    return true;
                }
                false
            }
            SlotKey::DepartureDate => match parse_single_date(input) {
                Some(date) => {
                    slots.departure_date = Some(date);
                    true
                }
                None => false,
            },
            SlotKey::ReturnDate => match parse_single_date(input) {
                // 返程不得早于出发
                Some(date) if slots.departure_date.map(|d| date >= d).unwrap_or(true) => {
                    slots.return_date = Some(date);
                    true
                }
                _ => false,
            },
            SlotKey::Travelers => {
                let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
                match digits.parse::<u32>() {
                    Ok(n) if n >= 1 => {
                        slots.travelers = Some(n);
                        true
                    }
                    _ => false,
                }
            }
            SlotKey::Preference => {
                let trimmed = input.trim();
                if trimmed.is_empty() {
                    return false;
                }
                slots.preference = Some(trimmed.to_string());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn extractor() -> LlmSlotExtractor {
        LlmSlotExtractor::new(Arc::new(MockLlmClient::new()))
    }

    #[tokio::test]
    async fn test_extract_query_fast_paths() {
        let mut slots = TripSlots::default();
        extractor()
            .extract_query(
                "Book a flight from New Delhi to New York, departing Dec 20 2024, returning Jan 5 2025",
                &mut slots,
            )
            .await;

        assert_eq!(slots.origin.as_ref().map(|p| p.iata.as_str()), Some("DEL"));
        assert_eq!(
            slots.destination.as_ref().map(|p| p.iata.as_str()),
            Some("JFK")
        );
        assert_eq!(slots.departure_date, NaiveDate::from_ymd_opt(2024, 12, 20));
        assert_eq!(slots.return_date, NaiveDate::from_ymd_opt(2025, 1, 5));
        assert_eq!(slots.travelers, None);
    }

    #[tokio::test]
    async fn test_extract_query_travelers_and_preference() {
        let mut slots = TripSlots::default();
        extractor()
            .extract_query("Relaxed trip to Paris for 2 adults", &mut slots)
            .await;
        assert_eq!(slots.travelers, Some(2));
        assert_eq!(slots.preference.as_deref(), Some("relaxed"));
        assert_eq!(
            slots.destination.as_ref().map(|p| p.iata.as_str()),
            Some("CDG")
        );
    }

    #[tokio::test]
    async fn test_llm_fallback_fills_missing() {
        let llm = MockLlmClient::scripted([
            r#"{"originLocationCode": "SVO", "originCity": "Moscow", "destinationLocationCode": "PEK", "destinationCity": "Beijing", "departureDate": "2025-03-01"}"#,
        ]);
        let mut slots = TripSlots::default();
        LlmSlotExtractor::new(Arc::new(llm))
            .extract_query("Moscow to Beijing in March", &mut slots)
            .await;

        assert_eq!(slots.origin.as_ref().map(|p| p.iata.as_str()), Some("SVO"));
        assert_eq!(
            slots.destination.as_ref().map(|p| p.name.as_str()),
            Some("Beijing")
        );
        assert_eq!(slots.departure_date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[tokio::test]
    async fn test_extract_single_travelers() {
        let mut slots = TripSlots::default();
        assert!(extractor()
            .extract_single(SlotKey::Travelers, "2", &mut slots)
            .await);
        assert_eq!(slots.travelers, Some(2));

        assert!(!extractor()
            .extract_single(SlotKey::Travelers, "a few", &mut slots)
            .await);
    }

    #[tokio::test]
    async fn test_extract_single_iata_code() {
        let mut slots = TripSlots::default();
        assert!(extractor()
            .extract_single(SlotKey::Destination, "bom", &mut slots)
            .await);
        assert_eq!(
            slots.destination.as_ref().map(|p| p.iata.as_str()),
            Some("BOM")
        );
    }

    #[tokio::test]
    async fn test_return_before_departure_rejected() {
        let mut slots = TripSlots::default();
        slots.departure_date = NaiveDate::from_ymd_opt(2024, 12, 20);
        assert!(!extractor()
            .extract_single(SlotKey::ReturnDate, "2024-12-01", &mut slots)
            .await);
        assert_eq!(slots.return_date, None);
    }

    #[test]
    fn test_find_dates_ordinal_forms() {
        let dates = find_dates("from 20th December 2024 to 5th January 2025");
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            ]
        );
    }
}
