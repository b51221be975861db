//! 会话数据模型
//!
//! 一次端到端对话为一个 Session：意图、待执行工具队列、当前激活工具、
//! 已收集的槽位参数与阶段标记。Session 只被绑定它的编排器在锁内修改。

pub mod store;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::intent::Intent;
use crate::tools::{ToolKind, TripTool};

pub use store::SessionStore;

/// 会话 ID（不透明令牌）
pub type SessionId = String;

/// 槽位键：required 列表按固定优先级排列，逐个追问
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Origin,
    Destination,
    DepartureDate,
    ReturnDate,
    Travelers,
    Preference,
}

impl SlotKey {
    /// 追问该槽位时的提示语
    pub fn prompt(&self) -> &'static str {
        match self {
            SlotKey::Origin => {
                "Which city or airport will you depart from? (e.g. JFK for New York)"
            }
            SlotKey::Destination => {
                "Where are you traveling to? (city name or IATA code, e.g. DEL for Delhi)"
            }
            SlotKey::DepartureDate => "What is your departure date? (YYYY-MM-DD)",
            SlotKey::ReturnDate => "What is your return date? (YYYY-MM-DD)",
            SlotKey::Travelers => "How many adult travelers (age 12 or older)?",
            SlotKey::Preference => "Any preference for the trip (tourism, food, relaxed)?",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SlotKey::Origin => "City/airport IATA code from which the traveler will depart",
            SlotKey::Destination => "City/airport IATA code to which the traveler is going",
            SlotKey::DepartureDate => "Date of departure in ISO 8601 YYYY-MM-DD format",
            SlotKey::ReturnDate => "Date of return in ISO 8601 YYYY-MM-DD format",
            SlotKey::Travelers => "Number of adult travelers (age 12 or older)",
            SlotKey::Preference => "Preference for the itinerary, empty if not specified",
        }
    }
}

/// 地点：城市名 + 主机场 IATA 代码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub name: String,
    pub iata: String,
}

/// 跨工具共享的槽位参数；先行工具收集后，后续工具不再重复追问
#[derive(Debug, Clone, Default)]
pub struct TripSlots {
    pub origin: Option<Place>,
    pub destination: Option<Place>,
    pub departure_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub travelers: Option<u32>,
    pub preference: Option<String>,
}

impl TripSlots {
    pub fn is_filled(&self, key: SlotKey) -> bool {
        match key {
            SlotKey::Origin => self.origin.is_some(),
            SlotKey::Destination => self.destination.is_some(),
            SlotKey::DepartureDate => self.departure_date.is_some(),
            SlotKey::ReturnDate => self.return_date.is_some(),
            SlotKey::Travelers => self.travelers.is_some(),
            SlotKey::Preference => self.preference.is_some(),
        }
    }

    /// 按给定优先级返回第一个缺失的槽位
    pub fn first_missing(&self, required: &[SlotKey]) -> Option<SlotKey> {
        required.iter().copied().find(|&k| !self.is_filled(k))
    }

    /// 行程天数 = 返程日 - 出发日；非正值视为退化输入
    pub fn trip_days(&self) -> Option<i64> {
        match (self.departure_date, self.return_date) {
            (Some(dep), Some(ret)) => Some((ret - dep).num_days()),
            _ => None,
        }
    }
}

/// 会话阶段（编排状态机的节点）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// 刚创建，意图尚未确定（含意图不明等待澄清的情况）
    Created,
    /// 意图已路由出工具队列
    Routed,
    ToolActive,
    /// 已向用户提问并挂起，等待下一次外部调用带来输入
    AwaitingInput,
    Processing,
    ToolComplete,
    /// 终态：不再接受输入，可从存储移除
    Terminated,
}

/// 单个会话
pub struct Session {
    pub id: SessionId,
    /// 由首条查询分类得出，之后不变
    pub intent: Option<Intent>,
    pub queue: VecDeque<ToolKind>,
    pub active: Option<Box<dyn TripTool>>,
    pub slots: TripSlots,
    pub phase: SessionPhase,
    /// 各工具完成后的结果摘要，终态时拼成最终答复
    pub reports: Vec<String>,
    pub created_at: Instant,
    pub last_active: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            intent: None,
            queue: VecDeque::new(),
            active: None,
            slots: TripSlots::default(),
            phase: SessionPhase::Created,
            reports: Vec::new(),
            created_at: Instant::now(),
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn set_phase(&mut self, phase: SessionPhase) {
        tracing::debug!(session = %self.id, from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
        self.touch();
    }

    pub fn is_terminated(&self) -> bool {
        self.phase == SessionPhase::Terminated
    }

    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.last_active.elapsed() > timeout
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_missing_follows_priority() {
        let mut slots = TripSlots::default();
        let required = [
            SlotKey::Origin,
            SlotKey::Destination,
            SlotKey::DepartureDate,
            SlotKey::ReturnDate,
            SlotKey::Travelers,
        ];
        assert_eq!(slots.first_missing(&required), Some(SlotKey::Origin));

        slots.origin = Some(Place {
            name: "New Delhi".into(),
            iata: "DEL".into(),
        });
        assert_eq!(slots.first_missing(&required), Some(SlotKey::Destination));

        slots.destination = Some(Place {
            name: "New York".into(),
            iata: "JFK".into(),
        });
        slots.departure_date = NaiveDate::from_ymd_opt(2024, 12, 20);
        slots.return_date = NaiveDate::from_ymd_opt(2025, 1, 5);
        slots.travelers = Some(2);
        assert_eq!(slots.first_missing(&required), None);
    }

    #[test]
    fn test_trip_days() {
        let mut slots = TripSlots::default();
        assert_eq!(slots.trip_days(), None);
        slots.departure_date = NaiveDate::from_ymd_opt(2024, 12, 20);
        slots.return_date = NaiveDate::from_ymd_opt(2024, 12, 23);
        assert_eq!(slots.trip_days(), Some(3));
    }

    #[test]
    fn test_session_ids_unique() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("session_"));
    }
}
