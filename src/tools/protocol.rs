//! 分步工具协议
//!
//! 每个预订工具实现 TripTool：step 接收共享槽位与最新用户输入，返回四种结局之一。
//! 工具内部是显式阶段机：收集槽位 → 检索候选 → 等待选择 → 确认下单，
//! 每次外部调用推进一步，挂起时不保留任何阻塞的执行上下文。

use async_trait::async_trait;

use crate::core::FailureKind;
use crate::session::{SlotKey, TripSlots};

/// 工具类别（封闭集合，由意图路由一次性选定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Flight,
    Hotel,
    Itinerary,
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolKind::Flight => write!(f, "flight_booking"),
            ToolKind::Hotel => write!(f, "hotel_booking"),
            ToolKind::Itinerary => write!(f, "itinerary_planning"),
        }
    }
}

/// 当前在等待哪类输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    /// 某个缺失槽位
    Slot(SlotKey),
    /// 候选列表中的序号
    Selection,
}

/// 工具单步结局；每次 step 恰好返回其中一种
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// 需要用户补充输入，编排器挂起会话并转发 prompt
    NeedsInput { prompt: String, field: InputField },
    /// 中间信息（如候选列表），编排器继续推进同一工具
    Progress(String),
    /// 工具完成，载荷为面向用户的结果文本
    Done(String),
    /// 工具失败，kind 决定重新提问、跳过还是终止
    Failed { kind: FailureKind, message: String },
}

/// 可恢复的分步工具
#[async_trait]
pub trait TripTool: Send {
    fn kind(&self) -> ToolKind;

    /// 推进一步；input 为本次外部调用携带的用户输入（首次推进时为空）
    async fn step(&mut self, slots: &mut TripSlots, input: Option<&str>) -> StepOutcome;
}

/// 解析候选序号（1 起始）；格式错误或越界返回 None，调用方重发同一提问
pub fn parse_selection(input: &str, count: usize) -> Option<usize> {
    let trimmed = input.trim().trim_end_matches('.');
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1", 5), Some(1));
        assert_eq!(parse_selection(" 3 ", 5), Some(3));
        assert_eq!(parse_selection("2.", 5), Some(2));
        // 越界与非数字都拒绝，绝不默认选择
        assert_eq!(parse_selection("6", 5), None);
        assert_eq!(parse_selection("0", 5), None);
        assert_eq!(parse_selection("the first one", 5), None);
        assert_eq!(parse_selection("", 5), None);
    }
}
