//! 会话编排状态机
//!
//! 驱动队首工具逐步推进：Progress 继续、NeedsInput 挂起、Done 换下一个工具、
//! Failed 视类别转为重新提问 / 跳过该段 / 终止。一次 drive 至多产生一个未答提问。

use std::sync::Arc;

use crate::core::engine::ResponseKind;
use crate::core::FailureKind;
use crate::session::{Session, SessionPhase};
use crate::tools::{build_tool, StepOutcome};

/// 一次外部调用驱动出的结果
#[derive(Debug, Clone)]
pub struct TurnOutput {
    pub kind: ResponseKind,
    pub content: String,
    pub done: bool,
}

pub struct Orchestrator {
    deps: Arc<crate::tools::ToolDeps>,
}

impl Orchestrator {
    pub fn new(deps: Arc<crate::tools::ToolDeps>) -> Self {
        Self { deps }
    }

    /// 推进会话直到挂起或终止；input 只喂给第一次工具步进
    pub async fn drive(&self, session: &mut Session, mut input: Option<&str>) -> TurnOutput {
        let mut parts: Vec<String> = Vec::new();

        loop {
            if session.active.is_none() {
                match session.queue.pop_front() {
                    Some(kind) => {
                        tracing::info!(session = %session.id, tool = %kind, "tool activated");
                        session.active = Some(build_tool(kind, &self.deps));
                        session.set_phase(SessionPhase::ToolActive);
                    }
                    None => {
                        session.set_phase(SessionPhase::Terminated);
                        parts.push(closing_line(session));
                        return TurnOutput {
                            kind: ResponseKind::Message,
                            content: parts.join("\n\n"),
                            done: true,
                        };
                    }
                }
            }

            session.set_phase(SessionPhase::Processing);
            let outcome = match session.active.as_mut() {
                Some(tool) => tool.step(&mut session.slots, input.take()).await,
                None => StepOutcome::Failed {
                    kind: FailureKind::Fatal,
                    message: "no active tool".to_string(),
                },
            };

            match outcome {
                StepOutcome::NeedsInput { prompt, .. } => {
                    session.set_phase(SessionPhase::AwaitingInput);
                    parts.push(prompt);
                    return TurnOutput {
                        kind: ResponseKind::Prompt,
                        content: parts.join("\n\n"),
                        done: false,
                    };
                }
                StepOutcome::Progress(text) => {
                    parts.push(text);
                    session.set_phase(SessionPhase::ToolActive);
                }
                StepOutcome::Done(report) => {
                    session.reports.push(report.clone());
                    parts.push(report);
                    session.active = None;
                    session.set_phase(SessionPhase::ToolComplete);
                }
                StepOutcome::Failed { kind, message } => {
                    let tool_name = session
                        .active
                        .as_ref()
                        .map(|t| t.kind().to_string())
                        .unwrap_or_else(|| "tool".to_string());

                    match kind {
                        FailureKind::Validation => {
                            // 工具级校验失败：转回提问
                            session.set_phase(SessionPhase::AwaitingInput);
                            parts.push(message);
                            return TurnOutput {
                                kind: ResponseKind::Prompt,
                                content: parts.join("\n\n"),
                                done: false,
                            };
                        }
                        FailureKind::ExternalProvider => {
                            tracing::warn!(
                                session = %session.id,
                                tool = %tool_name,
                                error = %message,
                                "provider paths exhausted"
                            );
                            session.active = None;
                            let apology = format!(
                                "Sorry - the {} service is unavailable right now ({}).",
                                tool_name, message
                            );
                            if session.queue.is_empty() {
                                session.set_phase(SessionPhase::Terminated);
                                parts.push(apology);
                                return TurnOutput {
                                    kind: ResponseKind::Message,
                                    content: parts.join("\n\n"),
                                    done: true,
                                };
                            }
                            // 多工具队列：跳过该段继续后续工具
                            parts.push(format!("{} Skipping this step and continuing.", apology));
                            session.set_phase(SessionPhase::ToolComplete);
                        }
                        FailureKind::Fatal => {
                            tracing::error!(
                                session = %session.id,
                                tool = %tool_name,
                                error = %message,
                                "fatal tool failure"
                            );
                            session.active = None;
                            session.set_phase(SessionPhase::Terminated);
                            parts.push(format!(
                                "Something went wrong and this conversation cannot continue ({}).",
                                message
                            ));
                            return TurnOutput {
                                kind: ResponseKind::Message,
                                content: parts.join("\n\n"),
                                done: true,
                            };
                        }
                    }
                }
            }
        }
    }
}

/// 终态收尾：多工具会话先给一份单行摘要（早前轮次的确认可能已滚出视野）
fn closing_line(session: &Session) -> String {
    let tail = match session.intent {
        Some(intent) => format!("That completes your {} request.", intent),
        None => "That completes your request.".to_string(),
    };
    if session.reports.len() > 1 {
        let bullets: Vec<String> = session
            .reports
            .iter()
            .map(|r| format!("- {}", r.lines().next().unwrap_or_default()))
            .collect();
        format!("Trip summary:\n{}\n\n{}", bullets.join("\n"), tail)
    } else {
        tail
    }
}
