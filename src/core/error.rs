//! 引擎错误类型
//!
//! 与编排状态机配合：可恢复错误（缺参数、可换参数重查）转回提问，
//! 供应商路径全部失败或会话损坏才终止会话。

use thiserror::Error;

/// 引擎运行过程中可能出现的错误（校验、意图、供应商、会话查找等）
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 意图不在封闭集合内或置信度不足，向用户追问而非终止
    #[error("Intent unclear: {0}")]
    IntentAmbiguous(String),

    /// 重试、缓存、备用供应商全部失败
    #[error("External provider unavailable: {0}")]
    ExternalProvider(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Malformed session state: {0}")]
    MalformedSession(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// 工具步进失败时携带的错误类别，编排器据此决定重新提问、跳过该段还是终止
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 输入无法校验，可通过重新提问恢复
    Validation,
    /// 供应商路径耗尽；多工具队列中可跳过该段
    ExternalProvider,
    /// 会话无法继续
    Fatal,
}
