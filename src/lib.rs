//! Wayfarer - Rust 旅行预订编排引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 预订引擎门面、会话编排状态机、错误类型
//! - **session**: 会话数据模型与进程级会话存储
//! - **intent**: 意图识别、槽位抽取、意图到工具队列的路由
//! - **tools**: 分步工具协议与三个预订工具（机票 / 酒店 / 行程）
//! - **providers**: 外部供应商客户端（Amadeus / TripAdvisor / Mock）与回退重试层
//! - **optimizer**: 行程优化器（地理聚类 + 单日路线 + 日序排列）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod config;
pub mod core;
pub mod intent;
pub mod llm;
pub mod optimizer;
pub mod providers;
pub mod session;
pub mod tools;

pub use crate::core::{BookingEngine, EngineError, EngineResponse, ResponseKind};
