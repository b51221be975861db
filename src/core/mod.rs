//! 核心层：引擎门面、会话编排状态机与错误类型

pub mod engine;
pub mod error;
pub mod orchestrator;

pub use engine::{BookingEngine, EngineResponse, ResponseKind};
pub use error::{EngineError, FailureKind};
pub use orchestrator::{Orchestrator, TurnOutput};
