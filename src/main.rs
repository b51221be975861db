//! Wayfarer - Rust 旅行预订编排引擎
//!
//! 入口：初始化日志、从配置装配引擎，逐行读入用户输入驱动 Initiate/Continue。

use std::io::{BufRead, Write};

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wayfarer::config::load_config;
use wayfarer::BookingEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().context("bad directive")?))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        wayfarer::config::AppConfig::default()
    });

    let engine = BookingEngine::from_config(&cfg);

    println!("Wayfarer travel assistant. Describe your trip (Ctrl-D to quit).");
    let stdin = std::io::stdin();
    let mut current_session: Option<String> = None;

    print!("> ");
    std::io::stdout().flush().ok();

    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        let input = line.trim();
        if input.is_empty() {
            print!("> ");
            std::io::stdout().flush().ok();
            continue;
        }

        let response = match current_session.clone() {
            None => engine.initiate(input).await,
            Some(id) => match engine.continue_session(&id, input).await {
                Ok(response) => response,
                Err(e) => {
                    // 会话过期等情况：提示后开新会话
                    tracing::warn!(error = %e, "continue failed, starting fresh");
                    current_session = None;
                    engine.initiate(input).await
                }
            },
        };

        println!("{}", response.content);
        current_session = if response.done {
            println!("--- conversation finished ---");
            None
        } else {
            Some(response.session_id)
        };

        print!("> ");
        std::io::stdout().flush().ok();
    }

    engine.shutdown();
    Ok(())
}
