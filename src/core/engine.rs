//! 预订引擎门面
//!
//! 对外只暴露两个操作：initiate（首条查询，分类意图并路由工具队列）与
//! continue_session（携 session_id 续接输入）。响应永远是良构的
//! {type, content, session_id, done}，传输层不需要处理崩溃形态。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::orchestrator::Orchestrator;
use crate::core::EngineError;
use crate::intent::{route, IntentClassifier, LlmIntentClassifier, LlmSlotExtractor};
use crate::llm::create_llm_from_config;
use crate::optimizer::OptimizerConfig;
use crate::providers::{
    AmadeusClient, FlightFailover, FlightProvider, HotelFailover, HotelProvider, MockFlightProvider,
    MockHotelProvider, MockPoiProvider, PoiFailover, PoiProvider, TripAdvisorClient,
};
use crate::session::{Session, SessionPhase, SessionStore};
use crate::tools::ToolDeps;

/// 响应类别：普通消息或需要回答的提问
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Message,
    Prompt,
}

/// 对外响应形态
#[derive(Debug, Clone, Serialize)]
pub struct EngineResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub content: String,
    pub session_id: String,
    pub done: bool,
}

/// 预订引擎：持有会话存储、意图分类器与工具依赖
pub struct BookingEngine {
    store: Arc<SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    orchestrator: Orchestrator,
    deps: Arc<ToolDeps>,
    sweeper_cancel: CancellationToken,
}

impl BookingEngine {
    /// 组件注入式构造（测试与自定义装配用）
    pub fn new(cfg: &AppConfig, classifier: Arc<dyn IntentClassifier>, deps: Arc<ToolDeps>) -> Self {
        let store = Arc::new(SessionStore::new(Duration::from_secs(
            cfg.app.session_timeout_secs,
        )));

        // 后台周期清理过期会话；shutdown 时取消
        let sweeper_cancel = CancellationToken::new();
        let sweep_interval = Duration::from_secs(cfg.app.sweep_interval_secs.max(1));
        {
            let store = store.clone();
            let cancel = sweeper_cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(sweep_interval) => {
                            let evicted = store.cleanup_expired().await;
                            if evicted > 0 {
                                tracing::info!(evicted, "expired sessions evicted");
                            }
                        }
                    }
                }
            });
        }

        Self {
            store,
            classifier,
            orchestrator: Orchestrator::new(deps.clone()),
            deps,
            sweeper_cancel,
        }
    }

    /// 从配置装配：有凭据用真实供应商，否则退回 Mock（便于无 Key 本地试跑）
    pub fn from_config(cfg: &AppConfig) -> Self {
        let llm = create_llm_from_config(cfg);
        let classifier = Arc::new(LlmIntentClassifier::new(llm.clone()));
        let extractor = Arc::new(LlmSlotExtractor::new(llm));

        let timeout = cfg.providers.request_timeout_secs;
        let ttl = Duration::from_secs(cfg.providers.cache_ttl_secs);

        let amadeus =
            AmadeusClient::from_env(&cfg.providers.amadeus.base_url, timeout).map(Arc::new);
        let (flight_primary, hotel_primary): (Arc<dyn FlightProvider>, Arc<dyn HotelProvider>) =
            match amadeus {
                Some(client) => (client.clone(), client),
                None => {
                    tracing::warn!("AMADEUS credentials not set, using mock flight/hotel providers");
                    (
                        Arc::new(MockFlightProvider::with_offers(3)),
                        Arc::new(MockHotelProvider::with_offers(3)),
                    )
                }
            };

        // 备用端点配置后作为同类目的替代供应商
        let flight_alternate: Option<Arc<dyn FlightProvider>> = cfg
            .providers
            .amadeus
            .fallback_base_url
            .as_deref()
            .and_then(|url| AmadeusClient::from_env(url, timeout))
            .map(|c| Arc::new(c) as Arc<dyn FlightProvider>);
        let hotel_alternate: Option<Arc<dyn HotelProvider>> = cfg
            .providers
            .amadeus
            .fallback_base_url
            .as_deref()
            .and_then(|url| AmadeusClient::from_env(url, timeout))
            .map(|c| Arc::new(c) as Arc<dyn HotelProvider>);

        let poi_primary: Arc<dyn PoiProvider> =
            match TripAdvisorClient::from_env(&cfg.providers.tripadvisor.base_url, timeout) {
                Some(client) => Arc::new(client),
                None => {
                    tracing::warn!("TRIPADVISOR_API_KEY not set, using mock POI provider");
                    Arc::new(MockPoiProvider::with_pois(12))
                }
            };

        let deps = Arc::new(ToolDeps {
            extractor,
            flights: Arc::new(FlightFailover::new(flight_primary, flight_alternate, ttl)),
            hotels: Arc::new(HotelFailover::new(hotel_primary, hotel_alternate, ttl)),
            pois: Arc::new(PoiFailover::new(poi_primary, None, ttl)),
            optimizer: OptimizerConfig::from(&cfg.optimizer),
            max_offers: cfg.providers.max_offers,
            max_pois: cfg.providers.max_pois,
        });

        Self::new(cfg, classifier, deps)
    }

    /// Initiate：铸造会话，分类意图并驱动到第一个挂起点或终态
    pub async fn initiate(&self, query: &str) -> EngineResponse {
        let (id, handle) = self.store.create().await;
        tracing::info!(session = %id, "session created");

        let mut session = handle.lock().await;
        self.start_session(&mut session, query).await
    }

    /// Continue：定位会话并续接输入；未知 / 已退役的 id 返回 SessionNotFound
    pub async fn continue_session(
        &self,
        session_id: &str,
        user_input: &str,
    ) -> Result<EngineResponse, EngineError> {
        let handle = self
            .store
            .get(session_id)
            .await
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;

        let mut session = handle.lock().await;
        if session.is_terminated() {
            // 终态会话等待清理期间收到的续接视同未知会话
            return Err(EngineError::SessionNotFound(session_id.to_string()));
        }
        session.touch();

        // 意图未明的会话把这次输入当作澄清重新分类
        if session.phase == SessionPhase::Created {
            return Ok(self.start_session(&mut session, user_input).await);
        }

        let turn = self.orchestrator.drive(&mut session, Some(user_input)).await;
        if turn.done {
            self.store.remove(session_id).await;
        }
        Ok(EngineResponse {
            kind: turn.kind,
            content: turn.content,
            session_id: session.id.clone(),
            done: turn.done,
        })
    }

    async fn start_session(&self, session: &mut Session, query: &str) -> EngineResponse {
        match self.classifier.classify(query).await {
            Ok(intent) => {
                tracing::info!(session = %session.id, %intent, "intent routed");
                session.intent = Some(intent);
                session.queue = route(intent);
                session.set_phase(SessionPhase::Routed);

                self.deps
                    .extractor
                    .extract_query(query, &mut session.slots)
                    .await;

                let turn = self.orchestrator.drive(session, None).await;
                if turn.done {
                    self.store.remove(&session.id).await;
                }
                EngineResponse {
                    kind: turn.kind,
                    content: turn.content,
                    session_id: session.id.clone(),
                    done: turn.done,
                }
            }
            Err(EngineError::IntentAmbiguous(_)) => {
                // 不明确不致命：保持 Created，下一条输入重新分类
                EngineResponse {
                    kind: ResponseKind::Prompt,
                    content: "I can help with flights, hotels, itineraries or a full trip. Could you say a bit more about what you need?".to_string(),
                    session_id: session.id.clone(),
                    done: false,
                }
            }
            Err(e) => {
                tracing::error!(session = %session.id, error = %e, "classification failed");
                session.set_phase(SessionPhase::Terminated);
                self.store.remove(&session.id).await;
                EngineResponse {
                    kind: ResponseKind::Message,
                    content: "Sorry - I could not process that request. Please try again later."
                        .to_string(),
                    session_id: session.id.clone(),
                    done: true,
                }
            }
        }
    }

    pub async fn active_sessions(&self) -> usize {
        self.store.active_count().await
    }

    /// 停掉后台清理任务（进程退出前调用）
    pub fn shutdown(&self) {
        self.sweeper_cancel.cancel();
    }
}
