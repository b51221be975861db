//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖（双下划线表示嵌套，
//! 如 `WAYFARER__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub optimizer: OptimizerSection,
}

/// [app] 段：应用名、会话过期与清理节奏
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 会话无活动超过该秒数后可被清理
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// 后台清理任务的扫描间隔（秒）
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            session_timeout_secs: default_session_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_session_timeout_secs() -> u64 {
    1800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub deepseek: LlmDeepSeekSection,
    #[serde(default)]
    pub openai: LlmOpenAiSection,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [providers] 段：供应商 HTTP 超时、重试、缓存与候选数量上限
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersSection {
    /// 单次供应商请求超时（秒）
    #[serde(default = "default_provider_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 查询结果缓存的有效期（秒）
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// 向用户展示的候选报价上限
    #[serde(default = "default_max_offers")]
    pub max_offers: usize,
    /// 行程规划抓取的兴趣点数量上限
    #[serde(default = "default_max_pois")]
    pub max_pois: usize,
    #[serde(default)]
    pub amadeus: AmadeusSection,
    #[serde(default)]
    pub tripadvisor: TripAdvisorSection,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_provider_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_offers: default_max_offers(),
            max_pois: default_max_pois(),
            amadeus: AmadeusSection::default(),
            tripadvisor: TripAdvisorSection::default(),
        }
    }
}

fn default_provider_timeout_secs() -> u64 {
    15
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_offers() -> usize {
    5
}

fn default_max_pois() -> usize {
    30
}

/// [providers.amadeus] 段：主端点与可选备用端点（凭据走环境变量）
#[derive(Debug, Clone, Deserialize)]
pub struct AmadeusSection {
    #[serde(default = "default_amadeus_base_url")]
    pub base_url: String,
    /// 备用端点；设置后作为同类目的替代供应商参与回退
    pub fallback_base_url: Option<String>,
}

impl Default for AmadeusSection {
    fn default() -> Self {
        Self {
            base_url: default_amadeus_base_url(),
            fallback_base_url: None,
        }
    }
}

fn default_amadeus_base_url() -> String {
    "https://test.api.amadeus.com".to_string()
}

/// [providers.tripadvisor] 段：兴趣点检索端点
#[derive(Debug, Clone, Deserialize)]
pub struct TripAdvisorSection {
    #[serde(default = "default_tripadvisor_base_url")]
    pub base_url: String,
}

impl Default for TripAdvisorSection {
    fn default() -> Self {
        Self {
            base_url: default_tripadvisor_base_url(),
        }
    }
}

fn default_tripadvisor_base_url() -> String {
    "https://api.content.tripadvisor.com/api/v1".to_string()
}

/// [optimizer] 段：行程优化器的可调参数
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSection {
    /// 每天可安排的兴趣点数（偏好未指定时的默认容量）
    #[serde(default = "default_daily_capacity")]
    pub daily_capacity: usize,
    /// 聚类迭代上限
    #[serde(default = "default_kmeans_max_iters")]
    pub kmeans_max_iters: usize,
    /// 单日路线交换改进的迭代上限
    #[serde(default = "default_route_swap_max_iters")]
    pub route_swap_max_iters: usize,
}

impl Default for OptimizerSection {
    fn default() -> Self {
        Self {
            daily_capacity: default_daily_capacity(),
            kmeans_max_iters: default_kmeans_max_iters(),
            route_swap_max_iters: default_route_swap_max_iters(),
        }
    }
}

fn default_daily_capacity() -> usize {
    3
}

fn default_kmeans_max_iters() -> usize {
    32
}

fn default_route_swap_max_iters() -> usize {
    64
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            providers: ProvidersSection::default(),
            optimizer: OptimizerSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.session_timeout_secs, 1800);
        assert_eq!(cfg.providers.max_offers, 5);
        assert_eq!(cfg.optimizer.daily_capacity, 3);
        assert!(cfg.providers.amadeus.base_url.contains("amadeus"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[optimizer]\ndaily_capacity = 4\n\n[providers]\nmax_offers = 2"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.optimizer.daily_capacity, 4);
        assert_eq!(cfg.providers.max_offers, 2);
        // 未覆盖的键保持默认
        assert_eq!(cfg.app.session_timeout_secs, 1800);
    }
}
