//! 供应商回退重试层
//!
//! 所有外部调用统一走一条策略：失败（瞬时）立即重试一次 → 未过期缓存 → 备用供应商 → 向上返回错误。
//! 每次调用输出结构化审计日志（JSON），记录走到了哪一步。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use super::{
    BookingConfirmation, FlightOffer, FlightProvider, FlightQuery, HotelOffer, HotelProvider,
    HotelQuery, PointOfInterest, PoiProvider, PoiQuery, ProviderError,
};

/// 供应商调用工厂：策略内部可能多次发起同一调用（重试），故传工厂而非 Future
pub type ProviderCall<'a, T> =
    Box<dyn Fn() -> BoxFuture<'a, Result<T, ProviderError>> + Send + Sync + 'a>;

/// 按查询键缓存的供应商结果，带 TTL
pub struct QueryCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, T)>>,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() <= self.ttl => Some(value.clone()),
            Some(_) => {
                // 过期条目顺手清掉
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: &str, value: T) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (Instant::now(), value));
    }
}

/// 回退策略主体：主供应商（瞬时失败重试一次）→ 缓存 → 备用供应商 → 错误
async fn run_policy<'a, T: Clone>(
    category: &'static str,
    key: &str,
    cache: Option<&QueryCache<T>>,
    primary: ProviderCall<'a, T>,
    alternate: Option<ProviderCall<'a, T>>,
) -> Result<T, ProviderError> {
    let start = Instant::now();

    let audit = |outcome: &str, ok: bool| {
        let line = serde_json::json!({
            "event": "provider_audit",
            "category": category,
            "key": key,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
        });
        tracing::info!(audit = %line.to_string(), "provider");
    };

    let mut last_err = match primary().await {
        Ok(value) => {
            if let Some(cache) = cache {
                cache.put(key, value.clone()).await;
            }
            audit("primary", true);
            return Ok(value);
        }
        Err(e) => e,
    };

    if matches!(last_err, ProviderError::Transient(_)) {
        match primary().await {
            Ok(value) => {
                if let Some(cache) = cache {
                    cache.put(key, value.clone()).await;
                }
                audit("retry", true);
                return Ok(value);
            }
            Err(e) => last_err = e,
        }
    }

    if let Some(cache) = cache {
        if let Some(value) = cache.get(key).await {
            tracing::warn!(category, key, "provider failed, serving cached result");
            audit("cache", true);
            return Ok(value);
        }
    }

    if let Some(alternate) = alternate {
        match alternate().await {
            Ok(value) => {
                if let Some(cache) = cache {
                    cache.put(key, value.clone()).await;
                }
                audit("alternate", true);
                return Ok(value);
            }
            Err(e) => last_err = e,
        }
    }

    audit("exhausted", false);
    Err(last_err)
}

/// 机票供应商的回退包装：检索结果带缓存，预订只走重试与备用
pub struct FlightFailover {
    primary: Arc<dyn FlightProvider>,
    alternate: Option<Arc<dyn FlightProvider>>,
    cache: QueryCache<Vec<FlightOffer>>,
}

impl FlightFailover {
    pub fn new(
        primary: Arc<dyn FlightProvider>,
        alternate: Option<Arc<dyn FlightProvider>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            alternate,
            cache: QueryCache::new(cache_ttl),
        }
    }

    pub async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let key = query.cache_key();
        let primary = make_call(self.primary.clone(), query.clone(), |p, q| async move {
            p.search(&q).await
        });
        let alternate = self.alternate.clone().map(|a| {
            make_call(a, query.clone(), |p, q| async move { p.search(&q).await })
        });
        run_policy("flights", &key, Some(&self.cache), primary, alternate).await
    }

    pub async fn book(
        &self,
        offer: &FlightOffer,
        travelers: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        let key = format!("flight-order:{}", offer.id);
        let primary = make_call(self.primary.clone(), offer.clone(), move |p, o| async move {
            p.book(&o, travelers).await
        });
        // 预订不缓存，也不切换供应商：所选报价只在主供应商有效
        run_policy("flights", &key, None, primary, None).await
    }
}

/// 酒店供应商的回退包装
pub struct HotelFailover {
    primary: Arc<dyn HotelProvider>,
    alternate: Option<Arc<dyn HotelProvider>>,
    cache: QueryCache<Vec<HotelOffer>>,
}

impl HotelFailover {
    pub fn new(
        primary: Arc<dyn HotelProvider>,
        alternate: Option<Arc<dyn HotelProvider>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            alternate,
            cache: QueryCache::new(cache_ttl),
        }
    }

    pub async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        let key = query.cache_key();
        let primary = make_call(self.primary.clone(), query.clone(), |p, q| async move {
            p.search(&q).await
        });
        let alternate = self.alternate.clone().map(|a| {
            make_call(a, query.clone(), |p, q| async move { p.search(&q).await })
        });
        run_policy("hotels", &key, Some(&self.cache), primary, alternate).await
    }

    pub async fn book(
        &self,
        offer: &HotelOffer,
        guests: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        let key = format!("hotel-order:{}", offer.id);
        let primary = make_call(self.primary.clone(), offer.clone(), move |p, o| async move {
            p.book(&o, guests).await
        });
        run_policy("hotels", &key, None, primary, None).await
    }
}

/// 兴趣点供应商的回退包装
pub struct PoiFailover {
    primary: Arc<dyn PoiProvider>,
    alternate: Option<Arc<dyn PoiProvider>>,
    cache: QueryCache<Vec<PointOfInterest>>,
}

impl PoiFailover {
    pub fn new(
        primary: Arc<dyn PoiProvider>,
        alternate: Option<Arc<dyn PoiProvider>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            alternate,
            cache: QueryCache::new(cache_ttl),
        }
    }

    pub async fn fetch_pois(
        &self,
        query: &PoiQuery,
    ) -> Result<Vec<PointOfInterest>, ProviderError> {
        let key = query.cache_key();
        let primary = make_call(self.primary.clone(), query.clone(), |p, q| async move {
            p.fetch_pois(&q).await
        });
        let alternate = self.alternate.clone().map(|a| {
            make_call(a, query.clone(), |p, q| async move { p.fetch_pois(&q).await })
        });
        run_policy("pois", &key, Some(&self.cache), primary, alternate).await
    }
}

/// 把 (供应商, 查询) 打包成可反复调用的工厂
fn make_call<'a, P, Q, T, F, Fut>(provider: Arc<P>, query: Q, f: F) -> ProviderCall<'a, T>
where
    P: ?Sized + Send + Sync + 'a,
    Q: Clone + Send + Sync + 'a,
    F: Fn(Arc<P>, Q) -> Fut + Send + Sync + 'a,
    Fut: std::future::Future<Output = Result<T, ProviderError>> + Send + 'a,
{
    Box::new(move || {
        let provider = provider.clone();
        let query = query.clone();
        Box::pin(f(provider, query))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockFlightProvider;
    use chrono::NaiveDate;

    fn query() -> FlightQuery {
        FlightQuery {
            origin: "DEL".into(),
            destination: "JFK".into(),
            departure: NaiveDate::from_ymd_opt(2024, 12, 20).unwrap(),
            return_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            adults: 2,
            max: 5,
        }
    }

    #[tokio::test]
    async fn test_primary_success() {
        let failover = FlightFailover::new(
            Arc::new(MockFlightProvider::with_offers(2)),
            None,
            Duration::from_secs(60),
        );
        let offers = failover.search(&query()).await.unwrap();
        assert_eq!(offers.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        // 第一次调用失败，重试成功
        let provider = MockFlightProvider::with_offers(1).failing_times(1);
        let failover = FlightFailover::new(Arc::new(provider), None, Duration::from_secs(60));
        let offers = failover.search(&query()).await.unwrap();
        assert_eq!(offers.len(), 1);
    }

    #[tokio::test]
    async fn test_cache_serves_after_exhaustion() {
        let provider = Arc::new(MockFlightProvider::with_offers(3));
        let failover = FlightFailover::new(provider.clone(), None, Duration::from_secs(60));

        // 先成功一次填充缓存，然后让供应商持续失败
        failover.search(&query()).await.unwrap();
        provider.fail_from_now_on();

        let offers = failover.search(&query()).await.unwrap();
        assert_eq!(offers.len(), 3);
    }

    #[tokio::test]
    async fn test_alternate_provider_used() {
        let primary = MockFlightProvider::with_offers(1);
        primary.fail_from_now_on();
        let failover = FlightFailover::new(
            Arc::new(primary),
            Some(Arc::new(MockFlightProvider::with_offers(4))),
            Duration::from_secs(60),
        );
        let offers = failover.search(&query()).await.unwrap();
        assert_eq!(offers.len(), 4);
    }

    #[tokio::test]
    async fn test_all_paths_exhausted() {
        let primary = MockFlightProvider::with_offers(1);
        primary.fail_from_now_on();
        let alternate = MockFlightProvider::with_offers(1);
        alternate.fail_from_now_on();
        let failover = FlightFailover::new(
            Arc::new(primary),
            Some(Arc::new(alternate)),
            Duration::from_secs(60),
        );
        assert!(failover.search(&query()).await.is_err());
    }

    #[tokio::test]
    async fn test_cache_expires() {
        let provider = Arc::new(MockFlightProvider::with_offers(2));
        let failover = FlightFailover::new(provider.clone(), None, Duration::from_millis(0));

        failover.search(&query()).await.unwrap();
        provider.fail_from_now_on();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // TTL 为 0，缓存立即过期，无备用供应商则失败
        assert!(failover.search(&query()).await.is_err());
    }
}
