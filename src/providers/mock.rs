//! Mock 供应商（用于测试，无需 API）
//!
//! 可预置候选数量与失败次数；fail_from_now_on 用于模拟供应商彻底不可用。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{
    BookingConfirmation, FlightOffer, FlightProvider, FlightQuery, HotelOffer, HotelProvider,
    HotelQuery, PoiCategory, PointOfInterest, PoiProvider, PoiQuery, ProviderError,
};

fn take_failure(remaining: &AtomicUsize, always: &AtomicBool) -> Option<ProviderError> {
    if always.load(Ordering::SeqCst) {
        return Some(ProviderError::Transient("provider offline".to_string()));
    }
    let mut current = remaining.load(Ordering::SeqCst);
    while current > 0 {
        match remaining.compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return Some(ProviderError::Transient("simulated failure".to_string())),
            Err(actual) => current = actual,
        }
    }
    None
}

/// Mock 机票供应商：返回固定数量的候选报价
#[derive(Default)]
pub struct MockFlightProvider {
    offers: usize,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
}

impl MockFlightProvider {
    pub fn with_offers(offers: usize) -> Self {
        Self {
            offers,
            ..Self::default()
        }
    }

    /// 前 n 次调用返回瞬时失败
    pub fn failing_times(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_from_now_on(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl FlightProvider for MockFlightProvider {
    fn name(&self) -> &str {
        "mock-flights"
    }

    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        if let Some(err) = take_failure(&self.fail_remaining, &self.fail_always) {
            return Err(err);
        }
        Ok((0..self.offers.min(query.max))
            .map(|i| FlightOffer {
                id: format!("MOCK-FL-{}", i + 1),
                carrier: "Mock Air".to_string(),
                departure: format!("{} {} 09:{:02}", query.origin, query.departure, 15 + i),
                arrival: format!("{} {}", query.destination, query.departure),
                price: 450.0 + i as f64 * 80.0,
                currency: "USD".to_string(),
            })
            .collect())
    }

    async fn book(
        &self,
        offer: &FlightOffer,
        travelers: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        if let Some(err) = take_failure(&self.fail_remaining, &self.fail_always) {
            return Err(err);
        }
        Ok(BookingConfirmation {
            order_id: format!("ORDER-{}", offer.id),
            description: format!("{} x{} travelers", offer.departure, travelers),
            price: offer.price * travelers as f64,
            currency: offer.currency.clone(),
        })
    }
}

/// Mock 酒店供应商
#[derive(Default)]
pub struct MockHotelProvider {
    offers: usize,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
}

impl MockHotelProvider {
    pub fn with_offers(offers: usize) -> Self {
        Self {
            offers,
            ..Self::default()
        }
    }

    pub fn failing_times(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_from_now_on(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl HotelProvider for MockHotelProvider {
    fn name(&self) -> &str {
        "mock-hotels"
    }

    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        if let Some(err) = take_failure(&self.fail_remaining, &self.fail_always) {
            return Err(err);
        }
        Ok((0..self.offers.min(query.max))
            .map(|i| HotelOffer {
                id: format!("MOCK-HT-{}", i + 1),
                hotel_name: format!("Mock Hotel {} ({})", i + 1, query.city_code),
                price: 120.0 + i as f64 * 40.0,
                currency: "USD".to_string(),
            })
            .collect())
    }

    async fn book(
        &self,
        offer: &HotelOffer,
        guests: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        if let Some(err) = take_failure(&self.fail_remaining, &self.fail_always) {
            return Err(err);
        }
        Ok(BookingConfirmation {
            order_id: format!("ORDER-{}", offer.id),
            description: format!("{} x{} guests", offer.hotel_name, guests),
            price: offer.price,
            currency: offer.currency.clone(),
        })
    }
}

/// Mock 兴趣点供应商：按网格铺开坐标，评分递减
#[derive(Default)]
pub struct MockPoiProvider {
    pois: usize,
    fail_remaining: AtomicUsize,
    fail_always: AtomicBool,
}

impl MockPoiProvider {
    pub fn with_pois(pois: usize) -> Self {
        Self {
            pois,
            ..Self::default()
        }
    }

    pub fn failing_times(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_from_now_on(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PoiProvider for MockPoiProvider {
    fn name(&self) -> &str {
        "mock-pois"
    }

    async fn fetch_pois(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, ProviderError> {
        if let Some(err) = take_failure(&self.fail_remaining, &self.fail_always) {
            return Err(err);
        }
        let categories = [
            PoiCategory::Attraction,
            PoiCategory::Restaurant,
            PoiCategory::Activity,
        ];
        Ok((0..self.pois.min(query.limit))
            .map(|i| PointOfInterest {
                id: format!("POI-{:03}", i + 1),
                name: format!("{} spot {}", query.city, i + 1),
                // 每三个一簇，簇间拉开距离
                latitude: 40.0 + (i / 3) as f64 * 0.5 + (i % 3) as f64 * 0.01,
                longitude: -74.0 + (i / 3) as f64 * 0.5 + (i % 3) as f64 * 0.01,
                category: categories[i % categories.len()],
                rating: 5.0 - i as f64 * 0.1,
            })
            .collect())
    }
}
