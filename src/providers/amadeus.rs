//! Amadeus 客户端：机票与酒店的检索、询价、下单
//!
//! 机票流程：OAuth token → flight-offers 检索 → pricing 询价 → flight-orders 下单；
//! 酒店流程：token → hotels/by-city 拉取城市酒店 → hotel-offers 询价 → hotel-orders 下单。
//! 凭据取自环境变量 AMADEUS_CLIENT_ID / AMADEUS_CLIENT_SECRET（沙箱端点可配置）。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    BookingConfirmation, FlightOffer, FlightProvider, FlightQuery, HotelOffer, HotelProvider,
    HotelQuery, ProviderError,
};

const USER_AGENT: &str = "wayfarer/0.1";

/// reqwest 错误映射：超时与连接问题视为瞬时，可重试
fn map_request_err(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() || e.is_connect() {
        ProviderError::Transient(e.to_string())
    } else {
        ProviderError::Permanent(e.to_string())
    }
}

/// HTTP 状态映射：5xx / 429 视为瞬时
fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else if status.is_server_error() || status.as_u16() == 429 {
        Err(ProviderError::Transient(format!("HTTP {}", status)))
    } else {
        Err(ProviderError::Permanent(format!("HTTP {}", status)))
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Amadeus API 客户端；同一实例同时充当机票与酒店供应商
pub struct AmadeusClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    /// access token 缓存（Amadeus token 约 30 分钟有效，提前刷新）
    token: Mutex<Option<(Instant, String)>>,
    /// 检索到的原始报价，按 id 暂存供下单时询价使用
    offer_stash: Mutex<HashMap<String, Value>>,
}

impl AmadeusClient {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token: Mutex::new(None),
            offer_stash: Mutex::new(HashMap::new()),
        }
    }

    /// 从环境变量读取凭据；缺失时返回 None（调用方可退回 Mock）
    pub fn from_env(base_url: &str, timeout_secs: u64) -> Option<Self> {
        let client_id = std::env::var("AMADEUS_CLIENT_ID").ok()?;
        let client_secret = std::env::var("AMADEUS_CLIENT_SECRET").ok()?;
        Some(Self::new(base_url, &client_id, &client_secret, timeout_secs))
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        {
            let token = self.token.lock().await;
            if let Some((fetched_at, value)) = token.as_ref() {
                if fetched_at.elapsed() < Duration::from_secs(25 * 60) {
                    return Ok(value.clone());
                }
            }
        }

        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(map_request_err)?;
        let body: Value = check_status(resp)?.json().await.map_err(map_request_err)?;

        let value = body
            .get("access_token")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProviderError::Permanent("token response missing access_token".into()))?
            .to_string();

        *self.token.lock().await = Some((Instant::now(), value.clone()));
        Ok(value)
    }

    async fn get_json(&self, url: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(map_request_err)?;
        check_status(resp)?.json().await.map_err(map_request_err)
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, ProviderError> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(map_request_err)?;
        check_status(resp)?.json().await.map_err(map_request_err)
    }

    /// 引擎不收集乘客证件信息，下单时按人数生成占位乘客条目（沙箱端点接受）
    fn traveler_stubs(travelers: u32) -> Vec<Value> {
        (1..=travelers)
            .map(|i| {
                serde_json::json!({
                    "id": i.to_string(),
                    "dateOfBirth": "1990-01-01",
                    "name": { "firstName": "TRAVELER", "lastName": format!("{}", i) },
                    "gender": "MALE",
                    "contact": {
                        "emailAddress": "traveler@example.com",
                        "phones": [{
                            "deviceType": "MOBILE",
                            "countryCallingCode": "1",
                            "number": "5550000000"
                        }]
                    }
                })
            })
            .collect()
    }

    fn flight_offer_from_json(offer: &Value) -> FlightOffer {
        let id = offer
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string();
        let carrier = offer
            .get("validatingAirlineCodes")
            .and_then(|v| v.get(0))
            .and_then(|v| v.as_str())
            .unwrap_or("??")
            .to_string();
        let segments = offer
            .pointer("/itineraries/0/segments")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let leg = |v: Option<&Value>| -> String {
            match v {
                Some(seg) => format!(
                    "{} {}",
                    seg.pointer("/iataCode").and_then(|c| c.as_str()).unwrap_or("?"),
                    seg.pointer("/at").and_then(|c| c.as_str()).unwrap_or("?")
                ),
                None => "?".to_string(),
            }
        };
        FlightOffer {
            id,
            carrier,
            departure: leg(segments.first().and_then(|s| s.get("departure"))),
            arrival: leg(segments.last().and_then(|s| s.get("arrival"))),
            price: as_f64(offer.pointer("/price/grandTotal").unwrap_or(&Value::Null)),
            currency: offer
                .pointer("/price/currency")
                .and_then(|v| v.as_str())
                .unwrap_or("USD")
                .to_string(),
        }
    }
}

#[async_trait]
impl FlightProvider for AmadeusClient {
    fn name(&self) -> &str {
        "amadeus-flights"
    }

    async fn search(&self, query: &FlightQuery) -> Result<Vec<FlightOffer>, ProviderError> {
        let url = format!("{}/v2/shopping/flight-offers", self.base_url);
        let params = [
            ("originLocationCode", query.origin.clone()),
            ("destinationLocationCode", query.destination.clone()),
            ("departureDate", query.departure.to_string()),
            ("returnDate", query.return_date.to_string()),
            ("adults", query.adults.to_string()),
            ("max", query.max.to_string()),
        ];
        let body = self.get_json(&url, &params).await?;

        let data = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut stash = self.offer_stash.lock().await;
        let offers = data
            .iter()
            .map(|raw| {
                let offer = Self::flight_offer_from_json(raw);
                stash.insert(format!("flight:{}", offer.id), raw.clone());
                offer
            })
            .collect();
        Ok(offers)
    }

    async fn book(
        &self,
        offer: &FlightOffer,
        travelers: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        let raw = self
            .offer_stash
            .lock()
            .await
            .get(&format!("flight:{}", offer.id))
            .cloned()
            .ok_or_else(|| {
                ProviderError::Permanent(format!("offer {} no longer available", offer.id))
            })?;

        // 询价确认报价仍有效
        let pricing_url = format!("{}/v1/shopping/flight-offers/pricing", self.base_url);
        let pricing_payload = serde_json::json!({
            "data": { "type": "flight-offers-pricing", "flightOffers": [raw] }
        });
        let pricing = self.post_json(&pricing_url, &pricing_payload).await?;
        let priced = pricing
            .pointer("/data/flightOffers/0")
            .cloned()
            .ok_or_else(|| ProviderError::Permanent("no priced flight offers found".into()))?;

        let orders_url = format!("{}/v1/booking/flight-orders", self.base_url);
        let order_payload = serde_json::json!({
            "data": {
                "type": "flight-order",
                "flightOffers": [priced],
                "travelers": Self::traveler_stubs(travelers),
            }
        });
        let order = self.post_json(&orders_url, &order_payload).await?;

        let order_id = order
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(BookingConfirmation {
            order_id,
            description: format!("{} {} -> {}", offer.carrier, offer.departure, offer.arrival),
            price: as_f64(priced.pointer("/price/grandTotal").unwrap_or(&Value::Null)),
            currency: offer.currency.clone(),
        })
    }
}

#[async_trait]
impl HotelProvider for AmadeusClient {
    fn name(&self) -> &str {
        "amadeus-hotels"
    }

    async fn search(&self, query: &HotelQuery) -> Result<Vec<HotelOffer>, ProviderError> {
        let list_url = format!(
            "{}/v1/reference-data/locations/hotels/by-city",
            self.base_url
        );
        let body = self
            .get_json(&list_url, &[("cityCode", query.city_code.clone())])
            .await?;

        let hotel_ids: Vec<String> = body
            .get("data")
            .and_then(|v| v.as_array())
            .map(|hotels| {
                hotels
                    .iter()
                    .filter_map(|h| h.get("hotelId").and_then(|v| v.as_str()))
                    .take(30)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if hotel_ids.is_empty() {
            return Ok(vec![]);
        }

        let offers_url = format!("{}/v3/shopping/hotel-offers", self.base_url);
        let params = [
            ("hotelIds", hotel_ids.join(",")),
            ("adults", query.adults.to_string()),
            ("checkInDate", query.check_in.to_string()),
            ("checkOutDate", query.check_out.to_string()),
            ("roomQuantity", "1".to_string()),
            ("paymentPolicy", "NONE".to_string()),
            ("bestRateOnly", "true".to_string()),
        ];
        let body = self.get_json(&offers_url, &params).await?;

        let data = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut stash = self.offer_stash.lock().await;
        let offers = data
            .iter()
            .filter_map(|entry| {
                let first_offer = entry.pointer("/offers/0")?;
                let id = first_offer.get("id")?.as_str()?.to_string();
                stash.insert(format!("hotel:{}", id), first_offer.clone());
                Some(HotelOffer {
                    id,
                    hotel_name: entry
                        .pointer("/hotel/name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("Unnamed hotel")
                        .to_string(),
                    price: as_f64(first_offer.pointer("/price/total").unwrap_or(&Value::Null)),
                    currency: first_offer
                        .pointer("/price/currency")
                        .and_then(|v| v.as_str())
                        .unwrap_or("USD")
                        .to_string(),
                })
            })
            .take(query.max)
            .collect();
        Ok(offers)
    }

    async fn book(
        &self,
        offer: &HotelOffer,
        guests: u32,
    ) -> Result<BookingConfirmation, ProviderError> {
        let known = self
            .offer_stash
            .lock()
            .await
            .contains_key(&format!("hotel:{}", offer.id));
        if !known {
            return Err(ProviderError::Permanent(format!(
                "hotel offer {} no longer available",
                offer.id
            )));
        }

        let guest_refs: Vec<Value> = (1..=guests)
            .map(|i| {
                serde_json::json!({
                    "tid": i,
                    "title": "MR",
                    "firstName": "TRAVELER",
                    "lastName": format!("{}", i),
                    "phone": "5550000000",
                    "email": "traveler@example.com"
                })
            })
            .collect();

        let orders_url = format!("{}/v2/booking/hotel-orders", self.base_url);
        // 沙箱端点要求完整支付结构，使用标准测试卡
        let payload = serde_json::json!({
            "data": {
                "type": "hotel-order",
                "roomAssociations": [{
                    "guestReferences": [{ "guestReference": guests.to_string() }],
                    "hotelOfferId": offer.id,
                }],
                "guests": guest_refs,
                "payment": {
                    "method": "CREDIT_CARD",
                    "paymentCard": {
                        "paymentCardInfo": {
                            "vendorCode": "VI",
                            "cardNumber": "4111111111111111",
                            "expiryDate": "2030-01",
                            "holderName": "TRAVELER ONE"
                        }
                    }
                }
            }
        });
        let order = self.post_json(&orders_url, &payload).await?;

        let order_id = order
            .pointer("/data/id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(BookingConfirmation {
            order_id,
            description: offer.hotel_name.clone(),
            price: offer.price,
            currency: offer.currency.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_offer_from_json() {
        let raw = serde_json::json!({
            "id": "7",
            "validatingAirlineCodes": ["AI"],
            "itineraries": [{
                "segments": [
                    { "departure": { "iataCode": "DEL", "at": "2024-12-20T09:15:00" },
                      "arrival": { "iataCode": "LHR", "at": "2024-12-20T14:00:00" } },
                    { "departure": { "iataCode": "LHR", "at": "2024-12-20T16:30:00" },
                      "arrival": { "iataCode": "JFK", "at": "2024-12-20T19:45:00" } }
                ]
            }],
            "price": { "grandTotal": "1240.50", "currency": "USD" }
        });
        let offer = AmadeusClient::flight_offer_from_json(&raw);
        assert_eq!(offer.id, "7");
        assert_eq!(offer.carrier, "AI");
        assert!(offer.departure.starts_with("DEL"));
        assert!(offer.arrival.starts_with("JFK"));
        assert!((offer.price - 1240.50).abs() < 1e-6);
    }

    #[test]
    fn test_flight_offer_from_json_tolerates_missing_fields() {
        let offer = AmadeusClient::flight_offer_from_json(&serde_json::json!({}));
        assert_eq!(offer.id, "?");
        assert_eq!(offer.price, 0.0);
        assert_eq!(offer.currency, "USD");
    }
}
