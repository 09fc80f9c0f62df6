//! HTTP implementation of the price client
//!
//! Talks to the upstream product-search API. The caller's credential rides
//! as a session cookie on every request; it is never logged.

use super::{LookupConfig, LookupError, LookupReply, PriceClient, ProductDetails};
use crate::error::{PricebatchError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

const SEARCH_PATH: &str = "/api/v6/products/search";
const SESSION_COOKIE: &str = "global_sid";
/// Route id the upstream expects on search requests
const CLIENT_ROUTE_ID: &str = "5fa0016c-9764-4e09-9738-12c33fb47fc2";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Reqwest-backed price client
#[derive(Clone)]
pub struct HttpPriceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPriceClient {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PricebatchError::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PriceClient for HttpPriceClient {
    async fn fetch(
        &self,
        auth_token: &SecretString,
        identifier: &str,
    ) -> std::result::Result<LookupReply, LookupError> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);

        let response = self
            .http
            .get(&url)
            .query(&[("term", identifier)])
            .header(header::ACCEPT, "application/json; charset=utf-8")
            .header("client-route-id", CLIENT_ROUTE_ID)
            .header(
                header::COOKIE,
                format!("{}={}", SESSION_COOKIE, auth_token.expose_secret()),
            )
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LookupError::AuthInvalid);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(LookupReply::NotCarried);
        }
        if !status.is_success() {
            // 429, 5xx, and anything else unexpected: worth another attempt
            return Err(LookupError::Transient(format!("upstream status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LookupError::Transient(format!("invalid upstream body: {e}")))?;

        Ok(parse_reply(&body))
    }
}

fn classify_request_error(err: reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Transient("request timed out".to_string())
    } else if err.is_connect() {
        LookupError::Transient(format!("connection failed: {err}"))
    } else {
        LookupError::Transient(format!("request failed: {err}"))
    }
}

/// Interpret the search response body
///
/// The endpoint answers 200 with an empty `entities.product` map when it
/// does not carry the item. When several products match, the first entry is
/// the best match.
fn parse_reply(body: &Value) -> LookupReply {
    match body.pointer("/entities/product").and_then(Value::as_object) {
        Some(products) if !products.is_empty() => {
            match products.values().next() {
                Some(product) => LookupReply::Found(extract_details(product)),
                None => LookupReply::NotCarried,
            }
        }
        _ => LookupReply::NotCarried,
    }
}

fn extract_details(product: &Value) -> ProductDetails {
    let current_price = amount(product.pointer("/price/current/amount"));
    let original_price = amount(product.pointer("/price/original/amount"));

    // Discount only when the item is actually marked down
    let discount_percentage = match (current_price, original_price) {
        (Some(current), Some(original)) if original > current && original > 0.0 => {
            Some(((original - current) / original * 100.0).round() as u32)
        }
        _ => None,
    };

    let category = product
        .get("categoryPath")
        .and_then(Value::as_array)
        .map(|path| {
            path.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" > ")
        })
        .unwrap_or_default();

    ProductDetails {
        name: string_field(product.get("name")),
        brand: string_field(product.get("brand")),
        available: product
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        category,
        image_url: string_field(product.pointer("/image/src")),
        current_price,
        original_price,
        discount_percentage,
        unit_price: amount(product.pointer("/price/unit/current/amount")),
        unit_label: string_field(product.pointer("/price/unit/label")),
        currency: string_field(product.pointer("/price/current/currency"))
            .unwrap_or_else(|| "CAD".to_string()),
    }
}

/// Price amounts arrive as either JSON numbers or decimal strings
fn amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reply_empty_entities_is_not_carried() {
        let body = json!({"entities": {"product": {}}});
        assert_eq!(parse_reply(&body), LookupReply::NotCarried);

        let body = json!({"entities": {}});
        assert_eq!(parse_reply(&body), LookupReply::NotCarried);
    }

    #[test]
    fn test_parse_reply_extracts_product() {
        let body = json!({
            "entities": {
                "product": {
                    "p-1": {
                        "productId": "p-1",
                        "name": "Oat Milk",
                        "brand": "Oatly",
                        "available": true,
                        "categoryPath": ["Dairy & Eggs", "Milk"],
                        "image": {"src": "https://img.example/oat.jpg"},
                        "price": {
                            "current": {"amount": "4.49", "currency": "CAD"},
                            "original": {"amount": "5.99"},
                            "unit": {"current": {"amount": "0.45"}, "label": "100ml"}
                        }
                    }
                }
            }
        });

        match parse_reply(&body) {
            LookupReply::Found(details) => {
                assert_eq!(details.name.as_deref(), Some("Oat Milk"));
                assert_eq!(details.brand.as_deref(), Some("Oatly"));
                assert!(details.available);
                assert_eq!(details.category, "Dairy & Eggs > Milk");
                assert_eq!(details.current_price, Some(4.49));
                assert_eq!(details.original_price, Some(5.99));
                assert_eq!(details.discount_percentage, Some(25));
                assert_eq!(details.unit_price, Some(0.45));
                assert_eq!(details.unit_label.as_deref(), Some("100ml"));
                assert_eq!(details.currency, "CAD");
                assert_eq!(
                    details.image_url.as_deref(),
                    Some("https://img.example/oat.jpg")
                );
            }
            LookupReply::NotCarried => panic!("expected a product"),
        }
    }

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        assert_eq!(amount(Some(&json!(3.5))), Some(3.5));
        assert_eq!(amount(Some(&json!("3.50"))), Some(3.5));
        assert_eq!(amount(Some(&json!(null))), None);
        assert_eq!(amount(None), None);
    }

    #[test]
    fn test_no_discount_when_not_marked_down() {
        let body = json!({
            "entities": {
                "product": {
                    "p-1": {
                        "name": "Eggs",
                        "price": {"current": {"amount": 5.0}, "original": {"amount": 5.0}}
                    }
                }
            }
        });

        match parse_reply(&body) {
            LookupReply::Found(details) => assert_eq!(details.discount_percentage, None),
            LookupReply::NotCarried => panic!("expected a product"),
        }
    }
}
