//! OpenStreetMap Nominatim geocoder.
//!
//! The public instance forbids concurrent bulk requests and asks for at most
//! one request per second, so every call goes through [`NominatimGeocoder::pace`].

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

use super::{get_json, Geocoder, ServiceError};
use crate::common::{Address, Coordinates};

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct AddressFields {
    county: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    error: Option<String>,
    address: Option<AddressFields>,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl NominatimGeocoder {
    /// A zero `min_interval` disables pacing
    pub fn new(client: Client, base_url: &str, min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    /// Hold the caller until `min_interval` has passed since the previous request
    async fn pace(&self) {
        self.rate_limiter.until_ready().await;
    }
}

fn parse_coordinate(value: &str, field: &str) -> Result<f64, ServiceError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| ServiceError::malformed(format!("bad {} '{}': {}", field, value, e)))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Coordinates, ServiceError> {
        self.pace().await;

        let url = format!("{}/search", self.base_url);
        let context = format!("geocode '{}'", query);
        let hits: Vec<SearchHit> = get_json(
            &self.client,
            &url,
            &[("q", query), ("format", "jsonv2"), ("limit", "1")],
            &context,
        )
        .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::not_found(context))?;
        Ok(Coordinates {
            latitude: parse_coordinate(&hit.lat, "latitude")?,
            longitude: parse_coordinate(&hit.lon, "longitude")?,
        })
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Address, ServiceError> {
        self.pace().await;

        let url = format!("{}/reverse", self.base_url);
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let context = format!("reverse {},{}", lat, lon);
        let response: ReverseResponse = get_json(
            &self.client,
            &url,
            &[
                ("lat", &lat),
                ("lon", &lon),
                ("format", "jsonv2"),
                ("accept-language", "en"),
            ],
            &context,
        )
        .await?;

        if let Some(error) = response.error {
            return Err(ServiceError::not_found(format!("{}: {}", context, error)));
        }
        let fields = response
            .address
            .ok_or_else(|| ServiceError::malformed(format!("{}: missing address", context)))?;

        Ok(Address {
            county: fields.county,
            city: fields.city.or(fields.town).or(fields.village),
            state: fields.state,
            country: fields.country,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate() {
        assert_eq!(parse_coordinate(" 37.4275 ", "latitude").unwrap(), 37.4275);
        assert!(parse_coordinate("north", "latitude").unwrap_err().is_retryable());
    }

    #[test]
    fn test_reverse_response_shape() {
        let json = r#"{"address": {"town": "Palo Alto", "county": "Santa Clara County",
            "state": "California", "country": "United States"}}"#;
        let response: ReverseResponse = serde_json::from_str(json).unwrap();
        let fields = response.address.unwrap();
        assert_eq!(fields.town.as_deref(), Some("Palo Alto"));
        assert!(fields.city.is_none());
    }

    #[tokio::test]
    async fn test_pace_spaces_requests() {
        let client = Client::new();
        let interval = Duration::from_millis(50);
        let geocoder = NominatimGeocoder::new(client, "http://localhost", interval);

        let start = std::time::Instant::now();
        geocoder.pace().await;
        geocoder.pace().await;
        geocoder.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_zero_interval_does_not_pace() {
        let geocoder = NominatimGeocoder::new(Client::new(), "http://localhost", Duration::ZERO);

        geocoder.pace().await;
        assert!(geocoder.rate_limiter.check().is_ok());
    }
}
