//! Adafruit IO REST lookup of a feed's most recent value.
//!
//! Used once at boot to restore the dashboard's auto-close switch.  The
//! feed path is the same string as the MQTT topic
//! (`{user}/feeds/{group}.{key}`); the API key travels as a query
//! parameter.

use log::info;
use serde::Deserialize;

use crate::app::ports::FeedLookupPort;
use crate::error::LookupError;

pub type FeedValue = heapless::String<64>;

const API_BASE: &str = "https://io.adafruit.com/api/v2";

/// Largest response body accepted from the feed endpoint.
const MAX_BODY: usize = 4096;

#[derive(Debug, Deserialize)]
struct FeedDetails {
    last_value: Option<String>,
}

pub fn feed_url(feed: &str, key: &str) -> String {
    format!("{API_BASE}/{feed}/?X-AIO-Key={key}")
}

/// Extract `last_value` from a feed-details JSON body.
pub fn parse_last_value(body: &[u8]) -> Result<FeedValue, LookupError> {
    let details: FeedDetails = serde_json::from_slice(body).map_err(|_| LookupError::Malformed)?;
    let value = details.last_value.ok_or(LookupError::NoValue)?;
    FeedValue::try_from(value.as_str()).map_err(|_| LookupError::Malformed)
}

pub struct AioFeedLookup {
    key: &'static str,
    #[cfg(not(target_os = "espidf"))]
    sim_responses: std::collections::HashMap<String, (u16, Vec<u8>)>,
}

impl AioFeedLookup {
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            #[cfg(not(target_os = "espidf"))]
            sim_responses: std::collections::HashMap::new(),
        }
    }

    /// Simulation: answer requests for `feed` with `status` and `body`.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_respond(&mut self, feed: &str, status: u16, body: &[u8]) {
        self.sim_responses.insert(feed.to_owned(), (status, body.to_vec()));
    }

    #[cfg(target_os = "espidf")]
    fn get(&self, url: &str) -> Result<(u16, Vec<u8>), LookupError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};

        let mut conn = EspHttpConnection::new(&Configuration {
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|_| LookupError::Request)?;

        conn.initiate_request(Method::Get, url, &[("accept", "application/json")])
            .map_err(|_| LookupError::Request)?;
        conn.initiate_response().map_err(|_| LookupError::Request)?;
        let status = conn.status();

        let mut body = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = conn.read(&mut chunk).map_err(|_| LookupError::Request)?;
            if n == 0 {
                break;
            }
            if body.len() + n > MAX_BODY {
                return Err(LookupError::Malformed);
            }
            body.extend_from_slice(&chunk[..n]);
        }
        Ok((status, body))
    }

    #[cfg(not(target_os = "espidf"))]
    fn get(&self, url: &str) -> Result<(u16, Vec<u8>), LookupError> {
        let feed = url
            .strip_prefix(API_BASE)
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.split("/?").next())
            .ok_or(LookupError::Request)?;
        let (status, body) = self.sim_responses.get(feed).cloned().ok_or(LookupError::Request)?;
        if body.len() > MAX_BODY {
            return Err(LookupError::Malformed);
        }
        Ok((status, body))
    }
}

impl FeedLookupPort for AioFeedLookup {
    fn last_value(&mut self, feed: &str) -> Result<FeedValue, LookupError> {
        info!("Fetching last value of {feed}");
        let (status, body) = self.get(&feed_url(feed, self.key))?;
        if status != 200 {
            return Err(LookupError::Status(status));
        }
        parse_last_value(&body)
    }
}
