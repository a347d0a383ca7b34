//! OSRM route service provider
//!
//! Queries `GET /route/v1/driving/{lng},{lat};{lng},{lat}?overview=false` and
//! reads the first route's distance (metres) and duration (seconds).

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{round_to, Credential, DistanceProvider, Resolution};
use crate::core::error::ProviderError;
use crate::core::pairs::{PairTask, TravelTime};

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Metres
    distance: f64,
    /// Seconds
    duration: f64,
}

/// Provider backed by an OSRM-compatible routing server
pub struct OsrmProvider {
    client: Client,
    base_url: String,
    delay: Duration,
}

impl OsrmProvider {
    pub fn new(client: Client, base_url: &str, delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }

    fn route_url(&self, task: &PairTask) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url, task.from.lng, task.from.lat, task.to.lng, task.to.lat
        )
    }
}

/// Convert an OSRM payload into a resolution
fn parse_route(body: &str) -> Result<Resolution, ProviderError> {
    let response: RouteResponse = serde_json::from_str(body)?;

    if response.code != "Ok" {
        return Err(ProviderError::Status(response.code));
    }

    let route = response
        .routes
        .first()
        .ok_or_else(|| ProviderError::Malformed("route list is empty".to_string()))?;

    Ok(Resolution {
        distance_km: round_to(route.distance / 1000.0, 2),
        duration: TravelTime::Minutes(round_to(route.duration / 60.0, 1)),
    })
}

#[async_trait]
impl DistanceProvider for OsrmProvider {
    fn name(&self) -> &str {
        "public-routing"
    }

    fn call_delay(&self) -> Duration {
        self.delay
    }

    async fn resolve(
        &self,
        task: &PairTask,
        _credential: Option<&Credential>,
    ) -> Result<Resolution, ProviderError> {
        let url = self.route_url(task);
        debug!("GET {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // OSRM reports routing failures (NoRoute, InvalidQuery...) with a 4xx
        // status and a JSON code, so prefer the code when the body parses.
        match parse_route(&body) {
            Err(ProviderError::Malformed(_)) if !status.is_success() => {
                Err(ProviderError::Http(format!("{status} from {url}")))
            }
            result => result,
        }
    }
}
