//! Credentialed matrix/route service provider
//!
//! Each lookup is a one-unit, one-stop route request: the origin node is the
//! sole mobile unit and the destination node the sole stop. The service does
//! not report a usable travel time, so resolutions carry [`TravelTime::Unknown`].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{round_to, Credential, DistanceProvider, Resolution};
use crate::core::error::{Error, ProviderError, Result};
use crate::core::pairs::{Node, PairTask, TravelTime};

#[derive(Debug, Serialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl From<&Node> for Location {
    fn from(node: &Node) -> Self {
        Self {
            lat: node.lat,
            lng: node.lng,
        }
    }
}

#[derive(Debug, Serialize)]
struct Unit {
    id: String,
    start: Location,
    shift_start: Option<String>,
    shift_end: Option<String>,
}

#[derive(Debug, Serialize)]
struct Stop {
    id: String,
    location: Location,
    duration: u32,
}

#[derive(Debug, Serialize)]
struct RouteOptions {
    polylines: bool,
    avoid_tolls: bool,
    avoid_highways: bool,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    units: Vec<Unit>,
    stops: Vec<Stop>,
    options: RouteOptions,
}

impl RouteRequest {
    fn for_task(task: &PairTask) -> Self {
        Self {
            units: vec![Unit {
                id: task.from.name.clone(),
                start: Location::from(&task.from),
                shift_start: None,
                shift_end: None,
            }],
            stops: vec![Stop {
                id: task.to.name.clone(),
                location: Location::from(&task.to),
                duration: 0,
            }],
            options: RouteOptions {
                polylines: false,
                avoid_tolls: false,
                avoid_highways: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    /// Metres
    total_distance: Option<f64>,
    #[serde(default)]
    solution: Vec<UnitRoute>,
}

#[derive(Debug, Deserialize)]
struct UnitRoute {
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    distance: Option<f64>,
}

impl RouteResponse {
    /// Aggregate distance, or the first unit's first positive step distance
    fn distance_m(&self) -> Option<f64> {
        match self.total_distance {
            Some(total) if total > 0.0 => Some(total),
            _ => self.solution.first().and_then(|unit| {
                unit.steps
                    .iter()
                    .filter_map(|step| step.distance)
                    .find(|d| *d > 0.0)
            }),
        }
    }
}

fn parse_route(body: &str) -> std::result::Result<Resolution, ProviderError> {
    let response: RouteResponse = serde_json::from_str(body)?;
    let meters = response
        .distance_m()
        .ok_or_else(|| ProviderError::Malformed("no positive distance in response".to_string()))?;

    Ok(Resolution {
        distance_km: round_to(meters / 1000.0, 2),
        duration: TravelTime::Unknown,
    })
}

/// Provider backed by the credentialed route service
pub struct MatrixProvider {
    client: Client,
    base_url: Option<String>,
    delay: Duration,
}

impl MatrixProvider {
    pub fn new(client: Client, base_url: Option<&str>, delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            delay,
        }
    }
}

#[async_trait]
impl DistanceProvider for MatrixProvider {
    fn name(&self) -> &str {
        "matrix-service"
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn call_delay(&self) -> Duration {
        self.delay
    }

    fn validate(&self, credential: Option<&Credential>) -> Result<()> {
        if credential.is_none() {
            return Err(Error::Validation(
                "provider 'matrix-service' requires an API credential".to_string(),
            ));
        }
        if self.base_url.is_none() {
            return Err(Error::Validation(
                "provider 'matrix-service' has no service URL configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn resolve(
        &self,
        task: &PairTask,
        credential: Option<&Credential>,
    ) -> std::result::Result<Resolution, ProviderError> {
        // validate() guards both; reaching here without them is a caller bug
        // that must still not take the batch down.
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::Http("service URL not configured".to_string()))?;
        let credential =
            credential.ok_or_else(|| ProviderError::Http("missing credential".to_string()))?;

        let url = format!("{base_url}/v1/route");
        debug!("POST {url} ({} -> {})", task.from.name, task.to.name);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("bearer {}", credential.expose()))
            .json(&RouteRequest::for_task(task))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(format!("{status} from {url}")));
        }

        let body = response.text().await?;
        parse_route(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pairs::generate;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_task() -> PairTask {
        let nodes = vec![
            Node::new("Depot", 50.85, 4.35),
            Node::new("Shop", 51.22, 4.40),
        ];
        generate(&nodes).remove(0)
    }

    fn provider(base_url: Option<&str>) -> MatrixProvider {
        MatrixProvider::new(Client::new(), base_url, Duration::ZERO)
    }

    #[test]
    fn test_request_shape() {
        let request = serde_json::to_value(RouteRequest::for_task(&sample_task())).unwrap();
        assert_eq!(
            request,
            json!({
                "units": [{
                    "id": "Depot",
                    "start": {"lat": 50.85, "lng": 4.35},
                    "shift_start": null,
                    "shift_end": null
                }],
                "stops": [{
                    "id": "Shop",
                    "location": {"lat": 51.22, "lng": 4.40},
                    "duration": 0
                }],
                "options": {"polylines": false, "avoid_tolls": false, "avoid_highways": false}
            })
        );
    }

    #[test]
    fn test_parse_prefers_total_distance() {
        let body = r#"{"total_distance": 12340.0, "solution": [{"steps": [{"distance": 999.0}]}]}"#;
        let resolution = parse_route(body).unwrap();
        assert_eq!(resolution.distance_km, 12.34);
        assert_eq!(resolution.duration, TravelTime::Unknown);
    }

    #[test]
    fn test_parse_falls_back_to_first_positive_step() {
        let body = r#"{
            "total_distance": 0,
            "solution": [
                {"unit": "Depot", "steps": [{"id": "Depot", "distance": 0}, {"id": "Shop"}, {"id": "Shop", "distance": 8100.0}, {"distance": 50.0}]},
                {"unit": "Other", "steps": [{"distance": 1.0}]}
            ]
        }"#;
        assert_eq!(parse_route(body).unwrap().distance_km, 8.1);

        let body = r#"{"solution": [{"steps": [{"distance": 2500.0}]}]}"#;
        assert_eq!(parse_route(body).unwrap().distance_km, 2.5);
    }

    #[test]
    fn test_parse_without_any_distance_fails() {
        let body = r#"{"total_distance": 0, "solution": [{"steps": [{"distance": 0}]}]}"#;
        assert!(matches!(parse_route(body), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_route("not json"), Err(ProviderError::Malformed(_))));
    }

    #[test]
    fn test_validate_requires_credential_and_url() {
        let credential = Credential::new("token");

        assert!(matches!(
            provider(Some("http://svc")).validate(None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            provider(None).validate(credential.as_ref()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            provider(Some("  ")).validate(credential.as_ref()),
            Err(Error::Validation(_))
        ));
        assert!(provider(Some("http://svc/")).validate(credential.as_ref()).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/route"))
            .and(header("Authorization", "bearer s3cret"))
            .and(body_json(serde_json::to_value(RouteRequest::for_task(&sample_task())).unwrap()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_distance": 41234.0,
                "solution": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = Credential::new("s3cret");
        let resolution = provider(Some(&server.uri()))
            .resolve(&sample_task(), credential.as_ref())
            .await
            .unwrap();

        assert_eq!(resolution.distance_km, 41.23);
        assert_eq!(resolution.duration, TravelTime::Unknown);
    }

    #[tokio::test]
    async fn test_resolve_rejected_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let credential = Credential::new("wrong");
        let result = provider(Some(&server.uri()))
            .resolve(&sample_task(), credential.as_ref())
            .await;
        assert!(matches!(result, Err(ProviderError::Http(_))), "{result:?}");
    }
}
