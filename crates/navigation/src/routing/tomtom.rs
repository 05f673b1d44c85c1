use async_trait::async_trait;
use itertools::Itertools;
use log::{debug, info};
use model::{
    geo::Coordinate,
    itinerary::{Route, Step, TravelMethod},
};
use reqwest::Method;
use serde::Deserialize;

use crate::{
    avoidance::AvoidAreas, http::read_json, retry::RetryPolicy, NavigationError, Result,
};

use super::{RouteRequest, RoutingEngine};

pub fn travel_mode(method: TravelMethod) -> &'static str {
    match method {
        TravelMethod::Car => "car",
        TravelMethod::Bike => "bicycle",
        TravelMethod::Foot => "pedestrian",
        // no rail routing, buses follow roads
        TravelMethod::Train => "bus",
    }
}

/// A `calculateRoute` call ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculateRoute {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<AvoidAreas>,
}

impl CalculateRoute {
    /// Constrained calculations carry their avoid areas as a POST body.
    pub fn method(&self) -> Method {
        match self.body {
            Some(_) => Method::POST,
            None => Method::GET,
        }
    }
}

pub struct TomTomRouting {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl TomTomRouting {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn prepare(&self, request: &RouteRequest) -> CalculateRoute {
        CalculateRoute {
            url: format!(
                "{}/routing/1/calculateRoute/{}:{}/json",
                self.base_url,
                request.departure.lat_lon(),
                request.arrival.lat_lon()
            ),
            query: vec![
                ("key", self.api_key.clone()),
                ("travelMode", travel_mode(request.method).to_owned()),
                ("routeType", request.preference.as_str().to_owned()),
                ("instructionsType", "text".to_owned()),
            ],
            body: request.avoid.clone(),
        }
    }

    async fn send(&self, call: &CalculateRoute) -> Result<CalculateRouteResponse> {
        let builder = match &call.body {
            Some(body) => self.http.post(&call.url).json(body),
            None => self.http.get(&call.url),
        };
        let response = builder.query(&call.query).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl RoutingEngine for TomTomRouting {
    async fn calculate_route(&self, request: &RouteRequest) -> Result<Route> {
        let call = self.prepare(request);
        let sent = if call.body.is_none() {
            self.retry
                .run("route calculation", || self.send(&call))
                .await
        } else {
            self.send(&call).await
        };
        // an unreachable engine stays an ExternalService failure
        let response = sent.map_err(|why| match why {
            NavigationError::ExternalService {
                status_code: Some(_),
                ..
            }
            | NavigationError::Serialization(_) => NavigationError::Routing(why.to_string()),
            other => other,
        })?;
        let route = normalize(response, request.method)?;
        info!(
            "{} route from {} to {}: {:.0} m, {:.0} s, {} steps, {} areas avoided",
            request.method,
            request.departure.lat_lon(),
            request.arrival.lat_lon(),
            route.distance,
            route.duration,
            route.steps.len(),
            request.avoid.as_ref().map_or(0, |avoid| avoid.rectangles().len())
        );
        Ok(route)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRouteResponse {
    #[serde(default)]
    pub routes: Vec<TomTomRoute>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TomTomRoute {
    pub summary: Summary,
    #[serde(default)]
    pub legs: Vec<Leg>,
    #[serde(default)]
    pub guidance: Guidance,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub length_in_meters: f64,
    pub travel_time_in_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Leg {
    #[serde(default)]
    pub points: Vec<Coordinate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Guidance {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// Offsets are cumulative from the start of the route.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub route_offset_in_meters: f64,
    pub travel_time_in_seconds: f64,
    pub point: Coordinate,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub maneuver: String,
}

/// Takes the first route; step lengths are the differences of consecutive
/// offsets, the last step runs to the summary totals.
pub fn normalize(response: CalculateRouteResponse, method: TravelMethod) -> Result<Route> {
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| NavigationError::Routing("the engine returned no route".to_owned()))?;
    let summary = route.summary;
    let instructions = route.guidance.instructions;

    let ends = instructions
        .iter()
        .skip(1)
        .map(|next| (next.route_offset_in_meters, next.travel_time_in_seconds))
        .chain([(summary.length_in_meters, summary.travel_time_in_seconds)]);
    let steps = instructions
        .iter()
        .zip(ends)
        .map(|(instruction, (distance_end, duration_end))| Step {
            distance: (distance_end - instruction.route_offset_in_meters).max(0.0),
            duration: (duration_end - instruction.travel_time_in_seconds).max(0.0),
            instruction: instruction.message.clone(),
            step_type: instruction.maneuver.clone(),
            waypoint: instruction.point,
        })
        .collect_vec();
    debug!(
        "normalized route: {}",
        steps.iter().map(|step| &step.step_type).join(" > ")
    );

    Ok(Route {
        travel_mode: method,
        distance: summary.length_in_meters,
        duration: summary.travel_time_in_seconds,
        steps,
        coordinates: route.legs.into_iter().flat_map(|leg| leg.points).collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        extract::{Path, Query},
        routing::get,
        Json, Router,
    };
    use model::itinerary::RoutePreference;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    use crate::avoidance::{Rectangle, Rectangles};

    use super::*;

    const RESPONSE: &str = r#"{
        "routes": [{
            "summary": {"lengthInMeters": 1450, "travelTimeInSeconds": 312},
            "legs": [
                {"points": [{"latitude": 48.8566, "longitude": 2.3522}, {"latitude": 48.8580, "longitude": 2.3450}]},
                {"points": [{"latitude": 48.8590, "longitude": 2.3400}, {"latitude": 48.8606, "longitude": 2.3376}]}
            ],
            "guidance": {"instructions": [
                {"routeOffsetInMeters": 0, "travelTimeInSeconds": 0, "point": {"latitude": 48.8566, "longitude": 2.3522}, "message": "Leave from Rue de Rivoli", "maneuver": "DEPART"},
                {"routeOffsetInMeters": 800, "travelTimeInSeconds": 170, "point": {"latitude": 48.8580, "longitude": 2.3450}, "message": "Turn right", "maneuver": "TURN_RIGHT"},
                {"routeOffsetInMeters": 1450, "travelTimeInSeconds": 312, "point": {"latitude": 48.8606, "longitude": 2.3376}, "message": "You have arrived", "maneuver": "ARRIVE"}
            ]}
        }]
    }"#;

    fn request(avoid: Option<AvoidAreas>) -> RouteRequest {
        RouteRequest {
            departure: Coordinate {
                latitude: 48.8566,
                longitude: 2.3522,
            },
            arrival: Coordinate {
                latitude: 48.8606,
                longitude: 2.3376,
            },
            method: TravelMethod::Bike,
            preference: RoutePreference::Shortest,
            avoid,
        }
    }

    fn one_area() -> AvoidAreas {
        AvoidAreas {
            avoid_areas: Rectangles {
                rectangles: vec![Rectangle::around(
                    &Coordinate {
                        latitude: 48.8586,
                        longitude: 2.3448,
                    },
                    0.001,
                )],
            },
        }
    }

    #[test]
    fn travel_modes() {
        assert_eq!(travel_mode(TravelMethod::Car), "car");
        assert_eq!(travel_mode(TravelMethod::Bike), "bicycle");
        assert_eq!(travel_mode(TravelMethod::Foot), "pedestrian");
        assert_eq!(travel_mode(TravelMethod::Train), "bus");
    }

    #[test]
    fn unconstrained_request_is_a_get() {
        let engine =
            TomTomRouting::new(reqwest::Client::new(), "https://example.org/", "secret");
        let call = engine.prepare(&request(None));

        assert_eq!(call.method(), Method::GET);
        assert_eq!(
            call.url,
            "https://example.org/routing/1/calculateRoute/48.8566,2.3522:48.8606,2.3376/json"
        );
        assert!(call.body.is_none());
        assert!(call.query.contains(&("key", "secret".to_owned())));
        assert!(call.query.contains(&("travelMode", "bicycle".to_owned())));
        assert!(call.query.contains(&("routeType", "shortest".to_owned())));
        assert!(call.query.contains(&("instructionsType", "text".to_owned())));
    }

    #[test]
    fn constrained_request_is_a_post() {
        let engine =
            TomTomRouting::new(reqwest::Client::new(), "https://example.org", "secret");
        let call = engine.prepare(&request(Some(one_area())));

        assert_eq!(call.method(), Method::POST);
        assert_eq!(call.body, Some(one_area()));
    }

    #[test]
    fn normalizes_steps_from_offsets() {
        let response: CalculateRouteResponse = serde_json::from_str(RESPONSE).unwrap();
        let route = normalize(response, TravelMethod::Car).unwrap();

        assert_eq!(route.travel_mode, TravelMethod::Car);
        assert_eq!(route.distance, 1450.0);
        assert_eq!(route.duration, 312.0);
        assert_eq!(route.coordinates.len(), 4);
        assert_eq!(
            route
                .steps
                .iter()
                .map(|step| (step.distance, step.duration))
                .collect_vec(),
            vec![(800.0, 170.0), (650.0, 142.0), (0.0, 0.0)]
        );
        assert_eq!(route.steps[1].instruction, "Turn right");
        assert_eq!(route.steps[1].step_type, "TURN_RIGHT");
        assert_eq!(route.steps[2].waypoint.latitude, 48.8606);
    }

    #[test]
    fn empty_routes_are_an_error() {
        let response: CalculateRouteResponse =
            serde_json::from_str(r#"{"routes": []}"#).unwrap();
        assert!(matches!(
            normalize(response, TravelMethod::Car),
            Err(NavigationError::Routing(_))
        ));
    }

    #[derive(Default)]
    struct Received {
        methods: Vec<&'static str>,
        bodies: Vec<Value>,
    }

    async fn serve(received: Arc<Mutex<Received>>) -> String {
        let on_get = received.clone();
        let router = Router::new().route(
            "/routing/1/calculateRoute/:locations/json",
            get(
                move |Path(locations): Path<String>,
                      Query(query): Query<HashMap<String, String>>| async move {
                    assert_eq!(locations, "48.8566,2.3522:48.8606,2.3376");
                    assert_eq!(query["key"], "secret");
                    on_get.lock().unwrap().methods.push("GET");
                    Json(serde_json::from_str::<Value>(RESPONSE).unwrap())
                },
            )
            .post(move |Json(body): Json<Value>| async move {
                let mut received = received.lock().unwrap();
                received.methods.push("POST");
                received.bodies.push(body);
                Json(serde_json::from_str::<Value>(RESPONSE).unwrap())
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{}", address)
    }

    #[tokio::test]
    async fn sends_get_and_post_to_the_engine() {
        let received = Arc::new(Mutex::new(Received::default()));
        let base_url = serve(received.clone()).await;
        let engine = TomTomRouting::new(reqwest::Client::new(), &base_url, "secret");

        let unconstrained = engine.calculate_route(&request(None)).await.unwrap();
        let constrained = engine
            .calculate_route(&request(Some(one_area())))
            .await
            .unwrap();

        assert_eq!(unconstrained.travel_mode, TravelMethod::Bike);
        assert_eq!(constrained.steps.len(), 3);
        let received = received.lock().unwrap();
        assert_eq!(received.methods, vec!["GET", "POST"]);
        assert_eq!(
            received.bodies[0],
            json!({"avoidAreas": {"rectangles": [{
                "southWestCorner": {"latitude": 48.8586 - 0.001, "longitude": 2.3448 - 0.001},
                "northEastCorner": {"latitude": 48.8586 + 0.001, "longitude": 2.3448 + 0.001}
            }]}})
        );
    }

    #[tokio::test]
    async fn engine_errors_become_routing_errors() {
        let router = Router::new().route(
            "/routing/1/calculateRoute/:locations/json",
            get(|| async { (axum::http::StatusCode::BAD_REQUEST, "invalid request") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        let base_url = format!("http://{}", address);
        let engine = TomTomRouting::new(reqwest::Client::new(), &base_url, "secret");

        let result = engine.calculate_route(&request(None)).await;

        assert!(matches!(result, Err(NavigationError::Routing(_))));
    }

    #[tokio::test]
    async fn unreachable_engine_is_an_external_service_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let engine = TomTomRouting::new(reqwest::Client::new(), &base_url, "secret")
            .with_retry(RetryPolicy::never());

        let unconstrained = engine.calculate_route(&request(None)).await;
        let constrained = engine.calculate_route(&request(Some(one_area()))).await;

        for result in [unconstrained, constrained] {
            assert!(matches!(
                result,
                Err(NavigationError::ExternalService {
                    status_code: None,
                    ..
                })
            ));
        }
    }
}
