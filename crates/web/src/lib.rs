pub use crate::common::RouteResult;

use std::sync::Arc;

use axum::Router;
use incidents::{client::Client, database::Database};
use log::info;
use navigation::itinerary::Navigator;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub mod api;
pub mod common;
pub mod middleware;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

pub struct WebState<D>
where
    D: Database,
{
    pub incident_client: Arc<Client<D>>,
    pub navigator: Arc<Navigator>,
    /// Cancelled on shutdown; in-flight itinerary computations stop with it.
    pub shutdown: CancellationToken,
}

impl<D> Clone for WebState<D>
where
    D: Database,
{
    fn clone(&self) -> Self {
        Self {
            incident_client: self.incident_client.clone(),
            navigator: self.navigator.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

pub fn router<D: Database>(state: WebState<D>) -> Router {
    api::routes(state)
}

pub async fn start_web_server<D: Database>(
    state: WebState<D>,
    bind_address: &str,
) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let routes = router(state);

    let listener = TcpListener::bind(bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, routes.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use incidents::{client::Client, memory::MemoryDatabase, moderation::ModerationConfig};
    use model::{
        geo::Coordinate,
        itinerary::{Route, Step},
    };
    use navigation::{
        geocoding::Geocoder,
        itinerary::Navigator,
        routing::{RouteRequest, RoutingEngine},
        window::LocalIncidentWindow,
        NavigationError, Result,
    };
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use crate::{router, WebState};

    #[derive(Default)]
    pub struct RecordingEngine {
        pub requests: Mutex<Vec<RouteRequest>>,
    }

    #[async_trait]
    impl RoutingEngine for RecordingEngine {
        async fn calculate_route(&self, request: &RouteRequest) -> Result<Route> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(Route {
                travel_mode: request.method,
                distance: 1450.0,
                duration: 312.0,
                steps: vec![Step {
                    distance: 1450.0,
                    duration: 312.0,
                    instruction: "Go straight".to_owned(),
                    step_type: "STRAIGHT".to_owned(),
                    waypoint: request.departure,
                }],
                coordinates: vec![request.departure, request.arrival],
            })
        }
    }

    pub struct TableGeocoder(pub HashMap<String, Coordinate>);

    #[async_trait]
    impl Geocoder for TableGeocoder {
        async fn geocode(&self, query: &str) -> Result<Coordinate> {
            self.0
                .get(query)
                .copied()
                .ok_or_else(|| NavigationError::LocationNotFound(query.to_owned()))
        }
    }

    pub struct TestServer {
        pub base_url: String,
        pub http: reqwest::Client,
        pub incident_client: Arc<Client<MemoryDatabase>>,
        pub engine: Arc<RecordingEngine>,
    }

    impl TestServer {
        pub fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    /// The full router over an in-memory store, a recording routing engine and a
    /// geocoder that only knows the Louvre.
    pub async fn serve() -> TestServer {
        let incident_client = Arc::new(Client::new(
            MemoryDatabase::new(),
            ModerationConfig::default(),
        ));
        let engine = Arc::new(RecordingEngine::default());
        let geocoder = TableGeocoder(HashMap::from([(
            "Louvre".to_owned(),
            Coordinate {
                latitude: 48.8606,
                longitude: 2.3376,
            },
        )]));
        let navigator = Navigator::new(
            Arc::new(LocalIncidentWindow::new(incident_client.clone())),
            engine.clone(),
            Arc::new(geocoder),
        );
        let state = WebState {
            incident_client: incident_client.clone(),
            navigator: Arc::new(navigator),
            shutdown: CancellationToken::new(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await.unwrap() });

        TestServer {
            base_url: format!("http://{}", address),
            http: reqwest::Client::new(),
            incident_client,
            engine,
        }
    }
}
