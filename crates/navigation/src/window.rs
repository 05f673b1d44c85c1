use std::sync::Arc;

use async_trait::async_trait;
use incidents::{client::Client, database::Database};
use log::debug;
use model::{geo::BoundingBox, incident::Incident, WithId};

use crate::{http::read_json, retry::RetryPolicy, Result};

/// Source of the incidents relevant to a route.
#[async_trait]
pub trait IncidentWindow: Send + Sync {
    /// Active incidents inside the box, inclusive on all four sides.
    async fn incidents_in(&self, bounding_box: &BoundingBox) -> Result<Vec<WithId<Incident>>>;
}

/// Reads the window from a remote incident service.
pub struct HttpIncidentWindow {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpIncidentWindow {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch(&self, bounding_box: &BoundingBox) -> Result<Vec<WithId<Incident>>> {
        let response = self
            .http
            .get(format!("{}/incident/bounding-box", self.base_url))
            .query(&[
                ("minLat", bounding_box.min_lat),
                ("maxLat", bounding_box.max_lat),
                ("minLon", bounding_box.min_lon),
                ("maxLon", bounding_box.max_lon),
            ])
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl IncidentWindow for HttpIncidentWindow {
    async fn incidents_in(&self, bounding_box: &BoundingBox) -> Result<Vec<WithId<Incident>>> {
        let incidents = self
            .retry
            .run("incident window", || self.fetch(bounding_box))
            .await?;
        debug!(
            "incident service reported {} incidents in {:?}",
            incidents.len(),
            bounding_box
        );
        Ok(incidents)
    }
}

/// Reads the window from an incident client living in the same process.
pub struct LocalIncidentWindow<D>
where
    D: Database,
{
    client: Arc<Client<D>>,
}

impl<D> LocalIncidentWindow<D>
where
    D: Database,
{
    pub fn new(client: Arc<Client<D>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<D> IncidentWindow for LocalIncidentWindow<D>
where
    D: Database,
{
    async fn incidents_in(&self, bounding_box: &BoundingBox) -> Result<Vec<WithId<Incident>>> {
        Ok(self.client.incidents_in(bounding_box).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use incidents::{
        memory::MemoryDatabase,
        moderation::{ModerationCommand, ModerationConfig},
    };
    use model::{
        geo::Coordinate,
        incident::{IncidentStatus, IncidentType},
        ExampleData,
    };
    use tokio::net::TcpListener;
    use utility::id::Id;

    use crate::NavigationError;

    use super::*;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{}", address)
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn http_window_decodes_incidents() {
        let router = Router::new().route(
            "/incident/bounding-box",
            get(|Query(params): Query<HashMap<String, f64>>| async move {
                assert_eq!(params.len(), 4);
                assert!(params["minLat"] <= params["maxLat"]);
                Json(vec![WithId::new(Id::<Incident>::new(7), Incident::example_data())])
            }),
        );
        let window = HttpIncidentWindow::new(reqwest::Client::new(), &serve(router).await);

        let incidents = window
            .incidents_in(&BoundingBox::example_data())
            .await
            .unwrap();

        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].id, Id::new(7));
        assert_eq!(incidents[0].content, Incident::example_data());
    }

    #[tokio::test]
    async fn http_window_retries_server_errors() {
        let counter = Arc::new(AtomicU32::new(0));
        let attempts = counter.clone();
        let router = Router::new().route(
            "/incident/bounding-box",
            get(move || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    StatusCode::SERVICE_UNAVAILABLE
                }
            }),
        );
        let window = HttpIncidentWindow::new(reqwest::Client::new(), &serve(router).await)
            .with_retry(fast_retry());

        let result = window.incidents_in(&BoundingBox::example_data()).await;

        assert!(matches!(
            result,
            Err(NavigationError::ExternalService {
                status_code: Some(status),
                ..
            }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn http_window_rejects_garbage() {
        let router = Router::new().route("/incident/bounding-box", get(|| async { "not json" }));
        let window = HttpIncidentWindow::new(reqwest::Client::new(), &serve(router).await)
            .with_retry(fast_retry());

        let result = window.incidents_in(&BoundingBox::example_data()).await;

        assert!(matches!(result, Err(NavigationError::Serialization(_))));
    }

    #[tokio::test]
    async fn local_window_returns_active_incidents_only() {
        let client = Arc::new(Client::new(
            MemoryDatabase::new(),
            ModerationConfig::default(),
        ));
        let inside = client
            .report_incident(IncidentType::Crash, Coordinate::new(48.858, 2.34).unwrap())
            .await
            .unwrap();
        let disabled = client
            .report_incident(IncidentType::Obstacle, Coordinate::new(48.859, 2.35).unwrap())
            .await
            .unwrap();
        client
            .moderate(&disabled.id, ModerationCommand::Disable)
            .await
            .unwrap();
        client
            .report_incident(IncidentType::Crash, Coordinate::new(50.0, 8.0).unwrap())
            .await
            .unwrap();

        let window = LocalIncidentWindow::new(client);
        let incidents = window
            .incidents_in(&BoundingBox {
                min_lat: 48.85,
                max_lat: 48.87,
                min_lon: 2.33,
                max_lon: 2.36,
            })
            .await
            .unwrap();

        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].id, inside.id);
        assert_eq!(incidents[0].content.status, IncidentStatus::Active);
    }
}
