use std::{error::Error, sync::Arc, time::Duration};

use futures::future::try_join;
use itertools::Itertools;
use log::{debug, info};
use model::{
    geo::{BoundingBox, Coordinate},
    itinerary::{Itinerary, RoutePreference, TravelMethod},
};
use tokio_util::sync::CancellationToken;

use crate::{
    avoidance::AvoidanceTable,
    config::{NavigationConfig, DEFAULT_TIMEOUT},
    geocoding::{resolve, Geocoder, Location, TomTomGeocoder},
    routing::{tomtom::TomTomRouting, RouteRequest, RoutingEngine},
    window::IncidentWindow,
    NavigationError, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ItineraryQuery {
    pub departure: Location,
    pub arrival: Location,
    pub method: TravelMethod,
    pub preference: RoutePreference,
}

/// Computes incident-aware itineraries. Stateless, so one instance serves any
/// number of concurrent requests.
pub struct Navigator {
    window: Arc<dyn IncidentWindow>,
    routing: Arc<dyn RoutingEngine>,
    geocoder: Arc<dyn Geocoder>,
    avoidance: AvoidanceTable,
    timeout: Duration,
}

impl Navigator {
    pub fn new(
        window: Arc<dyn IncidentWindow>,
        routing: Arc<dyn RoutingEngine>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            window,
            routing,
            geocoder,
            avoidance: AvoidanceTable::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// TomTom for routing and geocoding, the given window for incidents.
    pub fn from_config(
        config: &NavigationConfig,
        window: Arc<dyn IncidentWindow>,
    ) -> std::result::Result<Self, Box<dyn Error + Send + Sync>> {
        let http = reqwest::Client::new();
        let avoidance = match &config.avoidance_table_path {
            Some(path) => AvoidanceTable::from_file(path)?,
            None => AvoidanceTable::default(),
        };
        Ok(Self::new(
            window,
            Arc::new(TomTomRouting::new(
                http.clone(),
                &config.tomtom_base_url,
                &config.tomtom_api_key,
            )),
            Arc::new(TomTomGeocoder::new(
                http,
                &config.tomtom_base_url,
                &config.tomtom_api_key,
            )),
        )
        .with_avoidance(avoidance)
        .with_timeout(config.timeout))
    }

    pub fn with_avoidance(mut self, avoidance: AvoidanceTable) -> Self {
        self.avoidance = avoidance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves both locations and routes between them, bounded by the configured
    /// timeout and `cancel`. Failures other than caller errors are reported as
    /// `RouteCalculation`; nothing partial is ever returned.
    pub async fn compute(
        &self,
        query: &ItineraryQuery,
        cancel: &CancellationToken,
    ) -> Result<Itinerary> {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(NavigationError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.resolve_and_route(query)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => Err(NavigationError::TimedOut),
                }
            }
        };
        outcome.map_err(NavigationError::into_route_calculation)
    }

    async fn resolve_and_route(&self, query: &ItineraryQuery) -> Result<Itinerary> {
        let (departure, arrival) = try_join(
            resolve(self.geocoder.as_ref(), &query.departure),
            resolve(self.geocoder.as_ref(), &query.arrival),
        )
        .await?;
        self.route_between(departure, arrival, query.method, query.preference)
            .await
    }

    /// Routes around the active incidents in the box spanned by both endpoints.
    /// The itinerary carries exactly the incidents that were read.
    pub async fn route_between(
        &self,
        departure: Coordinate,
        arrival: Coordinate,
        method: TravelMethod,
        preference: RoutePreference,
    ) -> Result<Itinerary> {
        let bounding_box = BoundingBox::enclosing([&departure, &arrival])?;
        let incidents = self.window.incidents_in(&bounding_box).await?;

        let avoid = if incidents.is_empty() {
            None
        } else {
            debug!(
                "avoiding incidents {}",
                incidents.iter().map(|incident| incident.id).join(", ")
            );
            Some(self.avoidance.avoid_areas(&incidents))
        };

        let route = self
            .routing
            .calculate_route(&RouteRequest {
                departure,
                arrival,
                method,
                preference,
                avoid,
            })
            .await?;

        info!(
            "itinerary {} -> {} ({}, {}) with {} incidents",
            departure.lat_lon(),
            arrival.lat_lon(),
            method,
            preference,
            incidents.len()
        );
        Ok(Itinerary::new(route, incidents, bounding_box))
    }
}
