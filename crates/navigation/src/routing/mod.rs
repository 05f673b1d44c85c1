use async_trait::async_trait;
use model::{
    geo::Coordinate,
    itinerary::{Route, RoutePreference, TravelMethod},
};

use crate::{avoidance::AvoidAreas, Result};

pub mod tomtom;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub departure: Coordinate,
    pub arrival: Coordinate,
    pub method: TravelMethod,
    pub preference: RoutePreference,
    /// Areas the route must not pass through. `None` for an unconstrained route.
    pub avoid: Option<AvoidAreas>,
}

/// An external engine computing routes between two coordinates.
#[async_trait]
pub trait RoutingEngine: Send + Sync {
    /// All-or-nothing: either a complete route or an error.
    async fn calculate_route(&self, request: &RouteRequest) -> Result<Route>;
}
