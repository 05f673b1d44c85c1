use axum::{
    extract::{Query, State},
    routing::{get, on},
    Router,
};
use incidents::database::Database;
use log::debug;
use model::{itinerary::Itinerary, ValidationError};
use navigation::{
    geocoding::{Location, LocationKind},
    itinerary::ItineraryQuery,
    NavigationError,
};
use serde::Deserialize;

use crate::{
    common::{route_not_found, schema, ApiResponse, METHOD_FILTER_ALL},
    WebState,
};

pub(crate) fn routes<D: Database>(state: WebState<D>) -> Router {
    Router::new()
        .route("/", get(itinerary::<D>))
        .route("/schema", get(schema::<Itinerary>))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ItineraryParams {
    departure: Option<String>,
    departure_type: Option<String>,
    arrival: Option<String>,
    arrival_type: Option<String>,
    method: Option<String>,
    preference: Option<String>,
}

impl ItineraryParams {
    fn location(
        field: &'static str,
        value: Option<String>,
        kind: Option<String>,
    ) -> Result<Location, ValidationError> {
        let value = value
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ValidationError::new(field, "is required"))?;
        let kind = match kind {
            Some(kind) => kind.parse()?,
            None => LocationKind::default(),
        };
        Ok(Location::new(value, kind))
    }

    fn into_query(self) -> Result<ItineraryQuery, ValidationError> {
        Ok(ItineraryQuery {
            departure: Self::location("departure", self.departure, self.departure_type)?,
            arrival: Self::location("arrival", self.arrival, self.arrival_type)?,
            method: self
                .method
                .map(|method| method.parse())
                .transpose()?
                .unwrap_or_default(),
            preference: self
                .preference
                .map(|preference| preference.parse())
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

async fn itinerary<D: Database>(
    State(WebState {
        navigator,
        shutdown,
        ..
    }): State<WebState<D>>,
    Query(params): Query<ItineraryParams>,
) -> ApiResponse<Itinerary> {
    let query = match params.into_query() {
        Ok(query) => query,
        Err(why) => return NavigationError::from(why).into(),
    };
    debug!("itinerary requested: {:?}", query);
    match navigator.compute(&query, &shutdown.child_token()).await {
        Ok(itinerary) => ApiResponse::ok(itinerary),
        Err(why) => why.into(),
    }
}
