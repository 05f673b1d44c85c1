use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{Method, StatusCode},
    routing::{get, on, post, put},
    Extension, Json, Router,
};
use incidents::{database::Database, moderation::ModerationCommand, RequestError};
use model::{
    geo::{BoundingBox, Coordinate},
    incident::{Incident, IncidentType},
    vote::Reaction,
    WithDistance, WithId,
};
use schemars::JsonSchema;
use serde::Deserialize;
use utility::id::Id;

use crate::{
    common::{route_not_found, schema, RouteErrorResponse, RouteResult, METHOD_FILTER_ALL},
    middleware::caller::{caller_middleware, Caller},
    WebState,
};

pub(crate) fn routes<D: Database>(state: WebState<D>) -> Router {
    Router::new()
        .route("/", post(report_incident::<D>))
        .route("/schema", get(schema::<Incident>))
        .route("/bounding-box", get(incidents_in::<D>))
        .route("/nearby", get(nearby::<D>))
        .route(
            "/:id",
            get(get_incident::<D>)
                .put(react::<D>)
                .delete(delete_incident::<D>),
        )
        .route("/:id/enable", put(enable::<D>))
        .route("/:id/disable", put(disable::<D>))
        .layer(axum::middleware::from_fn(caller_middleware))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ReportBody {
    #[serde(rename = "type")]
    incident_type: IncidentType,
    coordinate: Coordinate,
}

async fn report_incident<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
    Json(body): Json<ReportBody>,
) -> RouteResult<(StatusCode, Json<WithId<Incident>>)> {
    incident_client
        .report_incident(body.incident_type, body.coordinate)
        .await
        .map(|incident| (StatusCode::CREATED, Json(incident)))
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::POST)
                .with_uri(original_uri.path())
        })
}

async fn get_incident<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    Path(id): Path<i64>,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
) -> RouteResult<Json<WithId<Incident>>> {
    incident_client
        .get_incident(&Id::new(id))
        .await
        .map(Json)
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

async fn incidents_in<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
    Query(bounding_box): Query<BoundingBox>,
) -> RouteResult<Json<Vec<WithId<Incident>>>> {
    incident_client
        .incidents_in(&bounding_box)
        .await
        .map(Json)
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

#[derive(Deserialize)]
struct NearbyQuery {
    latitude: f64,
    longitude: f64,
}

async fn nearby<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
    Query(params): Query<NearbyQuery>,
) -> RouteResult<Json<Vec<WithDistance<WithId<Incident>>>>> {
    let center = Coordinate {
        latitude: params.latitude,
        longitude: params.longitude,
    };
    incident_client
        .nearby(&center)
        .await
        .map(Json)
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::GET)
                .with_uri(original_uri.path())
        })
}

#[derive(Debug, Deserialize)]
struct ReactionBody {
    reaction: Reaction,
}

/// Toggles the caller's reaction and answers with the updated incident.
async fn react<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    Path(id): Path<i64>,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
    Extension(caller): Extension<Arc<Caller>>,
    Json(body): Json<ReactionBody>,
) -> RouteResult<Json<WithId<Incident>>> {
    let user_id = caller
        .user_id()
        .map_err(|why| why.with_method(&Method::PUT).with_uri(original_uri.path()))?;
    incident_client
        .react(&user_id, &Id::new(id), body.reaction)
        .await
        .map(|reacted| Json(reacted.incident))
        .map_err(|why| {
            RouteErrorResponse::from(why)
                .with_method(&Method::PUT)
                .with_uri(original_uri.path())
        })
}

async fn moderate<D: Database>(
    original_uri: OriginalUri,
    id: i64,
    state: WebState<D>,
    caller: &Caller,
    command: ModerationCommand,
) -> RouteResult<Json<WithId<Incident>>> {
    let result = match caller.require_admin() {
        Ok(()) => state.incident_client.moderate(&Id::new(id), command).await,
        Err(why) => Err(why),
    };
    result.map(Json).map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&Method::PUT)
            .with_uri(original_uri.0.path())
    })
}

async fn enable<D: Database>(
    original_uri: OriginalUri,
    Path(id): Path<i64>,
    State(state): State<WebState<D>>,
    Extension(caller): Extension<Arc<Caller>>,
) -> RouteResult<Json<WithId<Incident>>> {
    moderate(original_uri, id, state, &caller, ModerationCommand::Enable).await
}

async fn disable<D: Database>(
    original_uri: OriginalUri,
    Path(id): Path<i64>,
    State(state): State<WebState<D>>,
    Extension(caller): Extension<Arc<Caller>>,
) -> RouteResult<Json<WithId<Incident>>> {
    moderate(original_uri, id, state, &caller, ModerationCommand::Disable).await
}

async fn delete_incident<D: Database>(
    OriginalUri(original_uri): OriginalUri,
    Path(id): Path<i64>,
    State(WebState {
        incident_client, ..
    }): State<WebState<D>>,
    Extension(caller): Extension<Arc<Caller>>,
) -> RouteResult<Json<WithId<Incident>>> {
    let error = |why: RequestError| {
        RouteErrorResponse::from(why)
            .with_method(&Method::DELETE)
            .with_uri(original_uri.path())
    };
    caller.require_admin().map_err(error)?;
    match incident_client.delete_incident(&Id::new(id)).await {
        Ok(Some(incident)) => Ok(Json(incident)),
        Ok(None) => Err(RouteErrorResponse::not_found(&Method::DELETE, original_uri.path())),
        Err(why) => Err(error(why)),
    }
}
