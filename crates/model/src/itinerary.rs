use std::{fmt, str::FromStr};

use chrono::{TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::Id;

use crate::{
    geo::{BoundingBox, Coordinate},
    incident::{Incident, IncidentStatus, IncidentType, VoteTally},
    ExampleData, ValidationError, WithId,
};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum TravelMethod {
    #[default]
    Car,
    Bike,
    Foot,
    Train,
}

impl TravelMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Bike => "bike",
            Self::Foot => "foot",
            Self::Train => "train",
        }
    }
}

impl FromStr for TravelMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "car" => Ok(Self::Car),
            "bike" => Ok(Self::Bike),
            "foot" => Ok(Self::Foot),
            "train" => Ok(Self::Train),
            other => Err(ValidationError::new(
                "method",
                format!("'{}' is not one of car, bike, foot, train", other),
            )),
        }
    }
}

impl fmt::Display for TravelMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum RoutePreference {
    #[default]
    Fastest,
    Shortest,
    Eco,
    Thrilling,
}

impl RoutePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fastest => "fastest",
            Self::Shortest => "shortest",
            Self::Eco => "eco",
            Self::Thrilling => "thrilling",
        }
    }
}

impl FromStr for RoutePreference {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastest" => Ok(Self::Fastest),
            "shortest" => Ok(Self::Shortest),
            "eco" => Ok(Self::Eco),
            "thrilling" => Ok(Self::Thrilling),
            other => Err(ValidationError::new(
                "preference",
                format!("'{}' is not one of fastest, shortest, eco, thrilling", other),
            )),
        }
    }
}

impl fmt::Display for RoutePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One manoeuvre of a route. Distance in meters, duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub distance: f64,
    pub duration: f64,
    pub instruction: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub waypoint: Coordinate,
}

/// The normalized answer of a routing engine, before incidents are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub travel_mode: TravelMethod,
    pub distance: f64,
    pub duration: f64,
    pub steps: Vec<Step>,
    pub coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub travel_mode: TravelMethod,
    pub distance: f64,
    pub duration: f64,
    pub steps: Vec<Step>,
    pub coordinates: Vec<Coordinate>,
    pub incidents: Vec<WithId<Incident>>,
    pub bounding_box: BoundingBox,
}

impl Itinerary {
    pub fn new(
        route: Route,
        incidents: Vec<WithId<Incident>>,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            travel_mode: route.travel_mode,
            distance: route.distance,
            duration: route.duration,
            steps: route.steps,
            coordinates: route.coordinates,
            incidents,
            bounding_box,
        }
    }
}

impl ExampleData for Itinerary {
    fn example_data() -> Self {
        let departure = Coordinate {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let arrival = Coordinate {
            latitude: 48.8606,
            longitude: 2.3376,
        };
        Self {
            travel_mode: TravelMethod::Car,
            distance: 1450.0,
            duration: 312.0,
            steps: vec![
                Step {
                    distance: 1450.0,
                    duration: 312.0,
                    instruction: "Leave from Rue de Rivoli".to_owned(),
                    step_type: "DEPART".to_owned(),
                    waypoint: departure,
                },
                Step {
                    distance: 0.0,
                    duration: 0.0,
                    instruction: "You have arrived".to_owned(),
                    step_type: "ARRIVE".to_owned(),
                    waypoint: arrival,
                },
            ],
            coordinates: vec![departure, arrival],
            incidents: vec![WithId::new(
                Id::new(17),
                Incident {
                    incident_type: IncidentType::PoliceControl,
                    coordinate: Coordinate {
                        latitude: 48.858,
                        longitude: 2.345,
                    },
                    status: IncidentStatus::Active,
                    creation_timestamp: Utc
                        .with_ymd_and_hms(2024, 5, 17, 8, 30, 0)
                        .single()
                        .unwrap_or_default(),
                    tally: VoteTally::default(),
                },
            )],
            bounding_box: BoundingBox::example_data(),
        }
    }
}
