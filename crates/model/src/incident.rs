use std::{borrow::Cow, fmt};

use chrono::{DateTime, TimeZone, Utc};
use schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject},
    JsonSchema,
};
use serde::{Deserialize, Serialize};
use utility::id::HasId;

use crate::{geo::Coordinate, vote::Reaction, ExampleData};

/// Incident categories reported by drivers. Names not known to this build are kept
/// verbatim so that newer reporters do not break older readers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IncidentType {
    Crash,
    Bottling,
    ClosedRoad,
    PoliceControl,
    Obstacle,
    Unknown(String),
}

impl IncidentType {
    pub const KNOWN: [IncidentType; 5] = [
        Self::Crash,
        Self::Bottling,
        Self::ClosedRoad,
        Self::PoliceControl,
        Self::Obstacle,
    ];

    pub fn name(&self) -> &str {
        match self {
            Self::Crash => "Crash",
            Self::Bottling => "Bottling",
            Self::ClosedRoad => "ClosedRoad",
            Self::PoliceControl => "PoliceControl",
            Self::Obstacle => "Obstacle",
            Self::Unknown(name) => name,
        }
    }
}

impl From<String> for IncidentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Crash" => Self::Crash,
            "Bottling" => Self::Bottling,
            "ClosedRoad" => Self::ClosedRoad,
            "PoliceControl" => Self::PoliceControl,
            "Obstacle" => Self::Obstacle,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for IncidentType {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<IncidentType> for String {
    fn from(value: IncidentType) -> Self {
        match value {
            IncidentType::Unknown(name) => name,
            known => known.name().to_owned(),
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl JsonSchema for IncidentType {
    fn schema_name() -> String {
        "IncidentType".to_owned()
    }

    fn schema_id() -> Cow<'static, str> {
        Cow::Borrowed(concat!(module_path!(), "::IncidentType"))
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            enum_values: Some(
                Self::KNOWN
                    .iter()
                    .map(|known| serde_json::Value::from(known.name()))
                    .collect(),
            ),
            ..Default::default()
        }
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum IncidentStatus {
    Active,
    Inactive,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Active" => Some(Self::Active),
            "Inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub likes: u32,
    pub dislikes: u32,
}

impl VoteTally {
    pub fn from_reactions<I: IntoIterator<Item = Reaction>>(reactions: I) -> Self {
        reactions
            .into_iter()
            .fold(Self::default(), |tally, reaction| tally.with(reaction))
    }

    pub fn with(mut self, reaction: Reaction) -> Self {
        match reaction {
            Reaction::Like => self.likes += 1,
            Reaction::Dislike => self.dislikes += 1,
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub coordinate: Coordinate,
    pub status: IncidentStatus,
    pub creation_timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub tally: VoteTally,
}

impl HasId for Incident {
    type IdType = i64;
}

impl Incident {
    /// A freshly reported incident, active and without votes.
    pub fn report(incident_type: IncidentType, coordinate: Coordinate) -> Self {
        Self {
            incident_type,
            coordinate,
            status: IncidentStatus::Active,
            creation_timestamp: Utc::now(),
            tally: VoteTally::default(),
        }
    }}

impl ExampleData for Incident {
    fn example_data() -> Self {
        Self {
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
            tally: VoteTally {
                likes: 3,
                dislikes: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_type_round_trips_through_its_name() {
        for known in IncidentType::KNOWN {
            assert_eq!(IncidentType::from(known.name()), known);
        }
        assert_eq!(
            IncidentType::from("Hail"),
            IncidentType::Unknown("Hail".to_owned())
        );
    }

    #[test]
    fn unknown_type_deserializes() {
        let parsed: IncidentType = serde_json::from_str("\"Flood\"").unwrap();
        assert_eq!(parsed, IncidentType::Unknown("Flood".to_owned()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"Flood\"");
    }

    #[test]
    fn tally_counts_reactions() {
        let tally = VoteTally::from_reactions([
            Reaction::Like,
            Reaction::Dislike,
            Reaction::Dislike,
        ]);
        assert_eq!(tally, VoteTally { likes: 1, dislikes: 2 });
    }

    #[test]
    fn snapshot_wire_shape() {
        let json = serde_json::to_value(Incident::example_data()).unwrap();
        assert_eq!(json["type"], "PoliceControl");
        assert_eq!(json["status"], "Active");
        assert_eq!(json["likes"], 3);
        assert_eq!(json["dislikes"], 1);
        assert_eq!(json["coordinate"]["latitude"], 48.858);
        assert!(json.get("creationTimestamp").is_some());
    }

    #[test]
    fn reported_incident_starts_active() {
        let incident = Incident::report(
            IncidentType::Obstacle,
            Coordinate::new(1.0, 2.0).unwrap(),
        );
        assert_eq!(incident.status, IncidentStatus::Active);
        assert_eq!(incident.tally, VoteTally::default());
    }
}
