use std::{collections::HashMap, error::Error, fs, path::Path};

use log::info;
use model::{
    geo::{BoundingBox, Coordinate},
    incident::{Incident, IncidentType},
    WithId,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HALF_WIDTH: f64 = 0.002;

/// Half-width in degrees of the area to avoid around an incident, per type.
#[derive(Debug, Clone, PartialEq)]
pub struct AvoidanceTable {
    half_widths: HashMap<IncidentType, f64>,
    default_half_width: f64,
}

impl Default for AvoidanceTable {
    fn default() -> Self {
        Self {
            half_widths: HashMap::from([
                (IncidentType::Crash, 0.003),
                (IncidentType::Bottling, 0.002),
                (IncidentType::ClosedRoad, 0.005),
                (IncidentType::PoliceControl, 0.001),
                (IncidentType::Obstacle, 0.002),
            ]),
            default_half_width: DEFAULT_HALF_WIDTH,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvoidanceTableFile {
    #[serde(default)]
    half_widths: HashMap<IncidentType, f64>,
    default_half_width: Option<f64>,
}

impl AvoidanceTable {
    /// The built-in table with the entries of `json` taking precedence.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: AvoidanceTableFile = serde_json::from_str(json)?;
        let mut table = Self::default();
        table.half_widths.extend(
            file.half_widths
                .into_iter()
                .map(|(incident_type, half_width)| (incident_type, half_width.abs())),
        );
        if let Some(default_half_width) = file.default_half_width {
            table.default_half_width = default_half_width.abs();
        }
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let table = Self::from_json(&fs::read_to_string(path)?)?;
        info!("loaded avoidance table from {}", path.display());
        Ok(table)
    }

    pub fn half_width(&self, incident_type: &IncidentType) -> f64 {
        self.half_widths
            .get(incident_type)
            .copied()
            .unwrap_or(self.default_half_width)
    }

    pub fn rectangle(&self, incident: &Incident) -> Rectangle {
        Rectangle::around(
            &incident.coordinate,
            self.half_width(&incident.incident_type),
        )
    }

    /// One rectangle per incident, in the order given.
    pub fn avoid_areas(&self, incidents: &[WithId<Incident>]) -> AvoidAreas {
        AvoidAreas {
            avoid_areas: Rectangles {
                rectangles: incidents
                    .iter()
                    .map(|incident| self.rectangle(&incident.content))
                    .collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rectangle {
    pub south_west_corner: Coordinate,
    pub north_east_corner: Coordinate,
}

impl Rectangle {
    pub fn around(center: &Coordinate, half_width: f64) -> Self {
        let bounds = BoundingBox::around(center, half_width);
        Self {
            south_west_corner: bounds.south_west(),
            north_east_corner: bounds.north_east(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangles {
    pub rectangles: Vec<Rectangle>,
}

/// Request body of a constrained route calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidAreas {
    pub avoid_areas: Rectangles,
}

impl AvoidAreas {
    pub fn rectangles(&self) -> &[Rectangle] {
        &self.avoid_areas.rectangles
    }
}
