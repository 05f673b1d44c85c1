/// `"lat,lon"` pairs as used in query strings and by the routing engine's path
/// segments.
pub mod lat_lon {
    use std::{fmt, num::ParseFloatError};

    #[derive(Debug, Clone, PartialEq)]
    pub enum LatLonError {
        MissingSeparator(String),
        InvalidNumber(String, ParseFloatError),
    }

    impl fmt::Display for LatLonError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::MissingSeparator(input) => {
                    write!(f, "expected 'latitude,longitude', got '{}'", input)
                }
                Self::InvalidNumber(input, why) => {
                    write!(f, "invalid number in '{}': {}", input, why)
                }
            }
        }
    }

    impl std::error::Error for LatLonError {}

    pub fn parse(input: &str) -> Result<(f64, f64), LatLonError> {
        let (latitude, longitude) = input
            .split_once(',')
            .ok_or_else(|| LatLonError::MissingSeparator(input.to_owned()))?;
        let parse_number = |s: &str| {
            s.trim()
                .parse::<f64>()
                .map_err(|why| LatLonError::InvalidNumber(input.to_owned(), why))
        };
        Ok((parse_number(latitude)?, parse_number(longitude)?))
    }

    pub fn format(latitude: f64, longitude: f64) -> String {
        format!("{},{}", latitude, longitude)
    }

}
