//! Airport code types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when parsing an invalid airport code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid airport code: {reason}")]
pub struct InvalidAirportCode {
    reason: &'static str,
}

/// A valid 3-letter IATA airport code.
///
/// Codes are always 3 uppercase ASCII letters. The wildcard `ANY` is a
/// syntactically valid code; providers expand it to a destination list.
///
/// # Examples
///
/// ```
/// use flight_search::domain::AirportCode;
///
/// let den = AirportCode::parse("DEN").unwrap();
/// assert_eq!(den.as_str(), "DEN");
///
/// // Lowercase is rejected by `parse` but accepted by `parse_normalized`
/// assert!(AirportCode::parse("den").is_err());
/// assert_eq!(AirportCode::parse_normalized(" den ").unwrap(), den);
///
/// // Wrong length is rejected
/// assert!(AirportCode::parse("DE").is_err());
/// assert!(AirportCode::parse("DENV").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AirportCode([u8; 3]);

impl AirportCode {
    /// The wildcard destination code.
    pub const ANY: AirportCode = AirportCode(*b"ANY");

    /// Parse an airport code from a string.
    ///
    /// The input must be exactly 3 uppercase ASCII letters (A-Z).
    pub fn parse(s: &str) -> Result<Self, InvalidAirportCode> {
        let bytes = s.as_bytes();

        if bytes.len() != 3 {
            return Err(InvalidAirportCode {
                reason: "must be exactly 3 characters",
            });
        }

        for &b in bytes {
            if !b.is_ascii_uppercase() {
                return Err(InvalidAirportCode {
                    reason: "must be uppercase ASCII letters A-Z",
                });
            }
        }

        Ok(AirportCode([bytes[0], bytes[1], bytes[2]]))
    }

    /// Parse user input: surrounding whitespace is trimmed and letters are
    /// uppercased before validation.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidAirportCode> {
        Self::parse(&s.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII uppercase letters are ever stored
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Whether this is the `ANY` wildcard.
    pub fn is_wildcard(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Debug for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AirportCode({})", self.as_str())
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AirportCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AirportCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AirportCode::parse_normalized(&s).map_err(serde::de::Error::custom)
    }
}
