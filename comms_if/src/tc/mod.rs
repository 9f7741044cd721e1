//! # Telecommand module
//!
//! Telecommands tune and arm the stabilisation controller while it runs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the vehicle by the operator.
///
/// Serialised as externally tagged JSON, for example `{"SetHold": true}` or
/// `"SaveCurrentPose"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Replace the gain applied to the translation offset.
    SetMovementGain(f64),

    /// Replace the gain applied to the rotation offset.
    SetRotationGain(f64),

    /// Engage (`true`) or release (`false`) the position hold.
    SetHold(bool),

    /// Capture the next tracked pose as the hold checkpoint.
    SaveCurrentPose,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_tcs() {
        assert_eq!(Tc::from_json("\"SaveCurrentPose\"").unwrap(), Tc::SaveCurrentPose);
        assert_eq!(Tc::from_json(r#"{"SetHold": false}"#).unwrap(), Tc::SetHold(false));
        assert_eq!(
            Tc::from_json(r#"{"SetRotationGain": 0.5}"#).unwrap(),
            Tc::SetRotationGain(0.5)
        );
        assert_eq!(
            serde_json::to_string(&Tc::SetMovementGain(3.0)).unwrap(),
            r#"{"SetMovementGain":3.0}"#
        );
    }

    #[test]
    fn test_invalid_tcs() {
        assert!(matches!(Tc::from_json("{"), Err(TcParseError::InvalidJson(_))));
        assert!(matches!(
            Tc::from_json(r#"{"SetHold": 1.0}"#),
            Err(TcParseError::InvalidJson(_))
        ));
    }
}
