//! # Telecommand processor module
//!
//! The telecommand processor applies operator TCs to the shared control state.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};

// Internal
use comms_if::tc::Tc;
use stab_lib::control_state::ControlState;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Gains which are not finite are rejected and leave the current gain in place.
pub(crate) fn exec(control: &ControlState, tc: &Tc) {
    match tc {
        Tc::SetMovementGain(g) => {
            if g.is_finite() {
                info!("Movement gain set to {}", g);
                control.set_movement_gain(*g);
            } else {
                warn!("Rejected non-finite movement gain {}", g);
            }
        }
        Tc::SetRotationGain(g) => {
            if g.is_finite() {
                info!("Rotation gain set to {}", g);
                control.set_rotation_gain(*g);
            } else {
                warn!("Rejected non-finite rotation gain {}", g);
            }
        }
        Tc::SetHold(engaged) => {
            info!("Hold {}", if *engaged { "engaged" } else { "released" });
            control.set_hold(*engaged);
        }
        Tc::SaveCurrentPose => {
            info!("Checkpoint capture requested");
            control.request_capture();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exec() {
        let control = ControlState::default();

        exec(&control, &Tc::SetMovementGain(2.0));
        exec(&control, &Tc::SetRotationGain(0.5));
        exec(&control, &Tc::SetHold(true));
        exec(&control, &Tc::SaveCurrentPose);

        assert_eq!(control.movement_gain(), 2.0);
        assert_eq!(control.rotation_gain(), 0.5);
        assert!(control.hold_engaged());
        assert!(control.capture_requested());

        exec(&control, &Tc::SetHold(false));
        assert!(!control.hold_engaged());
    }

    #[test]
    fn test_reject_non_finite_gains() {
        let control = ControlState::new(1.0, 0.1);

        exec(&control, &Tc::SetMovementGain(f64::NAN));
        exec(&control, &Tc::SetRotationGain(f64::INFINITY));

        assert_eq!(control.movement_gain(), 1.0);
        assert_eq!(control.rotation_gain(), 0.1);
    }
}
