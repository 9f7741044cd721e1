//! Cyclic module interface
//!
//! Control modules which are initialised once and then stepped with fresh inputs (for example
//! `DriftCtrl`) implement [`State`], so that executables drive them all the same way.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::session::Session;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A module with persistent state and a processing step.
pub trait State {
    /// Configuration consumed by [`State::init`], usually the module's parameters
    type InitData;
    type InitError;

    /// Data the module needs on every step
    type InputData;
    /// Data the module produces on every step
    type OutputData;
    /// Diagnostics describing how a step went, suitable for archiving
    type StatusReport;
    type ProcError;

    /// Set up the module, opening any archives it keeps in `session`.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Run one processing step.
    ///
    /// A failed step leaves the module usable, the caller decides whether to skip the step or
    /// stop.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
