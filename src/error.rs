//! Error type shared by both engines.

use std::fmt;

/// Errors returned by the scheduler and mutual-exclusion engines.
///
/// Every error is local and recoverable. Operations validate their input
/// before touching any state, so a returned error means nothing changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A caller-supplied value is out of its domain.
    InvalidInput(String),
    /// Averages were requested over zero completed jobs.
    EmptySet,
    /// A manual protocol call does not match the participant's phase.
    InvalidState(String),
    /// The engine was built without the named capability.
    CapabilityDisabled(&'static str),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            SimError::EmptySet => write!(f, "no data: no completed jobs"),
            SimError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            SimError::CapabilityDisabled(what) => write!(f, "capability disabled: {what}"),
        }
    }
}

impl std::error::Error for SimError {}

pub type Result<T> = std::result::Result<T, SimError>;
