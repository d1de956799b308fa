//! Mutual-exclusion scenario definition and builder.

use tracing::warn;

use crate::error::{Result, SimError};
use crate::participant::Behavior;
use crate::protocol::Protocol;
use crate::types::ParticipantId;

/// Default PRNG seed used when no seed is specified.
pub const DEFAULT_SEED: u32 = 42;

/// Parse a seed string: a `u32` integer or `"entropy"` for OS randomness.
///
/// Returns `DEFAULT_SEED` for `None` or empty strings.
pub fn parse_seed(s: Option<&str>) -> Result<u32> {
    match s.map(str::trim) {
        None | Some("") => Ok(DEFAULT_SEED),
        Some(s) if s.eq_ignore_ascii_case("entropy") => {
            let seed: u32 = rand::random();
            warn!(
                seed,
                "seed=entropy: seeding PRNG with OS randomness \
                 (set seed={seed} to reproduce this run)"
            );
            Ok(seed)
        }
        Some(s) => s.parse::<u32>().map_err(|_| {
            SimError::InvalidInput(format!("seed={s:?}: expected a u32 integer or \"entropy\""))
        }),
    }
}

/// Resolve the PRNG seed from the `OSSIM_SEED` environment variable.
///
/// - Unset or empty: returns `DEFAULT_SEED` (42).
/// - `"entropy"` (case-insensitive): seeds from OS randomness and logs the
///   chosen value so the run can be reproduced later.
/// - Any decimal integer: parsed as a `u32` seed.
pub fn seed_from_env() -> Result<u32> {
    parse_seed(std::env::var("OSSIM_SEED").ok().as_deref())
}

/// A complete mutex scenario: protocol, participant behaviors and seed.
#[derive(Debug, Clone, PartialEq)]
pub struct MutexScenario {
    pub protocol: Protocol,
    /// Indexed by participant id.
    pub behaviors: Vec<Behavior>,
    /// Seed for random interleaving sweeps.
    pub seed: u32,
}

impl MutexScenario {
    pub fn builder() -> MutexScenarioBuilder {
        MutexScenarioBuilder {
            participants: 2,
            default_behavior: Behavior::default(),
            overrides: Vec::new(),
            seed: None,
        }
    }

    pub fn participants(&self) -> usize {
        self.behaviors.len()
    }
}

/// Builder for [`MutexScenario`].
#[derive(Debug, Clone)]
pub struct MutexScenarioBuilder {
    participants: usize,
    default_behavior: Behavior,
    overrides: Vec<(ParticipantId, Behavior)>,
    seed: Option<u32>,
}

impl MutexScenarioBuilder {
    /// Number of participants: 2 (Peterson) or 3 (ring turn).
    pub fn participants(mut self, n: usize) -> Self {
        self.participants = n;
        self
    }

    /// Behavior of every participant without an explicit override.
    pub fn default_behavior(mut self, behavior: Behavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    pub fn behavior(mut self, id: ParticipantId, behavior: Behavior) -> Self {
        self.overrides.push((id, behavior));
        self
    }

    /// Set the PRNG seed. Without this, `OSSIM_SEED` is consulted at build.
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<MutexScenario> {
        let protocol = Protocol::for_participants(self.participants)?;
        let mut behaviors = vec![self.default_behavior; self.participants];
        for (id, behavior) in self.overrides {
            let slot = behaviors.get_mut(id.index()).ok_or_else(|| {
                SimError::InvalidInput(format!(
                    "{id} out of range for {} participants",
                    self.participants
                ))
            })?;
            *slot = behavior;
        }
        for b in &behaviors {
            b.validate()?;
        }
        let seed = match self.seed {
            Some(s) => s,
            None => seed_from_env()?,
        };
        Ok(MutexScenario {
            protocol,
            behaviors,
            seed,
        })
    }
}
