//! Hooks into the individual mutation steps of multi-timeline moves.

use std::fmt;

use timeweave_types::{Result, TimeweaveError};

/// Mutation steps performed inside a move transaction, in execution order for
/// their respective move classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationStep {
    /// Piece leaves the source board of a cross-timeline move.
    DetachSource,
    /// Piece lands on the target board of a cross-timeline move.
    PlaceTarget,
    /// New timeline is registered for a time-travel move.
    CreateBranch,
    /// Arrival is recorded on the new timeline.
    RecordArrival,
    /// Departure is recorded on the source timeline.
    RecordDeparture,
}

impl fmt::Display for MutationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationStep::DetachSource => "detach-source",
            MutationStep::PlaceTarget => "place-target",
            MutationStep::CreateBranch => "create-branch",
            MutationStep::RecordArrival => "record-arrival",
            MutationStep::RecordDeparture => "record-departure",
        };
        f.write_str(name)
    }
}

/// Consulted before each mutation step. Returning an error aborts the move and
/// rolls back everything done so far.
pub trait MutationProbe: Send {
    fn before(&mut self, step: MutationStep) -> Result<()>;
}

impl<F> MutationProbe for F
where
    F: FnMut(MutationStep) -> Result<()> + Send,
{
    fn before(&mut self, step: MutationStep) -> Result<()> {
        self(step)
    }
}

/// Fails once, at the given step.
#[derive(Debug, Clone)]
pub struct FailAt {
    step: MutationStep,
    armed: bool,
}

impl FailAt {
    pub fn new(step: MutationStep) -> Self {
        Self { step, armed: true }
    }
}

impl MutationProbe for FailAt {
    fn before(&mut self, step: MutationStep) -> Result<()> {
        if self.armed && step == self.step {
            self.armed = false;
            return Err(TimeweaveError::Ops(format!(
                "injected failure at {step}"
            )));
        }
        Ok(())
    }
}
