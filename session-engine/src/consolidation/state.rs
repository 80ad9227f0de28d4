use common::error::AppError;
use state_machines::{core::GuardError, state_machine};

state_machine! {
    name: ConsolidationMachine,
    state: ConsolidationState,
    initial: Idle,
    states: [Idle, Running],
    events {
        start { transition: { from: Idle, to: Running } }
        finish { transition: { from: Running, to: Idle } }
    }
}

pub fn idle() -> ConsolidationMachine<(), Idle> {
    ConsolidationMachine::new(())
}

pub fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid consolidation transition during {event}: {guard:?}"
    ))
}
