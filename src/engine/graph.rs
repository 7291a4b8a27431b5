// ABOUTME: Transition table for the fixed stage graph
// ABOUTME: Two branch points: ASK may detour through WAIT, DECIDE may jump straight to COMPLETE

use super::stage::StageId;
use super::state::TicketState;

/// Next stage after `current`, or `None` once COMPLETE has run
pub fn next_stage(current: StageId, state: &TicketState) -> Option<StageId> {
    let next = match current {
        StageId::Intake => StageId::Understand,
        StageId::Understand => StageId::Prepare,
        StageId::Prepare => StageId::Ask,
        StageId::Ask if state.awaiting_human_response() => StageId::Wait,
        StageId::Ask => StageId::Retrieve,
        StageId::Wait => StageId::Retrieve,
        StageId::Retrieve => StageId::Decide,
        StageId::Decide if state.escalation_needed => StageId::Complete,
        StageId::Decide => StageId::Update,
        StageId::Update => StageId::Create,
        StageId::Create => StageId::Do,
        StageId::Do => StageId::Complete,
        StageId::Complete => return None,
    };
    Some(next)
}

pub fn first_stage() -> StageId {
    StageId::Intake
}

/// Walk the graph without running anything; useful for previews and tests
pub fn planned_path(state: &TicketState) -> Vec<StageId> {
    let mut path = vec![first_stage()];
    let mut current = first_stage();
    while let Some(next) = next_stage(current, state) {
        path.push(next);
        current = next;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ticket::InputRecord;

    fn state() -> TicketState {
        TicketState::new(InputRecord::sample()).unwrap()
    }

    #[test]
    fn test_straight_path_skips_wait() {
        let path = planned_path(&state());
        assert_eq!(path.len(), 10);
        assert!(!path.contains(&StageId::Wait));
        assert_eq!(path.last(), Some(&StageId::Complete));
    }

    #[test]
    fn test_clarification_detours_through_wait() {
        let mut state = state();
        state.clarification_requested = true;
        assert_eq!(next_stage(StageId::Ask, &state), Some(StageId::Wait));
        assert_eq!(planned_path(&state).len(), 11);

        state.human_response = Some("Yes, since Monday".to_string());
        assert_eq!(next_stage(StageId::Ask, &state), Some(StageId::Retrieve));
    }

    #[test]
    fn test_escalation_exits_to_complete() {
        let mut state = state();
        state.escalation_needed = true;
        assert_eq!(next_stage(StageId::Decide, &state), Some(StageId::Complete));

        let path = planned_path(&state);
        for skipped in [StageId::Update, StageId::Create, StageId::Do] {
            assert!(!path.contains(&skipped));
        }
        assert_eq!(path.len(), 7);
    }

    #[test]
    fn test_complete_is_terminal() {
        assert_eq!(next_stage(StageId::Complete, &state()), None);
    }
}
