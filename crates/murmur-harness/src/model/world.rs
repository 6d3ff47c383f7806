//! Model world - the reference implementation.

use super::operation::{Operation, OperationError, OperationResult, SlotId};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Slots currently in the room, ascending.
    pub members: Vec<SlotId>,
    /// Per-slot received messages as `(sender slot, content)`, in order.
    pub received: Vec<Vec<(SlotId, Vec<u8>)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Absent,
    Joined,
    Gone,
}

/// Model world.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    slots: Vec<SlotState>,
    received: Vec<Vec<(SlotId, Vec<u8>)>>,
}

impl ModelWorld {
    /// Model with `num_slots` participant slots.
    pub fn new(num_slots: usize) -> Self {
        Self { slots: vec![SlotState::Absent; num_slots], received: vec![Vec::new(); num_slots] }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Join { slot } => self.apply_join(*slot),
            Operation::Send { slot, content } => self.apply_send(*slot, content.to_bytes()),
            Operation::Leave { slot } | Operation::Disconnect { slot } => self.apply_leave(*slot),
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState { members: self.members(), received: self.received.clone() }
    }

    fn members(&self) -> Vec<SlotId> {
        (0..self.slots.len())
            .filter(|&i| self.slots[i] == SlotState::Joined)
            .filter_map(|i| SlotId::try_from(i).ok())
            .collect()
    }

    fn apply_join(&mut self, slot: SlotId) -> OperationResult {
        match self.slots.get_mut(slot as usize) {
            Some(state @ SlotState::Absent) => {
                *state = SlotState::Joined;
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::AlreadyJoined),
        }
    }

    /// Everyone else in the room receives the message once.
    fn apply_send(&mut self, slot: SlotId, content: Vec<u8>) -> OperationResult {
        if self.slots.get(slot as usize) != Some(&SlotState::Joined) {
            return OperationResult::Error(OperationError::NotJoined);
        }

        for member in self.members() {
            if member != slot {
                self.received[member as usize].push((slot, content.clone()));
            }
        }

        OperationResult::Ok
    }

    fn apply_leave(&mut self, slot: SlotId) -> OperationResult {
        match self.slots.get_mut(slot as usize) {
            Some(state @ SlotState::Joined) => {
                *state = SlotState::Gone;
                OperationResult::Ok
            },
            _ => OperationResult::Error(OperationError::NotJoined),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SmallMessage;

    #[test]
    fn send_reaches_other_members_only() {
        let mut model = ModelWorld::new(3);
        model.apply(&Operation::Join { slot: 0 });
        model.apply(&Operation::Join { slot: 1 });

        let content = SmallMessage { seed: 9, size_class: 1 };
        let result = model.apply(&Operation::Send { slot: 0, content: content.clone() });

        assert!(result.is_ok());
        let state = model.observable_state();
        assert!(state.received[0].is_empty());
        assert_eq!(state.received[1], vec![(0, content.to_bytes())]);
        assert!(state.received[2].is_empty());
    }

    #[test]
    fn left_slot_cannot_rejoin() {
        let mut model = ModelWorld::new(1);
        model.apply(&Operation::Join { slot: 0 });
        model.apply(&Operation::Leave { slot: 0 });

        assert_eq!(
            model.apply(&Operation::Join { slot: 0 }),
            OperationResult::Error(OperationError::AlreadyJoined)
        );
        let content = SmallMessage { seed: 0, size_class: 0 };
        assert_eq!(
            model.apply(&Operation::Send { slot: 0, content }),
            OperationResult::Error(OperationError::NotJoined)
        );
    }
}
