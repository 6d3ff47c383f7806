//! Operations for model-based testing.
//!
//! Operations are generated randomly by proptest and applied to both the
//! model and the simulated world.

/// Participant slot (0-indexed). A slot joins at most once.
pub type SlotId = u8;

/// Operations that can be applied to the system.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Slot connects and joins the room.
    Join {
        /// Joining slot.
        slot: SlotId,
    },

    /// Slot sends a message to every other member.
    Send {
        /// Sending slot.
        slot: SlotId,
        /// Message content (kept small for efficiency).
        content: SmallMessage,
    },

    /// Slot leaves the room and closes its session.
    Leave {
        /// Leaving slot.
        slot: SlotId,
    },

    /// Slot's connection drops without a leave message.
    Disconnect {
        /// Disconnecting slot.
        slot: SlotId,
    },
}

/// Small message content for testing.
///
/// The content is deterministic from the seed.
#[derive(Debug, Clone)]
pub struct SmallMessage {
    /// Message seed.
    pub seed: u8,
    /// Message length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let len: u8 = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 255,
        };

        (0..len).map(|i| self.seed.wrapping_add(i)).collect()
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Slot already joined (or joined and left).
    AlreadyJoined,

    /// Slot is not in the room.
    NotJoined,
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_classes() {
        let lens: Vec<_> = (0..4)
            .map(|size_class| SmallMessage { seed: 1, size_class }.to_bytes().len())
            .collect();
        assert_eq!(lens, [0, 8, 64, 255]);
    }
}
