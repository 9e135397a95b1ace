//! Interaction Model status codes used at the interaction boundary.

use serde::{Deserialize, Serialize};

/// Status code carried in `StatusResponse` messages and attribute/event
/// report statuses.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct StatusCode(pub u8);

impl StatusCode {
    /// The operation completed successfully.
    pub const SUCCESS: StatusCode = StatusCode(0x00);
    /// Generic failure.
    pub const FAILURE: StatusCode = StatusCode(0x01);
    /// Resource exhausted (e.g. no room for another subscription).
    pub const RESOURCE_EXHAUSTED: StatusCode = StatusCode(0x89);
    /// Path not found.
    pub const NOT_FOUND: StatusCode = StatusCode(0x8b);
    /// Constraint violated (value out of range for the data type).
    pub const CONSTRAINT_ERROR: StatusCode = StatusCode(0x87);
    /// Invalid action for the current exchange/message state.
    pub const INVALID_ACTION: StatusCode = StatusCode(0x80);
    /// Invalid command.
    pub const INVALID_COMMAND: StatusCode = StatusCode(0x85);
    /// Unsupported endpoint.
    pub const UNSUPPORTED_ENDPOINT: StatusCode = StatusCode(0x7f);
    /// Unsupported event.
    pub const UNSUPPORTED_EVENT: StatusCode = StatusCode(0x7c);
    /// Invalid or unknown subscription id.
    pub const INVALID_SUBSCRIPTION: StatusCode = StatusCode(0x7d);

    /// Whether this status represents success.
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_success() {
        assert!(StatusCode::SUCCESS.is_success());
        assert!(!StatusCode::FAILURE.is_success());
    }
}
