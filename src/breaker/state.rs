use serde::{Deserialize, Serialize};

/// Position of a circuit in its lifecycle.
///
/// Transitions are: CLOSED -> OPEN when failures inside the window reach the
/// threshold, OPEN -> HALF_OPEN lazily once the cooldown elapses, HALF_OPEN ->
/// CLOSED after enough probe successes, HALF_OPEN -> OPEN on any probe
/// failure. There is no direct OPEN -> CLOSED edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow; failures are being counted.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// A limited number of probes test whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.to_string(), "open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"half_open\""
        );
        let back: CircuitState = serde_json::from_str("\"half_open\"").unwrap();
        assert_eq!(back, CircuitState::HalfOpen);
    }
}
