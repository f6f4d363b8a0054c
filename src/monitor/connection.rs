use serde::{Deserialize, Serialize};

/// Link health as seen by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    /// Last poll got an error-flagged or undecodable reply over a live transport.
    ReadError,
}

/// Inputs that drive [`ConnectionState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectSucceeded,
    ConnectFailed,
    ReadSucceeded,
    TransportFailed,
    ErrorResponse,
}

impl ConnectionState {
    pub fn on(self, event: LinkEvent) -> Self {
        use ConnectionState::*;
        match (self, event) {
            (_, LinkEvent::ConnectSucceeded) => Connected,
            (_, LinkEvent::TransportFailed) => Disconnected,
            (Disconnected, LinkEvent::ConnectFailed) => Disconnected,
            // a late connect failure never downgrades a link that already works
            (state, LinkEvent::ConnectFailed) => state,
            (Disconnected, LinkEvent::ReadSucceeded | LinkEvent::ErrorResponse) => Disconnected,
            (_, LinkEvent::ReadSucceeded) => Connected,
            (_, LinkEvent::ErrorResponse) => ReadError,
        }
    }

    /// A transport exists, whether or not the last reply was usable.
    pub fn is_linked(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::ReadError)
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connected => "SYSTEM ONLINE",
            ConnectionState::ReadError => "READ ERROR",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), Disconnected);
    }

    #[test]
    fn test_connect_and_read_cycle() {
        let state = Disconnected.on(LinkEvent::ConnectSucceeded);
        assert_eq!(state, Connected);
        assert_eq!(state.on(LinkEvent::ReadSucceeded), Connected);
    }

    #[test]
    fn test_read_failure_then_recovery() {
        let state = Connected.on(LinkEvent::TransportFailed);
        assert_eq!(state, Disconnected);
        let state = state.on(LinkEvent::ConnectSucceeded);
        assert_eq!(state.on(LinkEvent::ReadSucceeded), Connected);
    }

    #[test]
    fn test_error_response_round_trip() {
        let state = Connected.on(LinkEvent::ErrorResponse);
        assert_eq!(state, ReadError);
        assert!(state.is_linked());
        assert_eq!(state.on(LinkEvent::ReadSucceeded), Connected);
        assert_eq!(ReadError.on(LinkEvent::TransportFailed), Disconnected);
    }

    #[test]
    fn test_stale_events_do_not_resurrect_a_dead_link() {
        assert_eq!(Disconnected.on(LinkEvent::ReadSucceeded), Disconnected);
        assert_eq!(Disconnected.on(LinkEvent::ErrorResponse), Disconnected);
        assert_eq!(Connected.on(LinkEvent::ConnectFailed), Connected);
    }
}
