use tokio_modbus::ExceptionCode;

/// Outcome classes of a field-bus exchange as seen by the monitor.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The peer could not be reached or the transport broke mid-request.
    #[error("Connection error: {0}")]
    Connection(String),
    /// A reply that does not match the outstanding request (transaction id or
    /// header mismatch). The stream is out of sync and cannot be reused.
    #[error("Framing error: {0}")]
    Framing(String),
    /// A well-formed reply flagged as an error, or a reply that could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BusError {
    pub fn exception(code: ExceptionCode) -> Self {
        BusError::Protocol(format!("exception response {:?}", code))
    }

    /// The client context that produced this error must be discarded.
    pub fn breaks_transport(&self) -> bool {
        matches!(self, BusError::Connection(_) | BusError::Framing(_))
    }
}

impl From<tokio_modbus::Error> for BusError {
    fn from(err: tokio_modbus::Error) -> Self {
        match err {
            tokio_modbus::Error::Transport(e) => BusError::Connection(e.to_string()),
            tokio_modbus::Error::Protocol(e) => BusError::Framing(e.to_string()),
        }
    }
}
