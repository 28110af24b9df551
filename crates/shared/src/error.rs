use thiserror::Error;

/// Failure taxonomy for operator commands issued against the vehicle.
///
/// Validation failures (`UnknownVariable`, `OutOfDomain`) are raised
/// before any network traffic; the remaining variants describe the
/// endpoint round-trip or the video resource.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("not connected to the instrumentation endpoint")]
    NotConnected,
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("value {value} is outside the domain of {variable}")]
    OutOfDomain { variable: &'static str, value: i64 },
    #[error("rejected by the endpoint: {0}")]
    RemoteRejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("video resource unavailable: {0}")]
    ResourceUnavailable(String),
}
