//! Session error taxonomy.
//!
//! One variant per way a bot can fail short of a clean shutdown; the
//! orchestrator's final report prints these per session.

#[derive(Debug)]
pub enum ConnectError {
    Refused(std::io::Error),
    Timeout,
    Resolution(std::io::Error),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::Refused(e) => write!(f, "connect refused: {e}"),
            ConnectError::Timeout => write!(f, "connect timed out"),
            ConnectError::Resolution(e) => write!(f, "host resolution failed: {e}"),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectError::Refused(e) | ConnectError::Resolution(e) => Some(e),
            ConnectError::Timeout => None,
        }
    }
}

#[derive(Debug)]
pub enum AuthFailed {
    /// Transport failure or a non-2xx from the gateway.
    Http(reqwest::Error),
    MalformedResponse(&'static str),
    NoCharacters,
}

impl std::fmt::Display for AuthFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailed::Http(e) => write!(f, "auth http error: {e}"),
            AuthFailed::MalformedResponse(s) => write!(f, "malformed auth response: {s}"),
            AuthFailed::NoCharacters => write!(f, "account has no characters"),
        }
    }
}

impl std::error::Error for AuthFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthFailed::Http(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ProtocolRejected {
    /// `ClientJoinResponse` carried a non-OK result code.
    JoinFailed(u8),
}

impl std::fmt::Display for ProtocolRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolRejected::JoinFailed(code) => write!(f, "join rejected by server (result {code})"),
        }
    }
}

impl std::error::Error for ProtocolRejected {}

#[derive(Debug)]
pub enum SessionError {
    Auth(AuthFailed),
    Connect(ConnectError),
    Protocol(ProtocolRejected),
    /// The server (or the network) dropped the connection while the session
    /// was active and no operator shutdown was in progress.
    ConnectionLost,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Auth(e) => write!(f, "auth failed: {e}"),
            SessionError::Connect(e) => write!(f, "{e}"),
            SessionError::Protocol(e) => write!(f, "{e}"),
            SessionError::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Auth(e) => Some(e),
            SessionError::Connect(e) => Some(e),
            SessionError::Protocol(e) => Some(e),
            SessionError::ConnectionLost => None,
        }
    }
}

impl From<AuthFailed> for SessionError {
    fn from(e: AuthFailed) -> Self {
        SessionError::Auth(e)
    }
}

impl From<ConnectError> for SessionError {
    fn from(e: ConnectError) -> Self {
        SessionError::Connect(e)
    }
}

impl From<ProtocolRejected> for SessionError {
    fn from(e: ProtocolRejected) -> Self {
        SessionError::Protocol(e)
    }
}
