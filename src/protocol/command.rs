//! STOMP command set

/// The STOMP 1.2 command set
///
/// Client-originated and server-originated commands share one enum;
/// the session decides which are meaningful in its current phase.
/// A well-formed frame whose command token is outside the known set
/// is carried as [`Command::Other`] rather than rejected, so the
/// session gets to see and ignore it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client connection request
    Connect,
    /// STOMP 1.2 alias for CONNECT
    Stomp,
    /// Server reply to a successful CONNECT
    Connected,
    /// Client message to a destination
    Send,
    /// Subscribe to a destination
    Subscribe,
    /// Unsubscribe from a destination
    Unsubscribe,
    /// Acknowledge a message
    Ack,
    /// Negative-acknowledge a message
    Nack,
    /// Begin a transaction
    Begin,
    /// Commit a transaction
    Commit,
    /// Abort a transaction
    Abort,
    /// Client disconnect request
    Disconnect,
    /// Server-pushed message
    Message,
    /// Server receipt
    Receipt,
    /// Server error report
    Error,
    /// A command token outside the STOMP set, preserved verbatim
    Other(String),
}

impl Command {
    /// Wire representation of the command
    pub fn as_str(&self) -> &str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Other(token) => token,
        }
    }

    /// Parse a command token from the wire
    ///
    /// Total: anything outside the STOMP command set comes back as
    /// [`Command::Other`] with the token preserved.
    pub fn from_bytes(token: &[u8]) -> Command {
        match token {
            b"CONNECT" => Command::Connect,
            b"STOMP" => Command::Stomp,
            b"CONNECTED" => Command::Connected,
            b"SEND" => Command::Send,
            b"SUBSCRIBE" => Command::Subscribe,
            b"UNSUBSCRIBE" => Command::Unsubscribe,
            b"ACK" => Command::Ack,
            b"NACK" => Command::Nack,
            b"BEGIN" => Command::Begin,
            b"COMMIT" => Command::Commit,
            b"ABORT" => Command::Abort,
            b"DISCONNECT" => Command::Disconnect,
            b"MESSAGE" => Command::Message,
            b"RECEIPT" => Command::Receipt,
            b"ERROR" => Command::Error,
            other => Command::Other(String::from_utf8_lossy(other).into_owned()),
        }
    }

    /// Whether the token was one of the 15 STOMP commands
    pub fn is_known(&self) -> bool {
        !matches!(self, Command::Other(_))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let all = [
            Command::Connect,
            Command::Stomp,
            Command::Connected,
            Command::Send,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Ack,
            Command::Nack,
            Command::Begin,
            Command::Commit,
            Command::Abort,
            Command::Disconnect,
            Command::Message,
            Command::Receipt,
            Command::Error,
        ];

        for command in all {
            assert_eq!(Command::from_bytes(command.as_str().as_bytes()), command);
            assert!(command.is_known());
        }
    }

    #[test]
    fn test_unknown_token_is_preserved() {
        assert_eq!(
            Command::from_bytes(b"PUBLISH"),
            Command::Other("PUBLISH".to_string())
        );
        // Commands are case-sensitive.
        assert_eq!(
            Command::from_bytes(b"connect"),
            Command::Other("connect".to_string())
        );
        assert!(!Command::from_bytes(b"PUBLISH").is_known());
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::Message.to_string(), "MESSAGE");
        assert_eq!(Command::Other("PUBLISH".to_string()).to_string(), "PUBLISH");
    }
}
