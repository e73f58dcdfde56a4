//! Wire-protocol string constants, grounded in
//! `original_source/tcpnetlock/constants.py`.

pub const RESPONSE_OK: &str = "ok";
pub const RESPONSE_ERR_INVALID_LOCK_NAME: &str = "err,invalid lock name";
pub const RESPONSE_INVALID_ACTION: &str = "bad-action";
pub const RESPONSE_INVALID_REQUEST: &str = "bad-request";
pub const RESPONSE_LOCK_NOT_GRANTED: &str = "not-granted";
pub const RESPONSE_RELEASED: &str = "released";
pub const RESPONSE_SHUTTING_DOWN: &str = "shutting-down";
pub const RESPONSE_PONG: &str = "pong";
pub const RESPONSE_STILL_ALIVE: &str = "alive";
pub const RESPONSE_STATS_PREFIX: &str = "stats-coming";

pub const ACTION_LOCK: &str = "lock";
pub const ACTION_RELEASE: &str = "release";
pub const ACTION_SERVER_SHUTDOWN: &str = ".server-shutdown";
pub const ACTION_PING: &str = ".ping";
pub const ACTION_KEEPALIVE: &str = ".keepalive";
pub const ACTION_STATS: &str = ".stats";

pub const DEFAULT_PORT: u16 = 7654;

/// `^[A-Za-z0-9_-]+$`, hand-checked rather than pulled in through a regex
/// engine — the character class is fixed and small enough that a `regex`
/// dependency would buy nothing over `chars().all(...)`.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_char() {
        assert!(is_valid_identifier("a"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn rejects_space_dot_percent() {
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("has.dot"));
        assert!(!is_valid_identifier("has%percent"));
    }

    #[test]
    fn accepts_mixed_word_chars() {
        assert!(is_valid_identifier("Alpha-Beta_123"));
    }
}
