//! Request-line parsing.
//!
//! A line is `ACTION[,KEY[:VALUE][,KEY[:VALUE]...]]`. The name is everything
//! before the first comma; everything after is split on commas into
//! parameter tokens, each split once more on `:`. Whitespace around the name
//! and each key/value is trimmed. Params are kept in an ordered `Vec` rather
//! than a `HashMap` so repeated/ordered parameters round-trip the way the
//! original implementation's dict-of-insertion-order did.

use crate::error::Error;

/// A parsed request or inner-loop line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    name: String,
    params: Vec<(String, String)>,
}

impl Action {
    /// Parses a single line (without its trailing `\n`) into an action.
    ///
    /// Never fails: a malformed line simply parses into an `Action` that
    /// `is_valid()` reports as invalid (e.g. a leading comma yields an empty
    /// name).
    pub fn from_line(line: &str) -> Action {
        let mut parts = line.splitn(2, ',');
        let name = parts.next().unwrap_or("").trim().to_string();
        let params = match parts.next() {
            Some(rest) if !rest.is_empty() => rest
                .split(',')
                .map(|token| {
                    let mut kv = token.splitn(2, ':');
                    let key = kv.next().unwrap_or("").trim().to_string();
                    let value = kv.next().unwrap_or("").trim().to_string();
                    (key, value)
                })
                .collect(),
            _ => Vec::new(),
        };

        Action { name, params }
    }

    /// Valid iff the name is non-empty and every parameter key is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.params.iter().all(|(k, _)| !k.is_empty())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of the first parameter matching `key`, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parses a line and checks validity in one step, returning
    /// `Error::InvalidRequest` for an invalid line.
    pub fn parse_valid(line: &str) -> Result<Action, Error> {
        let action = Action::from_line(line);
        if action.is_valid() {
            Ok(action)
        } else {
            Err(Error::InvalidRequest)
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.params.is_empty() {
            write!(f, "Action: '{}'", self.name)
        } else {
            let params = self
                .params
                .iter()
                .map(|(k, v)| format!("{}:{}", k, v))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "Action: '{}'; {}", self.name, params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_action_no_params() {
        let action = Action::from_line("lock1");
        assert_eq!(action.name(), "lock1");
        assert!(action.is_valid());
    }

    #[test]
    fn one_param() {
        let action = Action::from_line("lock1,blocking:true");
        assert_eq!(action.name(), "lock1");
        assert_eq!(action.param("blocking"), Some("true"));
    }

    #[test]
    fn two_params() {
        let action = Action::from_line("lock1,blocking:true,foo:bar");
        assert_eq!(action.param("blocking"), Some("true"));
        assert_eq!(action.param("foo"), Some("bar"));
    }

    #[test]
    fn param_without_value() {
        let action = Action::from_line("lock1,blocking");
        assert_eq!(action.param("blocking"), Some(""));
    }

    #[test]
    fn leading_comma_is_invalid() {
        let action = Action::from_line(",x:y");
        assert!(!action.is_valid());
        assert_eq!(action.name(), "");
    }

    #[test]
    fn empty_key_is_invalid() {
        let action = Action::from_line("action_name,:nokey");
        assert!(!action.is_valid());
    }

    #[test]
    fn display_does_not_panic() {
        let action = Action::from_line("action_name,key1:value1");
        let _ = action.to_string();
        let invalid = Action::from_line(",no:action");
        let _ = invalid.to_string();
    }

    #[test]
    fn parse_valid_rejects_bad_line() {
        assert!(Action::parse_valid(",x:y").is_err());
        assert!(Action::parse_valid("lock,name:alpha").is_ok());
    }
}
