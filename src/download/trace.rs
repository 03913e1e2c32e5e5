//! Trace ids tying together the log lines of one logical request.

use std::fmt;

use rand::Rng;

/// Identifier attached to every log line of one fetch or download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(String);

impl TraceId {
    /// Uses the caller's id when it is non-blank, otherwise generates one.
    #[must_use]
    pub fn from_option(trace_id: Option<&str>) -> Self {
        match trace_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self(id.to_string()),
            None => Self::generate(),
        }
    }

    /// Generates a random 8-hex-digit id.
    #[must_use]
    pub fn generate() -> Self {
        let value: u32 = rand::thread_rng().r#gen();
        Self(format!("{value:08x}"))
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
