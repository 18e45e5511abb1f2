use serde::{Deserialize, Serialize};
use std::fmt;

/// How the agent treats a completed HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Rejected,
}

/// Numeric HTTP response status as returned by the CMDB server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpStatus(pub u16);

impl HttpStatus {
    /// Classify by code alone; the response body is never consulted.
    pub fn disposition(self) -> Disposition {
        match self.0 {
            200 | 201 | 202 | 204 | 304 => Disposition::Accepted,
            _ => Disposition::Rejected,
        }
    }

    pub fn is_accepted(self) -> bool {
        self.disposition() == Disposition::Accepted
    }

    pub fn code(self) -> u16 {
        self.0
    }

    /// Meaning of the status in the CMDB API, where it differs from the
    /// generic reason phrase.
    fn description(self) -> Option<&'static str> {
        Some(match self.0 {
            200 => "request processed, no errors",
            201 => "request processed, object created",
            202 => "request processed, data accepted",
            204 => "request processed, no action taken",
            304 => "request processed, no changes found",
            400 => "unsupported or malformed request",
            404 => "object not found",
            406 => "insufficient or incorrect data",
            422 => "unable to decode request",
            424 => "unsatisfied prerequisite",
            500 => "unable to process request",
            _ => return None,
        })
    }
}

impl From<reqwest::StatusCode> for HttpStatus {
    fn from(status: reqwest::StatusCode) -> Self {
        HttpStatus(status.as_u16())
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} {}", self.0, text),
            None => {
                let reason = reqwest::StatusCode::from_u16(self.0)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown status");
                write!(f, "{} {}", self.0, reason)
            }
        }
    }
}
