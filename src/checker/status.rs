// src/checker/status.rs
// =============================================================================
// The closed set of outcomes a probe can produce.
//
// The persisted form is a plain string ("OK", "Error 404", "Broken", ...)
// so snapshot files and CSV exports stay human readable. In memory it is a
// tagged enum so nothing downstream has to parse strings.
//
// Sort rank:
//   Error / Broken            -> 0  (listed first)
//   everything else (incl OK) -> 1
// Restricted and TLS outcomes deliberately share rank 1 with OK; they are
// reported as warnings rather than failures everywhere (sorting and counts).
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LinkStatus {
    /// Final response below 400
    Ok,
    /// 401 or 403
    Restricted(u16),
    /// Any other code >= 400
    Error(u16),
    /// No response at all (DNS, connect, timeout, ...)
    Broken,
    /// Server requires legacy TLS renegotiation which the client refuses
    TlsLegacyRenegotiation,
    /// TLS handshake rejected by the server
    TlsHandshakeFailure,
}

// How a status is grouped in summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Ok,
    Warning,
    Failing,
}

impl LinkStatus {
    // Classifies a final HTTP status code
    pub fn from_code(code: u16) -> Self {
        match code {
            401 | 403 => LinkStatus::Restricted(code),
            c if c >= 400 => LinkStatus::Error(c),
            _ => LinkStatus::Ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, LinkStatus::Ok)
    }

    /// Sort group: 0 for Error/Broken, 1 for everything else
    pub fn rank(&self) -> u8 {
        match self {
            LinkStatus::Error(_) | LinkStatus::Broken => 0,
            _ => 1,
        }
    }

    pub fn severity(&self) -> Severity {
        match (self.is_ok(), self.rank()) {
            (true, _) => Severity::Ok,
            (false, 0) => Severity::Failing,
            (false, _) => Severity::Warning,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Ok => f.write_str("OK"),
            LinkStatus::Restricted(code) => write!(f, "Restricted {}", code),
            LinkStatus::Error(code) => write!(f, "Error {}", code),
            LinkStatus::Broken => f.write_str("Broken"),
            LinkStatus::TlsLegacyRenegotiation => {
                f.write_str("TLS Legacy Renegotiation Unsupported")
            }
            LinkStatus::TlsHandshakeFailure => f.write_str("TLS Handshake Failure"),
        }
    }
}

impl FromStr for LinkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "OK" => return Ok(LinkStatus::Ok),
            "Broken" => return Ok(LinkStatus::Broken),
            "TLS Legacy Renegotiation Unsupported" => {
                return Ok(LinkStatus::TlsLegacyRenegotiation)
            }
            "TLS Handshake Failure" => return Ok(LinkStatus::TlsHandshakeFailure),
            _ => {}
        }

        let (kind, code) = s
            .split_once(' ')
            .ok_or_else(|| format!("Unrecognised status: {}", s))?;
        let code: u16 = code
            .trim()
            .parse()
            .map_err(|_| format!("Invalid status code in: {}", s))?;

        match kind {
            "Restricted" => Ok(LinkStatus::Restricted(code)),
            "Error" => Ok(LinkStatus::Error(code)),
            _ => Err(format!("Unrecognised status: {}", s)),
        }
    }
}

impl TryFrom<String> for LinkStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<LinkStatus> for String {
    fn from(status: LinkStatus) -> Self {
        status.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code() {
        assert_eq!(LinkStatus::from_code(200), LinkStatus::Ok);
        assert_eq!(LinkStatus::from_code(302), LinkStatus::Ok);
        assert_eq!(LinkStatus::from_code(401), LinkStatus::Restricted(401));
        assert_eq!(LinkStatus::from_code(403), LinkStatus::Restricted(403));
        assert_eq!(LinkStatus::from_code(404), LinkStatus::Error(404));
        assert_eq!(LinkStatus::from_code(503), LinkStatus::Error(503));
    }

    #[test]
    fn test_display_strings() {
        assert_eq!(LinkStatus::Restricted(403).to_string(), "Restricted 403");
        assert_eq!(LinkStatus::Error(404).to_string(), "Error 404");
        assert_eq!(
            LinkStatus::TlsLegacyRenegotiation.to_string(),
            "TLS Legacy Renegotiation Unsupported"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("Error".parse::<LinkStatus>().is_err());
        assert!("Error abc".parse::<LinkStatus>().is_err());
        assert!("Fine 200".parse::<LinkStatus>().is_err());
    }

    #[test]
    fn test_rank_keeps_warnings_with_ok() {
        assert_eq!(LinkStatus::Error(500).rank(), 0);
        assert_eq!(LinkStatus::Broken.rank(), 0);
        assert_eq!(LinkStatus::Ok.rank(), 1);
        assert_eq!(LinkStatus::Restricted(401).rank(), 1);
        assert_eq!(LinkStatus::TlsHandshakeFailure.rank(), 1);
    }

    #[test]
    fn test_severity_matches_rank() {
        assert_eq!(LinkStatus::Ok.severity(), Severity::Ok);
        assert_eq!(LinkStatus::Broken.severity(), Severity::Failing);
        assert_eq!(LinkStatus::Restricted(403).severity(), Severity::Warning);
        assert_eq!(LinkStatus::TlsLegacyRenegotiation.severity(), Severity::Warning);
    }

    #[test]
    fn test_serde_uses_display_string() {
        let json = serde_json::to_string(&LinkStatus::Restricted(401)).unwrap();
        assert_eq!(json, "\"Restricted 401\"");
        let parsed: LinkStatus = serde_json::from_str("\"Broken\"").unwrap();
        assert_eq!(parsed, LinkStatus::Broken);
    }
}
