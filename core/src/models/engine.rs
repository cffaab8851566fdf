//! Engine identity: which wire dialect a scanner speaks and which adapter
//! family handles it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::errors::InvalidEnum;

/// The name of a family of scanner implementations sharing a wire protocol
/// (for example `openvas` or `zap`). Unlike [`ScanFamily`] this is not a
/// closed set: new engines are registered declaratively through the scaler
/// catalog (C4) and looked up by this key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct EngineKind(pub String);

impl EngineKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EngineKind {
    fn from(value: &str) -> Self {
        EngineKind(value.to_owned())
    }
}

impl From<String> for EngineKind {
    fn from(value: String) -> Self {
        EngineKind(value)
    }
}

/// The adapter family a scanner belongs to. This picks which
/// [`crate::adapter::EngineAdapter`] implementation handles the scanner's
/// engine kind; it is a closed set because each family hides a distinct
/// internal scan-state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ScanFamily {
    /// Network / host vulnerability scanning (e.g. OpenVAS). Supports
    /// sub-scan fan-out across several backend hosts.
    HostScan,
    /// Web application scanning (e.g. ZAP). Owns an internal
    /// spider -> ajax-spider -> active -> passive state machine.
    WebScan,
}

impl fmt::Display for ScanFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ScanFamily::HostScan => "host-scan",
            ScanFamily::WebScan => "web-scan",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ScanFamily {
    type Err = InvalidEnum;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host-scan" | "host" => Ok(ScanFamily::HostScan),
            "web-scan" | "web" => Ok(ScanFamily::WebScan),
            _ => Err(InvalidEnum(format!("{s} is not a valid scan family"))),
        }
    }
}

/// The scaling modes an engine can support, as declared in its scaler
/// registration (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalingModes {
    /// Vertical: grow/shrink `max_concurrency` on an existing pod.
    pub vpa: bool,
    /// Horizontal: spawn or remove whole pods.
    pub hpa: bool,
}

impl ScalingModes {
    pub fn none() -> Self {
        ScalingModes {
            vpa: false,
            hpa: false,
        }
    }

    pub fn supports_any(&self) -> bool {
        self.vpa || self.hpa
    }
}
