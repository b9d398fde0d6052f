use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Outcome reported by a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Changed,
    Failure,
    Error,
    Ignored,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Ok,
        Status::Changed,
        Status::Failure,
        Status::Error,
        Status::Ignored,
    ];

    /// States that let the machine continue to its next task.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Status::Ok | Status::Changed | Status::Ignored)
    }

    pub fn is_failed(&self) -> bool {
        !self.is_accepted()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Changed => "changed",
            Status::Failure => "failure",
            Status::Error => "error",
            Status::Ignored => "ignored",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON object a module prints on stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub status: Status,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub output: Value,
}

impl ModuleResult {
    pub fn new(status: Status, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
            output: Value::Null,
        }
    }

    pub fn ignored(msg: impl Into<String>) -> Self {
        Self::new(Status::Ignored, msg)
    }

    /// Strict parse of module stdout.
    pub fn parse(stdout: &[u8]) -> Result<Self, serde_json::Error> {
        let text = String::from_utf8_lossy(stdout);
        serde_json::from_str(text.trim())
    }

    /// Parse module stdout. Anything unparseable becomes a synthetic `error`.
    pub fn from_stdout(stdout: &[u8]) -> Self {
        Self::parse(stdout).unwrap_or_else(|e| ModuleResult {
            status: Status::Error,
            msg: format!("Error parsing module output: {e}"),
            output: Value::String(String::from_utf8_lossy(stdout).trim().to_string()),
        })
    }

    /// Value bound to a `register` name.
    pub fn to_register_value(&self) -> Value {
        serde_json::json!({
            "status": self.status.as_str(),
            "msg": self.msg,
            "output": self.output,
        })
    }
}
