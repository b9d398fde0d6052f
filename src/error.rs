use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Structured fields attached to an error as it travels up the stack.
pub type Fields = BTreeMap<String, Value>;

/// Broad classification of every failure the orchestrator can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Inventory, plan or configuration file missing or malformed.
    Config,
    /// Reserved keyword as var name, invalid identifier, unknown module.
    Validation,
    /// Template syntax error or unresolved reference.
    Render,
    /// Connection, authentication or remote process failure.
    Transport,
    /// Module output unparseable or a failed module status.
    Module,
    /// Preprocessor recursion or unexpected variable shapes.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::Render => "render",
            ErrorKind::Transport => "transport",
            ErrorKind::Module => "module",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error carrying a kind, a composed message and accumulated fields.
///
/// Wrapping never mutates: every call to [`HenchmanError::wrap`] returns a new
/// value whose [`std::error::Error::source`] is the error it wrapped.
#[derive(Debug, Clone)]
pub struct HenchmanError {
    kind: ErrorKind,
    message: String,
    fields: Fields,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl HenchmanError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, fields: Fields) -> Self {
        Self {
            kind,
            message: message.into(),
            fields,
            source: None,
        }
    }

    /// Turn any foreign error into a fresh `HenchmanError` with its own field map.
    pub fn from_error<E>(kind: ErrorKind, err: E, fields: Fields, context: &str) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            message: prefix(context, &err.to_string()),
            fields,
            source: Some(Arc::new(err)),
        }
    }

    /// Wrap with extra fields and context. Existing fields win.
    pub fn wrap(&self, fields: Fields, context: &str) -> Self {
        self.wrap_with(fields, context, false)
    }

    /// Wrap with extra fields and context. New fields win.
    pub fn wrap_override(&self, fields: Fields, context: &str) -> Self {
        self.wrap_with(fields, context, true)
    }

    fn wrap_with(&self, fields: Fields, context: &str, override_existing: bool) -> Self {
        let mut merged = self.fields.clone();
        for (key, value) in fields {
            if override_existing || !merged.contains_key(&key) {
                merged.insert(key, value);
            }
        }

        Self {
            kind: self.kind,
            message: prefix(context, &self.message),
            fields: merged,
            source: Some(Arc::new(self.clone())),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Fields rendered as a single JSON object, for log lines.
    pub fn fields_json(&self) -> String {
        serde_json::to_string(&self.fields).unwrap_or_default()
    }
}

fn prefix(context: &str, message: &str) -> String {
    if context.is_empty() {
        message.to_string()
    } else {
        format!("{context} :: {message}")
    }
}

impl fmt::Display for HenchmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HenchmanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Build a [`Fields`] map from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    () => { $crate::error::Fields::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::error::Fields::new();
        $( fields.insert($key.to_string(), ::serde_json::json!($value)); )+
        fields
    }};
}

pub type Result<T> = std::result::Result<T, HenchmanError>;
