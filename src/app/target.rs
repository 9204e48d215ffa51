//! Application import strings (`<module>:<attribute>`).

use std::fmt;
use std::str::FromStr;

/// Errors produced while parsing an application import string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppRefError {
    #[error("import string '{0}' must be in format \"<module>:<attribute>\"")]
    Format(String),
    #[error("'{segment}' in '{target}' is not a valid identifier")]
    InvalidSegment { target: String, segment: String },
}

/// Reference to an application object, e.g. `main:app`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppRef {
    module: String,
    attribute: String,
}

impl AppRef {
    pub fn new(module: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            attribute: attribute.into(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn check_dotted(target: &str, path: &str) -> Result<(), AppRefError> {
    for segment in path.split('.') {
        if !is_identifier(segment) {
            return Err(AppRefError::InvalidSegment {
                target: target.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    Ok(())
}

impl FromStr for AppRef {
    type Err = AppRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let target = s.trim();
        let (module, attribute) = target
            .split_once(':')
            .ok_or_else(|| AppRefError::Format(s.to_string()))?;

        if module.is_empty() || attribute.is_empty() || attribute.contains(':') {
            return Err(AppRefError::Format(s.to_string()));
        }

        check_dotted(target, module)?;
        check_dotted(target, attribute)?;

        Ok(Self::new(module, attribute))
    }
}

impl fmt::Display for AppRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.attribute)
    }
}
