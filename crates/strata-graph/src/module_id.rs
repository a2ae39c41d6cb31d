use std::fmt;
use std::path::Path;
use std::sync::Arc;

use path_clean::PathClean;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const VIRTUAL_PREFIX: &str = "virtual:";

/// Canonical identifier for a module in the strata graph.
///
/// Identifiers are project-relative, forward-slash separated and lexically
/// normalized (`./a/../b.js` becomes `b.js`). Absolute paths are rejected so
/// the same project produces the same identifiers on every machine, which
/// chunk identities depend on. Virtual modules (`virtual:...`) are kept
/// verbatim.
///
/// Ordering is plain lexical order of the identifier text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    /// Create a new module identifier from a path-like string.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ModuleIdError> {
        let raw = raw.as_ref();

        if raw.is_empty() {
            return Err(ModuleIdError::EmptyPath);
        }
        if raw.contains('\0') {
            return Err(ModuleIdError::NullByte(raw.replace('\0', "\\0")));
        }
        if raw.starts_with(VIRTUAL_PREFIX) {
            return Ok(Self(Arc::from(raw)));
        }

        let slashed = raw.replace('\\', "/");
        if slashed.starts_with('/') || Path::new(&slashed).is_absolute() || has_drive_prefix(&slashed) {
            return Err(ModuleIdError::Absolute(raw.to_string()));
        }

        let cleaned = Path::new(&slashed).clean();
        let text = cleaned.to_string_lossy().replace('\\', "/");

        if text == "." {
            return Err(ModuleIdError::EmptyPath);
        }
        if text == ".." || text.starts_with("../") {
            return Err(ModuleIdError::EscapesRoot(raw.to_string()));
        }

        Ok(Self(Arc::from(text)))
    }

    /// Create a module identifier for a virtual module (e.g. `virtual:env`).
    pub fn new_virtual(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().replace('\0', "");
        if id.starts_with(VIRTUAL_PREFIX) {
            Self(Arc::from(id))
        } else {
            Self(Arc::from(format!("{VIRTUAL_PREFIX}{id}")))
        }
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier represents a virtual module.
    pub fn is_virtual(&self) -> bool {
        self.0.starts_with(VIRTUAL_PREFIX)
    }
}

fn has_drive_prefix(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && !text.starts_with(VIRTUAL_PREFIX)
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ModuleId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModuleId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ModuleId::new(&value).map_err(serde::de::Error::custom)
    }
}

/// Error type for `ModuleId` construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleIdError {
    /// The provided path was empty.
    #[error("module id path is empty")]
    EmptyPath,

    /// The path contained a NUL byte.
    #[error("module id '{0}' contains a null byte")]
    NullByte(String),

    /// Absolute paths are machine specific.
    #[error("module id '{0}' is absolute; ids must be relative to the project root")]
    Absolute(String),

    /// The normalized path points outside the project root.
    #[error("module id '{0}' escapes the project root")]
    EscapesRoot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_relative_segments() {
        let id = ModuleId::new("./src/util/../index.js").unwrap();
        assert_eq!(id.as_str(), "src/index.js");
    }

    #[test]
    fn test_backslashes_become_forward_slashes() {
        let id = ModuleId::new("src\\components\\button.js").unwrap();
        assert_eq!(id.as_str(), "src/components/button.js");
    }

    #[test]
    fn test_rejects_empty_and_dot() {
        assert_eq!(ModuleId::new(""), Err(ModuleIdError::EmptyPath));
        assert_eq!(ModuleId::new("./"), Err(ModuleIdError::EmptyPath));
    }

    #[test]
    fn test_rejects_absolute_and_escaping_paths() {
        assert!(matches!(
            ModuleId::new("/etc/passwd"),
            Err(ModuleIdError::Absolute(_))
        ));
        assert!(matches!(
            ModuleId::new("C:\\project\\a.js"),
            Err(ModuleIdError::Absolute(_))
        ));
        assert!(matches!(
            ModuleId::new("src/../../secret.js"),
            Err(ModuleIdError::EscapesRoot(_))
        ));
    }

    #[test]
    fn test_rejects_null_bytes() {
        assert!(matches!(
            ModuleId::new("src/a\0.js"),
            Err(ModuleIdError::NullByte(_))
        ));
    }

    #[test]
    fn test_virtual_ids_are_kept_verbatim() {
        let id = ModuleId::new("virtual:env/../x").unwrap();
        assert!(id.is_virtual());
        assert_eq!(id.as_str(), "virtual:env/../x");
        assert_eq!(ModuleId::new_virtual("env").as_str(), "virtual:env");
    }

    #[test]
    fn test_lexical_ordering() {
        let mut ids = vec![
            ModuleId::new("src/b.js").unwrap(),
            ModuleId::new("lib/z.js").unwrap(),
            ModuleId::new("src/a.js").unwrap(),
        ];
        ids.sort();
        let names: Vec<_> = ids.iter().map(ModuleId::as_str).collect();
        assert_eq!(names, vec!["lib/z.js", "src/a.js", "src/b.js"]);
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let id: ModuleId = serde_json::from_str("\"./src/a.js\"").unwrap();
        assert_eq!(id.as_str(), "src/a.js");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"src/a.js\"");
        assert!(serde_json::from_str::<ModuleId>("\"/abs.js\"").is_err());
    }
}
