//! # Logical Pack Paths
//!
//! A `LogicalPath` is a relative, `/`-separated path inside a pack. It is
//! validated once at publish time and again by the installer before it is
//! joined onto a project directory.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// A validated pack-internal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Validate a logical path.
    ///
    /// Rejects empty paths, absolute paths, backslashes, empty segments,
    /// `.`/`..` segments and NUL bytes.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let reject = |reason| ValidationError::InvalidPath {
            path: s.to_string(),
            reason,
        };
        if s.is_empty() {
            return Err(reject("path is empty"));
        }
        if s.starts_with('/') {
            return Err(reject("path is absolute"));
        }
        if s.contains('\\') {
            return Err(reject("path contains a backslash"));
        }
        if s.contains('\0') {
            return Err(reject("path contains a NUL byte"));
        }
        // Windows drive prefixes such as `C:`.
        if s.as_bytes().get(1) == Some(&b':') {
            return Err(reject("path has a drive prefix"));
        }
        for segment in s.split('/') {
            match segment {
                "" => return Err(reject("path has an empty segment")),
                "." | ".." => return Err(reject("path has a dot segment")),
                _ => {}
            }
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Lowercased extension of the final segment, if any.
    pub fn extension(&self) -> Option<String> {
        let file = self.0.rsplit('/').next()?;
        let (stem, ext) = file.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Media type guessed from the extension.
    pub fn guess_mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("md") | Some("markdown") | Some("mdx") => "text/markdown",
            Some("yaml") | Some("yml") => "application/yaml",
            Some("toml") => "application/toml",
            Some("json") => "application/json",
            Some("txt") => "text/plain",
            Some("sh") => "text/x-shellscript",
            Some("py") => "text/x-python",
            Some("js") => "text/javascript",
            Some("png") => "image/png",
            _ => "application/octet-stream",
        }
    }
}

impl<'de> Deserialize<'de> for LogicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
