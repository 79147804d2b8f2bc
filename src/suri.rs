//! Symbol URIs
//!
//! Every symbol in the workspace is addressed by a SURI of the form
//! `py://<workspace-relative-path>#<fragment>`. The fragment is the dotted
//! path from the module root (`Class.method`); a SURI without a fragment
//! addresses the file itself.

use crate::error::{Result, StitcherError};
use std::fmt;
use std::str::FromStr;

/// Scheme used for Python sources
pub const PY_SCHEME: &str = "py";

/// Fragment naming the module body
pub const MODULE_DOC_FRAGMENT: &str = "__doc__";

/// A parsed symbol URI
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Suri {
    scheme: String,
    path: String,
    fragment: Option<String>,
}

impl Suri {
    /// Build a SURI from its parts, normalizing path separators
    pub fn new(scheme: &str, path: &str, fragment: Option<&str>) -> Result<Self> {
        let path = path.replace('\\', "/");
        let raw = match fragment {
            Some(f) => format!("{}://{}#{}", scheme, path, f),
            None => format!("{}://{}", scheme, path),
        };

        if scheme.is_empty() {
            return Err(invalid(&raw, "empty scheme"));
        }
        if path.is_empty() {
            return Err(invalid(&raw, "empty path"));
        }
        if path.starts_with('/') {
            return Err(invalid(&raw, "path must be workspace-relative"));
        }
        if let Some(f) = fragment {
            if f.is_empty() {
                return Err(invalid(&raw, "empty fragment"));
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            path,
            fragment: fragment.map(str::to_string),
        })
    }

    /// SURI addressing a Python file
    pub fn for_file(path: &str) -> Result<Self> {
        Self::new(PY_SCHEME, path, None)
    }

    /// SURI addressing a symbol within a Python file
    pub fn for_symbol(path: &str, fragment: &str) -> Result<Self> {
        Self::new(PY_SCHEME, path, Some(fragment))
    }

    /// Parse the canonical string form
    pub fn parse(uri: &str) -> Result<Self> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| invalid(uri, "missing '://' separator"))?;

        match rest.split_once('#') {
            Some((path, fragment)) => {
                if fragment.is_empty() {
                    return Err(invalid(uri, "empty fragment"));
                }
                Self::new(scheme, path, Some(fragment))
            }
            None => Self::new(scheme, rest, None),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Same symbol at a different file path
    pub fn with_path(&self, path: &str) -> Result<Self> {
        Self::new(&self.scheme, path, self.fragment.as_deref())
    }

    /// Same file with a different fragment
    pub fn with_fragment(&self, fragment: Option<&str>) -> Result<Self> {
        Self::new(&self.scheme, &self.path, fragment)
    }
}

fn invalid(uri: &str, reason: &str) -> StitcherError {
    StitcherError::InvalidSuri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for Suri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{}://{}#{}", self.scheme, self.path, fragment),
            None => write!(f, "{}://{}", self.scheme, self.path),
        }
    }
}

impl FromStr for Suri {
    type Err = StitcherError;

    fn from_str(s: &str) -> Result<Self> {
        Suri::parse(s)
    }
}
