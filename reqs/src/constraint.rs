use std::fmt;

use serde::{Deserialize, Serialize};

/// A single dependency constraint, as written in a manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "version")]
pub enum Constraint {
    Any,
    Exact(String),
    AtLeast(String),
    GreaterThan(String),
    AtMost(String),
    LessThan(String),
    Compatible(String),
}

impl Constraint {
    pub fn version_str(&self) -> Option<&str> {
        match self {
            Constraint::Any => None,
            Constraint::Exact(v)
            | Constraint::AtLeast(v)
            | Constraint::GreaterThan(v)
            | Constraint::AtMost(v)
            | Constraint::LessThan(v)
            | Constraint::Compatible(v) => Some(v),
        }
    }

    /// Render back to the `name<op>version` operator text, e.g. `==1.2.3`.
    pub fn render_suffix(&self) -> String {
        match self {
            Constraint::Any => String::new(),
            Constraint::Exact(v) => format!("=={v}"),
            Constraint::AtLeast(v) => format!(">={v}"),
            Constraint::GreaterThan(v) => format!(">{v}"),
            Constraint::AtMost(v) => format!("<={v}"),
            Constraint::LessThan(v) => format!("<{v}"),
            Constraint::Compatible(v) => format!("~={v}"),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render_suffix())
    }
}

/// `(major, minor, patch)` parsed leniently from a constraint's version
/// string, with an optional trailing pre-release tag. Missing components
/// are absent, not zero, so comparisons can distinguish "2" from "2.0".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTriple {
    pub major: u64,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
    pub pre_release: Option<String>,
}

impl VersionTriple {
    /// Parse a version string by stripping any leading non-digit prefix,
    /// then taking dot-separated numeric components until the first
    /// component that isn't purely numeric (which becomes the pre-release
    /// tag, if non-empty).
    pub fn parse(raw: &str) -> Option<VersionTriple> {
        let trimmed = raw.trim();
        let start = trimmed.find(|c: char| c.is_ascii_digit())?;
        let body = &trimmed[start..];

        let mut parts = body.splitn(4, '.');
        let major_part = parts.next()?;
        let major = numeric_prefix(major_part)?;

        let minor = parts.next().and_then(numeric_prefix);
        let patch = parts.next().and_then(numeric_prefix);

        let pre_release = non_numeric_tail(body);

        Some(VersionTriple { major, minor, patch, pre_release })
    }

    pub fn major_bump(&self, other: &VersionTriple) -> bool {
        other.major > self.major
    }

    pub fn minor_bump(&self, other: &VersionTriple) -> bool {
        other.major == self.major && other.minor.unwrap_or(0) > self.minor.unwrap_or(0)
    }

    pub fn patch_bump(&self, other: &VersionTriple) -> bool {
        other.major == self.major
            && other.minor.unwrap_or(0) == self.minor.unwrap_or(0)
            && other.patch.unwrap_or(0) > self.patch.unwrap_or(0)
    }

    pub fn is_downgrade(&self, other: &VersionTriple) -> bool {
        (other.major, other.minor.unwrap_or(0), other.patch.unwrap_or(0))
            < (self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0))
    }

    pub fn is_major_downgrade(&self, other: &VersionTriple) -> bool {
        other.major < self.major
    }
}

/// Leading run of ASCII digits, parsed as a number. None if empty.
fn numeric_prefix(s: &str) -> Option<u64> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Everything from the first non-digit, non-dot character onward, if any.
fn non_numeric_tail(body: &str) -> Option<String> {
    let idx = body.find(|c: char| !c.is_ascii_digit() && c != '.')?;
    let tail = body[idx..].trim_start_matches(['-', '+', '.']);
    if tail.is_empty() { None } else { Some(tail.to_string()) }
}

pub fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace(['-', '_'], "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor_patch() {
        let v = VersionTriple::parse("2.26.1").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2, Some(26), Some(1)));
    }

    #[test]
    fn missing_components_are_absent_not_zero() {
        let v = VersionTriple::parse("4").unwrap();
        assert_eq!(v.minor, None);
        assert_eq!(v.patch, None);
    }

    #[test]
    fn detects_major_bump() {
        let old = VersionTriple::parse("3.2.0").unwrap();
        let new = VersionTriple::parse("4.0.0").unwrap();
        assert!(old.major_bump(&new));
    }

    #[test]
    fn detects_downgrade() {
        let old = VersionTriple::parse("2.0.0").unwrap();
        let new = VersionTriple::parse("1.9.0").unwrap();
        assert!(old.is_downgrade(&new));
    }

    #[test]
    fn pre_release_tag_captured() {
        let v = VersionTriple::parse("1.2.3-rc1").unwrap();
        assert_eq!(v.pre_release.as_deref(), Some("rc1"));
    }
}
