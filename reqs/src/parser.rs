//! C2: parse manifest text into a normalized `name -> constraint` map.
//!
//! Total function: malformed lines are silently dropped, never an error.

use std::collections::BTreeMap;

use crate::constraint::Constraint;

/// Operators in priority order: first match wins. `~=` must be checked
/// before the single-character operators so `~=1.0` isn't mis-split.
const OPERATORS: &[(&str, fn(String) -> Constraint)] = &[
    ("==", Constraint::Exact as fn(String) -> Constraint),
    (">=", Constraint::AtLeast as fn(String) -> Constraint),
    ("<=", Constraint::AtMost as fn(String) -> Constraint),
    ("~=", Constraint::Compatible as fn(String) -> Constraint),
    (">", Constraint::GreaterThan as fn(String) -> Constraint),
    ("<", Constraint::LessThan as fn(String) -> Constraint),
];

pub fn parse_requirements(text: &str) -> BTreeMap<String, Constraint> {
    let mut out = BTreeMap::new();
    for raw_line in text.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, constraint)) = parse_line(line) {
            out.insert(name, constraint);
        }
    }
    out
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_line(line: &str) -> Option<(String, Constraint)> {
    for (op, build) in OPERATORS {
        if let Some(idx) = line.find(op) {
            let name = line[..idx].trim();
            let version = line[idx + op.len()..].trim();
            if name.is_empty() {
                return None;
            }
            return Some((name.to_string(), build(version.to_string())));
        }
    }

    let name = line.trim();
    if name.is_empty() {
        return None;
    }
    // `name[extra1,extra2]` keeps the bracketed portion verbatim as part
    // of the key; constraint is Any either way.
    Some((name.to_string(), Constraint::Any))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_pin() {
        let m = parse_requirements("requests==2.26.0\n");
        assert_eq!(m.get("requests"), Some(&Constraint::Exact("2.26.0".into())));
    }

    #[test]
    fn strips_inline_comments() {
        let m = parse_requirements("flask==2.0.0  # web framework\n");
        assert_eq!(m.get("flask"), Some(&Constraint::Exact("2.0.0".into())));
    }

    #[test]
    fn bare_name_is_any() {
        let m = parse_requirements("numpy\n");
        assert_eq!(m.get("numpy"), Some(&Constraint::Any));
    }

    #[test]
    fn extras_bracket_kept_verbatim_in_key() {
        let m = parse_requirements("uvicorn[standard]\n");
        assert_eq!(m.get("uvicorn[standard]"), Some(&Constraint::Any));
    }

    #[test]
    fn duplicates_resolve_last_wins() {
        let m = parse_requirements("pkg==1.0.0\npkg==2.0.0\n");
        assert_eq!(m.get("pkg"), Some(&Constraint::Exact("2.0.0".into())));
    }

    #[test]
    fn unparseable_lines_are_dropped_not_errors() {
        let m = parse_requirements("==\n-e git+https://example.com/pkg.git\n");
        assert!(!m.contains_key(""));
    }

    #[test]
    fn whitespace_around_name_and_version_trimmed() {
        let m = parse_requirements("  django ==  4.0.0 \n");
        assert_eq!(m.get("django"), Some(&Constraint::Exact("4.0.0".into())));
    }

    #[test]
    fn render_then_parse_round_trips_every_operator() {
        let constraints = [
            Constraint::Any,
            Constraint::Exact("1.2.3".into()),
            Constraint::AtLeast("1.2.3".into()),
            Constraint::GreaterThan("1.2.3".into()),
            Constraint::AtMost("1.2.3".into()),
            Constraint::LessThan("1.2.3".into()),
            Constraint::Compatible("1.2.3".into()),
        ];
        for constraint in constraints {
            let line = format!("pkg{constraint}");
            let m = parse_requirements(&line);
            assert_eq!(m.get("pkg"), Some(&constraint));
        }
    }
}
