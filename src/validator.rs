//! Pass/fail judgement of a received reply.

use std::fmt;

use crate::frame::ACK_PREFIX;

/// What a test case asserts about the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Canonical reply equals the text, case-sensitive.
    Exact(String),
    /// Canonical reply contains the text.
    Contains(String),
    /// Canonical reply has at least this many characters.
    MinLength(usize),
    /// No assertion; any non-empty reply passes.
    Any,
    /// The case's criteria could not be interpreted; always fails.
    Invalid(String),
}

impl Expectation {
    /// Builds an expectation from the config's `expect_type` and `criteria`.
    pub fn from_parts(expect_type: Option<&str>, criteria: Option<&str>) -> Self {
        let criteria = criteria.unwrap_or_default();
        match expect_type {
            Some("exact") => Expectation::Exact(criteria.to_string()),
            Some("contains") => Expectation::Contains(criteria.to_string()),
            Some("length") => match criteria.trim().parse() {
                Ok(n) => Expectation::MinLength(n),
                Err(_) => Expectation::Invalid(format!("length criteria {criteria:?}")),
            },
            _ => Expectation::Any,
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Exact(s) => write!(f, "== {s:?}"),
            Expectation::Contains(s) => write!(f, "contains {s:?}"),
            Expectation::MinLength(n) => write!(f, "length >= {n}"),
            Expectation::Any => f.write_str("any reply"),
            Expectation::Invalid(why) => write!(f, "invalid ({why})"),
        }
    }
}

/// Outcome of validating one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Nothing (or only whitespace) arrived before the timeout.
    NoResponse,
    Mismatch { expected: String, actual: String },
    /// The case itself could not be sent (e.g. a bad hex byte).
    InvalidCase(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Strips a leading `ACK: ` and surrounding whitespace.
///
/// Replies without the prefix (unsolicited traffic) are kept as-is.
pub fn canonicalize(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    trimmed.strip_prefix(ACK_PREFIX).unwrap_or(trimmed).trim()
}

/// Judges `response` against `expectation`.
pub fn validate(response: Option<&str>, expectation: &Expectation) -> Verdict {
    let raw = match response {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Verdict::NoResponse,
    };
    let reply = canonicalize(raw);
    let ok = match expectation {
        Expectation::Exact(want) => reply == want,
        Expectation::Contains(want) => reply.contains(want.as_str()),
        Expectation::MinLength(n) => reply.chars().count() >= *n,
        Expectation::Any => true,
        Expectation::Invalid(_) => false,
    };
    if ok {
        Verdict::Pass
    } else {
        Verdict::Mismatch {
            expected: expectation.to_string(),
            actual: reply.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(kind: &str, criteria: &str) -> Expectation {
        Expectation::from_parts(Some(kind), Some(criteria))
    }

    #[test]
    fn exact_match() {
        assert_eq!(validate(Some("ACK: v1.0.5"), &exp("exact", "v1.0.5")), Verdict::Pass);
        assert!(!validate(Some("ACK: V1.0.5"), &exp("exact", "v1.0.5")).passed());
    }

    #[test]
    fn length_match() {
        let e = exp("length", "17");
        assert_eq!(e, Expectation::MinLength(17));
        assert!(validate(Some("ACK: 00:11:22:33:44:55"), &e).passed());
        assert!(!validate(Some("ACK: 00:11:22"), &e).passed());
    }

    #[test]
    fn contains_match() {
        assert!(validate(Some("ACK: OK (Vol:9)"), &exp("contains", "Vol:9")).passed());
        assert!(!validate(Some("ACK: OK (Vol:8)"), &exp("contains", "Vol:9")).passed());
    }

    #[test]
    fn empty_response_always_fails() {
        for e in [exp("exact", ""), Expectation::Any, exp("length", "0")] {
            assert_eq!(validate(Some(""), &e), Verdict::NoResponse);
            assert_eq!(validate(Some(" \r"), &e), Verdict::NoResponse);
            assert_eq!(validate(None, &e), Verdict::NoResponse);
        }
    }

    #[test]
    fn unknown_type_passes_anything() {
        let e = Expectation::from_parts(Some("regex"), Some("x"));
        assert_eq!(e, Expectation::Any);
        assert!(validate(Some("garbage"), &e).passed());
        assert!(validate(Some("x"), &Expectation::from_parts(None, None)).passed());
    }

    #[test]
    fn missing_prefix_used_as_is() {
        assert_eq!(canonicalize("  BTN:Play \r"), "BTN:Play");
        assert_eq!(canonicalize("ACK: OK\r"), "OK");
        assert!(validate(Some("OK\r"), &exp("exact", "OK")).passed());
    }

    #[test]
    fn only_leading_prefix_is_stripped() {
        assert_eq!(canonicalize("ACK: ACK: x"), "ACK: x");
        assert_eq!(canonicalize("say ACK: x"), "say ACK: x");
    }

    #[test]
    fn unparsable_length_fails() {
        let e = exp("length", "long");
        assert!(matches!(e, Expectation::Invalid(_)));
        assert!(!validate(Some("ACK: anything"), &e).passed());
    }

    #[test]
    fn mismatch_reports_both_sides() {
        let verdict = validate(Some("ACK: Test Mode OFF"), &exp("exact", "Test Mode ON"));
        assert_eq!(
            verdict,
            Verdict::Mismatch {
                expected: "== \"Test Mode ON\"".into(),
                actual: "Test Mode OFF".into(),
            }
        );
    }
}
