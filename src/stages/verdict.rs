// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Verdict parsing for validator output.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Feedback used when the validator's output carries no recognizable verdict.
pub const UNPARSEABLE_VERDICT_FEEDBACK: &str =
    "Validator output did not contain a VALID, PARTIAL or INVALID verdict; treating the answer as invalid.";

/// `invalid` is listed first so it wins over the `valid` it contains.
static VERDICT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)invalid|partial|valid").expect("verdict pattern is valid"));

/// The validator's judgment of a candidate answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Valid,
    Partial,
    Invalid,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Partial => "PARTIAL",
            Self::Invalid => "INVALID",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed verdict with its feedback. Feedback is present unless the verdict is VALID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVerdict {
    pub verdict: Verdict,
    pub feedback: Option<String>,
}

/// Parse validator output.
///
/// The first case-insensitive occurrence of `VALID`, `PARTIAL` or `INVALID`
/// decides the verdict. Output without any token fails closed to INVALID
/// with [`UNPARSEABLE_VERDICT_FEEDBACK`].
pub fn parse_verdict(output: &str) -> ParsedVerdict {
    let Some(token) = VERDICT_TOKEN.find(output) else {
        return ParsedVerdict {
            verdict: Verdict::Invalid,
            feedback: Some(UNPARSEABLE_VERDICT_FEEDBACK.to_string()),
        };
    };

    let verdict = match token.as_str().to_ascii_lowercase().as_str() {
        "invalid" => Verdict::Invalid,
        "partial" => Verdict::Partial,
        _ => Verdict::Valid,
    };

    if verdict.is_valid() {
        return ParsedVerdict {
            verdict,
            feedback: None,
        };
    }

    ParsedVerdict {
        verdict,
        feedback: Some(extract_feedback(output, token.end())),
    }
}

/// Text after the verdict token, or the whole output if nothing follows it.
fn extract_feedback(output: &str, token_end: usize) -> String {
    let rest = output[token_end..]
        .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace())
        .trim_end();
    if rest.is_empty() {
        output.trim().to_string()
    } else {
        rest.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_any_case() {
        for output in ["VALID", "valid", "  Valid.\n", "The answer is VALID overall"] {
            let parsed = parse_verdict(output);
            assert_eq!(parsed.verdict, Verdict::Valid, "output: {output:?}");
            assert!(parsed.feedback.is_none());
        }
    }

    #[test]
    fn test_invalid_is_not_read_as_valid() {
        let parsed = parse_verdict("INVALID: the entry point is src/main.rs, not lib.rs");
        assert_eq!(parsed.verdict, Verdict::Invalid);
        assert_eq!(
            parsed.feedback.as_deref(),
            Some("the entry point is src/main.rs, not lib.rs")
        );
    }

    #[test]
    fn test_partial_with_dash_separator() {
        let parsed = parse_verdict("Partial - missing the config layer");
        assert_eq!(parsed.verdict, Verdict::Partial);
        assert_eq!(parsed.feedback.as_deref(), Some("missing the config layer"));
    }

    #[test]
    fn test_bare_token_feedback_is_whole_output() {
        let parsed = parse_verdict("  INVALID  ");
        assert_eq!(parsed.verdict, Verdict::Invalid);
        assert_eq!(parsed.feedback.as_deref(), Some("INVALID"));
    }

    #[test]
    fn test_first_token_wins() {
        let parsed = parse_verdict("PARTIAL: the VALID parts are fine but tests are missing");
        assert_eq!(parsed.verdict, Verdict::Partial);

        // Substring matching: "validation" counts as VALID.
        let parsed = parse_verdict("My validation found problems. INVALID: wrong file");
        assert_eq!(parsed.verdict, Verdict::Valid);
    }

    #[test]
    fn test_unparseable_fails_closed() {
        let parsed = parse_verdict("I could not decide.");
        assert_eq!(parsed.verdict, Verdict::Invalid);
        assert_eq!(
            parsed.feedback.as_deref(),
            Some(UNPARSEABLE_VERDICT_FEEDBACK)
        );

        let parsed = parse_verdict("");
        assert_eq!(parsed.verdict, Verdict::Invalid);
    }

    #[test]
    fn test_verdict_display_and_serde() {
        assert_eq!(Verdict::Partial.to_string(), "PARTIAL");
        assert_eq!(serde_json::to_string(&Verdict::Invalid).unwrap(), "\"INVALID\"");
    }
}
