//! Strict parsing with a single best-effort repair pass.

use serde_json::Value;

/// How a candidate span turned into a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParseOutcome {
    /// The span was valid JSON as received.
    Strict(Value),
    /// The span parsed after [`repair`] rewrote it.
    Repaired(Value),
    /// The span could not be decoded; it is dropped.
    Rejected,
}

impl ParseOutcome {
    pub(crate) fn into_value(self) -> Option<Value> {
        match self {
            Self::Strict(value) | Self::Repaired(value) => Some(value),
            Self::Rejected => None,
        }
    }
}

/// Parses a span, retrying once on the repaired text when `repair_json` is set.
pub(crate) fn parse_span(text: &str, repair_json: bool) -> ParseOutcome {
    let original_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return ParseOutcome::Strict(value),
        Err(err) => err,
    };
    if !repair_json {
        tracing::debug!(error = %original_err, "dropping malformed JSON span");
        return ParseOutcome::Rejected;
    }

    let repaired = repair(text);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            tracing::debug!(original = text, repaired = %repaired, "JSON span repaired");
            ParseOutcome::Repaired(value)
        }
        Err(err) => {
            tracing::debug!(
                error = %original_err,
                repair_error = %err,
                "dropping JSON span that could not be repaired"
            );
            ParseOutcome::Rejected
        }
    }
}

/// Applies the textual fixes for common model slips, in order: quote bare object keys,
/// then drop commas that directly precede `}` or `]`.
///
/// Each fix is a single left-to-right pass that leaves string literals untouched.
///
/// # Examples
///
/// ```
/// use llmeasy::json::repair;
///
/// assert_eq!(repair("{key: 1, tail: [2,],}"), r#"{"key": 1, "tail": [2]}"#);
/// ```
pub fn repair(text: &str) -> String {
    strip_trailing_commas(&quote_unquoted_keys(text))
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

/// Wraps identifier-shaped keys in double quotes when they are followed by `:`.
fn quote_unquoted_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut in_string = false;
    let mut escape = false;
    let mut expect_key = false;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if expect_key && is_ident_start(ch) {
            let end = (i..chars.len())
                .find(|&j| !is_ident_continue(chars[j]))
                .unwrap_or(chars.len());
            let colon_follows = chars[end..]
                .iter()
                .find(|c| !c.is_whitespace())
                .is_some_and(|c| *c == ':');
            if colon_follows {
                out.push('"');
                out.extend(&chars[i..end]);
                out.push('"');
            } else {
                out.extend(&chars[i..end]);
            }
            expect_key = false;
            i = end;
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                expect_key = false;
            }
            '{' | ',' => expect_key = true,
            c if c.is_whitespace() => {}
            _ => expect_key = false,
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Removes a comma when only whitespace separates it from a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' => in_string = true,
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some('}' | ']')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_takes_the_strict_path() {
        assert_eq!(
            parse_span(r#"{"a": 1}"#, true),
            ParseOutcome::Strict(json!({"a": 1}))
        );
    }

    #[test]
    fn unquoted_keys_and_trailing_comma_are_repaired() {
        let outcome = parse_span(r#"{key: "value", trailing: true,}"#, true);
        assert_eq!(
            outcome,
            ParseOutcome::Repaired(json!({"key": "value", "trailing": true}))
        );
    }

    #[test]
    fn repair_disabled_rejects_malformed_span() {
        assert_eq!(
            parse_span(r#"{key: "value"}"#, false),
            ParseOutcome::Rejected
        );
    }

    #[test]
    fn unrepairable_span_is_rejected() {
        assert_eq!(
            parse_span(r#"{"invalid": missing_quotes}"#, true),
            ParseOutcome::Rejected
        );
    }

    #[test]
    fn string_contents_are_left_alone() {
        let text = r#"{"note": "keep {a: 1,} as is", b: [1, 2, ],}"#;
        assert_eq!(
            repair(text),
            r#"{"note": "keep {a: 1,} as is", "b": [1, 2 ]}"#
        );
    }

    #[test]
    fn nested_keys_are_quoted() {
        let repaired = repair("{outer: {inner_1: 1, $ref: null}}");
        assert_eq!(repaired, r#"{"outer": {"inner_1": 1, "$ref": null}}"#);
        let value: Value = serde_json::from_str(&repaired).expect("valid after repair");
        assert_eq!(value, json!({"outer": {"inner_1": 1, "$ref": null}}));
    }

    #[test]
    fn bare_values_are_not_treated_as_keys() {
        assert_eq!(repair("[true, null, x]"), "[true, null, x]");
        assert_eq!(repair("{\"a\": true}"), "{\"a\": true}");
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let text = r#"{"q": "say \"hi,\"", k: 1,}"#;
        assert_eq!(repair(text), r#"{"q": "say \"hi,\"", "k": 1}"#);
    }
}
