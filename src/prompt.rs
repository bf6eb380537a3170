//! Prompt templates with `$name` / `${name}` placeholders.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::LLMError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Prompt text with named placeholders.
///
/// `$name` and `${name}` are substituted, `$$` renders a literal `$`. Names start with
/// an ASCII letter or underscore and continue with letters, digits or underscores.
///
/// # Examples
///
/// ```
/// use llmeasy::prompt::PromptTemplate;
///
/// let template = PromptTemplate::parse("Price: $$$amount for ${item}s").unwrap();
/// let text = template.format([("amount", "100"), ("item", "apple")]).unwrap();
/// assert_eq!(text, "Price: $100 for apples");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses the template syntax.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::Validation`] for a dangling `$`, an unclosed `${`, or a
    /// placeholder whose name does not start with a letter or underscore.
    pub fn parse(source: impl Into<String>) -> Result<Self, LLMError> {
        let source = source.into();
        let segments = parse_segments(&source)?;
        Ok(Self { source, segments })
    }

    /// Original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitutes every placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::MissingVariable`] for the first placeholder without a value.
    pub fn format<I, K, V>(&self, variables: I) -> Result<String, LLMError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        let values: HashMap<String, String> = variables
            .into_iter()
            .map(|(k, v)| (k.into(), v.to_string()))
            .collect();
        self.format_map(&values)
    }

    /// Substitutes every placeholder from an existing map.
    pub fn format_map(&self, values: &HashMap<String, String>) -> Result<String, LLMError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| LLMError::MissingVariable { name: name.clone() })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for PromptTemplate {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_segments(source: &str) -> Result<Vec<Segment>, LLMError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '$' {
            literal.push(ch);
            continue;
        }
        match chars.peek().map(|(_, c)| *c) {
            Some('$') => {
                chars.next();
                literal.push('$');
            }
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(LLMError::validation(format!(
                        "unclosed placeholder at offset {idx} in prompt template"
                    )));
                }
                check_name(&name, idx)?;
                flush_literal(&mut segments, &mut literal);
                segments.push(Segment::Variable(name));
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some((_, c)) = chars.peek().copied() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                flush_literal(&mut segments, &mut literal);
                segments.push(Segment::Variable(name));
            }
            _ => {
                return Err(LLMError::validation(format!(
                    "invalid placeholder at offset {idx} in prompt template"
                )));
            }
        }
    }
    flush_literal(&mut segments, &mut literal);
    Ok(segments)
}

fn check_name(name: &str, offset: usize) -> Result<(), LLMError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LLMError::validation(format!(
            "invalid placeholder name {name:?} at offset {offset} in prompt template"
        )))
    }
}

fn flush_literal(segments: &mut Vec<Segment>, literal: &mut String) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, vars: &[(&str, &str)]) -> Result<String, LLMError> {
        PromptTemplate::parse(source)?.format(vars.iter().copied())
    }

    #[test]
    fn substitutes_both_placeholder_forms() {
        assert_eq!(render("Hello, $name!", &[("name", "World")]).unwrap(), "Hello, World!");
        assert_eq!(
            render("Hello ${name}, you are ${age} years old", &[("name", "Alice"), ("age", "30")])
                .unwrap(),
            "Hello Alice, you are 30 years old"
        );
        assert_eq!(
            render("$outer($inner)", &[("outer", "Hello"), ("inner", "World")]).unwrap(),
            "Hello(World)"
        );
    }

    #[test]
    fn dollar_escapes() {
        assert_eq!(render("Cost: $$50", &[]).unwrap(), "Cost: $50");
        assert_eq!(render("Price: $$$amount", &[("amount", "100")]).unwrap(), "Price: $100");
    }

    #[test]
    fn whitespace_and_multiline_are_preserved() {
        assert_eq!(
            render("$start    $middle     $end", &[("start", "Begin"), ("middle", "Mid"), ("end", "Finish")])
                .unwrap(),
            "Begin    Mid     Finish"
        );
        let text = render("\n  Title: $title\n  Year: $year\n", &[("title", "Test"), ("year", "2024")])
            .unwrap();
        assert!(text.contains("Title: Test"));
        assert!(text.contains("Year: 2024"));
    }

    #[test]
    fn non_string_values_use_display() {
        let template = PromptTemplate::parse("Number: $num, Boolean: $flag").unwrap();
        let text = template
            .format([("num", 42.to_string()), ("flag", true.to_string())])
            .unwrap();
        assert_eq!(text, "Number: 42, Boolean: true");
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = render("Hello ${name}, you are ${age} years old", &[("name", "Alice")])
            .unwrap_err();
        match err {
            LLMError::MissingVariable { name } => assert_eq!(name, "age"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_placeholders_are_rejected() {
        for source in ["${invalid", "$", "$123", "${1x}", "${}"] {
            assert!(
                matches!(PromptTemplate::parse(source), Err(LLMError::Validation { .. })),
                "{source:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_template_and_variable_listing() {
        assert_eq!(render("", &[]).unwrap(), "");
        let template: PromptTemplate = "$a ${b} $a".parse().unwrap();
        assert_eq!(template.variables(), vec!["a", "b"]);
        assert_eq!(template.source(), "$a ${b} $a");
    }
}
