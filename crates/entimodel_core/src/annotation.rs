//! Annotation tag language.
//!
//! Schemas attach annotations to entities and fields as compact tag strings:
//!
//! ```text
//! id(assignable), name="text_col", index=hash
//! relation(name=tags, to=Tag) relation(name=owners, to=Person, uid=1234)
//! ```
//!
//! Items are separated by `,` or whitespace. An item is a bare name, a
//! `name=value` (or `name:value`) pair, or a `name(...)` group holding a nested
//! list of details. Quoted values may contain separators. Only `relation`,
//! `sync` and `id` accept groups, each with its own set of details.
//!
//! Repeated `relation(...)` groups are stored under synthesized keys
//! `relation-<N>-<name>` so iteration order equals declaration order.

use crate::error::{ModelError, ModelResult};
use std::collections::BTreeMap;
use std::fmt;

/// Prefix of the keys under which standalone relation groups are stored.
pub const RELATION_KEY_PREFIX: &str = "relation-";

/// Details accepted inside `relation(...)`.
const RELATION_DETAILS: &[&str] = &["to", "name", "uid"];
/// Details accepted inside `sync(...)`.
const SYNC_DETAILS: &[&str] = &["sharedglobalids"];
/// Details accepted inside `id(...)`.
const ID_DETAILS: &[&str] = &["assignable"];

/// Details that are flags and must not carry a value.
const BOOLEAN_DETAILS: &[&str] = &["sharedglobalids", "assignable"];

/// A single parsed annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// A bare name, e.g. `index`.
    Flag,
    /// A name with a value, e.g. `index=hash`. The value may be empty.
    Value(String),
    /// A name with nested details, e.g. `relation(name=tags,to=Tag)`.
    Group {
        /// The annotation name (`relation`, `sync` or `id`).
        name: String,
        /// The parsed details.
        details: Annotations,
    },
}

impl Annotation {
    /// Returns the value, or `""` for flags and groups.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Value(value) => value,
            Self::Flag | Self::Group { .. } => "",
        }
    }

    /// Returns the nested details of a group.
    #[must_use]
    pub fn details(&self) -> Option<&Annotations> {
        match self {
            Self::Group { details, .. } => Some(details),
            _ => None,
        }
    }

    /// Returns the value of a detail, if the group has it.
    #[must_use]
    pub fn detail(&self, name: &str) -> Option<&str> {
        self.details()
            .and_then(|d| d.get(name))
            .map(Annotation::value)
    }

    /// Returns true when there is no value.
    #[must_use]
    pub fn has_empty_value(&self) -> bool {
        self.value().is_empty()
    }
}

/// Annotations of a single entity or field, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    entries: BTreeMap<String, Annotation>,
}

impl Annotations {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a tag string, accepting only names in `allowed`.
    pub fn parse(text: &str, allowed: &[&str]) -> ModelResult<Self> {
        let mut annotations = Self::new();
        annotations.parse_into(text, allowed)?;
        Ok(annotations)
    }

    /// Parses a tag string into this set.
    ///
    /// Front-ends that read annotations from several comment lines call this
    /// once per line; names must stay unique across all of them.
    pub fn parse_into(&mut self, text: &str, allowed: &[&str]) -> ModelResult<()> {
        Tokenizer::new(text).parse(self, allowed)
    }

    /// Returns the annotation stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Annotation> {
        self.entries.get(key)
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all annotations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over standalone relation groups in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.iter()
            .filter(|(key, _)| key.starts_with(RELATION_KEY_PREFIX))
    }

    fn relation_count(&self) -> usize {
        self.relations().count()
    }

    fn insert(&mut self, key: String, annotation: Annotation, allowed: &[&str]) -> ModelResult<()> {
        let name = match &annotation {
            Annotation::Group { name, .. } => name.as_str(),
            _ => key.as_str(),
        };
        if self.entries.contains_key(&key) {
            return Err(ModelError::DuplicateAnnotation { name: key });
        }
        if !allowed.contains(&name) {
            return Err(ModelError::UnknownAnnotation {
                name: name.to_string(),
            });
        }
        self.entries.insert(key, annotation);
        Ok(())
    }
}

impl fmt::Display for Annotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, annotation)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match annotation {
                Annotation::Flag => f.write_str(key)?,
                Annotation::Value(value) => {
                    if needs_quotes(value) {
                        write!(f, "{key}=\"{value}\"")?;
                    } else {
                        write!(f, "{key}={value}")?;
                    }
                }
                Annotation::Group { name, details } => write!(f, "{name}({details})")?,
            }
        }
        Ok(())
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty() || value.chars().any(|c| is_separator(c) || "=:()".contains(c))
}

fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

fn ends_name(c: char) -> bool {
    is_separator(c) || matches!(c, '=' | ':' | '(' | ')' | '"')
}

/// Single pass tokenizer over an annotation string.
struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        self.skip_while(pred);
        &self.text[start..self.pos]
    }

    fn error(&self, message: impl Into<String>) -> ModelError {
        ModelError::malformed_annotation(message, self.pos, self.text)
    }

    /// Moves an error from parsing group details at `offset` onto the whole text.
    fn relocate(&self, err: ModelError, offset: usize) -> ModelError {
        match err {
            ModelError::MalformedAnnotation {
                message, position, ..
            } => ModelError::malformed_annotation(message, offset + position, self.text),
            other => other,
        }
    }

    fn parse(mut self, out: &mut Annotations, allowed: &[&str]) -> ModelResult<()> {
        loop {
            self.skip_while(is_separator);
            let Some(first) = self.peek() else {
                return Ok(());
            };

            let name = self.take_while(|c| !ends_name(c)).trim().to_lowercase();
            if name.is_empty() {
                return Err(self.error(format!("name expected before '{first}'")));
            }

            // whitespace between a name and its value doesn't separate items
            let after_name = self.pos;
            self.skip_while(char::is_whitespace);
            match self.peek() {
                Some('=' | ':') => {
                    self.bump();
                    self.skip_while(char::is_whitespace);
                    let value = self.take_value()?;
                    out.insert(name, Annotation::Value(value), allowed)?;
                }
                Some('(') => {
                    let Some(details) = group_details(&name) else {
                        return Err(self.error(format!(
                            "details only supported for `relation`, `sync` and `id` annotations, found `{name}`"
                        )));
                    };
                    self.bump();
                    let start = self.pos;
                    let inner = self.take_group()?;
                    let (key, group) = group_annotation(&name, details, inner, out)
                        .map_err(|err| self.relocate(err, start))?;
                    out.insert(key, group, allowed)?;
                }
                _ => {
                    self.pos = after_name;
                    out.insert(name, Annotation::Flag, allowed)?;
                }
            }

            match self.peek() {
                None => return Ok(()),
                Some(c) if is_separator(c) => {}
                Some(c) => return Err(self.error(format!("unexpected character '{c}'"))),
            }
        }
    }

    fn take_value(&mut self) -> ModelResult<String> {
        if self.peek() != Some('"') {
            return Ok(self.take_while(|c| !is_separator(c)).to_string());
        }
        self.bump();
        let value = self.take_while(|c| c != '"').to_string();
        if self.bump() != Some('"') {
            return Err(self.error("closing quote '\"' not found"));
        }
        match self.peek() {
            Some(c) if !is_separator(c) => Err(self.error(
                "no more characters may follow after a quoted value",
            )),
            _ => Ok(value),
        }
    }

    /// Returns the text up to the matching `)` and moves past it.
    fn take_group(&mut self) -> ModelResult<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quoted = false;
        while let Some(c) = self.bump() {
            match c {
                '"' => quoted = !quoted,
                '(' if !quoted => depth += 1,
                ')' if !quoted && depth == 0 => {
                    return Ok(&self.text[start..self.pos - 1]);
                }
                ')' if !quoted => depth -= 1,
                _ => {}
            }
        }
        self.pos = start;
        Err(self.error("closing bracket ')' not found"))
    }
}

/// Details accepted by each annotation that takes a group.
fn group_details(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "relation" => Some(RELATION_DETAILS),
        "sync" => Some(SYNC_DETAILS),
        "id" => Some(ID_DETAILS),
        _ => None,
    }
}

/// Builds the key and value of a `name(...)` group.
fn group_annotation(
    name: &str,
    allowed: &[&str],
    inner: &str,
    existing: &Annotations,
) -> ModelResult<(String, Annotation)> {
    let details = Annotations::parse(inner, allowed)?;
    for (detail, value) in details.iter() {
        if BOOLEAN_DETAILS.contains(&detail) && !value.has_empty_value() {
            return Err(ModelError::InvalidBooleanDetail {
                name: detail.to_string(),
                value: value.value().to_string(),
            });
        }
    }

    let key = if name == "relation" {
        let rel_name = details.get("name").map(Annotation::value).unwrap_or("");
        if rel_name.is_empty() {
            return Err(ModelError::missing_detail("relation", "name"));
        }
        format!(
            "{RELATION_KEY_PREFIX}{:010}-{rel_name}",
            existing.relation_count()
        )
    } else {
        name.to_string()
    };

    Ok((
        key,
        Annotation::Group {
            name: name.to_string(),
            details,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[&str] = &["a", "c", "f", "id", "index", "name", "relation", "sync", "uid", "-"];

    #[test]
    fn parses_flags_values_and_groups() {
        let a = Annotations::parse("index, name=\"my name\",relation(name=tags,to=Tag)", ALL).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a.get("index"), Some(&Annotation::Flag));
        assert_eq!(a.get("name").unwrap().value(), "my name");

        let (key, rel) = a.relations().next().unwrap();
        assert_eq!(key, "relation-0000000000-tags");
        assert_eq!(rel.detail("to"), Some("Tag"));
        assert_eq!(rel.detail("name"), Some("tags"));
    }

    #[test]
    fn colon_and_spaces_separate_like_commas() {
        let a = Annotations::parse("name:Foo index  uid = 42", ALL).unwrap();
        assert_eq!(a.get("name").unwrap().value(), "Foo");
        assert_eq!(a.get("uid").unwrap().value(), "42");
        assert!(a.contains("index"));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn names_are_lowercased() {
        let a = Annotations::parse("Index,NAME=Value", ALL).unwrap();
        assert!(a.contains("index"));
        // values keep their case
        assert_eq!(a.get("name").unwrap().value(), "Value");
    }

    #[test]
    fn duplicate_is_rejected() {
        let err = Annotations::parse("index,index", ALL).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAnnotation { ref name } if name == "index"));
    }

    #[test]
    fn duplicate_across_lines_is_rejected() {
        let mut a = Annotations::new();
        a.parse_into("uid=1", ALL).unwrap();
        let err = a.parse_into("uid=2", ALL).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateAnnotation { .. }));
    }

    #[test]
    fn unknown_is_rejected() {
        let err = Annotations::parse("index,lazy", ALL).unwrap_err();
        assert!(matches!(err, ModelError::UnknownAnnotation { ref name } if name == "lazy"));
    }

    #[test]
    fn repeated_relations_keep_declaration_order() {
        let a = Annotations::parse(
            "relation(name=zeta,to=A),relation(name=alpha,to=B),relation(name=mid,to=C)",
            ALL,
        )
        .unwrap();
        let names: Vec<_> = a.relations().map(|(_, r)| r.detail("name").unwrap()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn relation_requires_name() {
        let err = Annotations::parse("relation(to=A)", ALL).unwrap_err();
        assert!(matches!(err, ModelError::MissingDetail { .. }));
    }

    #[test]
    fn unknown_relation_detail_is_rejected() {
        let err = Annotations::parse("relation(name=a,to=A,lazy)", ALL).unwrap_err();
        assert!(matches!(err, ModelError::UnknownAnnotation { .. }));
    }

    #[test]
    fn group_on_other_annotation_is_rejected() {
        let err = Annotations::parse("index(hash)", ALL).unwrap_err();
        assert!(matches!(err, ModelError::MalformedAnnotation { .. }));
    }

    #[test]
    fn boolean_details() {
        let a = Annotations::parse("sync(sharedGlobalIds)", ALL).unwrap();
        let sync = a.get("sync").unwrap();
        assert!(sync.details().unwrap().contains("sharedglobalids"));

        let a = Annotations::parse("id(assignable)", ALL).unwrap();
        assert!(a.get("id").unwrap().details().unwrap().contains("assignable"));

        let err = Annotations::parse("id(assignable=yes)", ALL).unwrap_err();
        assert!(matches!(err, ModelError::InvalidBooleanDetail { .. }));
    }

    #[test]
    fn quoted_value_may_contain_separators() {
        let a = Annotations::parse("name=\"a, b (c)\",index", ALL).unwrap();
        assert_eq!(a.get("name").unwrap().value(), "a, b (c)");
        assert!(a.contains("index"));
    }

    #[test]
    fn nothing_may_follow_a_quoted_value() {
        let err = Annotations::parse("name=\"abc\"def", ALL).unwrap_err();
        match err {
            ModelError::MalformedAnnotation { position, .. } => assert_eq!(position, 10),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn details_on_plain_annotation_point_at_group() {
        let text = "name=x, index(type=hash)";
        match Annotations::parse(text, ALL).unwrap_err() {
            ModelError::MalformedAnnotation {
                message,
                position,
                text: reported,
            } => {
                assert!(message.contains("found `index`"));
                assert_eq!(position, 13);
                assert_eq!(&text[position..position + 1], "(");
                assert_eq!(reported, text);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn errors_inside_details_point_into_whole_text() {
        let text = "relation(name=\"a\"b,to=T)";
        match Annotations::parse(text, ALL).unwrap_err() {
            ModelError::MalformedAnnotation {
                position,
                text: reported,
                ..
            } => {
                assert_eq!(reported, text);
                assert_eq!(&text[position..position + 1], "b");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unterminated_quote_and_bracket() {
        assert!(matches!(
            Annotations::parse("name=\"abc", ALL).unwrap_err(),
            ModelError::MalformedAnnotation { .. }
        ));
        assert!(matches!(
            Annotations::parse("relation(name=a,to=B", ALL).unwrap_err(),
            ModelError::MalformedAnnotation { .. }
        ));
    }

    #[test]
    fn value_without_name_is_rejected() {
        let err = Annotations::parse("=abc", ALL).unwrap_err();
        assert!(err.to_string().contains("name expected"));
    }

    #[test]
    fn empty_input_yields_empty_set() {
        assert!(Annotations::parse("", ALL).unwrap().is_empty());
        assert!(Annotations::parse(" , ,", ALL).unwrap().is_empty());
    }

    #[test]
    fn dash_is_a_name() {
        let a = Annotations::parse("-", ALL).unwrap();
        assert!(a.contains("-"));
    }

    #[test]
    fn display_reparses_to_the_same_set() {
        let a = Annotations::parse("a=b,relation(name=e,to=T),f", ALL).unwrap();
        assert_eq!(a.len(), 3);
        let text = a.to_string();
        let b = Annotations::parse(&text, ALL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_quotes_values_when_needed() {
        let a = Annotations::parse("name=\"x y\"", ALL).unwrap();
        assert_eq!(a.to_string(), "name=\"x y\"");
    }
}
