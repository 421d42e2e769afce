//! Path rule parsing and matching.
//!
//! # Rule Syntax
//! - Literal segments match verbatim: `/api/users`
//! - `<name>` binds one segment to `name`
//! - `<converter:name>` constrains the binding:
//!   - `string` (default): any non-empty segment
//!   - `int`: ASCII digits only
//!   - `uuid`: a hyphenated or simple UUID
//!   - `path`: the rest of the path, slashes included (final segment only)
//!
//! # Design Decisions
//! - Segment-wise comparison, no regex
//! - Trailing slashes are significant: `/a/` and `/a` are different rules
//! - Segments are percent-decoded before comparison; a segment that does not
//!   decode to UTF-8 matches nothing

use std::borrow::Cow;
use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Path parameters bound by a successful match, keyed by placeholder name.
pub type PathParams = HashMap<String, String>;

/// Error raised for a malformed rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("rule must start with '/': {0}")]
    NotAbsolute(String),

    #[error("malformed placeholder '{segment}' in rule {rule}")]
    Malformed { rule: String, segment: String },

    #[error("unknown converter '{converter}' in rule {rule}")]
    UnknownConverter { rule: String, converter: String },

    #[error("placeholder '{name}' appears twice in rule {rule}")]
    DuplicateName { rule: String, name: String },

    #[error("'path' placeholder must be the last segment of rule {0}")]
    PathNotLast(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Converter {
    String,
    Int,
    Uuid,
    Path,
}

impl Converter {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "" | "string" | "default" => Some(Converter::String),
            "int" => Some(Converter::Int),
            "uuid" => Some(Converter::Uuid),
            "path" => Some(Converter::Path),
            _ => None,
        }
    }

    fn accepts(self, segment: &str) -> bool {
        match self {
            Converter::String => !segment.is_empty(),
            Converter::Int => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()),
            Converter::Uuid => uuid::Uuid::parse_str(segment).is_ok(),
            Converter::Path => !segment.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, converter: Converter },
}

/// A compiled path rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    rule: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a rule such as `/users/<int:id>/files/<path:rest>`.
    pub fn parse(rule: &str) -> Result<Self, PatternError> {
        let body = rule
            .strip_prefix('/')
            .ok_or_else(|| PatternError::NotAbsolute(rule.to_string()))?;

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();

        let parts: Vec<&str> = if body.is_empty() { Vec::new() } else { body.split('/').collect() };
        let last = parts.len().saturating_sub(1);

        for (index, part) in parts.iter().enumerate() {
            let Some(inner) = part.strip_prefix('<') else {
                if part.contains('<') || part.contains('>') {
                    return Err(malformed(rule, part));
                }
                segments.push(Segment::Literal(part.to_string()));
                continue;
            };

            let inner = inner.strip_suffix('>').ok_or_else(|| malformed(rule, part))?;
            let (converter, name) = match inner.split_once(':') {
                Some((converter, name)) => (converter.trim(), name.trim()),
                None => ("", inner.trim()),
            };

            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed(rule, part));
            }
            let converter = Converter::parse(converter).ok_or_else(|| PatternError::UnknownConverter {
                rule: rule.to_string(),
                converter: converter.to_string(),
            })?;
            if converter == Converter::Path && index != last {
                return Err(PatternError::PathNotLast(rule.to_string()));
            }
            if names.contains(&name) {
                return Err(PatternError::DuplicateName {
                    rule: rule.to_string(),
                    name: name.to_string(),
                });
            }
            names.push(name);

            segments.push(Segment::Param {
                name: name.to_string(),
                converter,
            });
        }

        Ok(Self {
            rule: rule.to_string(),
            segments,
        })
    }

    /// The rule this pattern was compiled from.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Match a request path, returning the bound parameters.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let body = path.strip_prefix('/')?;
        let mut remaining: Vec<&str> = if body.is_empty() { Vec::new() } else { body.split('/').collect() };
        remaining.reverse();

        let mut params = PathParams::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => {
                    if decode(remaining.pop()?)? != literal.as_str() {
                        return None;
                    }
                }
                Segment::Param { name, converter: Converter::Path } => {
                    remaining.reverse();
                    let rest = remaining.join("/");
                    remaining.clear();
                    let rest = decode(&rest)?;
                    if !Converter::Path.accepts(&rest) {
                        return None;
                    }
                    params.insert(name.clone(), rest.into_owned());
                }
                Segment::Param { name, converter } => {
                    let value = decode(remaining.pop()?)?;
                    if !converter.accepts(&value) {
                        return None;
                    }
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }

        remaining.is_empty().then_some(params)
    }
}

fn decode(raw: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(raw).decode_utf8().ok()
}

fn malformed(rule: &str, segment: &str) -> PatternError {
    PatternError::Malformed {
        rule: rule.to_string(),
        segment: segment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_rules_match_verbatim() {
        let pattern = PathPattern::parse("/api/health").unwrap();
        assert_eq!(pattern.matches("/api/health"), Some(PathParams::new()));
        assert_eq!(pattern.matches("/api/health/"), None);
        assert_eq!(pattern.matches("/api"), None);
        assert_eq!(pattern.matches("/api/health/extra"), None);
    }

    #[test]
    fn root_rule() {
        let pattern = PathPattern::parse("/").unwrap();
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/x").is_none());
    }

    #[test]
    fn placeholders_bind_segments() {
        let pattern = PathPattern::parse("/users/<name>/posts/<int:post_id>").unwrap();
        let params = pattern.matches("/users/ada/posts/42").unwrap();
        assert_eq!(params["name"], "ada");
        assert_eq!(params["post_id"], "42");

        assert!(pattern.matches("/users/ada/posts/latest").is_none());
        assert!(pattern.matches("/users//posts/1").is_none());
    }

    #[test]
    fn uuid_converter() {
        let pattern = PathPattern::parse("/orders/<uuid:id>").unwrap();
        assert!(pattern.matches("/orders/67e55044-10b1-426f-9247-bb680e5fe0c8").is_some());
        assert!(pattern.matches("/orders/not-a-uuid").is_none());
    }

    #[test]
    fn path_converter_takes_the_rest() {
        let pattern = PathPattern::parse("/static/<path:file>").unwrap();
        let params = pattern.matches("/static/css/site/main.css").unwrap();
        assert_eq!(params["file"], "css/site/main.css");
        assert!(pattern.matches("/static").is_none());
    }

    #[test]
    fn bound_values_are_percent_decoded() {
        let pattern = PathPattern::parse("/greet/<name>").unwrap();
        let params = pattern.matches("/greet/J%C3%BCrgen%20M").unwrap();
        assert_eq!(params["name"], "Jürgen M");

        let files = PathPattern::parse("/files/<path:rest>").unwrap();
        let params = files.matches("/files/a%20b/c.txt").unwrap();
        assert_eq!(params["rest"], "a b/c.txt");

        let literal = PathPattern::parse("/caf\u{e9}").unwrap();
        assert!(literal.matches("/caf%C3%A9").is_some());
    }

    #[test]
    fn undecodable_segments_match_nothing() {
        let pattern = PathPattern::parse("/greet/<name>").unwrap();
        assert!(pattern.matches("/greet/%FF%FE").is_none());
    }

    #[test]
    fn malformed_rules_are_rejected() {
        assert!(matches!(PathPattern::parse("users"), Err(PatternError::NotAbsolute(_))));
        assert!(matches!(PathPattern::parse("/a/<id"), Err(PatternError::Malformed { .. })));
        assert!(matches!(PathPattern::parse("/a/x<id>"), Err(PatternError::Malformed { .. })));
        assert!(matches!(
            PathPattern::parse("/a/<float:x>"),
            Err(PatternError::UnknownConverter { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/<id>/<id>"),
            Err(PatternError::DuplicateName { .. })
        ));
        assert!(matches!(
            PathPattern::parse("/a/<path:p>/b"),
            Err(PatternError::PathNotLast(_))
        ));
    }
}
