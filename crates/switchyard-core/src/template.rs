//! Route path templates.
//!
//! A template is a `/`-separated path in which whole segments may be
//! `{name}` placeholders. Templates are parsed once at contract load and
//! rendered per request by the gateway.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

/// A problem with a path template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Template does not start with `/`.
    #[error("path template must start with '/': {0}")]
    MissingLeadingSlash(String),

    /// A segment contains braces but is not exactly `{name}`.
    #[error("malformed placeholder segment '{0}'")]
    MalformedPlaceholder(String),

    /// The same placeholder name appears twice.
    #[error("placeholder '{{{0}}}' appears more than once")]
    DuplicatePlaceholder(String),

    /// No value was supplied for a placeholder while rendering.
    #[error("no value for placeholder '{{{0}}}'")]
    Unbound(String),
}

/// One segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    /// Literal text.
    Literal(String),
    /// Placeholder name.
    Param(String),
}

/// A parsed route path template such as `/recipes/{id}`.
///
/// # Example
///
/// ```
/// use switchyard_core::PathTemplate;
///
/// let template = PathTemplate::parse("/recipes/{id}").unwrap();
/// assert_eq!(template.params().collect::<Vec<_>>(), vec!["id"]);
///
/// let rendered = template
///     .render(|name| (name == "id").then_some("123"))
///     .unwrap();
/// assert_eq!(rendered, "/recipes/123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<TemplateSegment>,
    trailing_slash: bool,
}

impl PathTemplate {
    /// Parses and validates a template.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !raw.starts_with('/') {
            return Err(TemplateError::MissingLeadingSlash(raw.to_string()));
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if !segment.contains(['{', '}']) {
                segments.push(TemplateSegment::Literal(segment.to_string()));
                continue;
            }

            let name = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .filter(|name| is_placeholder_name(name))
                .ok_or_else(|| TemplateError::MalformedPlaceholder(segment.to_string()))?;

            if !seen.insert(name) {
                return Err(TemplateError::DuplicatePlaceholder(name.to_string()));
            }
            segments.push(TemplateSegment::Param(name.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            trailing_slash: raw.len() > 1 && raw.ends_with('/'),
            segments,
        })
    }

    /// The template exactly as written in the contract.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[TemplateSegment] {
        &self.segments
    }

    /// Placeholder names, left to right.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Param(name) => Some(name.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }

    /// Number of placeholders.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params().count()
    }

    /// Canonical form used for duplicate detection: empty segments and the
    /// trailing slash are dropped, matching how requests are routed.
    #[must_use]
    pub fn normalized(&self) -> String {
        let mut out = self
            .render_with(|name| Ok(format!("{{{name}}}")))
            .unwrap_or_else(|_: TemplateError| self.raw.clone());
        if out.len() > 1 && out.ends_with('/') {
            out.pop();
        }
        out
    }

    /// Substitutes every placeholder with the value returned by `lookup`.
    ///
    /// Literal segments are copied unchanged. A placeholder without a value
    /// is an error.
    pub fn render<'a, F>(&self, lookup: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.render_with(|name| {
            lookup(name)
                .map(ToString::to_string)
                .ok_or_else(|| TemplateError::Unbound(name.to_string()))
        })
    }

    fn render_with<F>(&self, value_for: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Result<String, TemplateError>,
    {
        if self.segments.is_empty() {
            return Ok("/".to_string());
        }

        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            out.push('/');
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Param(name) => out.push_str(&value_for(name)?),
            }
        }
        if self.trailing_slash {
            out.push('/');
        }
        Ok(out)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_literal_and_params() {
        let template = PathTemplate::parse("/orgs/{org}/recipes/{id}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                TemplateSegment::Literal("orgs".into()),
                TemplateSegment::Param("org".into()),
                TemplateSegment::Literal("recipes".into()),
                TemplateSegment::Param("id".into()),
            ]
        );
        assert_eq!(template.param_count(), 2);
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert_eq!(
            PathTemplate::parse("recipes"),
            Err(TemplateError::MissingLeadingSlash("recipes".into()))
        );
        assert!(matches!(
            PathTemplate::parse("/recipes/id-{id}"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
        assert!(matches!(
            PathTemplate::parse("/recipes/{}"),
            Err(TemplateError::MalformedPlaceholder(_))
        ));
        assert_eq!(
            PathTemplate::parse("/a/{id}/b/{id}"),
            Err(TemplateError::DuplicatePlaceholder("id".into()))
        );
    }

    #[test]
    fn test_render_unbound_placeholder() {
        let template = PathTemplate::parse("/recipes/{id}").unwrap();
        assert_eq!(
            template.render(|_| None),
            Err(TemplateError::Unbound("id".into()))
        );
    }

    #[test]
    fn test_render_root_and_trailing_slash() {
        let root = PathTemplate::parse("/").unwrap();
        assert_eq!(root.render(|_| None).unwrap(), "/");

        let trailing = PathTemplate::parse("/recipes/").unwrap();
        assert_eq!(trailing.render(|_| None).unwrap(), "/recipes/");
        assert_eq!(trailing.normalized(), "/recipes");
    }

    #[test]
    fn test_normalized_collapses_empty_segments() {
        let template = PathTemplate::parse("//recipes//{id}").unwrap();
        assert_eq!(template.normalized(), "/recipes/{id}");
    }

    proptest! {
        #[test]
        fn prop_render_only_replaces_placeholders(id in "[A-Za-z0-9_-]{1,24}") {
            let template = PathTemplate::parse("/recipes/{id}/steps").unwrap();
            let rendered = template.render(|_| Some(id.as_str())).unwrap();
            prop_assert_eq!(rendered, format!("/recipes/{id}/steps"));
        }
    }
}
