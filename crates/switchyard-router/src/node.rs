//! Radix tree node.
//!
//! Each node is one path segment. Static children are kept sorted for binary
//! search; a node has at most one parameter child.

use http::Method;

use crate::method_table::MethodTable;
use crate::params::PathParams;
use crate::RouteConflict;

/// Kind of a template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment such as `recipes`.
    Static,
    /// Placeholder segment such as `{id}`, carrying the parameter name.
    Param(String),
}

/// A node in the routing tree.
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// Segment text as written in the template.
    pub segment: String,
    /// Segment kind.
    pub kind: SegmentKind,
    /// Dispatch values if a template ends at this node.
    pub methods: Option<MethodTable<T>>,
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            segment: segment.into(),
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
        }
    }

    /// Creates the root node.
    #[must_use]
    pub fn root() -> Self {
        Self::new("", SegmentKind::Static)
    }

    /// Splits a template into segments. Empty segments are dropped, so
    /// trailing slashes are insignificant.
    pub(crate) fn parse_template(template: &str) -> Vec<(String, SegmentKind)> {
        template
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => (s.to_string(), SegmentKind::Param(name.to_string())),
                None => (s.to_string(), SegmentKind::Static),
            })
            .collect()
    }

    /// Inserts `value` for `method` at `template`.
    pub fn insert(&mut self, template: &str, method: Method, value: T) -> Result<(), RouteConflict> {
        let segments = Self::parse_template(template);
        let leaf = self.descend_or_create(&segments, template)?;

        let table = leaf.methods.get_or_insert_with(MethodTable::new);
        table
            .insert(method.clone(), value)
            .map_err(|_| RouteConflict::duplicate(method, template))
    }

    fn descend_or_create(
        &mut self,
        segments: &[(String, SegmentKind)],
        template: &str,
    ) -> Result<&mut Self, RouteConflict> {
        let Some(((segment, kind), rest)) = segments.split_first() else {
            return Ok(self);
        };

        match kind {
            SegmentKind::Static => {
                let idx = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.static_children
                            .insert(idx, Node::new(segment.clone(), SegmentKind::Static));
                        idx
                    }
                };
                self.static_children[idx].descend_or_create(rest, template)
            }
            SegmentKind::Param(name) => {
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Node::new(segment.clone(), kind.clone())));

                // `/a/{id}` and `/a/{slug}` would make the captured name depend on
                // registration order.
                if child.kind != *kind {
                    return Err(RouteConflict::param_name(template, &child.segment, segment));
                }
                child.descend_or_create(rest, template)
            }
        }
    }

    /// Matches a concrete path, capturing parameters in template order.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodTable<T>, PathParams)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = PathParams::new();
        let table = self.match_segments(&segments, &mut params)?;
        Some((table, params))
    }

    fn match_segments<'a>(
        &'a self,
        segments: &[&str],
        params: &mut PathParams,
    ) -> Option<&'a MethodTable<T>> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        // Static segments win over placeholders.
        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(rest, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), (*segment).to_string());
                if let Some(found) = child.match_segments(rest, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Self> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}
