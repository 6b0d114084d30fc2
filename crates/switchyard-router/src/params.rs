//! Path parameters captured while matching a route template.
//!
//! Parameters are kept in the order their placeholders appear in the
//! template, left to right. Dispatchers rely on this ordering when binding
//! handler arguments, so [`PathParams`] never reorders or deduplicates.

use smallvec::SmallVec;

/// Parameters stored inline before spilling to the heap.
const INLINE_PARAMS: usize = 4;

/// Ordered `(name, value)` pairs captured from a matched path.
///
/// # Example
///
/// ```rust
/// use switchyard_router::PathParams;
///
/// let mut params = PathParams::new();
/// params.push("orgId", "acme");
/// params.push("userId", "42");
///
/// assert_eq!(params.get("userId"), Some("42"));
/// assert_eq!(params.values().collect::<Vec<_>>(), vec!["acme", "42"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParams {
    inner: SmallVec<[(String, String); INLINE_PARAMS]>,
}

impl PathParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a captured parameter.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value captured for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the captured values in template order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.inner.iter().map(|(_, v)| v.as_str())
    }

    /// Returns `(name, value)` pairs in template order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns true when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    // Backtracking support for the matcher.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.inner.truncate(len);
    }
}

impl FromIterator<(String, String)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut params = PathParams::new();
        params.push("id", "123");
        params.push("slug", "pancakes");

        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.get("slug"), Some("pancakes"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_order_is_insertion_order() {
        let mut params = PathParams::new();
        params.push("b", "2");
        params.push("a", "1");

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);
    }

    #[test]
    fn test_truncate_drops_tail() {
        let mut params = PathParams::new();
        params.push("a", "1");
        params.push("b", "2");
        params.truncate(1);

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("b"), None);
    }

    #[test]
    fn test_spills_past_inline_capacity() {
        let params: PathParams = (0..10)
            .map(|i| (format!("k{i}"), format!("v{i}")))
            .collect();

        assert_eq!(params.len(), 10);
        assert_eq!(params.get("k7"), Some("v7"));
    }
}
