//! Per-path method dispatch.
//!
//! A [`MethodTable`] holds one value per HTTP method for a single path
//! template. Two routes that share a template but differ by method land in
//! the same table as independent entries.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to dispatch values for one path template.
///
/// # Example
///
/// ```rust
/// use switchyard_router::MethodTable;
/// use http::Method;
///
/// let mut table = MethodTable::new();
/// table.insert(Method::GET, "list").unwrap();
/// table.insert(Method::POST, "create").unwrap();
///
/// assert_eq!(table.get(&Method::GET), Some(&"list"));
/// assert!(table.insert(Method::GET, "again").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MethodTable<T> {
    entries: SmallVec<[(Method, T); 2]>,
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`.
    ///
    /// Returns the value back if the method is already taken.
    pub fn insert(&mut self, method: Method, value: T) -> Result<(), T> {
        if self.contains(&method) {
            return Err(value);
        }
        self.entries.push((method, value));
        Ok(())
    }

    /// Returns the value registered for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }

    /// Returns true if `method` has a value.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// Methods registered on this path, in registration order.
    pub fn allowed(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
