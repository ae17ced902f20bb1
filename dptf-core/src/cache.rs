//! Lazily fetched capability values
//!
//! A `CachedProperty` holds one value read from the action layer. It is filled
//! on first access, kept until invalidated, and never expires on a timer.

use std::cell::RefCell;

use crate::error::Result;

#[derive(Debug)]
pub struct CachedProperty<T> {
    value: RefCell<Option<T>>,
}

impl<T> Default for CachedProperty<T> {
    fn default() -> Self {
        Self {
            value: RefCell::new(None),
        }
    }
}

impl<T: Clone> CachedProperty<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value, fetching it first when the cache is empty.
    /// A failed fetch leaves the cache empty.
    pub fn get_or_fetch<F>(&self, fetch: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.borrow().as_ref() {
            return Ok(value.clone());
        }

        let value = fetch()?;
        *self.value.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    /// Cached value without fetching
    pub fn peek(&self) -> Option<T> {
        self.value.borrow().clone()
    }

    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
    }

    pub fn invalidate(&self) {
        *self.value.borrow_mut() = None;
    }

    pub fn is_valid(&self) -> bool {
        self.value.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DptfError;
    use std::cell::Cell;

    #[test]
    fn test_fetches_once_until_invalidated() {
        let fetches = Cell::new(0);
        let cache = CachedProperty::new();
        let fetch = || {
            fetches.set(fetches.get() + 1);
            Ok(42u32)
        };

        assert_eq!(cache.get_or_fetch(fetch).unwrap(), 42);
        assert_eq!(cache.get_or_fetch(fetch).unwrap(), 42);
        assert_eq!(fetches.get(), 1);

        cache.invalidate();
        assert!(!cache.is_valid());
        assert_eq!(cache.get_or_fetch(fetch).unwrap(), 42);
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn test_fetch_may_read_the_cache() {
        let cache = CachedProperty::new();
        let value = cache.get_or_fetch(|| Ok(cache.peek().unwrap_or(5) + 1)).unwrap();
        assert_eq!(value, 6);

        cache.set(9);
        assert_eq!(cache.get_or_fetch(|| Ok(0)).unwrap(), 9);
    }

    #[test]
    fn test_failed_fetch_is_not_cached() {
        let cache: CachedProperty<u32> = CachedProperty::new();
        assert!(cache
            .get_or_fetch(|| Err(DptfError::generic("firmware busy")))
            .is_err());
        assert!(cache.peek().is_none());
        assert_eq!(cache.get_or_fetch(|| Ok(7)).unwrap(), 7);
    }
}
