//! Per-key outcomes of batch operations.

use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::fmt;

/// Composite error for a batch where at least one key failed.
///
/// Keeps the terminal error of every failed key, and picks one
/// representative error for contexts that can only show one: the least
/// severe observed error wins (miss, then empty value, then anything else),
/// ties broken by key order so the choice is deterministic.
#[derive(Debug, Clone)]
pub struct BatchError {
    errors: HashMap<String, CacheError>,
    primary: String,
}

impl BatchError {
    /// Fold per-key results into one outcome.
    ///
    /// Returns `Ok(())` when there are no results or every result is `Ok`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flightcache_cache::{BatchError, CacheError};
    ///
    /// let outcome = BatchError::collect(vec![
    ///     ("a".to_string(), Ok(())),
    ///     ("b".to_string(), Err(CacheError::Miss)),
    /// ]);
    ///
    /// let err = outcome.unwrap_err();
    /// assert!(err.lookup("a").is_none());
    /// assert!(err.lookup("b").unwrap().is_miss());
    /// ```
    pub fn collect<I>(results: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = (String, CacheResult<()>)>,
    {
        let errors: HashMap<String, CacheError> = results
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|err| (key, err)))
            .collect();

        match Self::from_errors(errors) {
            Some(batch) => Err(CacheError::Batch(batch)),
            None => Ok(()),
        }
    }

    /// Build a composite from failed keys only; `None` if the map is empty.
    pub fn from_errors(errors: HashMap<String, CacheError>) -> Option<Self> {
        let primary = errors
            .iter()
            .min_by(|(ka, ea), (kb, eb)| ea.severity().cmp(&eb.severity()).then(ka.cmp(kb)))
            .map(|(key, _)| key.clone())?;

        Some(Self { errors, primary })
    }

    /// The error recorded for `key`, or `None` if that key succeeded.
    pub fn lookup(&self, key: &str) -> Option<&CacheError> {
        self.errors.get(key)
    }

    /// The representative error.
    pub fn primary(&self) -> &CacheError {
        &self.errors[&self.primary]
    }

    /// The key whose error is the representative.
    pub fn primary_key(&self) -> &str {
        &self.primary
    }

    /// All failed keys and their errors.
    pub fn errors(&self) -> &HashMap<String, CacheError> {
        &self.errors
    }

    /// Failed keys, sorted.
    pub fn failed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.errors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of failed keys.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// False for any constructed batch; an empty batch is represented as
    /// success.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())
    }
}

impl std::error::Error for BatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: Vec<(&str, CacheResult<()>)>) -> Vec<(String, CacheResult<()>)> {
        pairs.into_iter().map(|(k, r)| (k.to_string(), r)).collect()
    }

    #[test]
    fn test_empty_is_success() {
        assert!(BatchError::collect(Vec::new()).is_ok());
        assert!(BatchError::from_errors(HashMap::new()).is_none());
    }

    #[test]
    fn test_all_ok_is_success() {
        let outcome = BatchError::collect(results(vec![("a", Ok(())), ("b", Ok(()))]));
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_miss_is_primary_over_faults() {
        let err = BatchError::collect(results(vec![
            ("a", Err(CacheError::store("connection reset"))),
            ("b", Err(CacheError::Miss)),
            ("c", Err(CacheError::EmptyValue)),
        ]))
        .unwrap_err();

        let batch = err.batch().unwrap();
        assert!(batch.primary().is_miss());
        assert_eq!(batch.primary_key(), "b");
        assert_eq!(err.to_string(), "cache miss");
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_empty_value_beats_other_errors() {
        let err = BatchError::collect(results(vec![
            ("a", Err(CacheError::loader("db down"))),
            ("b", Err(CacheError::EmptyValue)),
        ]))
        .unwrap_err();

        assert!(err.batch().unwrap().primary().is_empty_value());
    }

    #[test]
    fn test_ties_break_by_key() {
        let err = BatchError::collect(results(vec![
            ("zeta", Err(CacheError::store("z"))),
            ("alpha", Err(CacheError::store("a"))),
            ("mid", Err(CacheError::loader("m"))),
        ]))
        .unwrap_err();

        let batch = err.batch().unwrap();
        assert_eq!(batch.primary_key(), "alpha");
        assert_eq!(batch.failed_keys(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_lookup_per_key() {
        let err = BatchError::collect(results(vec![
            ("ok", Ok(())),
            ("gone", Err(CacheError::Miss)),
            ("broken", Err(CacheError::store("timeout"))),
        ]))
        .unwrap_err();

        assert!(err.lookup("ok").is_none());
        assert!(err.lookup("gone").unwrap().is_miss());
        assert!(err.lookup("broken").unwrap().is_store_fault());
        assert!(err.lookup("never-asked").is_none());
    }
}
