//! Cache key derivation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Key of the content-analysis cache: hash of normalized content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey(u64);

impl ContentKey {
    pub fn of(normalized: &str) -> Self {
        Self(hash_value(&normalized))
    }
}

/// Compute a hash for any hashable value.
///
/// `DefaultHasher::new()` uses fixed keys, so the value is stable for the
/// lifetime of the process.
fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_content_yields_equal_keys() {
        assert_eq!(ContentKey::of("x^2 + 1"), ContentKey::of("x^2 + 1"));
        assert_ne!(ContentKey::of("x^2 + 1"), ContentKey::of("x^2 + 2"));
    }
}
