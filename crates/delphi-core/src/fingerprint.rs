//! Deterministic structural hashing of resolved units.
//!
//! A [`Fingerprint`] summarises the declaration and type graphs of a resolved
//! unit. Resolving the same input twice must produce the same fingerprint, so
//! the hash is fed only with order-stable data (arena order, sorted keys) and
//! never with pointer values or hash-map iteration order.
//!
//! Uses XXHash64 with domain-specific mixing constants so that a declaration
//! and a type with the same spelling never contribute the same bits.

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain markers mixed in before each kind of record.
pub mod domain {
    /// Separator between path components and sequence items.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
    /// A unit header.
    pub const UNIT: u64 = 0x6c1b3f9e0a2d7c55;
    /// A declaration record.
    pub const DECL: u64 = 0x5ea77ffbcdf5f302;
    /// A type record.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
    /// A scope record.
    pub const SCOPE: u64 = 0x1a095090689d4647;
    /// A resolution fact (node binding, call outcome).
    pub const FACT: u64 = 0x7d3c8b4a92e15f6d;
}

/// A 64-bit structural hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// The raw hash value.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:#018x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Incremental builder for a [`Fingerprint`].
///
/// # Examples
///
/// ```
/// use delphi_core::fingerprint::{domain, FingerprintBuilder};
///
/// let mut a = FingerprintBuilder::new(domain::UNIT);
/// a.write_str("Foo").write_u64(3);
/// let mut b = FingerprintBuilder::new(domain::UNIT);
/// b.write_str("Foo").write_u64(3);
/// assert_eq!(a.finish(), b.finish());
/// ```
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    state: u64,
    items: u64,
}

impl FingerprintBuilder {
    /// Start a fingerprint in the given domain.
    pub fn new(domain: u64) -> Self {
        Self {
            state: domain,
            items: 0,
        }
    }

    #[inline]
    fn mix(&mut self, value: u64) {
        self.items = self.items.wrapping_add(1);
        self.state = (self.state.rotate_left(5) ^ value)
            .wrapping_mul(0x9e3779b97f4a7c15)
            .wrapping_add(self.items);
    }

    /// Mix in a domain marker.
    pub fn write_tag(&mut self, tag: u64) -> &mut Self {
        self.mix(tag ^ domain::SEP);
        self
    }

    /// Mix in a string.
    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.mix(xxh64(s.as_bytes(), self.items));
        self
    }

    /// Mix in an integer.
    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.mix(value);
        self
    }

    /// Mix in a boolean.
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.mix(value as u64);
        self
    }

    /// Mix in an optional integer, distinguishing `None` from any value.
    pub fn write_opt(&mut self, value: Option<u64>) -> &mut Self {
        match value {
            Some(v) => {
                self.mix(1);
                self.mix(v);
            }
            None => self.mix(0),
        }
        self
    }

    /// Mix in another fingerprint.
    pub fn write_fingerprint(&mut self, other: Fingerprint) -> &mut Self {
        self.mix(other.0);
        self
    }

    /// Finish the fingerprint.
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(xxh64(&self.state.to_le_bytes(), self.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_fingerprint() {
        let build = || {
            let mut b = FingerprintBuilder::new(domain::DECL);
            b.write_str("TFoo").write_u64(1).write_bool(true).write_opt(None);
            b.finish()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn order_matters() {
        let mut a = FingerprintBuilder::new(domain::TYPE);
        a.write_str("A").write_str("B");
        let mut b = FingerprintBuilder::new(domain::TYPE);
        b.write_str("B").write_str("A");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn domains_separate() {
        let mut a = FingerprintBuilder::new(domain::TYPE);
        a.write_str("Integer");
        let mut b = FingerprintBuilder::new(domain::DECL);
        b.write_str("Integer");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn option_none_differs_from_zero() {
        let mut a = FingerprintBuilder::new(domain::FACT);
        a.write_opt(None);
        let mut b = FingerprintBuilder::new(domain::FACT);
        b.write_opt(Some(0));
        assert_ne!(a.finish(), b.finish());
    }
}
