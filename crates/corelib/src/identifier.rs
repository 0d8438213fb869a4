//! Identifier arithmetic on the modular ring.
//!
//! Every comparison in the engine above this module goes through one of
//! the three range predicates here rather than plain integer comparison —
//! the ring wraps, so "less than" is meaningless without a reference arc.
//! Direct integer comparison anywhere else in the codebase is a bug.

use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::config::Config;
use crate::error::{Error, Result};

/// A point on the circular identifier space `[0, 2^m)`.
///
/// Stored in its canonical form: a lowercase, zero-padded hex string of
/// width `ceil(m / 4)`. This is deliberate — the same representation is
/// compared, serialized over RPC, and logged, so nothing downstream ever
/// has to worry about format drift between two identifiers that are
/// numerically equal but spelled differently.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap an already-canonical hex string without validating it against
    /// a particular [`Config`]. Prefer [`parse`](Self::parse) at trust
    /// boundaries (RPC deserialization, CLI argument parsing).
    pub fn from_canonical(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Parse a hex string (of any case, any width) into the canonical
    /// form for `config`, rejecting anything that isn't a valid hex
    /// integer in range.
    pub fn parse(config: &Config, hex: &str) -> Result<Self> {
        let value = BigUint::parse_bytes(hex.as_bytes(), 16)
            .ok_or_else(|| Error::InvalidIdentifier(hex.to_string()))?;
        if value >= modulus(config) {
            return Err(Error::InvalidIdentifier(hex.to_string()));
        }
        Ok(format(config, &value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

/// `2^m` for this ring's configuration.
pub fn modulus(config: &Config) -> BigUint {
    BigUint::from(1u32) << config.ring_bits
}

fn to_biguint(id: &Identifier) -> BigUint {
    // Constructed exclusively through `format`/`parse`, both of which only
    // ever produce valid hex, so this cannot fail.
    BigUint::parse_bytes(id.0.as_bytes(), 16).expect("identifier is not valid hex")
}

/// Format an integer value as the canonical zero-padded hex identifier.
pub fn format(config: &Config, value: &BigUint) -> Identifier {
    let digits = value.to_str_radix(16);
    let width = config.hex_width();
    if digits.len() >= width {
        Identifier(digits)
    } else {
        let mut padded = "0".repeat(width - digits.len());
        padded.push_str(&digits);
        Identifier(padded)
    }
}

/// Signed modular addition: `(id + delta) mod 2^m`, handling negative
/// intermediate results by wrapping back into range rather than panicking.
pub fn add(config: &Config, id: &Identifier, delta: i128) -> Identifier {
    add_signed(config, id, &BigInt::from(delta))
}

/// `2^exponent` as an unbounded integer. Finger-start offsets need this
/// rather than a native shift: `exponent` runs up to `ring_bits - 1`, and
/// the production SHA-1 ring (160 bits) overflows any native integer type
/// well before the table is fully built.
pub fn power_of_two(exponent: u32) -> BigUint {
    BigUint::from(1u32) << exponent
}

/// Same as [`add`], but for a delta too wide for `i128` — namely finger-
/// start offsets on a ring wider than 127 bits.
pub fn add_signed(config: &Config, id: &Identifier, delta: &BigInt) -> Identifier {
    let modulus = BigInt::from_biguint(Sign::Plus, modulus(config));
    let base = BigInt::from_biguint(Sign::Plus, to_biguint(id));
    let sum = base + delta;
    let wrapped = sum.mod_floor(&modulus);
    let (_, magnitude) = wrapped.into_parts();
    format(config, &magnitude)
}

/// Resolve an identifier to the host:port a peer listening at that
/// identifier can be reached on. There is no separate address book: the
/// hex id itself, prefixed, is the host name.
pub fn net_address(config: &Config, id: &Identifier) -> String {
    format!("{}{}:{}", config.host_prefix, id.as_str(), config.rpc_port)
}

/// SHA-1 the name, then reduce modulo `2^m` to land it on the ring.
pub fn hash(config: &Config, name: &str) -> Identifier {
    let digest = Sha1::digest(name.as_bytes());
    let value = BigUint::from_bytes_be(&digest) % modulus(config);
    format(config, &value)
}

/// Is `n` in the open interval `(s, e)`?
///
/// Empty per the spec when `e == s` (degenerate) or `e == s + 1 (mod 2^m)`
/// (the interval would contain no integers at all).
pub fn in_range_ee(
    config: &Config,
    n: Option<&Identifier>,
    s: Option<&Identifier>,
    e: Option<&Identifier>,
) -> bool {
    let (n, s, e) = match (n, s, e) {
        (Some(n), Some(s), Some(e)) => (to_biguint(n), to_biguint(s), to_biguint(e)),
        _ => return false,
    };
    if s > e {
        n > s || n < e
    } else {
        if &e - &s <= BigUint::from(1u32) {
            return false;
        }
        s < n && n < e
    }
}

/// Is `n` in the half-open interval `[s, e)`? Empty when `s == e`.
pub fn in_range_ie(
    config: &Config,
    n: Option<&Identifier>,
    s: Option<&Identifier>,
    e: Option<&Identifier>,
) -> bool {
    let (n, s, e) = match (n, s, e) {
        (Some(n), Some(s), Some(e)) => (to_biguint(n), to_biguint(s), to_biguint(e)),
        _ => return false,
    };
    let _ = config;
    if s > e {
        n >= s || n < e
    } else if s == e {
        false
    } else {
        s <= n && n < e
    }
}

/// Is `n` in the half-open interval `(s, e]`? Empty when `s == e`.
pub fn in_range_ei(
    config: &Config,
    n: Option<&Identifier>,
    s: Option<&Identifier>,
    e: Option<&Identifier>,
) -> bool {
    let (n, s, e) = match (n, s, e) {
        (Some(n), Some(s), Some(e)) => (to_biguint(n), to_biguint(s), to_biguint(e)),
        _ => return false,
    };
    let _ = config;
    if s > e {
        n > s || n <= e
    } else if s == e {
        false
    } else {
        s < n && n <= e
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(config: &Config, v: u64) -> Identifier {
        format(config, &BigUint::from(v))
    }

    #[test]
    fn add_roundtrips() {
        let config = Config::with_ring_bits(5);
        let a = id(&config, 7);
        for delta in [-9_i128, -1, 0, 1, 30] {
            let forward = add(&config, &a, delta);
            let back = add(&config, &forward, -delta);
            assert_eq!(back, a, "add({delta}) then add(-{delta}) should roundtrip");
        }
    }

    #[test]
    fn add_wraps_negative() {
        let config = Config::with_ring_bits(3); // mod 8
        let a = id(&config, 1);
        assert_eq!(add(&config, &a, -2), id(&config, 7));
    }

    #[test]
    fn power_of_two_supports_the_production_ring_width() {
        // exponent 159 is the widest finger-start offset on the 160-bit
        // SHA-1 ring; this must not overflow the way `1i128 << 159` would.
        let config = Config::production();
        let a = id(&config, 0);
        let offset = power_of_two(159);
        let result = add_signed(&config, &a, &BigInt::from_biguint(Sign::Plus, offset.clone()));
        assert_eq!(result, format(&config, &offset));
    }

    #[test]
    fn format_parses_back() {
        let config = Config::with_ring_bits(5);
        let a = id(&config, 19);
        let parsed = Identifier::parse(&config, a.as_str()).unwrap();
        assert_eq!(a, parsed);
    }

    #[test]
    fn ee_rejects_adjacent_and_equal_bounds() {
        let config = Config::with_ring_bits(3);
        let s = id(&config, 2);
        assert!(!in_range_ee(&config, Some(&id(&config, 3)), Some(&s), Some(&s)));
        let adjacent = id(&config, 3);
        assert!(!in_range_ee(&config, Some(&id(&config, 2)), Some(&s), Some(&adjacent)));
    }

    #[test]
    fn ee_wraps_around_zero() {
        let config = Config::with_ring_bits(3); // ring of 8
        let s = id(&config, 6);
        let e = id(&config, 2);
        assert!(in_range_ee(&config, Some(&id(&config, 7)), Some(&s), Some(&e)));
        assert!(in_range_ee(&config, Some(&id(&config, 0)), Some(&s), Some(&e)));
        assert!(!in_range_ee(&config, Some(&id(&config, 6)), Some(&s), Some(&e)));
        assert!(!in_range_ee(&config, Some(&id(&config, 2)), Some(&s), Some(&e)));
    }

    #[test]
    fn ie_empty_when_start_equals_end() {
        let config = Config::with_ring_bits(3);
        let s = id(&config, 4);
        assert!(!in_range_ie(&config, Some(&id(&config, 4)), Some(&s), Some(&s)));
    }

    #[test]
    fn ei_includes_end_excludes_start() {
        let config = Config::with_ring_bits(3);
        let s = id(&config, 1);
        let e = id(&config, 4);
        assert!(!in_range_ei(&config, Some(&s), Some(&s), Some(&e)));
        assert!(in_range_ei(&config, Some(&e), Some(&s), Some(&e)));
    }

    #[test]
    fn predicates_are_false_on_nil() {
        let config = Config::with_ring_bits(3);
        let a = id(&config, 1);
        assert!(!in_range_ee(&config, None, Some(&a), Some(&a)));
        assert!(!in_range_ie(&config, Some(&a), None, Some(&a)));
        assert!(!in_range_ei(&config, Some(&a), Some(&a), None));
    }
}
