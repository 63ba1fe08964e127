//! Deterministic A/B experiment bucketing.
//!
//! Users are assigned to variant A or B by hashing their Telegram id with
//! FNV-1a and comparing the bucket (hash mod 100) against the configured
//! split ratio. The assignment is a pure function of (identifier, ratio),
//! so a user keeps the same variant across restarts and across instances.

use std::fmt;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Experiment bucket a user belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    A,
    B,
}

impl Variant {
    /// Short form used in URLs, callback data and analytics payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::A => "A",
            Variant::B => "B",
        }
    }

    /// Parses the short form back; anything other than "A"/"B" is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Variant::A),
            "B" => Some(Variant::B),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
///
/// All arithmetic wraps at 32 bits; the multiply-by-prime step is
/// bit-identical to the shift-add formulation used by scripting runtimes
/// that lack native 32-bit integer multiplication.
pub fn fnv1a_hash32(input: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Assigns `identifier` to variant A or B for the given split ratio.
///
/// `ratio_a` is the percentage of users that should land in A; the caller
/// (the config layer) clamps it to [0, 100]. An empty identifier is
/// treated as the literal `"0"`. Rounding of fractional ratios is
/// half-away-from-zero.
pub fn assign_variant(identifier: &str, ratio_a: f64) -> Variant {
    let id = if identifier.is_empty() { "0" } else { identifier };
    let bucket = fnv1a_hash32(id) % 100;
    if f64::from(bucket) < ratio_a.round() {
        Variant::A
    } else {
        Variant::B
    }
}
