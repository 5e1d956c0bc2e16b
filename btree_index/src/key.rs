//! The index's key type.
//!
//! The public surface accepts a `KeyType` tag so that construction can be
//! refused for anything but a fixed-width signed integer, matching the
//! single supported attribute type; internally every key is a plain `i32`.

/// The key types a caller may request when creating or opening an index.
///
/// Only `Integer` is actually supported; the variant exists so
/// construction can validate and reject anything else, and so a reopened
/// index's stored tag can be checked against what the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Integer,
}

impl KeyType {
    pub(crate) fn tag(self) -> u8 {
        match self {
            KeyType::Integer => 0,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(KeyType::Integer),
            _ => None,
        }
    }
}

/// The sentinel reserved for an unused key slot. Occupancy is tracked by
/// each node's explicit `key_count`, not by sweeping for this value, but
/// a real key equal to it is still rejected on insert.
pub const EMPTY_KEY: i32 = i32::MAX;
