//! # deidmap-checksum
//!
//! Check-digit layer for surrogate identifiers.
//!
//! This crate provides:
//! - the Verhoeff check-digit algorithm over digit sequences
//! - the alphabet-to-digit mapping for alphanumeric identifiers
//! - `SurrogateId` (a checksum-verified identifier value)
//! - batch identifier generation for pool files
//!
//! It is pure: no I/O, no persistence. Pool loading and mapping storage
//! live in `deidmap-store`.

pub mod id;
pub mod verhoeff;

pub use id::{GenerateIds, SurrogateId, SurrogateIdError, append_check_digit, generate_ids};
pub use verhoeff::{ChecksumError, checksum, compute, digits_of, verify};
