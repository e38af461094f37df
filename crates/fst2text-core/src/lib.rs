//! Shared types for the fst2text toolkit.
//!
//! - [`alphabet`] -- letter classification and upper/lower correspondence
//!   loaded from an alphabet file
//! - [`offsets`] -- the (input-span, output-span) alignment table produced
//!   by rewriting passes and consumed by downstream alignment tooling

pub mod alphabet;
pub mod offsets;

pub use alphabet::{Alphabet, AlphabetError};
pub use offsets::{OffsetRecord, OffsetTable};
