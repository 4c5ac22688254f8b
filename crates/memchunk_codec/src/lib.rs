//! # memchunk Codec
//!
//! Serialization of cached values and encoding of the per-entry flags
//! integer.
//!
//! Values are serialized as CBOR, which is self-describing: a payload that
//! fails to decode is always distinguishable from a valid empty value.
//!
//! The flags integer carries two independent fields, see [`Flags`]:
//!
//! ```text
//!  31                16 15                 0
//! ┌────────────────────┬────────────────────┐
//! │  part count + 1    │  backend bits      │
//! └────────────────────┴────────────────────┘
//!                         bit 0 = compressed
//! ```
//!
//! ## Usage
//!
//! ```
//! use memchunk_codec::{from_bytes, to_bytes, Flags};
//!
//! let bytes = to_bytes(&vec![1u32, 2, 3]).unwrap();
//! let decoded: Vec<u32> = from_bytes(&bytes).unwrap();
//! assert_eq!(decoded, vec![1, 2, 3]);
//!
//! let flags = Flags::chunked(false, 2).encode().unwrap();
//! assert_eq!(Flags::decode(flags).part_count, Some(2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod flags;
mod value;

pub use error::{CodecError, CodecResult};
pub use flags::{Flags, COMPRESSED_BIT, MAX_PART_COUNT, RESERVED_BITS};
pub use value::{from_bytes, to_bytes};
