//! Binary decoding primitives for the WoC archive.
//!
//! The archive was produced by Perl tooling, so its values use two Perl-isms:
//!
//! - **BER varints** (`pack "w*"`): big-endian base-128 integers, used for
//!   blob `(offset, length)` pairs. See [`unpack_varints`].
//! - **Compress::LZF frames**: an LZF payload prefixed by a variable-length
//!   header holding the uncompressed size, or a `0x00` byte followed by the
//!   value stored verbatim. See [`decompress`].

pub mod error;
pub mod frame;
pub mod varint;

pub use error::{CodecError, CodecResult};
pub use frame::{compress, decompress, frame_length};
pub use varint::{pack_varints, unpack_varints};
