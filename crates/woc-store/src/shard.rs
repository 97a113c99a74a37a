//! Mapping keys to shard indices.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// How a key picks its shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sharding {
    /// First byte of the key. Used for binary git object keys, which are
    /// already uniformly distributed.
    Prefix,
    /// FNV-1a hash of the key. Used for identifier strings such as project
    /// names, file paths and author identities.
    Hashed,
}

/// 32-bit FNV-1a.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Shard index of `key` in a category with `2^prefix_bits` shards.
///
/// An empty key falls into shard 0 under [`Sharding::Prefix`].
pub fn shard_index(key: &[u8], prefix_bits: u8, sharding: Sharding) -> u32 {
    let raw = match sharding {
        Sharding::Prefix => key.first().copied().map(u32::from).unwrap_or(0),
        Sharding::Hashed => fnv1a_32(key),
    };
    raw & prefix_mask(prefix_bits)
}

fn prefix_mask(prefix_bits: u8) -> u32 {
    if prefix_bits >= 32 {
        u32::MAX
    } else {
        (1u32 << prefix_bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fnv_reference_values() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn prefix_sharding_uses_first_byte() {
        let key = [0xAB, 0x01, 0x02];
        assert_eq!(shard_index(&key, 7, Sharding::Prefix), 0xAB & 0x7F);
        assert_eq!(shard_index(&key, 3, Sharding::Prefix), 0xAB & 0x07);
        assert_eq!(shard_index(&key, 0, Sharding::Prefix), 0);
        assert_eq!(shard_index(&[], 7, Sharding::Prefix), 0);
    }

    #[test]
    fn hashed_sharding_masks_fnv() {
        assert_eq!(shard_index(b"foobar", 5, Sharding::Hashed), 0xbf9c_f968 & 0x1F);
        assert_eq!(shard_index(b"foobar", 32, Sharding::Hashed), 0xbf9c_f968);
    }

    proptest! {
        #[test]
        fn shard_index_is_pure_and_in_range(
            key in proptest::collection::vec(any::<u8>(), 0..64),
            bits in 0u8..=16,
            hashed in any::<bool>(),
        ) {
            let sharding = if hashed { Sharding::Hashed } else { Sharding::Prefix };
            let a = shard_index(&key, bits, sharding);
            let b = shard_index(&key, bits, sharding);
            prop_assert_eq!(a, b);
            prop_assert!(u64::from(a) < (1u64 << bits));
        }
    }
}
