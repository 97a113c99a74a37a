//! BER compressed integers (Perl `pack "w"`).

/// Unpack consecutive BER integers.
///
/// Each byte carries 7 payload bits, most significant group first; a set
/// high bit means another byte follows. A trailing group that never sees a
/// terminating byte is dropped.
pub fn unpack_varints(data: &[u8]) -> Vec<u64> {
    let mut values = Vec::new();
    let mut acc: u64 = 0;
    for &byte in data {
        acc = (acc << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            values.push(acc);
            acc = 0;
        }
    }
    values
}

/// Pack integers with the same encoding [`unpack_varints`] reads.
pub fn pack_varints(values: &[u64]) -> Vec<u8> {
    let mut buf = Vec::new();
    for &value in values {
        let mut groups = [0u8; 10];
        let mut n = 0;
        let mut rest = value;
        loop {
            groups[n] = (rest & 0x7F) as u8;
            n += 1;
            rest >>= 7;
            if rest == 0 {
                break;
            }
        }
        for i in (0..n).rev() {
            let continuation = if i > 0 { 0x80 } else { 0 };
            buf.push(groups[i] | continuation);
        }
    }
    buf
}
