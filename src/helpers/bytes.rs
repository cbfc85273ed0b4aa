//! Little-endian conversions over the byte slices of legacy binary workbooks.
//! Callers pass slices at least as long as the value they read.

/// Converts a byte slice into 32-bit unsigned integers, 4 bytes at a time.
/// A trailing partial group is ignored.
pub(crate) fn to_u32_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = u32> + '_ {
    bytes.chunks_exact(4).map(to_u32)
}

/// Converts a byte slice into sector ids and offsets.
pub(crate) fn to_usize_iter(bytes: &[u8]) -> impl ExactSizeIterator<Item = usize> + '_ {
    to_u32_iter(bytes).map(|value| value as usize)
}

#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_bits(to_u64(s))
}

#[inline]
pub(crate) fn to_u64(s: &[u8]) -> u64 {
    u64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes([s[0], s[1], s[2], s[3]])
}

#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes([s[0], s[1]])
}

#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_values() {
        assert_eq!(to_u16(&[0x09, 0x08, 0xFF]), 0x0809);
        assert_eq!(to_u32(&[0xFE, 0xFF, 0xFF, 0xFF]), 0xFFFF_FFFE);
        assert_eq!(to_usize(&[0x00, 0x02, 0x00, 0x00]), 512);
        assert_eq!(to_f64(&1250.5f64.to_le_bytes()), 1250.5);
        assert_eq!(to_usize_iter(&[1, 0, 0, 0, 2, 0, 0, 0, 3]).collect::<Vec<_>>(), vec![1, 2]);
    }
}
