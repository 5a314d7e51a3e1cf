//! Decimal formatting of message payloads into fixed byte buffers.

/// Maximum size of a formatted `i32` payload: "-2147483648".
pub const MAX_PAYLOAD_DIGITS: usize = 11;

/// Write an i32 as a signed decimal string.
///
/// Returns the number of bytes written (1-11 bytes).
///
/// # Panics
///
/// Panics if `buf.len() < 11` (max size: "-2147483648").
#[inline]
pub fn write_i32(buf: &mut [u8], value: i32) -> usize {
    debug_assert!(buf.len() >= MAX_PAYLOAD_DIGITS, "buffer too small for i32");

    if value == 0 {
        buf[0] = b'0';
        return 1;
    }

    let mut pos = 0;
    if value < 0 {
        buf[0] = b'-';
        pos = 1;
    }
    // unsigned_abs covers i32::MIN without overflow
    let mut n = value.unsigned_abs();

    // Digits come out least significant first.
    let mut temp = [0u8; 10];
    let mut len = 0;
    while n > 0 {
        temp[len] = b'0' + (n % 10) as u8;
        n /= 10;
        len += 1;
    }

    for i in (0..len).rev() {
        buf[pos] = temp[i];
        pos += 1;
    }

    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_i32() {
        let mut buf = [0u8; MAX_PAYLOAD_DIGITS];

        let len = write_i32(&mut buf, 0);
        assert_eq!(&buf[..len], b"0");

        let len = write_i32(&mut buf, 7);
        assert_eq!(&buf[..len], b"7");

        let len = write_i32(&mut buf, -1);
        assert_eq!(&buf[..len], b"-1");

        let len = write_i32(&mut buf, 1000);
        assert_eq!(&buf[..len], b"1000");

        let len = write_i32(&mut buf, -255);
        assert_eq!(&buf[..len], b"-255");
    }

    #[test]
    fn test_write_i32_extremes() {
        let mut buf = [0u8; MAX_PAYLOAD_DIGITS];

        let len = write_i32(&mut buf, i32::MAX);
        assert_eq!(&buf[..len], b"2147483647");

        let len = write_i32(&mut buf, i32::MIN);
        assert_eq!(&buf[..len], b"-2147483648");
    }
}
