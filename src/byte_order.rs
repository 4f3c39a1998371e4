//! Helpers for the 24-bit network byte-order length field.
//!
//! Runner frames carry their payload length as a 3-byte big-endian integer.
//! These helpers keep Clippy expectations scoped to the conversion points so
//! codec code can remain explicit about wire endianness.

/// Largest value representable in the 24-bit length field.
pub const MAX_U24: u32 = 0x00FF_FFFF;

/// Serialise the low 24 bits of `value` in network byte order.
///
/// # Examples
///
/// ```
/// use plugin_runner::byte_order::write_network_u24;
///
/// assert_eq!(write_network_u24(0x0012_3456), [0x12, 0x34, 0x56]);
/// ```
#[must_use]
pub fn write_network_u24(value: u32) -> [u8; 3] {
    debug_assert!(value <= MAX_U24, "u24 overflow: {value:#x}");
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    let [_, hi, mid, lo] = value.to_be_bytes();
    [hi, mid, lo]
}

/// Parse a network-order 24-bit integer from its on-wire representation.
///
/// # Examples
///
/// ```
/// use plugin_runner::byte_order::read_network_u24;
///
/// assert_eq!(read_network_u24([0x12, 0x34, 0x56]), 0x0012_3456);
/// ```
#[must_use]
pub fn read_network_u24(bytes: [u8; 3]) -> u32 {
    let [hi, mid, lo] = bytes;
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u32::from_be_bytes([0, hi, mid, lo])
}
