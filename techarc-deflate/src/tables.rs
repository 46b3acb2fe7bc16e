//! Length and distance code tables (RFC 1951 Section 3.2.5).
//!
//! Match lengths 3-258 map onto literal/length symbols 257-285 and
//! distances 1-32768 onto distance symbols 0-29, each followed by a fixed
//! number of extra bits.

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Bits used to serialize a literal/length leaf.
pub const LITLEN_SYMBOL_BITS: u8 = 9;

/// Bits used to serialize a distance leaf.
pub const DISTANCE_SYMBOL_BITS: u8 = 5;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// First length symbol.
pub const FIRST_LENGTH_SYMBOL: u16 = 257;

/// Base lengths for symbols 257-285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for symbols 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Base distances for symbols 0-29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance symbols 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// A symbol with its extra bits: `(symbol, extra_bit_count, extra_value)`.
pub type SymbolCode = (u16, u8, u16);

/// Convert a match length (3-258) to its literal/length symbol.
pub fn length_to_code(length: u16) -> SymbolCode {
    debug_assert!((3..=258).contains(&length), "length out of range: {length}");
    let index = LENGTH_BASE.partition_point(|&base| base <= length) - 1;
    (
        FIRST_LENGTH_SYMBOL + index as u16,
        LENGTH_EXTRA_BITS[index],
        length - LENGTH_BASE[index],
    )
}

/// Convert a distance (1-32768) to its distance symbol.
pub fn distance_to_code(distance: u16) -> SymbolCode {
    debug_assert!(distance >= 1, "distance out of range: {distance}");
    let index = DISTANCE_BASE.partition_point(|&base| base <= distance) - 1;
    (
        index as u16,
        DISTANCE_EXTRA_BITS[index],
        distance - DISTANCE_BASE[index],
    )
}

/// Base length and extra bit count of a length symbol, if it is one.
pub fn length_base(symbol: u16) -> Option<(u16, u8)> {
    let index = symbol.checked_sub(FIRST_LENGTH_SYMBOL)? as usize;
    Some((*LENGTH_BASE.get(index)?, LENGTH_EXTRA_BITS[index]))
}

/// Base distance and extra bit count of a distance symbol.
pub fn distance_base(symbol: u16) -> Option<(u16, u8)> {
    let index = symbol as usize;
    Some((*DISTANCE_BASE.get(index)?, DISTANCE_EXTRA_BITS[index]))
}
