// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Power-of-two rounding, mip level counts and unpack alignment for texture transfers.
*/

/// Best unpack alignment for the low 3 bits of a value.
const ALIGNMENT_FOR_LOW_BITS: [u8; 8] = [8, 1, 2, 1, 4, 1, 2, 1];

/// Largest power of two <= 8 that divides `x`.
pub const fn alignment_of(x: usize) -> u8 {
    ALIGNMENT_FOR_LOW_BITS[x & 7]
}

/**
Unpack alignment usable for a transfer starting at `address` with rows `pitch` bytes apart.

Both the first row and every following row must land on the alignment, so this is
the smaller of the two.
*/
pub const fn unpack_alignment(address: usize, pitch: usize) -> u8 {
    let for_address = alignment_of(address);
    let for_pitch = alignment_of(pitch);
    if for_address < for_pitch {
        for_address
    } else {
        for_pitch
    }
}

/// Rounds `x` up to the next power of two. Zero rounds to 1.
pub const fn round_up_pow2(x: u32) -> u32 {
    if x <= 1 { 1 } else { x.next_power_of_two() }
}

pub const fn is_pow2(x: u32) -> bool {
    x != 0 && x & (x - 1) == 0
}

/**
Number of mip levels in a full chain for a `width`x`height` image.

This is `floor(log2(max(width, height))) + 1`, i.e. the index of the highest set bit
of `width | height`, counting from 1.
*/
pub const fn full_level_count(width: u32, height: u32) -> u8 {
    let bits = width | height;
    if bits == 0 {
        return 0;
    }
    (u32::BITS - bits.leading_zeros()) as u8
}

/// Size of mip `level` along one axis of a `base`-sized image.
pub const fn level_extent(base: u32, level: u8) -> u32 {
    let shifted = if level as u32 >= u32::BITS {
        0
    } else {
        base >> level
    };
    if shifted == 0 { 1 } else { shifted }
}

/// Rounds `x` up to a multiple of `alignment`, which must be a power of two.
pub const fn align_up(x: usize, alignment: usize) -> usize {
    (x + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_table() {
        assert_eq!(alignment_of(0), 8);
        assert_eq!(alignment_of(1), 1);
        assert_eq!(alignment_of(2), 2);
        assert_eq!(alignment_of(4), 4);
        assert_eq!(alignment_of(6), 2);
        assert_eq!(alignment_of(12), 4);
        assert_eq!(alignment_of(24), 8);
    }

    #[test]
    fn unpack_alignment_takes_minimum() {
        assert_eq!(unpack_alignment(0x1004, 12), 4);
        assert_eq!(unpack_alignment(0x1000, 6), 2);
        assert_eq!(unpack_alignment(0x1001, 16), 1);
        assert_eq!(unpack_alignment(0, 256), 8);
    }

    #[test]
    fn level_counts() {
        assert_eq!(full_level_count(256, 256), 9);
        assert_eq!(full_level_count(64, 16), 7);
        assert_eq!(full_level_count(100, 60), 7);
        assert_eq!(full_level_count(1, 1), 1);
        assert_eq!(full_level_count(0, 0), 0);
    }

    #[test]
    fn level_extents_clamp_to_one() {
        assert_eq!(level_extent(256, 0), 256);
        assert_eq!(level_extent(256, 3), 32);
        assert_eq!(level_extent(5, 1), 2);
        assert_eq!(level_extent(5, 3), 1);
        assert_eq!(level_extent(5, 40), 1);
    }

    #[test]
    fn pow2_rounding() {
        assert_eq!(round_up_pow2(0), 1);
        assert_eq!(round_up_pow2(1), 1);
        assert_eq!(round_up_pow2(60), 64);
        assert_eq!(round_up_pow2(100), 128);
        assert_eq!(round_up_pow2(128), 128);
        assert!(is_pow2(64));
        assert!(!is_pow2(60));
        assert!(!is_pow2(0));
    }

    #[test]
    fn align_up_rounds() {
        assert_eq!(align_up(12, 8), 16);
        assert_eq!(align_up(16, 8), 16);
        assert_eq!(align_up(3, 1), 3);
    }
}
