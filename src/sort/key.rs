//! Order-preserving float → integer key transform.
//!
//! IEEE-754 bit patterns sort correctly as unsigned integers only for
//! non-negative values. Flipping the sign bit of positives and complementing
//! negatives yields a `u32` whose unsigned order matches float order:
//!
//! ```text
//! -inf .. -0.0 | +0.0 .. +inf
//! 0x007F_FFFF    0x8000_0000
//! ```

const SIGN_MASK: u32 = 0x8000_0000;

/// Map a distance to a radix-sortable key.
#[inline]
pub fn sort_key(distance: f32) -> u32 {
    let bits = distance.to_bits();
    if bits & SIGN_MASK != 0 {
        !bits
    } else {
        bits ^ SIGN_MASK
    }
}

/// The 8-bit digit of `sort_key(distance)` starting at bit `shift`.
#[inline]
pub fn key_digit(distance: f32, shift: u32) -> u8 {
    (sort_key(distance) >> shift) as u8
}
