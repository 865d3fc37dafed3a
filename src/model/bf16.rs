//! # BF16 storage for distances
//!
//! Distance matrices are `N × N`; at street-network scale (10⁴ nodes) an
//! `f64` matrix is 800 MB. Distances are therefore stored as BF16: the
//! upper 16 bits of an IEEE `f32`.
//!
//! ```text
//! BF16 layout:  [ sign (1b) | exponent (8b) | mantissa (7b) ]
//!                 bit 15       bits 14..7       bits 6..0
//! ```
//!
//! BF16 keeps the full `f32` exponent range, so a 40 km detour is still a
//! finite number (IEEE half precision saturates to `inf` at 65 504) and
//! `f32::INFINITY` maps to the BF16 infinity pattern exactly. The price is
//! roughly three significant decimal digits. Integers up to 256 are exact.

const SIGN_MASK: u16 = 0x8000; // bit 15
const EXP_MASK: u16 = 0x7F80; // bits 14..7

/// BF16 bit pattern of `+inf`, the "unreachable" marker.
pub const BF16_INFINITY: u16 = EXP_MASK;

/// Canonical quiet NaN.
const BF16_NAN: u16 = EXP_MASK | 0x0040;

/// Encode an `f32` to BF16 with round-to-nearest-even.
#[inline(always)]
pub fn f32_to_bf16(val: f32) -> u16 {
    if val.is_nan() {
        return BF16_NAN | ((val.to_bits() >> 16) as u16 & SIGN_MASK);
    }
    let bits = val.to_bits();
    let lsb = (bits >> 16) & 1;
    let rounding_bias = 0x7FFF + lsb;
    (bits.wrapping_add(rounding_bias) >> 16) as u16
}

/// Decode BF16 back to `f32`. Exact.
#[inline(always)]
pub fn bf16_to_f32(bf16: u16) -> f32 {
    f32::from_bits((bf16 as u32) << 16)
}

/// Is the BF16 value finite (neither inf nor NaN)?
#[inline(always)]
pub fn bf16_is_finite(bf16: u16) -> bool {
    bf16 & EXP_MASK != EXP_MASK
}
