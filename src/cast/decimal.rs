//! Decimal conversion utilities.
//!
//! Decimals are stored as `i128` scaled by `10^scale`. All conversions here
//! return user errors for values that do not fit the target precision,
//! except `rescale_int` which reports overflow as `None`.

use crate::common::error::{VexelError, VexelResult};

/// Powers of ten up to the maximum decimal precision.
pub const POWERS_OF_TEN: [i128; 39] = {
    let mut table = [1i128; 39];
    let mut i = 1;
    while i < 39 {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
};

/// The largest unscaled value representable at the given precision.
#[inline]
pub fn max_for_precision(precision: u8) -> i128 {
    POWERS_OF_TEN[precision as usize] - 1
}

/// Rescale a decimal value between precisions and scales, rounding half
/// away from zero when reducing scale.
pub fn rescale(
    value: i128,
    from_scale: u8,
    to_precision: u8,
    to_scale: u8,
) -> VexelResult<i128> {
    let rescaled = if to_scale >= from_scale {
        let factor = POWERS_OF_TEN[(to_scale - from_scale) as usize];
        value.checked_mul(factor).ok_or_else(|| {
            VexelError::OutOfRange(format!(
                "Value {} cannot be rescaled to scale {}",
                value, to_scale
            ))
        })?
    } else {
        let factor = POWERS_OF_TEN[(from_scale - to_scale) as usize];
        let mut quotient = value / factor;
        let remainder = value % factor;
        if remainder.abs() * 2 >= factor {
            quotient += if value >= 0 { 1 } else { -1 };
        }
        quotient
    };

    if rescaled.abs() > max_for_precision(to_precision) {
        return Err(VexelError::OutOfRange(format!(
            "Value {} exceeds precision {}",
            rescaled, to_precision
        )));
    }
    Ok(rescaled)
}

/// Rescale an integer into a decimal's unscaled representation.
/// Overflow is reported as `None`, which callers turn into a null row.
pub fn rescale_int(value: i128, to_precision: u8, to_scale: u8) -> Option<i128> {
    let scaled = value.checked_mul(POWERS_OF_TEN[to_scale as usize])?;
    (scaled.abs() <= max_for_precision(to_precision)).then_some(scaled)
}

/// Rescale a floating point number into a decimal's unscaled
/// representation, rounding half away from zero.
pub fn rescale_float(value: f64, to_precision: u8, to_scale: u8) -> VexelResult<i128> {
    if !value.is_finite() {
        return Err(VexelError::OutOfRange(format!(
            "The value {} is not a finite number",
            value
        )));
    }
    let scaled = value * POWERS_OF_TEN[to_scale as usize] as f64;
    // f64::round rounds half away from zero.
    let rounded = scaled.round();
    let limit = max_for_precision(to_precision);
    if rounded.abs() > limit as f64 {
        return Err(VexelError::OutOfRange(format!(
            "Value {} exceeds precision {}",
            value, to_precision
        )));
    }
    Ok(rounded as i128)
}

/// Parse a decimal string into the unscaled representation for the target
/// precision and scale. Extra fractional digits round half away from zero.
pub fn parse_string(input: &str, to_precision: u8, to_scale: u8) -> VexelResult<i128> {
    let input = input.trim();
    if input.is_empty() {
        return Err(VexelError::Parse("Empty string".to_string()));
    }

    let (negative, digits) = match input.as_bytes()[0] {
        b'+' => (false, &input[1..]),
        b'-' => (true, &input[1..]),
        _ => (false, input),
    };

    let (integral, fraction) = match digits.find('.') {
        Some(pos) => (&digits[..pos], &digits[pos + 1..]),
        None => (digits, ""),
    };
    if integral.is_empty() && fraction.is_empty() {
        return Err(VexelError::Parse(format!(
            "Value is not a number: '{}'",
            input
        )));
    }
    if !integral.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(VexelError::Parse(format!(
            "Value is not a number: '{}'",
            input
        )));
    }

    let mut unscaled: i128 = 0;
    let overflow = || {
        VexelError::OutOfRange(format!(
            "Value '{}' exceeds precision {}",
            input, to_precision
        ))
    };
    for b in integral.bytes() {
        unscaled = unscaled
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i128))
            .ok_or_else(overflow)?;
    }
    for i in 0..to_scale as usize {
        let digit = fraction.as_bytes().get(i).map(|b| b - b'0').unwrap_or(0);
        unscaled = unscaled
            .checked_mul(10)
            .and_then(|v| v.checked_add(digit as i128))
            .ok_or_else(overflow)?;
    }
    // Round on the first dropped fractional digit.
    if let Some(next) = fraction.as_bytes().get(to_scale as usize) {
        if *next - b'0' >= 5 {
            unscaled = unscaled.checked_add(1).ok_or_else(overflow)?;
        }
    }

    if unscaled > max_for_precision(to_precision) {
        return Err(overflow());
    }
    Ok(if negative { -unscaled } else { unscaled })
}

/// Render an unscaled decimal value at the given scale.
pub fn to_string(value: i128, scale: u8) -> String {
    if scale == 0 {
        return value.to_string();
    }
    let divisor = POWERS_OF_TEN[scale as usize];
    let integral = value / divisor;
    let fraction = (value % divisor).abs();
    let sign = if value < 0 && integral == 0 { "-" } else { "" };
    format!(
        "{}{}.{:0width$}",
        sign,
        integral,
        fraction,
        width = scale as usize
    )
}

/// Upper bound on the rendered length of a decimal with the given
/// precision and scale: sign, integral digits (at least one), dot and
/// fractional digits. Used to pre-size output arenas.
pub fn max_string_size(precision: u8, scale: u8) -> usize {
    let integral = (precision.saturating_sub(scale)).max(1) as usize;
    let fractional = if scale > 0 { 1 + scale as usize } else { 0 };
    1 + integral + fractional
}
