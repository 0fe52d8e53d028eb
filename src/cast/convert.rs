//! Per-row primitive conversions shared by the cast kernels.
//!
//! Converters return a user error carrying only the failure detail; the
//! kernel wraps it into the full cast error message and applies the error
//! policy.

use crate::common::constants::MICROS_PER_SECOND;
use crate::common::error::{VexelError, VexelResult};
use crate::internal_err;
use crate::types::LogicalType;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Inclusive bounds of an integral logical type.
pub fn integral_bounds(ty: &LogicalType) -> VexelResult<(i128, i128)> {
    match ty {
        LogicalType::TinyInt => Ok((i8::MIN as i128, i8::MAX as i128)),
        LogicalType::SmallInt => Ok((i16::MIN as i128, i16::MAX as i128)),
        LogicalType::Integer => Ok((i32::MIN as i128, i32::MAX as i128)),
        LogicalType::BigInt => Ok((i64::MIN as i128, i64::MAX as i128)),
        LogicalType::HugeInt => Ok((i128::MIN, i128::MAX)),
        other => Err(internal_err!("Not an integral type: {}", other)),
    }
}

/// Bounds-check a wide integer against the target integral type.
pub fn narrow_integer(value: i128, target: &LogicalType) -> VexelResult<i128> {
    let (min, max) = integral_bounds(target)?;
    if value < min || value > max {
        return Err(VexelError::OutOfRange("Out of bounds.".to_string()));
    }
    Ok(value)
}

/// Whether the byte string is pure ASCII.
pub fn is_ascii(input: &str) -> bool {
    input.is_ascii()
}

/// Parse a string as an integer. Fractional digits are accepted and either
/// truncated or rounded half away from zero depending on `truncate`.
pub fn string_to_integer(input: &str, truncate: bool) -> VexelResult<i128> {
    let bytes = input.as_bytes();
    if bytes.is_empty() {
        return Err(VexelError::Parse("Empty string".to_string()));
    }

    let (negative, rest) = match bytes[0] {
        b'+' => (false, &input[1..]),
        b'-' => (true, &input[1..]),
        _ => (false, input),
    };
    let (integral, fraction) = match rest.find('.') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
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

    let mut value: i128 = 0;
    for b in integral.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as i128))
            .ok_or_else(|| VexelError::OutOfRange("Out of bounds.".to_string()))?;
    }
    if !truncate {
        if let Some(first) = fraction.bytes().next() {
            if first - b'0' >= 5 {
                value = value
                    .checked_add(1)
                    .ok_or_else(|| VexelError::OutOfRange("Out of bounds.".to_string()))?;
            }
        }
    }
    Ok(if negative { -value } else { value })
}

/// Parse a string as a boolean.
pub fn string_to_boolean(input: &str) -> VexelResult<bool> {
    match input.to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err(VexelError::Parse(format!(
            "Value is not a boolean: '{}'",
            input
        ))),
    }
}

/// Parse a string as an f64.
pub fn string_to_double(input: &str) -> VexelResult<f64> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| VexelError::Parse(format!("Value is not a number: '{}'", input)))
}

/// Parse a string as an f32.
pub fn string_to_real(input: &str) -> VexelResult<f32> {
    input
        .trim()
        .parse::<f32>()
        .map_err(|_| VexelError::Parse(format!("Value is not a number: '{}'", input)))
}

/// Convert a float to an integer, truncating or rounding half away from
/// zero, then bounds-check against the target.
pub fn float_to_integer(value: f64, target: &LogicalType, truncate: bool) -> VexelResult<i128> {
    if !value.is_finite() {
        return Err(VexelError::OutOfRange(format!(
            "The value {} is not a finite number",
            value
        )));
    }
    let adjusted = if truncate { value.trunc() } else { value.round() };
    let (min, max) = integral_bounds(target)?;
    if adjusted < min as f64 || adjusted > max as f64 {
        return Err(VexelError::OutOfRange("Out of bounds.".to_string()));
    }
    Ok(adjusted as i128)
}

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

/// Parse a timestamp string. Accepts `YYYY-MM-DD`, with an optional
/// `T` or space separated `HH:MM:SS` and fractional seconds.
pub fn parse_timestamp(input: &str) -> VexelResult<i64> {
    let input = input.trim();
    let parsed = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| {
            VexelError::Parse(format!("Value is not a valid timestamp: '{}'", input))
        })?;
    Ok(parsed.and_utc().timestamp_micros())
}

/// Render a timestamp (microseconds since the epoch). Whole seconds render
/// without a fractional part.
pub fn format_timestamp(micros: i64) -> VexelResult<String> {
    let datetime = chrono::DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| VexelError::OutOfRange(format!("Timestamp out of range: {}", micros)))?
        .naive_utc();
    let base = datetime.format("%Y-%m-%d %H:%M:%S").to_string();
    let fraction = micros.rem_euclid(MICROS_PER_SECOND);
    if fraction == 0 {
        Ok(base)
    } else {
        let digits = format!("{:06}", fraction);
        Ok(format!("{}.{}", base, digits.trim_end_matches('0')))
    }
}

/// Parse a `YYYY-MM-DD` date into days since the epoch.
pub fn parse_date(input: &str) -> VexelResult<i32> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| VexelError::Parse(format!("Value is not a valid date: '{}'", input)))?;
    Ok(date.num_days_from_ce() - epoch_date().num_days_from_ce())
}

/// Render days since the epoch as `YYYY-MM-DD`.
pub fn format_date(days: i32) -> VexelResult<String> {
    epoch_date()
        .checked_add_signed(Duration::days(days as i64))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| VexelError::OutOfRange(format!("Date out of range: {}", days)))
}

/// Days since the epoch to microseconds since the epoch.
pub fn date_to_timestamp(days: i32) -> VexelResult<i64> {
    (days as i64)
        .checked_mul(86_400 * MICROS_PER_SECOND)
        .ok_or_else(|| VexelError::OutOfRange(format!("Date out of range: {}", days)))
}
