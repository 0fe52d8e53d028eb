//! Dialect policy hooks for cast evaluation.
//!
//! A hooks object selects the observable dialect behaviors of a cast:
//! whitespace handling, fractional truncation, unicode rejection and the
//! temporal conversions that differ between dialects.

use crate::cast::convert;
use crate::common::constants::MICROS_PER_SECOND;
use crate::common::error::{VexelError, VexelResult};
use std::sync::Arc;

/// The cast dialect policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastPolicy {
    /// Back-compat behavior; identical to `Presto` today.
    Legacy,
    /// Strict errors, half-up rounding.
    Presto,
    /// Rejects unicode in string-to-integer casts, truncates fractions.
    Spark,
    /// Spark semantics with null-on-error.
    SparkTry,
}

impl CastPolicy {
    /// Whether string-to-integer casts reject non-ASCII input.
    pub fn throw_on_unicode(&self) -> bool {
        matches!(self, CastPolicy::Spark | CastPolicy::SparkTry)
    }
}

/// Dialect behavior injected into cast kernels.
pub trait CastHooks: Send + Sync {
    fn policy(&self) -> CastPolicy;

    /// Whether fractional parts are truncated instead of rounded.
    fn truncate(&self) -> bool;

    /// Strip surrounding whitespace from string input.
    fn remove_white_spaces<'a>(&self, input: &'a str) -> &'a str {
        input.trim()
    }

    fn cast_string_to_timestamp(&self, input: &str) -> VexelResult<i64>;

    fn cast_string_to_real(&self, input: &str) -> VexelResult<f32> {
        convert::string_to_real(input)
    }

    fn cast_string_to_double(&self, input: &str) -> VexelResult<f64> {
        convert::string_to_double(input)
    }

    /// Integer seconds to a timestamp.
    fn cast_int_to_timestamp(&self, seconds: i64) -> VexelResult<i64>;

    fn cast_boolean_to_timestamp(&self, value: bool) -> VexelResult<i64>;

    /// Fractional seconds to a timestamp; `None` nulls the row.
    fn cast_double_to_timestamp(&self, seconds: f64) -> VexelResult<Option<i64>>;

    /// Timestamp to integer seconds.
    fn cast_timestamp_to_int(&self, micros: i64) -> VexelResult<i64> {
        Ok(micros.div_euclid(MICROS_PER_SECOND))
    }

    /// Whether a failed row nulls the output instead of recording an error.
    fn set_null_in_result_at_error(&self) -> bool {
        self.policy() == CastPolicy::SparkTry
    }
}

fn seconds_to_micros(seconds: i64) -> VexelResult<i64> {
    seconds
        .checked_mul(MICROS_PER_SECOND)
        .ok_or_else(|| VexelError::OutOfRange(format!("Timestamp out of range: {}", seconds)))
}

/// Strict Presto-style hooks. Also carries the legacy policy, which only
/// differs in name.
#[derive(Debug)]
pub struct PrestoCastHooks {
    policy: CastPolicy,
}

impl PrestoCastHooks {
    pub fn new() -> Self {
        Self {
            policy: CastPolicy::Presto,
        }
    }

    pub fn legacy() -> Self {
        Self {
            policy: CastPolicy::Legacy,
        }
    }
}

impl Default for PrestoCastHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl CastHooks for PrestoCastHooks {
    fn policy(&self) -> CastPolicy {
        self.policy
    }

    fn truncate(&self) -> bool {
        false
    }

    fn cast_string_to_timestamp(&self, input: &str) -> VexelResult<i64> {
        convert::parse_timestamp(input)
    }

    fn cast_int_to_timestamp(&self, seconds: i64) -> VexelResult<i64> {
        seconds_to_micros(seconds)
    }

    fn cast_boolean_to_timestamp(&self, _value: bool) -> VexelResult<i64> {
        Err(VexelError::Parse(
            "Conversion from BOOLEAN to TIMESTAMP is not supported".to_string(),
        ))
    }

    fn cast_double_to_timestamp(&self, _seconds: f64) -> VexelResult<Option<i64>> {
        Err(VexelError::Parse(
            "Conversion from DOUBLE to TIMESTAMP is not supported".to_string(),
        ))
    }
}

/// Spark-style hooks: fractions truncate, unicode input to integer casts
/// is rejected, and the try variant nulls failed rows.
#[derive(Debug)]
pub struct SparkCastHooks {
    policy: CastPolicy,
}

impl SparkCastHooks {
    pub fn new() -> Self {
        Self {
            policy: CastPolicy::Spark,
        }
    }

    pub fn try_cast() -> Self {
        Self {
            policy: CastPolicy::SparkTry,
        }
    }
}

impl Default for SparkCastHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl CastHooks for SparkCastHooks {
    fn policy(&self) -> CastPolicy {
        self.policy
    }

    fn truncate(&self) -> bool {
        true
    }

    fn cast_string_to_timestamp(&self, input: &str) -> VexelResult<i64> {
        convert::parse_timestamp(input)
    }

    fn cast_int_to_timestamp(&self, seconds: i64) -> VexelResult<i64> {
        seconds_to_micros(seconds)
    }

    fn cast_boolean_to_timestamp(&self, value: bool) -> VexelResult<i64> {
        Ok(if value { MICROS_PER_SECOND } else { 0 })
    }

    fn cast_double_to_timestamp(&self, seconds: f64) -> VexelResult<Option<i64>> {
        if !seconds.is_finite() {
            return Ok(None);
        }
        let micros = seconds * MICROS_PER_SECOND as f64;
        if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
            return Ok(None);
        }
        Ok(Some(micros as i64))
    }
}

/// The hooks matching a policy value.
pub fn hooks_for_policy(policy: CastPolicy) -> Arc<dyn CastHooks> {
    match policy {
        CastPolicy::Legacy => Arc::new(PrestoCastHooks::legacy()),
        CastPolicy::Presto => Arc::new(PrestoCastHooks::new()),
        CastPolicy::Spark => Arc::new(SparkCastHooks::new()),
        CastPolicy::SparkTry => Arc::new(SparkCastHooks::try_cast()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_flags() {
        assert!(!CastPolicy::Presto.throw_on_unicode());
        assert!(CastPolicy::Spark.throw_on_unicode());
        assert!(CastPolicy::SparkTry.throw_on_unicode());
    }

    #[test]
    fn test_presto_hooks() {
        let hooks = PrestoCastHooks::new();
        assert!(!hooks.truncate());
        assert!(!hooks.set_null_in_result_at_error());
        assert_eq!(
            hooks.cast_int_to_timestamp(1000).unwrap(),
            1000 * MICROS_PER_SECOND
        );
        assert!(hooks.cast_boolean_to_timestamp(true).is_err());
        assert_eq!(hooks.remove_white_spaces("  12 "), "12");
    }

    #[test]
    fn test_spark_try_hooks() {
        let hooks = SparkCastHooks::try_cast();
        assert!(hooks.truncate());
        assert!(hooks.set_null_in_result_at_error());
        assert_eq!(hooks.cast_double_to_timestamp(f64::NAN).unwrap(), None);
        assert_eq!(
            hooks.cast_double_to_timestamp(1.5).unwrap(),
            Some(1_500_000)
        );
        assert_eq!(
            hooks.cast_boolean_to_timestamp(true).unwrap(),
            MICROS_PER_SECOND
        );
    }

    #[test]
    fn test_timestamp_to_int_floors() {
        let hooks = PrestoCastHooks::new();
        assert_eq!(hooks.cast_timestamp_to_int(1_500_000).unwrap(), 1);
        assert_eq!(hooks.cast_timestamp_to_int(-1_500_000).unwrap(), -2);
    }
}
