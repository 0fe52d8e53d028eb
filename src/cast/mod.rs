//! Cast evaluation over columnar batches.
//!
//! The cast operator dispatches on the (source kind, target kind) pair and
//! applies per-row conversion under a dialect policy supplied by a
//! [`CastHooks`] object. Per-row failures follow the error policy: try
//! casts null the row, strict casts record a user error into the
//! evaluation context and keep going so one pass can surface every bad
//! row. System errors abort the batch.

pub mod convert;
pub mod decimal;
pub mod hooks;

pub use hooks::{hooks_for_policy, CastHooks, CastPolicy, PrestoCastHooks, SparkCastHooks};

use crate::common::error::{VexelError, VexelResult};
use crate::expression::context::EvalContext;
use crate::internal_err;
use crate::types::{LogicalType, SelectionVector, Value, Vector};
use std::sync::Arc;

/// The per-row cast error message template.
pub fn make_error_message(
    from_type: &LogicalType,
    value: &Value,
    to_type: &LogicalType,
    detail: &str,
) -> String {
    format!("Cannot cast {} '{}' to {}. {}", from_type, value, to_type, detail)
}

/// Evaluates casts between two logical types over a selection of rows.
pub struct CastOperator {
    hooks: Arc<dyn CastHooks>,
    try_cast: bool,
}

impl CastOperator {
    pub fn new(hooks: Arc<dyn CastHooks>, try_cast: bool) -> Self {
        Self { hooks, try_cast }
    }

    /// Whether a failed row nulls the output instead of recording an error.
    fn null_on_error(&self) -> bool {
        self.try_cast || self.hooks.set_null_in_result_at_error()
    }

    /// Cast `input` to `to_type` for every selected row, writing into a
    /// pre-sized output vector.
    pub fn apply(
        &self,
        rows: &SelectionVector,
        input: &Vector,
        to_type: &LogicalType,
        ctx: &mut EvalContext,
    ) -> VexelResult<Vector> {
        let from_type = input.get_type().clone();
        let mut result = ctx.ensure_writable(rows, to_type)?;

        // Decimal-to-string output is bounded; reserve the arena up front.
        if let (LogicalType::Decimal { precision, scale }, LogicalType::Varchar) =
            (&from_type, to_type)
        {
            result.reserve_arena(rows.count() * decimal::max_string_size(*precision, *scale));
        }

        for row in rows.iter() {
            let value = input.get_value(row)?;
            if value.is_null() {
                result.set_null(row);
                continue;
            }
            match self.convert_row(&value, &from_type, to_type) {
                Ok(Some(converted)) => result.set_value(row, &converted)?,
                Ok(None) => result.set_null(row),
                Err(err @ VexelError::UnsupportedCast { .. }) => return Err(err),
                Err(err) if err.is_user_error() => {
                    if self.null_on_error() {
                        result.set_null(row);
                    } else if ctx.capture_error_details() {
                        let message =
                            make_error_message(&from_type, &value, to_type, &err.to_string());
                        ctx.set_error(row, VexelError::CastFailed(message));
                    } else {
                        ctx.set_error(row, VexelError::CastFailed(String::new()));
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    /// Convert a single non-null value. `Ok(None)` nulls the output row
    /// without being an error.
    fn convert_row(
        &self,
        value: &Value,
        from_type: &LogicalType,
        to_type: &LogicalType,
    ) -> VexelResult<Option<Value>> {
        use LogicalType::*;

        if from_type.equivalent(to_type) {
            return Ok(Some(value.clone()));
        }

        match (from_type, to_type) {
            // ---- decimal source ----
            (Decimal { scale, .. }, _) => {
                let unscaled = value.try_as_i128()?;
                self.convert_from_decimal(unscaled, *scale, to_type)
            }

            // ---- decimal target ----
            (Boolean, Decimal { precision, scale }) => {
                let int = value.try_as_boolean()? as i128;
                Ok(decimal::rescale_int(int, *precision, *scale)
                    .map(|v| Value::decimal(v, *precision, *scale)))
            }
            (f, Decimal { precision, scale }) if f.is_integral() => {
                Ok(decimal::rescale_int(value.try_as_i128()?, *precision, *scale)
                    .map(|v| Value::decimal(v, *precision, *scale)))
            }
            (f, Decimal { precision, scale }) if f.is_floating_point() => {
                let unscaled = decimal::rescale_float(value.try_as_f64()?, *precision, *scale)?;
                Ok(Some(Value::decimal(unscaled, *precision, *scale)))
            }
            (Varchar, Decimal { precision, scale }) => {
                let input = value.try_as_string()?;
                let stripped = self.hooks.remove_white_spaces(&input);
                let unscaled = decimal::parse_string(stripped, *precision, *scale)?;
                Ok(Some(Value::decimal(unscaled, *precision, *scale)))
            }

            // ---- string source ----
            (Varchar | Varbinary, _) => {
                let input = match value {
                    Value::Varchar(s) => s.clone(),
                    Value::Varbinary(b) => String::from_utf8(b.clone()).map_err(|_| {
                        VexelError::Parse("Invalid UTF-8 sequence".to_string())
                    })?,
                    _ => value.try_as_string()?,
                };
                self.convert_from_string(&input, to_type)
            }

            // ---- boolean source ----
            (Boolean, t) if t.is_integral() => {
                let int = value.try_as_boolean()? as i128;
                Ok(Some(integer_value(int, to_type)?))
            }
            (Boolean, Real) => Ok(Some(Value::Real(value.try_as_boolean()? as u8 as f32))),
            (Boolean, Double) => Ok(Some(Value::Double(value.try_as_boolean()? as u8 as f64))),
            (Boolean, Timestamp) => {
                let micros = self.hooks.cast_boolean_to_timestamp(value.try_as_boolean()?)?;
                Ok(Some(Value::Timestamp(micros)))
            }
            (Boolean, Varchar) => Ok(Some(Value::Varchar(
                if value.try_as_boolean()? { "true" } else { "false" }.to_string(),
            ))),

            // ---- integral source ----
            (f, Boolean) if f.is_integral() => {
                Ok(Some(Value::Boolean(value.try_as_i128()? != 0)))
            }
            (f, t) if f.is_integral() && t.is_integral() => {
                let narrowed = convert::narrow_integer(value.try_as_i128()?, to_type)?;
                Ok(Some(integer_value(narrowed, to_type)?))
            }
            (f, Real) if f.is_integral() => {
                Ok(Some(Value::Real(value.try_as_i128()? as f32)))
            }
            (f, Double) if f.is_integral() => {
                Ok(Some(Value::Double(value.try_as_i128()? as f64)))
            }
            (f, Timestamp) if f.is_integral() => {
                let seconds = i64::try_from(value.try_as_i128()?).map_err(|_| {
                    VexelError::OutOfRange("Out of bounds.".to_string())
                })?;
                let micros = self.hooks.cast_int_to_timestamp(seconds)?;
                Ok(Some(Value::Timestamp(micros)))
            }
            (f, Varchar) if f.is_integral() => {
                Ok(Some(Value::Varchar(value.try_as_i128()?.to_string())))
            }

            // ---- floating point source ----
            (f, Boolean) if f.is_floating_point() => {
                Ok(Some(Value::Boolean(value.try_as_f64()? != 0.0)))
            }
            (f, t) if f.is_floating_point() && t.is_integral() => {
                let narrowed =
                    convert::float_to_integer(value.try_as_f64()?, to_type, self.hooks.truncate())?;
                Ok(Some(integer_value(narrowed, to_type)?))
            }
            (f, Real) if f.is_floating_point() => {
                Ok(Some(Value::Real(value.try_as_f64()? as f32)))
            }
            (f, Double) if f.is_floating_point() => {
                Ok(Some(Value::Double(value.try_as_f64()?)))
            }
            (f, Timestamp) if f.is_floating_point() => {
                let micros = self.hooks.cast_double_to_timestamp(value.try_as_f64()?)?;
                Ok(micros.map(Value::Timestamp))
            }
            (f, Varchar) if f.is_floating_point() => {
                Ok(Some(Value::Varchar(value.try_as_f64()?.to_string())))
            }

            // ---- temporal source ----
            (Timestamp, t) if t.is_integral() => {
                let seconds = self.hooks.cast_timestamp_to_int(value.try_as_i64()?)?;
                let narrowed = convert::narrow_integer(seconds as i128, to_type)?;
                Ok(Some(integer_value(narrowed, to_type)?))
            }
            (Timestamp, Varchar) => Ok(Some(Value::Varchar(convert::format_timestamp(
                value.try_as_i64()?,
            )?))),
            (Timestamp, Date) => {
                let micros = value.try_as_i64()?;
                Ok(Some(Value::Date(
                    micros.div_euclid(86_400 * crate::common::constants::MICROS_PER_SECOND) as i32,
                )))
            }
            (Date, Timestamp) => match value {
                Value::Date(days) => {
                    Ok(Some(Value::Timestamp(convert::date_to_timestamp(*days)?)))
                }
                _ => Err(internal_err!("Date vector holds non-date")),
            },
            (Date, Varchar) => match value {
                Value::Date(days) => Ok(Some(Value::Varchar(convert::format_date(*days)?))),
                _ => Err(internal_err!("Date vector holds non-date")),
            },

            (from, to) => Err(VexelError::UnsupportedCast {
                from: from.to_string(),
                to: to.to_string(),
            }),
        }
    }

    fn convert_from_decimal(
        &self,
        unscaled: i128,
        scale: u8,
        to_type: &LogicalType,
    ) -> VexelResult<Option<Value>> {
        use LogicalType::*;

        let scale_factor = decimal::POWERS_OF_TEN[scale as usize];
        match to_type {
            Boolean => Ok(Some(Value::Boolean(unscaled != 0))),
            t if t.is_integral() => {
                let mut integral = unscaled / scale_factor;
                if !self.hooks.truncate() && self.hooks.policy() != CastPolicy::SparkTry {
                    let fraction = unscaled % scale_factor;
                    let sign = if unscaled >= 0 { 1 } else { -1 };
                    if scale_factor != 1 && sign * fraction * 2 >= scale_factor {
                        integral += sign;
                    }
                }
                let narrowed = convert::narrow_integer(integral, to_type)?;
                Ok(Some(integer_value(narrowed, to_type)?))
            }
            Real => Ok(Some(Value::Real(
                (unscaled as f64 / scale_factor as f64) as f32,
            ))),
            Double => Ok(Some(Value::Double(unscaled as f64 / scale_factor as f64))),
            Varchar => Ok(Some(Value::Varchar(decimal::to_string(unscaled, scale)))),
            Decimal { precision, scale: to_scale } => {
                let rescaled = decimal::rescale(unscaled, scale, *precision, *to_scale)?;
                Ok(Some(Value::decimal(rescaled, *precision, *to_scale)))
            }
            other => Err(VexelError::UnsupportedCast {
                from: format!("DECIMAL with scale {}", scale),
                to: other.to_string(),
            }),
        }
    }

    fn convert_from_string(
        &self,
        input: &str,
        to_type: &LogicalType,
    ) -> VexelResult<Option<Value>> {
        use LogicalType::*;

        // Fixed-width targets other than TIMESTAMP strip configured
        // whitespace first; an empty result is a failure, not a zero.
        let stripped = if to_type.is_fixed_width() && *to_type != Timestamp {
            let stripped = self.hooks.remove_white_spaces(input);
            if stripped.is_empty() {
                return Err(VexelError::Parse("Empty string".to_string()));
            }
            stripped
        } else {
            input
        };

        match to_type {
            Timestamp => Ok(Some(Value::Timestamp(
                self.hooks.cast_string_to_timestamp(input)?,
            ))),
            Real => Ok(Some(Value::Real(self.hooks.cast_string_to_real(stripped)?))),
            Double => Ok(Some(Value::Double(
                self.hooks.cast_string_to_double(stripped)?,
            ))),
            Boolean => Ok(Some(Value::Boolean(convert::string_to_boolean(stripped)?))),
            Date => Ok(Some(Value::Date(convert::parse_date(stripped)?))),
            t if t.is_integral() => {
                if self.hooks.policy().throw_on_unicode() && !convert::is_ascii(stripped) {
                    return Err(VexelError::Parse(
                        "Unicode characters are not supported for conversion to integer types"
                            .to_string(),
                    ));
                }
                let wide = convert::string_to_integer(stripped, self.hooks.truncate())?;
                let narrowed = convert::narrow_integer(wide, to_type)?;
                Ok(Some(integer_value(narrowed, to_type)?))
            }
            Varbinary => Ok(Some(Value::Varbinary(input.as_bytes().to_vec()))),
            Varchar => Ok(Some(Value::Varchar(input.to_string()))),
            other => Err(VexelError::UnsupportedCast {
                from: LogicalType::Varchar.to_string(),
                to: other.to_string(),
            }),
        }
    }
}

/// Wrap a bounds-checked wide integer into the value for an integral type.
fn integer_value(value: i128, ty: &LogicalType) -> VexelResult<Value> {
    Ok(match ty {
        LogicalType::TinyInt => Value::TinyInt(value as i8),
        LogicalType::SmallInt => Value::SmallInt(value as i16),
        LogicalType::Integer => Value::Integer(value as i32),
        LogicalType::BigInt => Value::BigInt(value as i64),
        LogicalType::HugeInt => Value::HugeInt(value),
        other => return Err(internal_err!("Not an integral type: {}", other)),
    })
}
