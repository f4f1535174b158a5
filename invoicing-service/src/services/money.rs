//! Two-decimal money rounding shared by every monetary computation.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use service_core::error::AppError;

/// Largest amount a NUMERIC(12,2) column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Round to cents, ties away from zero, always carrying scale 2 (`10` becomes `10.00`).
pub fn round2(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Round `value` and reject it when storage cannot hold it.
pub fn bounded(field: &str, value: Decimal) -> Result<Decimal, AppError> {
    let rounded = round2(value);
    if rounded.abs() > MAX_AMOUNT {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "{} exceeds the maximum amount {}",
            field,
            MAX_AMOUNT
        )));
    }
    Ok(rounded)
}

/// `a * b` rounded and bounded; overflow is a `BadRequest`.
pub fn checked_mul(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    let product = a.checked_mul(b).ok_or_else(|| overflow(field))?;
    bounded(field, product)
}

/// `a + b` rounded and bounded; overflow is a `BadRequest`.
pub fn checked_add(field: &str, a: Decimal, b: Decimal) -> Result<Decimal, AppError> {
    let sum = a.checked_add(b).ok_or_else(|| overflow(field))?;
    bounded(field, sum)
}

fn overflow(field: &str) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("{} is too large", field))
}

/// Serialize a money column with exactly two places. Postgres NUMERIC zero
/// decodes without a scale, so rows read back would otherwise render as `"0"`.
pub fn serialize_cents<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    Serialize::serialize(&round2(*value), serializer)
}
