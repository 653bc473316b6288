/// Serde helpers for rows returned by the hosted backend.
///
/// Identifiers are opaque: depending on the table definition PostgREST sends
/// them as JSON strings (uuid) or numbers (bigint). Amounts are `numeric`
/// columns which arrive as JSON numbers, or as strings when the column is
/// configured for exact output. Both are normalised here so the rest of the
/// crate only sees `String` ids and integer cents.
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Int(i64),
    UInt(u64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Number(f64),
    Text(String),
}

pub fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => Ok(s),
        IdRepr::Int(n) => Ok(n.to_string()),
        IdRepr::UInt(n) => Ok(n.to_string()),
    }
}

pub fn deserialize_cents<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match AmountRepr::deserialize(deserializer)? {
        AmountRepr::Number(n) => n,
        AmountRepr::Text(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)?,
    };
    cents_from_decimal(value)
        .ok_or_else(|| serde::de::Error::custom(format!("amount {} is out of range", value)))
}

pub fn serialize_cents<S>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(cents_to_decimal(*cents))
}

/// `null` and missing text columns both become an empty string.
pub fn deserialize_text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Largest magnitude a single amount may have: one trillion whole units.
/// Sums over any realistic number of rows stay far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000;

/// Whole cents for `amount`, or `None` when it is not finite or its
/// magnitude exceeds [`MAX_AMOUNT_CENTS`].
pub fn cents_from_decimal(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    let cents = (amount * 100.0).round();
    if cents.abs() > MAX_AMOUNT_CENTS as f64 {
        return None;
    }
    Some(cents as i64)
}

pub fn cents_to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}
