use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Best-effort conversion of a mobile number to the international form the
/// provider expects (`2547XXXXXXXX` for the default calling code).
///
/// `+` and spaces are stripped, a leading national `0` is replaced by the
/// calling code and numbers without the calling code get it prepended.
/// Anything else is passed through untouched.
pub fn normalize_phone(phone: &str, country_code: &str) -> String {
    let digits: String = phone.chars().filter(|c| *c != '+' && *c != ' ').collect();
    if let Some(national) = digits.strip_prefix('0') {
        format!("{country_code}{national}")
    } else if digits.starts_with(country_code) {
        digits
    } else {
        format!("{country_code}{digits}")
    }
}

/// Payer email used for collection requests when the caller supplies none.
pub fn fallback_email(wallet_id: &str, domain: &str) -> String {
    format!("wallet-{wallet_id}@{domain}")
}

/// Reads an amount that may arrive as a JSON number or a numeric string.
/// `NaN` and infinities are not amounts.
pub fn amount_from_value(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    amount.is_finite().then_some(amount)
}

/// First field among `keys` that holds a readable, non-negative amount.
/// Negative figures are skipped like missing ones.
pub fn amount_field(payload: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .filter_map(amount_from_value)
        .find(|amount| *amount >= 0.0)
}

/// String view of a payload field; numbers are rendered, nulls are skipped.
pub fn string_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

pub fn de_optional_amount<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => amount_from_value(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {value}"))),
    }
}

pub fn de_amount<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    de_optional_amount(d)?.ok_or_else(|| serde::de::Error::custom("amount is missing"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_national_prefix() {
        assert_eq!(normalize_phone("0712345678", "254"), "254712345678");
    }

    #[test]
    fn normalizes_plus_and_spaces() {
        assert_eq!(normalize_phone("+254 712 345 678", "254"), "254712345678");
    }

    #[test]
    fn prepends_missing_country_code() {
        assert_eq!(normalize_phone("712345678", "254"), "254712345678");
    }

    #[test]
    fn keeps_already_international_numbers() {
        assert_eq!(normalize_phone("254712345678", "254"), "254712345678");
    }

    #[test]
    fn passes_malformed_numbers_through_with_prefix() {
        assert_eq!(normalize_phone("abc", "254"), "254abc");
    }

    #[test]
    fn reads_amounts_from_numbers_and_strings() {
        assert_eq!(amount_from_value(&json!(150)), Some(150.0));
        assert_eq!(amount_from_value(&json!("99.50")), Some(99.5));
        assert_eq!(amount_from_value(&json!("n/a")), None);
        assert_eq!(amount_from_value(&json!(null)), None);
    }

    #[test]
    fn non_finite_strings_are_not_amounts() {
        assert_eq!(amount_from_value(&json!("NaN")), None);
        assert_eq!(amount_from_value(&json!("inf")), None);
        assert_eq!(amount_from_value(&json!("-infinity")), None);
    }

    #[test]
    fn amount_field_skips_negative_figures() {
        assert_eq!(amount_field(&json!({ "value": "-500" }), &["value"]), None);
        let payload = json!({ "value": -5, "amount": "20" });
        assert_eq!(amount_field(&payload, &["value", "amount"]), Some(20.0));
        assert_eq!(amount_field(&json!({ "amount": 0 }), &["amount"]), Some(0.0));
    }

    #[test]
    fn amount_field_falls_back_in_order() {
        let payload = json!({ "amount": "20" });
        assert_eq!(amount_field(&payload, &["value", "amount"]), Some(20.0));
        let payload = json!({ "value": 5, "amount": "20" });
        assert_eq!(amount_field(&payload, &["value", "amount"]), Some(5.0));
        assert_eq!(amount_field(&json!({}), &["value"]), None);
    }

    #[test]
    fn fallback_email_uses_wallet_id() {
        assert_eq!(
            fallback_email("ABC123", "university.ac.ke"),
            "wallet-ABC123@university.ac.ke"
        );
    }
}
