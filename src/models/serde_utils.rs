//! Serialize ledger amounts as fixed two-decimal strings (`"150.00"`).
//!
//! Deserialization accepts either a JSON string or a JSON number.

use rust_decimal::Decimal;
use serde::{self, Deserialize, Deserializer, Serializer};

use crate::models::amount::format_amount;

pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_amount(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    <Decimal as Deserialize>::deserialize(deserializer)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "crate::models::serde_utils")]
        amount: Decimal,
    }

    #[test]
    fn test_accepts_string_or_number() {
        let from_str: Holder = serde_json::from_str(r#"{"amount":"15.00"}"#).unwrap();
        let from_num: Holder = serde_json::from_str(r#"{"amount":15}"#).unwrap();
        assert_eq!(from_str.amount, Decimal::new(1500, 2));
        assert_eq!(from_num.amount, Decimal::from(15));
        assert_eq!(serde_json::to_string(&from_num).unwrap(), r#"{"amount":"15.00"}"#);
    }
}
