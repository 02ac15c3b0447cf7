use serde::{Deserialize, Deserializer};

pub mod account;
pub mod accept_quote;
pub mod asset_info;
pub mod capital;
pub mod exchange_info;
pub mod get_quote;
pub mod order_status;
pub mod trade_flow;

/// Venue identifiers arrive as either JSON strings or bare numbers depending
/// on the endpoint (`acceptQuote` returns `"orderId": "933256..."`, while
/// `orderStatus` returns the same id as a number). Normalise both to `String`.
pub(crate) fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(value) => value,
        StringOrNumber::Number(value) => value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "de_string_or_number")]
        order_id: String,
    }

    #[test]
    fn test_string_or_number_ids() {
        let s: Row = serde_json::from_str(r#"{"order_id": "933256278426274426"}"#).unwrap();
        assert_eq!(s.order_id, "933256278426274426");

        let n: Row = serde_json::from_str(r#"{"order_id": 933256278426274426}"#).unwrap();
        assert_eq!(n.order_id, "933256278426274426");
    }
}
