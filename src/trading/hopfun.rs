//! hop.fun bonding-curve constants, launch-event decoding and supply math.

use crate::error::BotError;
use crate::sui::events::MoveData;

/// Every hop.fun token mints exactly 1 quadrillion base units.
pub const TOTAL_SUPPLY: u128 = 1_000_000_000_000_000;

/// `max_price` argument of `meme::buy`: effectively unbounded.
pub const MAX_PRICE: u64 = 184_467_440_737_095;

pub const SUI_COIN_TYPE: &str = "0x2::sui::SUI";
pub const MIST_PER_SUI: u64 = 1_000_000_000;

/// 8 fractional digits of fixed-point precision for supply percentages.
const PERCENT_SCALE: u128 = 100_000_000;

/// First generic argument of a type signature: `0x..::meme::BondingCurve<T>` -> `T`.
pub fn extract_type_argument(type_signature: &str) -> Option<String> {
    let start = type_signature.find('<')? + 1;
    let len = type_signature[start..].find('>')?;
    let inner = type_signature[start..start + len].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Share of `total` held as a percentage, rounded to 2 decimals.
///
/// The division happens in integers scaled by 1e8 so huge supplies lose no precision
/// before the final conversion to `f64`.
pub fn supply_percentage(balance: u128, total: u128) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scaled = balance.saturating_mul(100).saturating_mul(PERCENT_SCALE) / total;
    let percentage = scaled as f64 / PERCENT_SCALE as f64;
    (percentage * 100.0).round() / 100.0
}

pub fn mist_to_sui(mist: u128) -> f64 {
    mist as f64 / MIST_PER_SUI as f64
}

/// A newly accepted bonding curve, decoded from the connector-acceptance event.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchEvent {
    pub curve_id: String,
    pub creator: String,
    pub coin_name: String,
    pub ticker: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub twitter: Option<String>,
    pub website: Option<String>,
    pub telegram: Option<String>,
}

impl TryFrom<&MoveData> for LaunchEvent {
    type Error = BotError;

    fn try_from(data: &MoveData) -> Result<Self, Self::Error> {
        let required_id = |name: &str| {
            data.field(name)
                .and_then(MoveData::as_hex_id)
                .ok_or_else(|| BotError::DecodeError(format!("launch event missing {}", name)))
        };
        let required_str = |name: &str| {
            data.field(name)
                .and_then(MoveData::as_str)
                .map(str::to_string)
                .ok_or_else(|| BotError::DecodeError(format!("launch event missing {}", name)))
        };
        // Socials arrive either as plain strings or wrapped in an Option
        let optional_str = |name: &str| {
            data.field(name).and_then(|value| {
                value
                    .as_str()
                    .or_else(|| value.as_some().and_then(MoveData::first_string))
                    .map(str::to_string)
            })
        };

        Ok(Self {
            curve_id: required_id("curve_id")?,
            creator: required_id("creator")?,
            coin_name: required_str("coin_name")?,
            ticker: required_str("ticker")?,
            description: optional_str("description"),
            image_url: data
                .field("image_url")
                .and_then(MoveData::as_some)
                .and_then(MoveData::first_string)
                .map(str::to_string),
            twitter: optional_str("twitter"),
            website: optional_str("website"),
            telegram: optional_str("telegram"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_type_argument() {
        assert_eq!(
            extract_type_argument("0xda79::meme::BondingCurve<0xabc::frog::FROG>").as_deref(),
            Some("0xabc::frog::FROG")
        );
        assert_eq!(extract_type_argument("0x2::coin::Coin"), None);
        assert_eq!(extract_type_argument("0x2::coin::Coin<>"), None);
    }

    #[test]
    fn test_supply_percentage_precision() {
        assert_eq!(supply_percentage(123_456_789_000_000, TOTAL_SUPPLY), 12.35);
        assert_eq!(supply_percentage(TOTAL_SUPPLY, TOTAL_SUPPLY), 100.0);
        assert_eq!(supply_percentage(0, TOTAL_SUPPLY), 0.0);
        assert_eq!(supply_percentage(5, 0), 0.0);
    }

    #[test]
    fn test_decode_launch_event() {
        let raw = json!({ "Struct": [
            { "name": "curve_id", "value": { "ID": [1, 2] } },
            { "name": "creator", "value": { "Address": [171, 205] } },
            { "name": "coin_name", "value": { "String": "Frog" } },
            { "name": "ticker", "value": { "String": "FROG" } },
            { "name": "image_url", "value": { "Option": { "Struct": [
                { "name": "url", "value": { "String": "https://images.hop.ag/ipfs/Qm" } }
            ] } } },
            { "name": "twitter", "value": { "String": "https://x.com/frog" } }
        ] });
        let data: MoveData = serde_json::from_value(raw).unwrap();

        let event = LaunchEvent::try_from(&data).unwrap();
        assert_eq!(event.curve_id, "0x0102");
        assert_eq!(event.creator, "0xabcd");
        assert_eq!(event.ticker, "FROG");
        assert_eq!(event.image_url.as_deref(), Some("https://images.hop.ag/ipfs/Qm"));
        assert_eq!(event.twitter.as_deref(), Some("https://x.com/frog"));
        assert!(event.website.is_none());
    }

    #[test]
    fn test_launch_event_requires_creator() {
        let raw = json!({ "Struct": [
            { "name": "curve_id", "value": { "ID": [1] } },
            { "name": "coin_name", "value": { "String": "Frog" } },
            { "name": "ticker", "value": { "String": "FROG" } }
        ] });
        let data: MoveData = serde_json::from_value(raw).unwrap();
        assert!(matches!(LaunchEvent::try_from(&data), Err(BotError::DecodeError(_))));
    }
}
