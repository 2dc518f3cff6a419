//! Credit card details used to pay for an order.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Card networks recognised from the number, checked in order.
static CARD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("VISA", r"^4[0-9]{12}(?:[0-9]{3})?$"),
        ("MASTERCARD", r"^5[1-5][0-9]{14}$"),
        ("AMEX", r"^3[47][0-9]{13}$"),
        ("DINERS", r"^3(?:0[0-5]|[68][0-9])[0-9]{11}$"),
        ("DISCOVER", r"^6(?:011|5[0-9]{2})[0-9]{12}$"),
        ("JCB", r"^(?:2131|1800|35\d{3})\d{11}$"),
        ("ENROUTE", r"^(?:2014|2149)\d{11}$"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("Invalid card regex pattern")))
    .collect()
});

static EXPIRATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("Invalid expiration regex pattern"));

static CVV_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,4}$").expect("Invalid cvv regex pattern"));

/// A payment card.
///
/// Input is normalised on construction: spaces and dashes are removed from
/// the number, `/` from the expiration (`01/27` becomes `0127`).
#[derive(Clone, PartialEq, Eq)]
pub struct CreditCard {
    pub number: String,
    /// `MMYY`
    pub expiration: String,
    pub cvv: String,
    pub zip: String,
    /// Network name, empty when the number matches none.
    pub card_type: String,
}

impl CreditCard {
    pub fn new(number: &str, expiration: &str, cvv: &str, zip: &str) -> Self {
        let number: String = number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        let card_type = find_type(&number).unwrap_or_default().to_string();
        Self {
            expiration: expiration.trim().replace('/', ""),
            cvv: cvv.trim().to_string(),
            zip: zip.trim().to_string(),
            card_type,
            number,
        }
    }

    /// Whether the card looks usable: known network, `MMYY` expiration,
    /// 3-4 digit CVV and a postal code.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.card_type.is_empty()
            && EXPIRATION_PATTERN.is_match(&self.expiration)
            && CVV_PATTERN.is_match(&self.cvv)
            && !self.zip.is_empty()
    }
}

/// Detect the card network from a digits-only number.
#[must_use]
pub fn find_type(number: &str) -> Option<&'static str> {
    CARD_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(number))
        .map(|(name, _)| *name)
}

impl fmt::Debug for CreditCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last4 = self.number.get(self.number.len().saturating_sub(4)..).unwrap_or("");
        f.debug_struct("CreditCard")
            .field("number", &format!("****{last4}"))
            .field("expiration", &self.expiration)
            .field("cvv", &"[REDACTED]")
            .field("zip", &self.zip)
            .field("card_type", &self.card_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("4111111111111111", Some("VISA"))]
    #[case("4222222222222", Some("VISA"))]
    #[case("5500000000000004", Some("MASTERCARD"))]
    #[case("340000000000009", Some("AMEX"))]
    #[case("30000000000004", Some("DINERS"))]
    #[case("6011000000000004", Some("DISCOVER"))]
    #[case("3530111333300000", Some("JCB"))]
    #[case("201400000000009", Some("ENROUTE"))]
    #[case("1234", None)]
    fn test_find_type(#[case] number: &str, #[case] expected: Option<&str>) {
        assert_eq!(find_type(number), expected);
    }

    #[test]
    fn test_new_normalises_input() {
        let card = CreditCard::new("4111 1111-1111 1111", " 01/27 ", " 123", "37916 ");
        assert_eq!(card.number, "4111111111111111");
        assert_eq!(card.expiration, "0127");
        assert_eq!(card.zip, "37916");
        assert_eq!(card.card_type, "VISA");
        assert!(card.is_valid());
    }

    #[test]
    fn test_invalid_card() {
        assert!(!CreditCard::new("1234", "0127", "123", "37916").is_valid());
        assert!(!CreditCard::new("4111111111111111", "127", "123", "37916").is_valid());
        assert!(!CreditCard::new("4111111111111111", "0127", "12", "37916").is_valid());
    }

    #[test]
    fn test_debug_redacts_number() {
        let card = CreditCard::new("4111111111111111", "0127", "123", "37916");
        let debug = format!("{card:?}");
        assert!(debug.contains("****1111"));
        assert!(!debug.contains("4111111111111111"));
        assert!(!debug.contains("123\""));
    }
}
