//! Value Objects for the storefront

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(ValueError::Empty("sku")); }
        if value.len() > 50 { return Err(ValueError::TooLong("sku", 50)); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Sku {
    type Error = ValueError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self { value.0 }
}

/// URL-safe identifier shared by products and categories.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub const MAX_LEN: usize = 120;

    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(ValueError::Empty("slug")); }
        if value.len() > Self::MAX_LEN { return Err(ValueError::TooLong("slug", Self::MAX_LEN)); }
        let url_safe = value.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !url_safe || value.starts_with('-') || value.ends_with('-') {
            return Err(ValueError::Malformed("slug"));
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Slug {
    type Error = ValueError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self { value.0 }
}

/// Customer email, normalized so guest orders can be matched to accounts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_lowercase();
        if value.is_empty() { return Err(ValueError::Empty("email")); }
        let well_formed = matches!(
            value.split_once('@'),
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );
        if !well_formed { return Err(ValueError::Malformed("email")); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }

    /// Compares against a raw, user-supplied address.
    pub fn matches(&self, raw: &str) -> bool { self.0 == raw.trim().to_lowercase() }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for Email {
    type Error = ValueError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Email> for String {
    fn from(value: Email) -> Self { value.0 }
}

/// Human-facing order identifier: `ORD-<base36 millis>-<4 base36 chars>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn parse(value: impl Into<String>) -> Result<Self, ValueError> {
        let value = value.into().trim().to_uppercase();
        let mut parts = value.split('-');
        let valid = matches!(
            (parts.next(), parts.next(), parts.next(), parts.next()),
            (Some("ORD"), Some(stamp), Some(suffix), None)
                if !stamp.is_empty() && is_base36(stamp) && suffix.len() == 4 && is_base36(suffix)
        );
        if !valid { return Err(ValueError::Malformed("order number")); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for OrderNumber {
    type Error = ValueError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self { value.0 }
}

/// Mints order numbers.
///
/// The timestamp component never repeats within one generator: when two
/// numbers are requested in the same millisecond the second borrows the next
/// millisecond. The random suffix only has to separate processes.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    last_millis: AtomicU64,
}

impl OrderNumberGenerator {
    pub fn new() -> Self { Self::default() }

    pub fn next(&self) -> OrderNumber {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_millis.load(Ordering::Acquire);
        let stamp = loop {
            let candidate = now.max(prev + 1);
            match self.last_millis.compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break candidate,
                Err(actual) => prev = actual,
            }
        };
        let mut rng = rand::thread_rng();
        let suffix: String = (0..4).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect();
        OrderNumber(format!("ORD-{}-{}", to_base36(stamp), suffix))
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 { return "0".to_string(); }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

fn is_base36(s: &str) -> bool { s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()) }

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{0} is required")]
    Empty(&'static str),
    #[error("{0} must be at most {1} characters")]
    TooLong(&'static str, usize),
    #[error("{0} is malformed")]
    Malformed(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sku() { let sku = Sku::new("prod-001").unwrap(); assert_eq!(sku.as_str(), "PROD-001"); }

    #[test]
    fn test_slug() {
        assert_eq!(Slug::new(" Smart-Watch-Pro ").unwrap().as_str(), "smart-watch-pro");
        assert_eq!(Slug::new("home & garden"), Err(ValueError::Malformed("slug")));
        assert_eq!(Slug::new("-lead"), Err(ValueError::Malformed("slug")));
        assert_eq!(Slug::new(""), Err(ValueError::Empty("slug")));
    }

    #[test]
    fn test_email_normalized() {
        let email = Email::new("  A@B.com ").unwrap();
        assert_eq!(email.as_str(), "a@b.com");
        assert!(email.matches("a@B.COM"));
        assert!(!email.matches("c@b.com"));
        assert!(Email::new("nobody").is_err());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_order_number_format() {
        let generator = OrderNumberGenerator::new();
        let number = generator.next();
        assert!(number.as_str().starts_with("ORD-"));
        assert_eq!(OrderNumber::parse(number.as_str()).unwrap(), number);
        assert!(OrderNumber::parse("ORD-LX3K9A2-F7QZ").is_ok());
        assert!(OrderNumber::parse("ORD-LX3K9A2-F7Q").is_err());
        assert!(OrderNumber::parse("ORD--F7QZ").is_err());
        assert!(OrderNumber::parse("INV-LX3K9A2-F7QZ").is_err());
    }

    #[test]
    fn test_order_numbers_unique() {
        let generator = OrderNumberGenerator::new();
        let numbers: HashSet<String> = (0..100_000).map(|_| generator.next().to_string()).collect();
        assert_eq!(numbers.len(), 100_000);
        assert!(numbers.iter().all(|n| OrderNumber::parse(n.clone()).is_ok()));
    }
}
