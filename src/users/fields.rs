use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

use super::error::UserError;

// Declared widths of the users columns, in characters.
pub const FIRST_NAME_MAX: usize = 50;
pub const LAST_NAME_MAX: usize = 50;
pub const COUNTRY_MAX: usize = 50;
pub const PHONE_MAX: usize = 20;
pub const EMAIL_MAX: usize = 100;
pub const PASSWORD_MAX: usize = 255;
pub const ROLE_MAX: usize = 20;

pub const DEFAULT_ROLE: &str = "user";

/// Fractional digits carried by `balance NUMERIC(10,2)`.
pub const BALANCE_SCALE: u32 = 2;
/// Integer digits left for `balance` (10 total minus 2 fractional).
const BALANCE_INTEGER_DIGITS: u32 = 8;

pub fn check_width(field: &'static str, value: &str, max: usize) -> Result<(), UserError> {
    if value.chars().count() > max {
        return Err(UserError::FieldTooLong { field, max });
    }
    Ok(())
}

/// A normalized email address: trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return Err(UserError::MissingField("email"));
        }
        check_width("email", &email, EMAIL_MAX)?;
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Email {
    type Error = UserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account balance with exactly two fractional digits.
///
/// Values that would need rounding to fit are rejected, so what is stored is
/// always what the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Balance(Decimal);

impl Balance {
    pub const ZERO: Balance = Balance(Decimal::from_parts(0, 0, 0, false, BALANCE_SCALE));

    pub fn new(value: Decimal) -> Result<Self, UserError> {
        let mut value = value.normalize();
        if value.scale() > BALANCE_SCALE {
            return Err(UserError::BalancePrecision(value.to_string()));
        }
        if value.abs() >= Decimal::from(10_i64.pow(BALANCE_INTEGER_DIGITS)) {
            return Err(UserError::BalanceOutOfRange(value.to_string()));
        }
        value.rescale(BALANCE_SCALE);
        Ok(Self(value))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Wraps a value read back from `balance`. Postgres drops the scale of
    /// some values (the `0.00` default arrives as `0`), so it is restored here.
    fn from_column(mut value: Decimal) -> Self {
        value.rescale(BALANCE_SCALE);
        Self(value)
    }
}

impl Type<Postgres> for Balance {
    fn type_info() -> PgTypeInfo {
        <Decimal as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <Decimal as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Balance {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let amount = <Decimal as Decode<'r, Postgres>>::decode(value)?;
        Ok(Self::from_column(amount))
    }
}

impl<'q> Encode<'q, Postgres> for Balance {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
        <Decimal as Encode<'q, Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<Decimal> for Balance {
    type Error = UserError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Balance> for Decimal {
    fn from(value: Balance) -> Self {
        value.0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role label stored in `users.role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "String", into = "String")]
#[sqlx(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(raw: &str) -> Result<Self, UserError> {
        let role = raw.trim();
        if role.is_empty() {
            return Err(UserError::MissingField("role"));
        }
        check_width("role", role, ROLE_MAX)?;
        Ok(Self(role.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Role {
    fn default() -> Self {
        Self(DEFAULT_ROLE.to_string())
    }
}

impl TryFrom<String> for Role {
    type Error = UserError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = Email::parse("  Alice@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "alice@example.com");
    }

    #[test]
    fn email_rejects_blank_and_overlong() {
        assert!(matches!(Email::parse("   "), Err(UserError::MissingField("email"))));
        let long = format!("{}@example.com", "a".repeat(EMAIL_MAX));
        assert!(matches!(
            Email::parse(&long),
            Err(UserError::FieldTooLong { field: "email", max: EMAIL_MAX })
        ));
    }

    #[test]
    fn balance_pads_to_two_digits() {
        assert_eq!(Balance::new(dec("10")).unwrap().to_string(), "10.00");
        assert_eq!(Balance::new(dec("10.5")).unwrap().to_string(), "10.50");
        assert_eq!(Balance::new(dec("-3.25")).unwrap().to_string(), "-3.25");
        assert_eq!(Balance::ZERO.to_string(), "0.00");
        assert_eq!(Balance::default(), Balance::ZERO);
    }

    #[test]
    fn balance_accepts_trailing_zeros_beyond_scale() {
        assert_eq!(Balance::new(dec("10.500")).unwrap().to_string(), "10.50");
    }

    #[test]
    fn balance_rejects_extra_precision() {
        assert!(matches!(
            Balance::new(dec("10.005")),
            Err(UserError::BalancePrecision(_))
        ));
    }

    #[test]
    fn balance_rejects_values_wider_than_column() {
        assert!(Balance::new(dec("99999999.99")).is_ok());
        assert!(matches!(
            Balance::new(dec("100000000")),
            Err(UserError::BalanceOutOfRange(_))
        ));
        assert!(matches!(
            Balance::new(dec("-100000000.00")),
            Err(UserError::BalanceOutOfRange(_))
        ));
    }

    #[test]
    fn balance_read_from_column_keeps_two_digits() {
        // NUMERIC zero comes off the wire with scale 0.
        let stored = Balance::from_column(Decimal::ZERO);
        assert_eq!(stored.to_string(), "0.00");
        assert_eq!(stored.amount().scale(), BALANCE_SCALE);
        assert_eq!(serde_json::to_string(&stored).unwrap(), "\"0.00\"");

        assert_eq!(Balance::from_column(Decimal::from(10)).to_string(), "10.00");
        assert_eq!(Balance::from_column(dec("10.01")).to_string(), "10.01");
    }

    #[test]
    fn balance_maps_to_numeric() {
        assert_eq!(
            <Balance as Type<Postgres>>::type_info(),
            <Decimal as Type<Postgres>>::type_info()
        );
    }

    #[test]
    fn balance_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Balance::new(dec("10")).unwrap()).unwrap();
        assert_eq!(json, "\"10.00\"");

        let back: Balance = serde_json::from_str("\"7.1\"").unwrap();
        assert_eq!(back.to_string(), "7.10");

        assert!(serde_json::from_str::<Balance>("\"1.001\"").is_err());
    }

    #[test]
    fn role_defaults_to_user() {
        assert_eq!(Role::default().as_str(), DEFAULT_ROLE);
        assert_eq!(Role::new(" admin ").unwrap().as_str(), "admin");
        assert!(Role::new("").is_err());
        assert!(Role::new(&"r".repeat(ROLE_MAX + 1)).is_err());
    }

    #[test]
    fn width_counts_characters_not_bytes() {
        let name = "é".repeat(FIRST_NAME_MAX);
        assert!(check_width("first_name", &name, FIRST_NAME_MAX).is_ok());
        assert!(check_width("first_name", &format!("{name}x"), FIRST_NAME_MAX).is_err());
    }
}
