//! Shipping addresses.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use warung_core::{AddressId, UserId};

use super::{ValidationError, required};

/// Indonesian mobile number without the leading `0` or `+62`.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^8[1-9][0-9]{7,11}$").expect("Invalid regex"));

const MAX_POSTAL_CODE: usize = 5;
const MAX_COMPLETE_ADDRESS: usize = 200;

/// A saved shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(skip_serializing)]
    pub user_id: UserId,
    pub receiver_name: String,
    pub phone_number: String,
    pub label: String,
    pub province: String,
    pub province_id: String,
    pub city: String,
    pub city_id: String,
    pub subdistrict: String,
    pub postal_code: String,
    pub complete_address: String,
    pub is_main: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Address {
    /// Single-line form used as the delivery snapshot on orders.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{} (+62{}), {}, {}, {}, {} {}",
            self.receiver_name,
            self.phone_number,
            self.complete_address,
            self.subdistrict,
            self.city,
            self.province,
            self.postal_code
        )
    }
}

/// Address form as submitted by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub receiver_name: String,
    pub phone_number: String,
    pub label: String,
    pub province: String,
    pub province_id: String,
    pub city: String,
    pub city_id: String,
    pub subdistrict: String,
    pub postal_code: String,
    pub complete_address: String,
    #[serde(default)]
    pub is_main: bool,
}

/// A validated address ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddress {
    pub receiver_name: String,
    pub phone_number: String,
    pub label: String,
    pub province: String,
    pub province_id: String,
    pub city: String,
    pub city_id: String,
    pub subdistrict: String,
    pub postal_code: String,
    pub complete_address: String,
    pub is_main: bool,
}

impl AddressInput {
    /// Validate and normalize the form.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first invalid field.
    pub fn validate(&self) -> Result<NewAddress, ValidationError> {
        let phone_number = self.phone_number.trim();
        if !PHONE_PATTERN.is_match(phone_number) {
            return Err(ValidationError::new(
                "phone_number must be 9-13 digits starting with 8 (without 0 or +62)",
            ));
        }

        let postal_code = required(&self.postal_code, "postal_code")?;
        if postal_code.chars().count() > MAX_POSTAL_CODE {
            return Err(ValidationError::new(format!(
                "postal_code must be at most {MAX_POSTAL_CODE} characters"
            )));
        }

        let complete_address = required(&self.complete_address, "complete_address")?;
        if complete_address.chars().count() > MAX_COMPLETE_ADDRESS {
            return Err(ValidationError::new(format!(
                "complete_address must be at most {MAX_COMPLETE_ADDRESS} characters"
            )));
        }

        Ok(NewAddress {
            receiver_name: required(&self.receiver_name, "receiver_name")?,
            phone_number: phone_number.to_owned(),
            label: required(&self.label, "label")?,
            province: required(&self.province, "province")?,
            province_id: required(&self.province_id, "province_id")?,
            city: required(&self.city, "city")?,
            city_id: required(&self.city_id, "city_id")?,
            subdistrict: required(&self.subdistrict, "subdistrict")?,
            postal_code,
            complete_address,
            is_main: self.is_main,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            receiver_name: " Dewi Lestari ".to_owned(),
            phone_number: "81234567890".to_owned(),
            label: "Rumah".to_owned(),
            province: "DKI Jakarta".to_owned(),
            province_id: "6".to_owned(),
            city: "Jakarta Selatan".to_owned(),
            city_id: "153".to_owned(),
            subdistrict: "Kebayoran Baru".to_owned(),
            postal_code: "12110".to_owned(),
            complete_address: "Jl. Senopati No. 10".to_owned(),
            is_main: false,
        }
    }

    #[test]
    fn test_valid_address_is_trimmed() {
        let address = input().validate().unwrap();
        assert_eq!(address.receiver_name, "Dewi Lestari");
        assert!(!address.is_main);
    }

    #[test]
    fn test_phone_number_rules() {
        for bad in ["081234567890", "+6281234567", "80123456789", "8123456", "81234567890123"] {
            let mut form = input();
            form.phone_number = bad.to_owned();
            assert!(form.validate().is_err(), "{bad} should be rejected");
        }
        for good in ["812345678", "8991234567890"] {
            let mut form = input();
            form.phone_number = good.to_owned();
            assert!(form.validate().is_ok(), "{good} should be accepted");
        }
    }

    #[test]
    fn test_postal_code_length() {
        let mut form = input();
        form.postal_code = "123456".to_owned();
        assert!(form.validate().is_err());
        form.postal_code = String::new();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_complete_address_length() {
        let mut form = input();
        form.complete_address = "x".repeat(201);
        assert!(form.validate().is_err());
        form.complete_address = "x".repeat(200);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_blank_required_field() {
        let mut form = input();
        form.subdistrict = "   ".to_owned();
        assert_eq!(
            form.validate().unwrap_err(),
            ValidationError::new("subdistrict is required")
        );
    }
}
