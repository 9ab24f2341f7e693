//! Validation utilities for the SST Training Management Platform
//!
//! Includes Peru-specific identity and phone number rules used by the
//! collaborator and coach forms.

use rust_decimal::Decimal;

use crate::models::DocumentKind;

// ============================================================================
// Identity Validations
// ============================================================================

/// Validate a personal document number for the given document kind
///
/// - DNI: exactly 8 digits
/// - CE (carné de extranjería): 9-12 alphanumeric characters
/// - Passport: 6-12 alphanumeric characters
pub fn validate_document_number(kind: DocumentKind, number: &str) -> Result<(), &'static str> {
    let number = number.trim();
    match kind {
        DocumentKind::Dni => {
            if number.len() != 8 || !number.chars().all(|c| c.is_ascii_digit()) {
                return Err("DNI must be exactly 8 digits");
            }
        }
        DocumentKind::Ce => {
            if !(9..=12).contains(&number.len())
                || !number.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err("CE must be 9 to 12 alphanumeric characters");
            }
        }
        DocumentKind::Passport => {
            if !(6..=12).contains(&number.len())
                || !number.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err("Passport must be 6 to 12 alphanumeric characters");
            }
        }
    }
    Ok(())
}

/// Mask a document number for public display, keeping the last 3 characters
pub fn mask_document_number(number: &str) -> String {
    let chars: Vec<char> = number.trim().chars().collect();
    let visible = chars.len().min(3);
    let hidden = chars.len() - visible;
    let mut masked: String = std::iter::repeat('*').take(hidden).collect();
    masked.extend(&chars[hidden..]);
    masked
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate Peruvian mobile phone format
/// Accepts: 987654321, 987 654 321, +51 987654321
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = if digits.len() == 11 && digits.starts_with("51") {
        &digits[2..]
    } else {
        digits.as_str()
    };

    if national.len() == 9 && national.starts_with('9') {
        Ok(())
    } else {
        Err("Invalid mobile phone number format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

/// Validate a required free-text field is not blank
pub fn validate_required(value: &str) -> Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("Value is required");
    }
    Ok(())
}

// ============================================================================
// Training Validations
// ============================================================================

/// Highest possible evaluation score (vigesimal scale)
pub const MAX_SCORE: u32 = 20;

/// Validate an evaluation score on the 0-20 scale
pub fn validate_score(score: Decimal) -> Result<(), &'static str> {
    if score < Decimal::ZERO || score > Decimal::from(MAX_SCORE) {
        return Err("Score must be between 0 and 20");
    }
    Ok(())
}

/// Validate a percentage in the 0-100 range
pub fn validate_percent(percent: Decimal) -> Result<(), &'static str> {
    if percent < Decimal::ZERO || percent > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate course hours are positive
pub fn validate_hours(hours: Decimal) -> Result<(), &'static str> {
    if hours <= Decimal::ZERO {
        return Err("Hours must be greater than zero");
    }
    Ok(())
}

/// Validate a reporting period
pub fn validate_year_month(year: i32, month: u32) -> Result<(), &'static str> {
    if !(2000..=2100).contains(&year) {
        return Err("Year must be between 2000 and 2100");
    }
    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12");
    }
    Ok(())
}

// ============================================================================
// Certificate Validations
// ============================================================================

/// Prefix of every public certificate code
pub const CERTIFICATE_CODE_PREFIX: &str = "SST";

/// Alphabet for certificate code suffixes (no 0/O, 1/I)
pub const CERTIFICATE_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of the random-looking part of a certificate code
pub const CERTIFICATE_CODE_SUFFIX_LEN: usize = 8;

/// Validate certificate code format: SST-YYYY-XXXXXXXX
pub fn validate_certificate_code_format(code: &str) -> Result<(), &'static str> {
    let parts: Vec<&str> = code.trim().split('-').collect();
    if parts.len() != 3 {
        return Err("Certificate code must be in format SST-YYYY-XXXXXXXX");
    }

    if !parts[0].eq_ignore_ascii_case(CERTIFICATE_CODE_PREFIX) {
        return Err("Certificate code must start with SST");
    }

    // Validate year
    let year: i32 = parts[1].parse().map_err(|_| "Invalid year in certificate code")?;
    if parts[1].len() != 4 || !(2000..=2100).contains(&year) {
        return Err("Invalid year in certificate code");
    }

    // Validate suffix
    let suffix = parts[2];
    if suffix.len() != CERTIFICATE_CODE_SUFFIX_LEN
        || !suffix
            .bytes()
            .all(|b| CERTIFICATE_CODE_ALPHABET.contains(&b.to_ascii_uppercase()))
    {
        return Err("Invalid certificate code suffix");
    }

    Ok(())
}

/// Normalize a user-entered certificate code for lookup
pub fn normalize_certificate_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
