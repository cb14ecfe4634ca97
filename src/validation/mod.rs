//! Input validation module
//!
//! Local form checks run before any request is issued. A form that fails
//! here never reaches the backend.

use crate::models::{CreateAppointment, ServiceForm, UpdateLead, UpdateSettings};
use thiserror::Error;
use validator::Validate;

/// Longest SMS body the backend accepts in one manual message
pub const MAX_MESSAGE_LENGTH: usize = 1600;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid phone number for '{field}'")]
    InvalidPhone { field: String },

    #[error("Field '{field}' is invalid ({reason})")]
    Invalid { field: String, reason: String },
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let Some((field, errs)) = fields.into_iter().next() else {
            return ValidationError::Invalid {
                field: "form".to_string(),
                reason: "invalid".to_string(),
            };
        };
        let field = field.to_string();
        let Some(error) = errs.first() else {
            return ValidationError::Invalid {
                field,
                reason: "invalid".to_string(),
            };
        };
        match error.code.as_ref() {
            "blank" => ValidationError::Required { field },
            "email" => ValidationError::InvalidEmail,
            "length" => match error.params.get("max").and_then(|max| max.as_u64()) {
                Some(max) => ValidationError::TooLong {
                    field,
                    max: max as usize,
                },
                None => ValidationError::Invalid {
                    field,
                    reason: "length".to_string(),
                },
            },
            code => ValidationError::Invalid {
                field,
                reason: code.to_string(),
            },
        }
    }
}

/// Custom `validator` rule: rejects empty and whitespace-only strings
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// Validate a manual message body. Returns the trimmed body to send.
pub fn validate_message_body(body: &str) -> Result<&str, ValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "body".to_string(),
        });
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "body".to_string(),
            max: MAX_MESSAGE_LENGTH,
        });
    }
    Ok(trimmed)
}

/// Validate a service editor form
pub fn validate_service(input: &ServiceForm) -> Result<(), ValidationError> {
    input.validate()?;
    Ok(())
}

/// Validate a new appointment
pub fn validate_create_appointment(input: &CreateAppointment) -> Result<(), ValidationError> {
    if let Some(ref address) = input.address {
        if address.len() > 500 {
            return Err(ValidationError::TooLong {
                field: "address".to_string(),
                max: 500,
            });
        }
    }
    if let Some(ref service) = input.service_type {
        if service.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "service_type".to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a lead update
pub fn validate_update_lead(input: &UpdateLead) -> Result<(), ValidationError> {
    if let Some(ref email) = input.email {
        if !email.is_empty() && !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
    }
    if let Some(value) = input.estimated_value {
        if value < 0.0 {
            return Err(ValidationError::Invalid {
                field: "estimated_value".to_string(),
                reason: "negative".to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a settings update
pub fn validate_update_settings(input: &UpdateSettings) -> Result<(), ValidationError> {
    if let Some(ref name) = input.name {
        if name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }
        if name.len() > 255 {
            return Err(ValidationError::TooLong {
                field: "name".to_string(),
                max: 255,
            });
        }
    }

    if let Some(ref email) = input.owner_email {
        if !is_valid_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
    }

    for (field, phone) in [
        ("owner_phone", &input.owner_phone),
        ("business_phone", &input.business_phone),
    ] {
        if let Some(phone) = phone {
            if !is_valid_phone(phone) {
                return Err(ValidationError::InvalidPhone {
                    field: field.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    // Basic check: contains @ and at least one .
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}

/// E.164 check: leading '+', then 8 to 15 digits
fn is_valid_phone(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}
