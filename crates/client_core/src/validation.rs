//! Client-side checks that run before any identity request leaves the process.

use shared::{
    domain::is_plausible_email,
    protocol::{LoginRequest, RegisterRequest},
};

use crate::error::{ClientError, Field, FieldErrors};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::default();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.insert(Field::Password, "Password is required");
        }
        errors.into_result()
    }

    pub fn to_request(&self) -> LoginRequest {
        LoginRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::default();
        if self.first_name.trim().is_empty() {
            errors.insert(Field::FirstName, "First name is required");
        }
        if self.last_name.trim().is_empty() {
            errors.insert(Field::LastName, "Last name is required");
        }
        check_email(&self.email, &mut errors);
        check_new_password(&self.password, Field::Password, "Password", &mut errors);
        if self.password != self.confirm_password {
            errors.insert(Field::ConfirmPassword, "Passwords do not match");
        }
        errors.into_result()
    }

    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChangeForm {
    pub fn new(
        current_password: impl Into<String>,
        new_password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            current_password: current_password.into(),
            new_password: new_password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let mut errors = FieldErrors::default();
        if self.current_password.is_empty() {
            errors.insert(Field::CurrentPassword, "Current password is required");
        }
        check_new_password(
            &self.new_password,
            Field::NewPassword,
            "New password",
            &mut errors,
        );
        if self.new_password != self.confirm_password {
            errors.insert(Field::ConfirmPassword, "Passwords do not match");
        }
        errors.into_result()
    }
}

fn check_email(email: &str, errors: &mut FieldErrors) {
    if email.trim().is_empty() {
        errors.insert(Field::Email, "Email is required");
    } else if !is_plausible_email(email) {
        errors.insert(Field::Email, "Email is invalid");
    }
}

fn check_new_password(password: &str, field: Field, label: &str, errors: &mut FieldErrors) {
    if password.is_empty() {
        errors.insert(field, format!("{label} is required"));
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            field,
            format!("{label} must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}
