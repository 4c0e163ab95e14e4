use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::dto::{AgeInput, TextInput, UserPayload};
use super::repo_types::UserFields;

pub const NAME_LEN: (usize, usize) = (2, 50);
pub const AGE_RANGE: (i32, i32) = (1, 120);
pub const PASSWORD_LEN: (usize, usize) = (6, 100);

/// Same acceptance as the browser form: a local part of `[A-Z0-9_'+-.]` that
/// neither starts with a dot nor ends with one, labels that start with an
/// alphanumeric, and an alphabetic TLD of two or more letters. No `..` anywhere.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"(?i)^[A-Z0-9_'+\-.]*[A-Z0-9_+\-]@([A-Z0-9][A-Z0-9\-]*\.)+[A-Z]{2,}$")
                .unwrap();
    }
    !email.starts_with('.') && !email.contains("..") && EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Email,
    Age,
    Password,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Age => "age",
            Field::Password => "password",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Every rule a payload broke, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.0.iter().map(|e| e.field).collect()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Empty or non-numeric text becomes 0, which the range check then rejects.
pub fn coerce_age(age: &AgeInput) -> f64 {
    let n = match age {
        AgeInput::Number(n) => *n,
        AgeInput::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        AgeInput::Missing | AgeInput::Other(_) => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

fn within(len: usize, (min, max): (usize, usize)) -> bool {
    (min..=max).contains(&len)
}

/// `None` when the client sent something other than a string. A missing
/// field reads as empty and fails the length rule instead.
fn text(input: &TextInput) -> Option<&str> {
    match input {
        TextInput::Text(s) => Some(s),
        TextInput::Missing => Some(""),
        TextInput::Other(_) => None,
    }
}

/// Checks the whole payload; any violation rejects all of it.
pub fn validate(payload: &UserPayload) -> Result<UserFields, ValidationErrors> {
    let mut errs = ValidationErrors::default();

    let name = text(&payload.name);
    match name {
        None => errs.push(Field::Name, "Name must be a string"),
        Some(n) if !within(n.chars().count(), NAME_LEN) => errs.push(
            Field::Name,
            format!("Name must be between {} and {} characters", NAME_LEN.0, NAME_LEN.1),
        ),
        Some(_) => {}
    }

    let email = text(&payload.email);
    match email {
        None => errs.push(Field::Email, "Email must be a string"),
        Some(e) if !is_valid_email(e) => errs.push(Field::Email, "Invalid email address"),
        Some(_) => {}
    }

    let age = coerce_age(&payload.age);
    if age.fract() != 0.0 {
        errs.push(Field::Age, "Age must be a whole number");
    } else if age < AGE_RANGE.0 as f64 || age > AGE_RANGE.1 as f64 {
        errs.push(
            Field::Age,
            format!("Age must be between {} and {}", AGE_RANGE.0, AGE_RANGE.1),
        );
    }

    let password = text(&payload.password);
    match password {
        None => errs.push(Field::Password, "Password must be a string"),
        Some(p) if !within(p.chars().count(), PASSWORD_LEN) => errs.push(
            Field::Password,
            format!(
                "Password must be between {} and {} characters",
                PASSWORD_LEN.0, PASSWORD_LEN.1
            ),
        ),
        Some(_) => {}
    }

    match (name, email, password) {
        (Some(name), Some(email), Some(password)) if errs.is_empty() => Ok(UserFields {
            name: name.to_string(),
            email: email.to_string(),
            age: age as i32,
            password: password.to_string(),
        }),
        _ => Err(errs),
    }
}
