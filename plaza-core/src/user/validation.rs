//! Field rules for user records: presence, length, email format and password confirmation.
//!
//! Uniqueness of the email needs the store and is checked by [`super::UserManager`];
//! everything here is pure and never fails on malformed input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const NAME_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 255;
pub const PASSWORD_MIN_CHARS: usize = 6;
/// bcrypt ignores everything past this many bytes.
pub const PASSWORD_MAX_BYTES: usize = 72;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

/// Record attribute a violation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Base,
    Name,
    Email,
    Password,
    PasswordConfirmation,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Base => "base",
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::PasswordConfirmation => "password_confirmation",
        }
    }

    fn label(&self) -> Option<&'static str> {
        match self {
            Field::Base => None,
            Field::Name => Some("Name"),
            Field::Email => Some("Email"),
            Field::Password => Some("Password"),
            Field::PasswordConfirmation => Some("Password confirmation"),
        }
    }
}

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: Field,
    pub message: String,
}

impl Violation {
    /// Message prefixed with the humanized field name, e.g. `Name can't be blank`.
    pub fn full_message(&self) -> String {
        match self.field.label() {
            Some(label) => format!("{} {}", label, self.message),
            None => self.message.clone(),
        }
    }
}

/// Ordered collection of violations found for one candidate record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a set holding exactly one violation.
    pub fn single(field: Field, message: impl Into<String>) -> Self {
        let mut violations = Self::new();
        violations.add(field, message);
        violations
    }

    pub fn add(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(Violation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Whether any violation is attached to `field`.
    pub fn has(&self, field: Field) -> bool {
        self.0.iter().any(|v| v.field == field)
    }

    /// Messages grouped by field name, as returned to clients.
    pub fn by_field(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for v in &self.0 {
            map.entry(v.field.as_str()).or_default().push(v.message.clone());
        }
        map
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.0.iter().map(Violation::full_message).collect()
    }

    /// `Ok(())` when nothing was recorded, otherwise the set itself.
    pub fn into_result(self) -> Result<(), Violations> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

impl Serialize for Violations {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.by_field().serialize(serializer)
    }
}

/// Password pair submitted when a password is being set.
#[derive(Debug, Clone, Copy)]
pub struct PasswordChange<'a> {
    pub password: &'a str,
    pub confirmation: &'a str,
}

/// Lowercased form used for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email) && !email.contains("..")
}

pub fn check_name(name: &str, violations: &mut Violations) {
    if is_blank(name) {
        violations.add(Field::Name, "can't be blank");
    } else if name.chars().count() > NAME_MAX_CHARS {
        violations.add(
            Field::Name,
            format!("is too long (maximum is {} characters)", NAME_MAX_CHARS),
        );
    }
}

pub fn check_email(email: &str, violations: &mut Violations) {
    if is_blank(email) {
        violations.add(Field::Email, "can't be blank");
        return;
    }
    if email.chars().count() > EMAIL_MAX_CHARS {
        violations.add(
            Field::Email,
            format!("is too long (maximum is {} characters)", EMAIL_MAX_CHARS),
        );
    }
    if !is_valid_email(email) {
        violations.add(Field::Email, "is invalid");
    }
}

pub fn check_password(change: PasswordChange<'_>, violations: &mut Violations) {
    if is_blank(change.password) {
        violations.add(Field::Password, "can't be blank");
    } else if change.password.chars().count() < PASSWORD_MIN_CHARS {
        violations.add(
            Field::Password,
            format!("is too short (minimum is {} characters)", PASSWORD_MIN_CHARS),
        );
    } else if change.password.len() > PASSWORD_MAX_BYTES {
        violations.add(
            Field::Password,
            format!("is too long (maximum is {} bytes)", PASSWORD_MAX_BYTES),
        );
    }
    // Plain equality: the confirmation is never hashed.
    if change.password != change.confirmation {
        violations.add(Field::PasswordConfirmation, "doesn't match Password");
    }
}

/// Runs every field rule that does not need the store.
pub fn validate_fields(name: &str, email: &str, password: Option<PasswordChange<'_>>) -> Violations {
    let mut violations = Violations::new();
    check_name(name, &mut violations);
    check_email(email, &mut violations);
    if let Some(change) = password {
        check_password(change, &mut violations);
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pw<'a>(password: &'a str, confirmation: &'a str) -> Option<PasswordChange<'a>> {
        Some(PasswordChange {
            password,
            confirmation,
        })
    }

    #[test]
    fn valid_record_passes() {
        let v = validate_fields("Example User", "user@example.com", pw("spaceship", "spaceship"));
        assert!(v.is_empty(), "{v}");
    }

    #[test]
    fn blank_name_and_email_fail() {
        let v = validate_fields("      ", "     ", pw("spaceship", "spaceship"));
        assert!(v.has(Field::Name));
        assert!(v.has(Field::Email));
        assert_eq!(v.by_field()["name"], vec!["can't be blank".to_string()]);
    }

    #[test]
    fn name_length_boundary() {
        let fifty = "a".repeat(50);
        assert!(validate_fields(&fifty, "user@example.com", None).is_empty());
        let v = validate_fields(&"a".repeat(51), "user@example.com", None);
        assert_eq!(
            v.full_messages(),
            vec!["Name is too long (maximum is 50 characters)".to_string()]
        );
    }

    #[test]
    fn email_too_long() {
        let email = format!("{}@example.com", "a".repeat(244));
        assert_eq!(email.len(), 256);
        let v = validate_fields("Example User", &email, None);
        assert!(v.has(Field::Email));
    }

    #[test]
    fn accepts_valid_addresses() {
        for address in [
            "user@example.com",
            "USER@foo.COM",
            "UsEr@t.co.uk",
            "me-it_is@place.co",
            "user.lastname@my.website",
            "liz+sheila@plaza-space.org",
        ] {
            assert!(is_valid_email(address), "{address:?} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_addresses() {
        for address in [
            "user@example,com",
            "user_at_example.com",
            "user@example.",
            "user@my_web.com",
            "user@site+me.com",
            "user@example..com",
            "user..name@example.com",
            "user@example.c0m",
            "user@example",
        ] {
            assert!(!is_valid_email(address), "{address:?} should be invalid");
        }
    }

    #[test]
    fn password_rules() {
        let v = validate_fields("Example User", "user@example.com", pw("      ", "      "));
        assert_eq!(v.by_field()["password"], vec!["can't be blank".to_string()]);

        let v = validate_fields("Example User", "user@example.com", pw("hello", "hello"));
        assert!(v.has(Field::Password));

        let v = validate_fields("Example User", "user@example.com", pw("password", "passward"));
        assert!(!v.has(Field::Password));
        assert!(v.has(Field::PasswordConfirmation));

        let long = "x".repeat(73);
        let v = validate_fields("Example User", "user@example.com", pw(&long, &long));
        assert!(v.has(Field::Password));
    }

    #[test]
    fn confirmation_is_byte_exact() {
        let v = validate_fields("Example User", "user@example.com", pw("Spaceship", "spaceship"));
        assert!(v.has(Field::PasswordConfirmation));
        let v = validate_fields("Example User", "user@example.com", pw("spaceship", "spaceship "));
        assert!(v.has(Field::PasswordConfirmation));
    }

    #[test]
    fn password_skipped_when_not_being_set() {
        assert!(validate_fields("Example User", "user@example.com", None).is_empty());
    }

    #[test]
    fn normalizes_to_lowercase() {
        assert_eq!(normalize_email("UsEr@eXAmPlE.coM"), "user@example.com");
    }
}
