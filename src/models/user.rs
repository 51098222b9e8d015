//! User model
//!
//! Users author news items. The e-mail is indexed but not unique in storage;
//! the service refuses duplicates instead.

use serde::{Deserialize, Serialize};

use super::validation::ValidationErrors;

pub const NAME_MAX_CHARS: usize = 250;
pub const PASSWORD_MAX_CHARS: usize = 50;
pub const EMAIL_MAX_CHARS: usize = 250;

/// User entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    pub name: String,
    /// Stored as entered
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
}

impl User {
    /// Create a new User; the ID is assigned by the database.
    pub fn new(name: String, password: String, email: String) -> Self {
        Self {
            id: 0,
            name,
            password,
            email,
        }
    }
}

/// Form input for creating or editing a user
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserInput {
    /// Hidden id carried by edit forms; zero on create
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

impl UserInput {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if errors.require("name", "Name", &self.name) {
            errors.max_chars("name", "Name", &self.name, NAME_MAX_CHARS);
        }
        if errors.require("password", "Password", &self.password) {
            errors.max_chars("password", "Password", &self.password, PASSWORD_MAX_CHARS);
        }
        if errors.require("email", "E-mail", &self.email) {
            errors.max_chars("email", "E-mail", &self.email, EMAIL_MAX_CHARS);
            errors.email("email", "E-mail", self.email.trim());
        }

        errors.into_result()
    }

    /// Build the entity, trimming surrounding whitespace from name and e-mail.
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            name: self.name.trim().to_string(),
            password: self.password,
            email: self.email.trim().to_string(),
        }
    }
}

impl From<&User> for UserInput {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            password: user.password.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> UserInput {
        UserInput {
            id: 0,
            name: "Ana".to_string(),
            password: "secret".to_string(),
            email: "ana@example.com".to_string(),
        }
    }

    #[test]
    fn test_valid_input_passes() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported_together() {
        let errors = UserInput::default().validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.for_field("name").is_some());
        assert!(errors.for_field("password").is_some());
        assert!(errors.for_field("email").is_some());
    }

    #[test]
    fn test_length_limits() {
        let input = UserInput {
            id: 0,
            name: "n".repeat(NAME_MAX_CHARS + 1),
            password: "p".repeat(PASSWORD_MAX_CHARS + 1),
            ..valid_input()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.for_field("name").is_some());
        assert!(errors.for_field("password").is_some());
        assert!(errors.for_field("email").is_none());
    }

    #[test]
    fn test_email_shape_is_checked() {
        let input = UserInput {
            email: "not-an-email".to_string(),
            ..valid_input()
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(
            errors.for_field("email"),
            Some("E-mail is not a valid e-mail address.")
        );
    }

    #[test]
    fn test_into_user_trims() {
        let user = UserInput {
            id: 0,
            name: "  Ana ".to_string(),
            email: " ana@example.com ".to_string(),
            ..valid_input()
        }
        .into_user(7);
        assert_eq!(user.id, 7);
        assert_eq!(user.name, "Ana");
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn test_password_not_serialized() {
        let user = User::new("Ana".into(), "secret".into(), "ana@example.com".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
    }
}
