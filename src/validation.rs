// Registration form checks, run before anything touches the store
use std::fmt;

const MIN_USER_ID_LEN: usize = 3;
const MIN_PREFERRED_NAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    UserId,
    Password,
    ConfirmPassword,
    PreferredName,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::UserId => "user id",
            Field::Password => "password",
            Field::ConfirmPassword => "confirm password",
            Field::PreferredName => "preferred name",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{count} registration field(s) invalid", count = .0.len())]
pub struct RegistrationErrors(pub Vec<FieldError>);

impl RegistrationErrors {
    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &FieldError> {
        self.0.iter().filter(move |e| e.field == field)
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub user_id: String,
    pub password: String,
    pub confirm_password: String,
    pub preferred_name: String,
}

impl Registration {
    /// Form with the confirmation already matching the password.
    pub fn new(
        user_id: impl Into<String>,
        password: impl Into<String>,
        preferred_name: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            user_id: user_id.into(),
            confirm_password: password.clone(),
            password,
            preferred_name: preferred_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub label: &'static str,
    pub met: bool,
}

/// Every password rule with whether it is satisfied, for a live checklist.
pub fn password_requirements(password: &str) -> Vec<Requirement> {
    vec![
        Requirement {
            label: "At least 8 characters long",
            met: password.chars().count() >= MIN_PASSWORD_LEN,
        },
        Requirement {
            label: "At least one digit",
            met: password.chars().any(|c| c.is_ascii_digit()),
        },
        Requirement {
            label: "At least one lowercase letter",
            met: password.chars().any(|c| c.is_ascii_lowercase()),
        },
        Requirement {
            label: "At least one uppercase letter",
            met: password.chars().any(|c| c.is_ascii_uppercase()),
        },
        Requirement {
            label: "At least one special character (e.g. @#$%^&+=!)",
            met: password.chars().any(|c| c.is_ascii_punctuation()),
        },
        Requirement {
            label: "No spaces allowed",
            met: !password.contains(' '),
        },
    ]
}

pub fn validate(form: &Registration) -> Result<(), RegistrationErrors> {
    let mut errors = Vec::new();

    if form.user_id.chars().count() < MIN_USER_ID_LEN {
        errors.push(FieldError::new(
            Field::UserId,
            "User ID must be at least 3 characters long",
        ));
    }

    errors.extend(
        password_requirements(&form.password)
            .into_iter()
            .filter(|r| !r.met)
            .map(|r| FieldError::new(Field::Password, r.label)),
    );

    if form.password != form.confirm_password {
        errors.push(FieldError::new(
            Field::ConfirmPassword,
            "Passwords do not match",
        ));
    }

    if form.preferred_name.chars().count() < MIN_PREFERRED_NAME_LEN {
        errors.push(FieldError::new(
            Field::PreferredName,
            "Preferred name must be at least 3 characters long",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(RegistrationErrors(errors))
    }
}
