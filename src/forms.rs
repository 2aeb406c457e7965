//! Structural validation for the HTML forms.
//!
//! Each form is a plain [`FormSpec`] value listing its fields. Validation
//! only checks presence, length and shape; business rules live in the
//! services.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Decoded `application/x-www-form-urlencoded` body.
pub type RawForm = HashMap<String, String>;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Password,
}

impl FieldKind {
    /// Value of the `type` attribute on the rendered `<input>`.
    pub fn input_type(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Password => "password",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub max_len: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct FormSpec {
    pub fields: &'static [FieldSpec],
    pub submit: &'static str,
}

pub const REGISTER_FORM: FormSpec = FormSpec {
    fields: &[
        FieldSpec {
            name: "name",
            label: "Nombre",
            kind: FieldKind::Text,
            required: true,
            max_len: 50,
        },
        FieldSpec {
            name: "email",
            label: "Correo electrónico",
            kind: FieldKind::Email,
            required: true,
            max_len: 80,
        },
        FieldSpec {
            name: "password",
            label: "Contraseña",
            kind: FieldKind::Password,
            required: true,
            max_len: 80,
        },
    ],
    submit: "Registrarse",
};

pub const LOGIN_FORM: FormSpec = FormSpec {
    fields: &[
        FieldSpec {
            name: "email",
            label: "Correo electrónico",
            kind: FieldKind::Email,
            required: true,
            max_len: 80,
        },
        FieldSpec {
            name: "password",
            label: "Contraseña",
            kind: FieldKind::Password,
            required: true,
            max_len: 80,
        },
    ],
    submit: "Iniciar sesión",
};

// An empty description is a valid todo.
pub const TODO_FORM: FormSpec = FormSpec {
    fields: &[FieldSpec {
        name: "description",
        label: "Tarea",
        kind: FieldKind::Text,
        required: false,
        max_len: 200,
    }],
    submit: "Agregar",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("form validation failed with {} error(s)", errors.len())]
pub struct ValidationFailure {
    pub errors: Vec<FieldError>,
}

/// Field values that passed their [`FormSpec`]. Optional fields that were
/// not submitted read as the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidForm {
    values: HashMap<&'static str, String>,
}

impl ValidForm {
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or_default()
    }

    pub fn take(&mut self, field: &str) -> String {
        self.values.remove(field).unwrap_or_default()
    }
}

impl FormSpec {
    pub fn validate(&self, raw: &RawForm) -> Result<ValidForm, ValidationFailure> {
        let mut values = HashMap::with_capacity(self.fields.len());
        let mut errors = Vec::new();

        for field in self.fields {
            let value = raw.get(field.name).map(String::as_str).unwrap_or_default();
            match field.check(value) {
                Ok(()) => {
                    values.insert(field.name, value.to_owned());
                }
                Err(message) => errors.push(FieldError {
                    field: field.name,
                    message,
                }),
            }
        }

        if errors.is_empty() {
            Ok(ValidForm { values })
        } else {
            Err(ValidationFailure { errors })
        }
    }
}

impl FieldSpec {
    fn check(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return if self.required {
                Err("This field is required.".to_owned())
            } else {
                Ok(())
            };
        }

        if value.chars().count() > self.max_len {
            return Err(format!(
                "Field cannot be longer than {} characters.",
                self.max_len
            ));
        }

        if self.kind == FieldKind::Email && !EMAIL_RE.is_match(value) {
            return Err("Invalid email address.".to_owned());
        }

        Ok(())
    }
}
