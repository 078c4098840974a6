// Contact form validation.
//
// Submissions are validated field by field; any failure rejects the whole
// form with per-field messages. Accepted submissions are only logged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

pub const NAME_MIN_CHARS: usize = 2;
pub const MESSAGE_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Outcome returned to the form. `errors` maps field name to messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactFormState {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ContactForm {
    pub fn validate(&self) -> Result<(), BTreeMap<String, Vec<String>>> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut fail = |field: &str, msg: &str| {
            errors
                .entry(field.to_string())
                .or_default()
                .push(msg.to_string());
        };

        if self.name.trim().chars().count() < NAME_MIN_CHARS {
            fail("name", "Name must be at least 2 characters");
        }
        if !is_valid_email(self.email.trim()) {
            fail("email", "Please enter a valid email address");
        }
        if self.subject.trim().is_empty() {
            fail("subject", "Please select a subject");
        }
        if self.message.trim().chars().count() < MESSAGE_MIN_CHARS {
            fail("message", "Message must be at least 10 characters");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Validate and accept a contact form submission.
pub fn submit_contact_form(form: &ContactForm) -> ContactFormState {
    match form.validate() {
        Err(errors) => ContactFormState {
            success: false,
            message: "Please fix the errors below".to_string(),
            errors: Some(errors),
        },
        Ok(()) => {
            info!(
                name = %form.name,
                email = %form.email,
                subject = %form.subject,
                property = form.property.as_deref().unwrap_or("-"),
                "contact form submitted"
            );
            ContactFormState {
                success: true,
                message: "Thank you for your message! We'll get back to you within 24 hours."
                    .to_string(),
                errors: None,
            }
        }
    }
}

/// `local@domain.tld` shape check: one `@`, non-empty local part, a dotted
/// domain without empty labels, no whitespace.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> ContactForm {
        ContactForm {
            name: "Jamie Buyer".into(),
            email: "jamie@example.com".into(),
            phone: None,
            subject: "Buying".into(),
            property: Some("MLS 12345".into()),
            message: "I'd like to see the house on Elm.".into(),
        }
    }

    #[test]
    fn valid_form_is_accepted() {
        let state = submit_contact_form(&valid_form());
        assert!(state.success);
        assert!(state.errors.is_none());
    }

    #[test]
    fn every_invalid_field_is_reported() {
        let form = ContactForm {
            name: "J".into(),
            email: "not-an-email".into(),
            subject: " ".into(),
            message: "hi".into(),
            ..Default::default()
        };
        let state = submit_contact_form(&form);
        assert!(!state.success);
        assert_eq!(state.message, "Please fix the errors below");
        let errors = state.errors.unwrap();
        let fields: Vec<_> = errors.keys().cloned().collect();
        assert_eq!(fields, vec!["email", "message", "name", "subject"]);
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a b@c.co"));
        assert!(!is_valid_email("a@b..co"));
    }
}
