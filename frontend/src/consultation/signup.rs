use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
    #[error("Could not reach the sign up service: {0}")]
    Network(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignupError {
    #[error("Please enter a valid email address")]
    InvalidEmail,
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("Sign up is not available right now")]
    Unavailable,
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Signup form state left behind after a call. Owned by the session
/// controller so a reset clears it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    pub submitting: bool,
}

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("error", &self.error)
            .field("submitting", &self.submitting)
            .finish()
    }
}

impl SignupForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Local checks that run before the auth service is contacted.
    pub fn credentials(&self) -> Result<Credentials, SignupError> {
        let email = self.email.trim();
        if !is_valid_email(email) {
            return Err(SignupError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(SignupError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        Ok(Credentials {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupConfirmation {
    pub email: String,
}

impl SignupConfirmation {
    pub fn message(&self) -> String {
        format!("Almost there! Check {} for a link to confirm your account.", self.email)
    }
}

#[async_trait(?Send)]
pub trait AuthApi {
    /// Creates the account. Success still needs email confirmation.
    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthError>;
}

fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str) -> SignupForm {
        SignupForm {
            email: email.to_string(),
            password: password.to_string(),
            ..SignupForm::default()
        }
    }

    #[test]
    fn short_password_is_rejected_locally() {
        assert_eq!(
            form("a@b.com", "short").credentials().unwrap_err(),
            SignupError::PasswordTooShort(MIN_PASSWORD_LEN)
        );
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "plainaddress", "@b.com", "a@b", "a@.com", "a@b.com.", "a@@b.com", "a b@c.com"] {
            assert_eq!(
                form(email, "long enough").credentials().unwrap_err(),
                SignupError::InvalidEmail,
                "{email:?} should be rejected"
            );
        }
    }

    #[test]
    fn valid_input_is_trimmed_into_credentials() {
        let credentials = form("  a@b.com ", "correct horse").credentials().unwrap();
        assert_eq!(credentials.email, "a@b.com");
        assert_eq!(credentials.password, "correct horse");
    }

    #[test]
    fn debug_output_never_shows_the_password() {
        let form = form("a@b.com", "hunter2hunter2");
        assert!(!format!("{form:?}").contains("hunter2"));
        assert!(!format!("{:?}", form.credentials().unwrap()).contains("hunter2"));
    }
}
