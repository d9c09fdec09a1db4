//! Secure credential container with automatic memory zeroing.
//!
//! # Security
//! - Credentials are stored in `Zeroizing<T>` containers
//! - Memory is cleared when credentials go out of scope
//! - The password never appears in `Debug` output

use zeroize::{Zeroize, Zeroizing};

/// SQL Server login credentials that zero their memory on drop.
///
/// # Example
///
/// ```rust
/// use dbexport_core::security::Credentials;
///
/// let creds = Credentials::new("jvcb".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "jvcb");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Gets the password for handing to the driver during login.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Checks if password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Replaces the password, wiping the previous one.
    pub fn set_password(&mut self, password: String) {
        self.password = Zeroizing::new(Some(password));
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &"<redacted>")
            .field("password", &self.has_password().then_some("****"))
            .finish()
    }
}
