//! Authentication module for authgate.
//!
//! This module provides password hashing, input validation, registration,
//! login, session management and password recovery.

mod login;
mod password;
mod password_reset;
mod registration;
mod session;
mod token;
pub mod validation;

pub use login::authenticate;
pub use password::PasswordHasher;
pub use password_reset::PasswordResetFlow;
pub use registration::{register, RegistrationRequest};
pub use session::{Identity, SessionManager, SessionValidation};
pub use token::{generate_secure_token, TOKEN_BYTES};
pub use validation::ValidationError;
