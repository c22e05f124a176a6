//! Authentication and authorization
//!
//! Tokens carry the acting identity. `sub` is an account id for customers and
//! an employee id for staff; the ledger never looks the actor up from ambient
//! session state.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{AccountId, EmployeeId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account id for customers, employee id for staff
    pub sub: String,
    /// User's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject '{0}' is not a valid identifier")]
    InvalidSubject(String),
    #[error("Missing permission: {0}")]
    MissingPermission(String),
}

/// Role names
pub mod roles {
    pub const CUSTOMER: &str = "customer";
    pub const EMPLOYEE: &str = "employee";
    pub const ADMIN: &str = "admin";
}

/// Creates a new JWT token
///
/// # Arguments
///
/// * `subject` - Account id for customers, employee id for staff
/// * `roles` - User's roles
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    subject: &str,
    roles: Vec<String>,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: subject.to_string(),
        roles,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks if user has required role
///
/// Admins hold every role.
pub fn has_role(claims: &Claims, required_role: &str) -> bool {
    claims
        .roles
        .iter()
        .any(|r| r == required_role || r == roles::ADMIN)
}

/// Who is acting on a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A customer acting on their own account
    Customer(AccountId),
    /// A teller or admin acting for the branch
    Employee(EmployeeId),
}

impl Actor {
    /// Derives the actor from validated claims
    ///
    /// Staff roles win over `customer` when a token carries both.
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let subject = || {
            claims
                .sub
                .parse::<i64>()
                .map_err(|_| AuthError::InvalidSubject(claims.sub.clone()))
        };

        if has_role(claims, roles::EMPLOYEE) {
            Ok(Actor::Employee(EmployeeId::new(subject()?)))
        } else if claims.roles.iter().any(|r| r == roles::CUSTOMER) {
            Ok(Actor::Customer(AccountId::new(subject()?)))
        } else {
            Err(AuthError::MissingPermission(roles::CUSTOMER.to_string()))
        }
    }

    /// The employee id to record on entries, if any
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match self {
            Actor::Employee(id) => Some(*id),
            Actor::Customer(_) => None,
        }
    }

    /// Requires a staff actor
    pub fn require_employee(&self) -> Result<EmployeeId, AuthError> {
        self.employee_id()
            .ok_or_else(|| AuthError::MissingPermission(roles::EMPLOYEE.to_string()))
    }

    /// Checks that the actor may see or move money out of `account`
    pub fn may_access(&self, account: AccountId) -> bool {
        match self {
            Actor::Employee(_) => true,
            Actor::Customer(own) => *own == account,
        }
    }
}

/// Requires the admin role
pub fn require_admin(claims: &Claims) -> Result<(), AuthError> {
    if claims.roles.iter().any(|r| r == roles::ADMIN) {
        Ok(())
    } else {
        Err(AuthError::MissingPermission(roles::ADMIN.to_string()))
    }
}
