use crate::core::errors::PayError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Merchant,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "USER",
            Role::Merchant => "MERCHANT",
            Role::Admin => "ADMIN",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Role {
    type Err = PayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "MERCHANT" => Ok(Role::Merchant),
            "ADMIN" => Ok(Role::Admin),
            other => Err(PayError::InvalidToken(format!("unknown role {}", other))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub preferred_currency: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Builds a user whose password is hashed here, before the entity exists.
    pub fn with_password(
        name: String,
        email: String,
        password: &str,
        preferred_currency: String,
        role: Role,
        cost: u32,
    ) -> Result<Self, PayError> {
        let password_hash = bcrypt::hash(password, cost)
            .map_err(|e| PayError::InternalServerError(format!("Password hashing error: {}", e)))?;
        Ok(User {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            preferred_currency,
            role,
            created_at: Utc::now(),
        })
    }

    pub fn verify_password(&self, password: &str) -> Result<bool, PayError> {
        bcrypt::verify(password, &self.password_hash)
            .map_err(|e| PayError::InternalServerError(format!("Password verification error: {}", e)))
    }
}
