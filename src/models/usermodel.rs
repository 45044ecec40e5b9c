use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Provider,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Provider => "provider",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "provider_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Approved,
    Suspended,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<UserRole>,
    pub provider_status: Option<ProviderStatus>,
    /// Mean review rating, maintained by the review gate. Zero without reviews.
    pub rating: f64,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn as_caller(&self) -> Caller {
        Caller::new(self.id, self.roles.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub roles: Vec<UserRole>,
    pub provider_status: Option<ProviderStatus>,
}

/// Identity handed to every lifecycle operation by the auth layer.
///
/// Roles are a capability set: a single user may act as owner on one request
/// and as provider on another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: Uuid,
    pub roles: Vec<UserRole>,
}

impl Caller {
    pub fn new(id: Uuid, roles: Vec<UserRole>) -> Self {
        Self { id, roles }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RatingSummary {
    pub provider_id: Uuid,
    pub rating: f64,
    pub review_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_holds_multiple_roles() {
        let caller = Caller::new(Uuid::new_v4(), vec![UserRole::Owner, UserRole::Provider]);
        assert!(caller.has_role(UserRole::Owner));
        assert!(caller.has_role(UserRole::Provider));
        assert!(!caller.has_role(UserRole::Admin));
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&UserRole::Provider).unwrap();
        assert_eq!(json, "\"provider\"");
        assert_eq!(UserRole::Owner.to_str(), "owner");
    }

    #[test]
    fn test_roles_bind_as_postgres_array() {
        fn binds_as<T: sqlx::Type<sqlx::Postgres> + for<'q> sqlx::Encode<'q, sqlx::Postgres>>() {}
        binds_as::<Vec<UserRole>>();
        binds_as::<UserRole>();
    }
}
