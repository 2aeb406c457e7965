use std::fmt;

use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Todo {
    pub id: i64,
    pub description: String,
    pub is_completed: bool,
    pub user_id: i64,
}

#[derive(Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// argon2 PHC string, never the raw credential
    pub password: String,
}

// keeps the password hash out of logs
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl axum_login::AuthUser for User {
    type Id = i64;

    fn id(&self) -> Self::Id {
        self.id
    }

    // when the stored hash changes, existing sessions stop validating
    fn session_auth_hash(&self) -> &[u8] {
        self.password.as_bytes()
    }
}
