//! SQLite persistence for users and todos.
//!
//! Handlers and services never touch SQL directly; they go through
//! [`UserRepository`] and [`TodoRepository`], both implemented by [`Database`].

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::entities::{Todo, User};

const SCHEMA: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS "user" (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(50) NOT NULL,
        email VARCHAR(80) NOT NULL,
        password TEXT NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS user_email_idx ON "user" (email)"#,
    r#"CREATE TABLE IF NOT EXISTS todo (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        description VARCHAR(200) NOT NULL DEFAULT '',
        is_completed BOOLEAN NOT NULL DEFAULT 0,
        user_id INTEGER NOT NULL REFERENCES "user" (id)
    )"#,
];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Emails are not unique; the oldest matching account wins.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn insert_todo(&self, user_id: i64, description: &str) -> Result<Todo, StoreError>;

    async fn find_todo_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError>;

    /// Todos owned by `user_id`, in insertion order.
    async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, StoreError>;

    /// Flips `is_completed` in a single statement. `None` if the row is gone.
    async fn flip_todo(&self, id: i64) -> Result<Option<Todo>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_todo(&self, id: i64) -> Result<bool, StoreError>;
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `url` and makes sure the
    /// tables exist.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("database schema ready");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for Database {
    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO "user" (name, email, password) VALUES (?, ?, ?)
               RETURNING id, name, email, password"#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password FROM "user" WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, name, email, password FROM "user"
               WHERE email = ? ORDER BY id LIMIT 1"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl TodoRepository for Database {
    async fn insert_todo(&self, user_id: i64, description: &str) -> Result<Todo, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            "INSERT INTO todo (description, is_completed, user_id) VALUES (?, ?, ?)
             RETURNING id, description, is_completed, user_id",
        )
        .bind(description)
        .bind(false)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(todo)
    }

    async fn find_todo_by_id(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            "SELECT id, description, is_completed, user_id FROM todo WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(todo)
    }

    async fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, StoreError> {
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT id, description, is_completed, user_id FROM todo
             WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(todos)
    }

    async fn flip_todo(&self, id: i64) -> Result<Option<Todo>, StoreError> {
        let todo = sqlx::query_as::<_, Todo>(
            "UPDATE todo SET is_completed = NOT is_completed WHERE id = ?
             RETURNING id, description, is_completed, user_id",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(todo)
    }

    async fn delete_todo(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM todo WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
