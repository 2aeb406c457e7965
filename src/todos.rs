//! Todo operations, always on behalf of one user.
//!
//! Toggle and delete refuse to touch another user's todo. Ids are never
//! reused (`AUTOINCREMENT`) and todos never change owner, so the ownership
//! check cannot go stale before the write that follows it.

use tracing::{debug, info, warn};

use crate::{
    entities::Todo,
    store::{StoreError, TodoRepository},
};

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("Todo with ID {0} not found")]
    NotFound(i64),

    #[error("Todo with ID {0:?} not found")]
    MalformedId(String),

    #[error("User {user_id} may not modify todo {todo_id}")]
    Forbidden { todo_id: i64, user_id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Todo ids come from the URL; anything that is not an integer names no todo.
pub fn parse_id(raw: &str) -> Result<i64, TodoError> {
    raw.parse().map_err(|_| TodoError::MalformedId(raw.to_string()))
}

pub async fn list<R>(repo: &R, user_id: i64) -> Result<Vec<Todo>, TodoError>
where
    R: TodoRepository + ?Sized,
{
    let todos = repo.list_todos(user_id).await?;
    debug!(user_id, count = todos.len(), "listed todos");
    Ok(todos)
}

pub async fn create<R>(repo: &R, user_id: i64, description: &str) -> Result<Todo, TodoError>
where
    R: TodoRepository + ?Sized,
{
    let todo = repo.insert_todo(user_id, description).await?;
    info!(user_id, todo_id = todo.id, "created todo");
    Ok(todo)
}

pub async fn toggle<R>(repo: &R, user_id: i64, todo_id: i64) -> Result<Todo, TodoError>
where
    R: TodoRepository + ?Sized,
{
    owned_todo(repo, user_id, todo_id).await?;

    // deleted between the check and the update
    let todo = repo
        .flip_todo(todo_id)
        .await?
        .ok_or(TodoError::NotFound(todo_id))?;
    info!(user_id, todo_id, is_completed = todo.is_completed, "toggled todo");
    Ok(todo)
}

pub async fn delete<R>(repo: &R, user_id: i64, todo_id: i64) -> Result<(), TodoError>
where
    R: TodoRepository + ?Sized,
{
    owned_todo(repo, user_id, todo_id).await?;

    if !repo.delete_todo(todo_id).await? {
        return Err(TodoError::NotFound(todo_id));
    }
    info!(user_id, todo_id, "deleted todo");
    Ok(())
}

async fn owned_todo<R>(repo: &R, user_id: i64, todo_id: i64) -> Result<Todo, TodoError>
where
    R: TodoRepository + ?Sized,
{
    let todo = repo
        .find_todo_by_id(todo_id)
        .await?
        .ok_or(TodoError::NotFound(todo_id))?;

    if todo.user_id != user_id {
        warn!(user_id, todo_id, owner = todo.user_id, "refusing access to foreign todo");
        return Err(TodoError::Forbidden { todo_id, user_id });
    }

    Ok(todo)
}
