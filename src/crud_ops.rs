use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};

use crate::{
    authentication::CurrentUser,
    error::AppError,
    forms::{RawForm, TODO_FORM},
    store::Database,
    todos, views,
};

const TODO_PATH: &str = "/todo";

pub async fn get_todos(
    State(db): State<Database>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>, AppError> {
    let todos = todos::list(&db, user.id).await?;
    Ok(views::todo_page(&user, &todos, &[]))
}

pub async fn create_todo(
    State(db): State<Database>,
    CurrentUser(user): CurrentUser,
    Form(raw): Form<RawForm>,
) -> Result<Response, AppError> {
    let mut form = match TODO_FORM.validate(&raw) {
        Ok(form) => form,
        Err(failure) => {
            let todos = todos::list(&db, user.id).await?;
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                views::todo_page(&user, &todos, &failure.errors),
            )
                .into_response());
        }
    };

    todos::create(&db, user.id, &form.take("description")).await?;
    Ok(Redirect::to(TODO_PATH).into_response())
}

pub async fn update_todo(
    State(db): State<Database>,
    CurrentUser(user): CurrentUser,
    Path(todo_id): Path<String>,
) -> Result<Redirect, AppError> {
    let todo_id = todos::parse_id(&todo_id)?;
    todos::toggle(&db, user.id, todo_id).await?;
    Ok(Redirect::to(TODO_PATH))
}

pub async fn delete_todo(
    State(db): State<Database>,
    CurrentUser(user): CurrentUser,
    Path(todo_id): Path<String>,
) -> Result<Redirect, AppError> {
    let todo_id = todos::parse_id(&todo_id)?;
    todos::delete(&db, user.id, todo_id).await?;
    Ok(Redirect::to(TODO_PATH))
}
