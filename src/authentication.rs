use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use tracing::{info, warn};

use crate::{
    entities::User,
    error::AppError,
    forms::{RawForm, LOGIN_FORM, REGISTER_FORM},
    store::{Database, StoreError, UserRepository},
    views,
};

pub const LOGIN_PATH: &str = "/login";

pub type AuthSession = axum_login::AuthSession<SqliteAuthBackend>;

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email")]
    InvalidEmail,

    #[error("Invalid password")]
    InvalidPassword,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct SqliteAuthBackend {
    pub db: Database,
}

impl SqliteAuthBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores a new account. Duplicate emails are accepted.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: String,
    ) -> Result<User, AuthError> {
        // `password_auth::generate_hash()` is blocking, hence `spawn_blocking`
        let password_hash =
            tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;

        Ok(self.db.insert_user(name, email, &password_hash).await?)
    }

    /// Looks the user up by exact email and checks the password, telling the
    /// two failure cases apart.
    pub async fn verify(&self, creds: Credentials) -> Result<User, AuthError> {
        let user = self
            .db
            .find_user_by_email(&creds.email)
            .await?
            .ok_or(AuthError::InvalidEmail)?;

        let password_hash = user.password.clone();
        tokio::task::spawn_blocking(move || {
            password_auth::verify_password(creds.password, &password_hash)
        })
        .await?
        .map_err(|_| AuthError::InvalidPassword)?;

        Ok(user)
    }
}

#[async_trait::async_trait]
impl axum_login::AuthnBackend for SqliteAuthBackend {
    type User = User;
    type Credentials = self::Credentials;
    type Error = self::AuthError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        match self.verify(creds).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::InvalidEmail | AuthError::InvalidPassword) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_user(
        &self,
        user_id: &axum_login::UserId<Self>,
    ) -> Result<Option<Self::User>, Self::Error> {
        Ok(self.db.find_user_by_id(*user_id).await?)
    }
}

/// The authenticated user for the current request, placed in the request
/// extensions by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| Redirect::to(LOGIN_PATH))
    }
}

/// Guard for user-scoped routes. Anonymous requests, and sessions whose user
/// no longer exists, are sent to the login page without running the handler.
pub async fn require_login(auth_session: AuthSession, mut request: Request, next: Next) -> Response {
    match auth_session.user {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "refusing unauthenticated request");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

pub async fn register_form() -> Html<String> {
    views::register_page(&[])
}

pub async fn sign_up(
    auth_session: AuthSession,
    Form(raw): Form<RawForm>,
) -> Result<Response, AppError> {
    let mut form = match REGISTER_FORM.validate(&raw) {
        Ok(form) => form,
        Err(failure) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                views::register_page(&failure.errors),
            )
                .into_response())
        }
    };

    let password = form.take("password");
    let user = auth_session
        .backend
        .register(form.get("name"), form.get("email"), password)
        .await?;
    info!(user_id = user.id, "registered user");

    Ok(Html(views::SUCCESS).into_response())
}

pub async fn login_form() -> Html<String> {
    views::login_page(&[])
}

pub async fn sign_in(
    mut auth_session: AuthSession,
    Form(raw): Form<RawForm>,
) -> Result<Response, AppError> {
    let mut form = match LOGIN_FORM.validate(&raw) {
        Ok(form) => form,
        Err(failure) => {
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                views::login_page(&failure.errors),
            )
                .into_response())
        }
    };

    let creds = Credentials {
        email: form.take("email"),
        password: form.take("password"),
    };

    let user = auth_session
        .backend
        .verify(creds)
        .await
        .inspect_err(|err| warn!(error = %err, "login rejected"))?;

    auth_session.login(&user).await?;
    info!(user_id = user.id, "user logged in");

    Ok(Redirect::to("/todo").into_response())
}

pub async fn logout(
    mut auth_session: AuthSession,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect, AppError> {
    auth_session.logout().await?;
    info!(user_id = user.id, "user logged out");

    Ok(Redirect::to(LOGIN_PATH))
}
