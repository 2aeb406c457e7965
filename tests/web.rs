use std::net::SocketAddr;

use reqwest::{header::LOCATION, redirect::Policy, Client, Response, StatusCode};
use tempfile::TempDir;
use todo_web::{
    entities::{Todo, User},
    store::{Database, TodoRepository, UserRepository},
    SessionSettings,
};
use tokio::net::TcpListener;
use tower_sessions::cookie::Key;

struct TestApp {
    addr: SocketAddr,
    db: Database,
    _dir: TempDir,
}

impl TestApp {
    async fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("todo.db").display());
        let db = Database::connect(&url, 5).await.unwrap();

        let settings = SessionSettings {
            key: Key::generate(),
            inactivity: time::Duration::hours(1),
        };
        let (router, _session_store) = todo_web::app(db.clone(), settings).await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            addr,
            db,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    fn client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap()
    }

    async fn get(&self, client: &Client, path: &str) -> Response {
        client.get(self.url(path)).send().await.unwrap()
    }

    async fn post(&self, client: &Client, path: &str, form: &[(&str, &str)]) -> Response {
        client.post(self.url(path)).form(form).send().await.unwrap()
    }

    async fn register(&self, client: &Client, name: &str, email: &str, password: &str) {
        let response = self
            .post(
                client,
                "/",
                &[("name", name), ("email", email), ("password", password)],
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "<h1>success</h1>");
    }

    async fn login(&self, client: &Client, email: &str, password: &str) -> Response {
        self.post(client, "/login", &[("email", email), ("password", password)])
            .await
    }

    /// Registers and logs in a fresh client.
    async fn signed_in(&self, name: &str, email: &str) -> (Client, User) {
        let client = self.client();
        self.register(&client, name, email, "secret").await;
        let response = self.login(&client, email, "secret").await;
        assert_redirect(&response, "/todo");

        let user = self.db.find_user_by_email(email).await.unwrap().unwrap();
        (client, user)
    }

    async fn todos_of(&self, user: &User) -> Vec<Todo> {
        self.db.list_todos(user.id).await.unwrap()
    }
}

fn assert_redirect(response: &Response, location: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], location);
}

#[tokio::test]
async fn register_then_login_establishes_session() {
    let app = TestApp::spawn().await;
    let client = app.client();

    app.register(&client, "A", "a@x.com", "p").await;

    // registering does not log in
    assert_redirect(&app.get(&client, "/todo").await, "/login");

    assert_redirect(&app.login(&client, "a@x.com", "p").await, "/todo");

    let response = app.get(&client, "/todo").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Hola, A"));
}

#[tokio::test]
async fn failed_logins_report_marker_without_session() {
    let app = TestApp::spawn().await;
    let client = app.client();
    app.register(&client, "A", "a@x.com", "p").await;

    let response = app.login(&client, "nobody@x.com", "p").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await.unwrap(), "<h1>Invalid email</h1>");

    let response = app.login(&client, "a@x.com", "P").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text().await.unwrap(), "<h1>Invalid password</h1>");

    assert_redirect(&app.get(&client, "/todo").await, "/login");
}

#[tokio::test]
async fn guarded_routes_redirect_anonymous_clients_without_mutation() {
    let app = TestApp::spawn().await;
    let (_owner, user) = app.signed_in("A", "a@x.com").await;
    let todo = app.db.insert_todo(user.id, "buy milk").await.unwrap();

    let anonymous = app.client();
    for path in [
        "/todo".to_string(),
        format!("/update/{}", todo.id),
        format!("/delete/{}", todo.id),
        "/logout".to_string(),
    ] {
        assert_redirect(&app.get(&anonymous, &path).await, "/login");
    }

    let response = app.post(&anonymous, "/todo", &[("description", "sneaky")]).await;
    assert_redirect(&response, "/login");

    assert_eq!(app.todos_of(&user).await, vec![todo]);
}

#[tokio::test]
async fn todo_lifecycle() {
    let app = TestApp::spawn().await;
    let (client, user) = app.signed_in("A", "a@x.com").await;

    let response = app.post(&client, "/todo", &[("description", "buy milk")]).await;
    assert_redirect(&response, "/todo");

    let todos = app.todos_of(&user).await;
    assert_eq!(todos.len(), 1);
    let todo = &todos[0];
    assert_eq!(todo.description, "buy milk");
    assert!(!todo.is_completed);
    assert_eq!(todo.user_id, user.id);

    let page = app.get(&client, "/todo").await.text().await.unwrap();
    assert!(page.contains("buy milk"));
    assert!(page.contains(&format!("/update/{}", todo.id)));

    let toggle = format!("/update/{}", todo.id);
    assert_redirect(&app.get(&client, &toggle).await, "/todo");
    assert!(app.todos_of(&user).await[0].is_completed);
    assert_redirect(&app.get(&client, &toggle).await, "/todo");
    assert!(!app.todos_of(&user).await[0].is_completed);

    let delete = format!("/delete/{}", todo.id);
    assert_redirect(&app.get(&client, &delete).await, "/todo");
    assert!(app.todos_of(&user).await.is_empty());

    assert_eq!(app.get(&client, &delete).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&client, &toggle).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_description_is_accepted_but_overlong_is_not() {
    let app = TestApp::spawn().await;
    let (client, user) = app.signed_in("A", "a@x.com").await;

    assert_redirect(&app.post(&client, "/todo", &[("description", "")]).await, "/todo");
    assert_redirect(&app.post(&client, "/todo", &[]).await, "/todo");

    let long = "x".repeat(201);
    let response = app
        .post(&client, "/todo", &[("description", long.as_str())])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let descriptions: Vec<_> = app
        .todos_of(&user)
        .await
        .into_iter()
        .map(|todo| todo.description)
        .collect();
    assert_eq!(descriptions, ["", ""]);
}

#[tokio::test]
async fn users_only_see_their_own_todos() {
    let app = TestApp::spawn().await;
    let (alice, _) = app.signed_in("Alice", "alice@x.com").await;
    let (bob, bob_user) = app.signed_in("Bob", "bob@x.com").await;

    app.post(&alice, "/todo", &[("description", "alice private")]).await;
    app.post(&bob, "/todo", &[("description", "bob stuff")]).await;

    let page = app.get(&bob, "/todo").await.text().await.unwrap();
    assert!(page.contains("bob stuff"));
    assert!(!page.contains("alice private"));
    assert_eq!(app.todos_of(&bob_user).await.len(), 1);
}

#[tokio::test]
async fn cross_user_toggle_and_delete_are_forbidden() {
    let app = TestApp::spawn().await;
    let (u1, user1) = app.signed_in("U1", "u1@x.com").await;
    let (u2, _) = app.signed_in("U2", "u2@x.com").await;

    app.post(&u1, "/todo", &[("description", "mine")]).await;
    let todo = app.todos_of(&user1).await.remove(0);

    let response = app.get(&u2, &format!("/update/{}", todo.id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.get(&u2, &format!("/delete/{}", todo.id)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    assert_eq!(app.db.find_todo_by_id(todo.id).await.unwrap(), Some(todo));
}

#[tokio::test]
async fn logout_ends_session() {
    let app = TestApp::spawn().await;
    let (client, _) = app.signed_in("A", "a@x.com").await;

    assert_eq!(app.get(&client, "/todo").await.status(), StatusCode::OK);
    assert_redirect(&app.get(&client, "/logout").await, "/login");
    assert_redirect(&app.get(&client, "/todo").await, "/login");
}

#[tokio::test]
async fn session_of_deleted_user_is_anonymous() {
    let app = TestApp::spawn().await;
    let (client, user) = app.signed_in("A", "a@x.com").await;
    assert_eq!(app.get(&client, "/todo").await.status(), StatusCode::OK);

    sqlx::query(r#"DELETE FROM "user" WHERE id = ?"#)
        .bind(user.id)
        .execute(app.db.pool())
        .await
        .unwrap();

    assert_redirect(&app.get(&client, "/todo").await, "/login");
    assert_redirect(&app.get(&client, "/logout").await, "/login");
}

#[tokio::test]
async fn malformed_todo_ids_are_not_found() {
    let app = TestApp::spawn().await;
    let (client, _) = app.signed_in("A", "a@x.com").await;

    for path in ["/update/abc", "/delete/abc", "/update/99999999999999999999"] {
        let response = app.get(&client, path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }
}

#[tokio::test]
async fn invalid_forms_are_rerendered() {
    let app = TestApp::spawn().await;
    let client = app.client();

    let response = app
        .post(&client, "/", &[("name", "A"), ("email", "a@x.com")])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.text().await.unwrap().contains("<form"));
    assert!(app.db.find_user_by_email("a@x.com").await.unwrap().is_none());

    let response = app
        .post(&client, "/login", &[("email", "not-an-email"), ("password", "p")])
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn public_pages_render_forms() {
    let app = TestApp::spawn().await;
    let client = app.client();

    for path in ["/", "/login"] {
        let response = app.get(&client, path).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.text().await.unwrap().contains("type=\"password\""));
    }
}
