use std::borrow::Cow;

use axum::response::Html;

use crate::entities::{Todo, User};
use crate::forms::{FieldError, FormSpec, LOGIN_FORM, REGISTER_FORM, TODO_FORM};

pub const SUCCESS: &str = "<h1>success</h1>";

/// A bare one-line page, used for the login failure markers.
pub fn message(text: &str) -> Html<String> {
    Html(format!("<h1>{}</h1>", escape(text)))
}

pub fn register_page(errors: &[FieldError]) -> Html<String> {
    page(
        "Registro",
        &form_html(&REGISTER_FORM, "/", errors),
        r#"<p><a href="/login">Iniciar sesión</a></p>"#,
    )
}

pub fn login_page(errors: &[FieldError]) -> Html<String> {
    page(
        "Iniciar sesión",
        &form_html(&LOGIN_FORM, "/login", errors),
        r#"<p><a href="/">Registrarse</a></p>"#,
    )
}

pub fn todo_page(user: &User, todos: &[Todo], errors: &[FieldError]) -> Html<String> {
    let mut body = format!("<p>Hola, {}</p>\n", escape(&user.name));
    body.push_str(&form_html(&TODO_FORM, "/todo", errors));

    body.push_str("<ul>\n");
    for todo in todos {
        let status = if todo.is_completed { "done" } else { "pending" };
        body.push_str(&format!(
            "<li class=\"{status}\">{description} <a href=\"/update/{id}\">{toggle}</a> \
             <a href=\"/delete/{id}\">Eliminar</a></li>\n",
            description = escape(&todo.description),
            id = todo.id,
            toggle = if todo.is_completed { "Reabrir" } else { "Completar" },
        ));
    }
    body.push_str("</ul>\n");

    page("Tareas", &body, r#"<p><a href="/logout">Cerrar sesión</a></p>"#)
}

fn page(title: &str, body: &str, footer: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n{body}{footer}\n</body>\n</html>\n"
    ))
}

fn form_html(spec: &FormSpec, action: &str, errors: &[FieldError]) -> String {
    let mut html = String::new();

    if !errors.is_empty() {
        html.push_str("<ul class=\"errors\">\n");
        for error in errors {
            html.push_str(&format!("<li>{}</li>\n", escape(&error.to_string())));
        }
        html.push_str("</ul>\n");
    }

    html.push_str(&format!("<form method=\"post\" action=\"{action}\">\n"));
    for field in spec.fields {
        html.push_str(&format!(
            "<label for=\"{name}\">{label}</label> \
             <input id=\"{name}\" name=\"{name}\" type=\"{kind}\" maxlength=\"{max}\"{required}>\n",
            name = field.name,
            label = field.label,
            kind = field.kind.input_type(),
            max = field.max_len,
            required = if field.required { " required" } else { "" },
        ));
    }
    html.push_str(&format!("<button type=\"submit\">{}</button>\n", spec.submit));
    html.push_str("</form>\n");

    html
}

pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.contains(|c: char| matches!(c, '&' | '<' | '>' | '"' | '\'')) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
