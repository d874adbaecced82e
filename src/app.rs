use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, posts, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(posts::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>, _latency: std::time::Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{mail::testing::RecordingMailer, users::permissions::bootstrap_roles};

    struct Harness {
        app: Router,
        mailer: Arc<RecordingMailer>,
    }

    impl Harness {
        async fn new() -> Self {
            let mailer = Arc::new(RecordingMailer::default());
            let state = AppState::fake_with_mailer(mailer.clone());
            bootstrap_roles(state.store.as_ref()).await.unwrap();
            Self {
                app: build_app(state),
                mailer,
            }
        }

        async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(v) => {
                    req = req.header(header::CONTENT_TYPE, "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            self.app.clone().oneshot(req.body(body).unwrap()).await.unwrap()
        }

        /// Registers and logs in; returns (access token, confirm token).
        async fn signup(&self, email: &str, username: &str) -> (String, String) {
            let res = self
                .call(
                    Method::POST,
                    "/api/v1/auth/register",
                    None,
                    Some(json!({
                        "email": email,
                        "username": username,
                        "password": "cat",
                        "password2": "cat",
                    })),
                )
                .await;
            assert_eq!(res.status(), StatusCode::CREATED);
            let confirm = self.mailer.last_token().unwrap();

            let res = self
                .call(
                    Method::POST,
                    "/api/v1/auth/login",
                    None,
                    Some(json!({ "email": email, "password": "cat" })),
                )
                .await;
            assert_eq!(res.status(), StatusCode::OK);
            let access = json_body(res).await["access_token"].as_str().unwrap().to_string();
            (access, confirm)
        }

        /// Registers, logs in and confirms; returns the access token.
        async fn signup_confirmed(&self, email: &str, username: &str) -> String {
            let (access, confirm) = self.signup(email, username).await;
            let res = self
                .call(Method::GET, &format!("/api/v1/auth/confirm/{confirm}"), Some(&access), None)
                .await;
            assert_eq!(res.status(), StatusCode::OK);
            access
        }
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn text_body(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health() {
        let h = Harness::new().await;
        let res = h.call(Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(text_body(res).await, "ok");
    }

    #[tokio::test]
    async fn register_confirm_and_post() {
        let h = Harness::new().await;
        let (access, confirm) = h.signup("cat@example.com", "catcatcat").await;

        let post = json!({ "body": "hello" });
        let res = h.call(Method::POST, "/api/v1/posts", Some(&access), Some(post.clone())).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = h
            .call(Method::GET, &format!("/api/v1/auth/confirm/{confirm}"), Some(&access), None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = h.call(Method::GET, "/api/v1/auth/unconfirmed", Some(&access), None).await;
        assert_eq!(json_body(res).await["confirmed"], json!(true));

        let res = h.call(Method::POST, "/api/v1/posts", Some(&access), Some(post)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(res.headers().contains_key(header::LOCATION));

        let res = h.call(Method::GET, "/api/v1/users/catcatcat/posts", None, None).await;
        let posts = json_body(res).await;
        assert_eq!(posts.as_array().unwrap().len(), 1);
        assert_eq!(posts[0]["body"], json!("hello"));
    }

    #[tokio::test]
    async fn confirm_with_another_users_token_is_rejected() {
        let h = Harness::new().await;
        let (_, cat_confirm) = h.signup("cat@example.com", "catcatcat").await;
        let (dog_access, _) = h.signup("dog@example.com", "dogdogdog").await;

        let res = h
            .call(Method::GET, &format!("/api/v1/auth/confirm/{cat_confirm}"), Some(&dog_access), None)
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(text_body(res).await, "The link is invalid or has expired.");
    }

    #[tokio::test]
    async fn confirm_requires_sign_in() {
        let h = Harness::new().await;
        let (_, confirm) = h.signup("cat@example.com", "catcatcat").await;
        let res = h
            .call(Method::GET, &format!("/api/v1/auth/confirm/{confirm}"), None, None)
            .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict() {
        let h = Harness::new().await;
        h.signup("cat@example.com", "catcatcat").await;
        let res = h
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "email": "cat@example.com",
                    "username": "othername",
                    "password": "cat",
                    "password2": "cat",
                })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(text_body(res).await, "Email already registered.");
    }

    #[tokio::test]
    async fn login_failure_is_uniform() {
        let h = Harness::new().await;
        h.signup("cat@example.com", "catcatcat").await;
        for body in [
            json!({ "email": "cat@example.com", "password": "dog" }),
            json!({ "email": "ghost@example.com", "password": "cat" }),
        ] {
            let res = h.call(Method::POST, "/api/v1/auth/login", None, Some(body)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(text_body(res).await, "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn remember_me_issues_refresh_token() {
        let h = Harness::new().await;
        h.signup("cat@example.com", "catcatcat").await;
        let res = h
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "cat@example.com", "password": "cat", "remember_me": true })),
            )
            .await;
        let refresh = json_body(res).await["refresh_token"].as_str().unwrap().to_string();

        let res = h
            .call(
                Method::POST,
                "/api/v1/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(json_body(res).await["access_token"].is_string());
    }

    #[tokio::test]
    async fn password_reset_over_http() {
        let h = Harness::new().await;
        let (access, _) = h.signup("cat@example.com", "catcatcat").await;

        // signed-in users cannot request a reset
        let res = h
            .call(
                Method::POST,
                "/api/v1/auth/reset",
                Some(&access),
                Some(json!({ "email": "cat@example.com" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = h
            .call(Method::POST, "/api/v1/auth/reset", None, Some(json!({ "email": "cat@example.com" })))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let token = h.mailer.last_token().unwrap();

        let res = h
            .call(
                Method::POST,
                &format!("/api/v1/auth/reset/{token}"),
                None,
                Some(json!({ "password": "tiger", "password2": "tiger" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = h
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "email": "cat@example.com", "password": "tiger" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_need_administer() {
        let h = Harness::new().await;
        let (user_access, _) = h.signup("cat@example.com", "catcatcat").await;
        let boss_access = h.signup_confirmed("boss@example.com", "bossboss").await;

        let res = h.call(Method::GET, "/api/v1/admin/roles", Some(&user_access), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = h.call(Method::GET, "/api/v1/admin/roles", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let res = h.call(Method::GET, "/api/v1/admin/roles", Some(&boss_access), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let names: Vec<String> = json_body(res)
            .await
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["Administrator", "Moderator", "User"]);

        let res = h.call(Method::GET, "/api/v1/me", Some(&user_access), None).await;
        let cat_id = json_body(res).await["id"].as_str().unwrap().to_string();
        let res = h
            .call(
                Method::PUT,
                &format!("/api/v1/admin/users/{cat_id}"),
                Some(&boss_access),
                Some(json!({ "confirmed": true, "name": "Cat" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["confirmed"], json!(true));
        assert_eq!(body["name"], json!("Cat"));
        assert_eq!(body["role"], json!("User"));
    }

    #[tokio::test]
    async fn profile_edit_and_public_view() {
        let h = Harness::new().await;
        let access = h.signup_confirmed("cat@example.com", "catcatcat").await;

        let res = h
            .call(
                Method::PUT,
                "/api/v1/me/profile",
                Some(&access),
                Some(json!({ "name": "Cat", "location": "Mars", "about_me": "meow" })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = h.call(Method::GET, "/api/v1/users/catcatcat", None, None).await;
        let body = json_body(res).await;
        assert_eq!(body["location"], json!("Mars"));
        assert_eq!(body["role"], json!("User"));
        assert!(body["avatar_url"].as_str().unwrap().contains("gravatar"));
        assert!(body.get("email").is_none());

        let res = h.call(Method::GET, "/api/v1/users/nobody", None, None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_author_or_admin_edits_posts() {
        let h = Harness::new().await;
        let cat_access = h.signup_confirmed("cat@example.com", "catcatcat").await;
        let res = h
            .call(Method::POST, "/api/v1/posts", Some(&cat_access), Some(json!({ "body": "mine" })))
            .await;
        let post_id = json_body(res).await["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/posts/{post_id}");

        let dog_access = h.signup_confirmed("dog@example.com", "dogdogdog").await;
        let res = h.call(Method::PUT, &uri, Some(&dog_access), Some(json!({ "body": "ours" }))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let boss_access = h.signup_confirmed("boss@example.com", "bossboss").await;
        let res = h.call(Method::PUT, &uri, Some(&boss_access), Some(json!({ "body": "edited" }))).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = h.call(Method::GET, &uri, None, None).await;
        assert_eq!(json_body(res).await["body"], json!("edited"));
    }

    #[tokio::test]
    async fn unconfirmed_admin_cannot_confirm_itself() {
        let h = Harness::new().await;
        let (boss_access, _) = h.signup("boss@example.com", "bossboss").await;
        let res = h.call(Method::GET, "/api/v1/me", Some(&boss_access), None).await;
        let boss_id = json_body(res).await["id"].as_str().unwrap().to_string();

        let res = h
            .call(
                Method::PUT,
                &format!("/api/v1/admin/users/{boss_id}"),
                Some(&boss_access),
                Some(json!({ "confirmed": true })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(text_body(res).await, "Account not confirmed");

        let res = h.call(Method::GET, "/api/v1/admin/roles", Some(&boss_access), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = h.call(Method::GET, "/api/v1/auth/unconfirmed", Some(&boss_access), None).await;
        assert_eq!(json_body(res).await["confirmed"], json!(false));
    }

    #[tokio::test]
    async fn unconfirmed_members_cannot_edit_profile_or_posts() {
        let h = Harness::new().await;
        let (access, _) = h.signup("cat@example.com", "catcatcat").await;

        let res = h
            .call(Method::PUT, "/api/v1/me/profile", Some(&access), Some(json!({ "name": "Cat" })))
            .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let uri = format!("/api/v1/posts/{}", uuid::Uuid::new_v4());
        let res = h.call(Method::PUT, &uri, Some(&access), Some(json!({ "body": "x" }))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn bad_bearer_token_is_unauthorized() {
        let h = Harness::new().await;
        let res = h.call(Method::GET, "/api/v1/me", Some("not-a-token"), None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
