//! Router assembly: public and authenticated API routes, stored uploads, CORS,
//! and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::auth;
use crate::papers::MAX_PDF_BYTES;
use crate::state::AppState;

pub mod http;

// multipart framing and text fields on top of the file itself
const UPLOAD_BODY_LIMIT: usize = MAX_PDF_BYTES + 1024 * 1024;

/// Build the application router with:
/// - `/api/health`, `/api/auth/register`, `/api/auth/login` (public)
/// - every other `/api/...` route behind the bearer-token middleware
/// - stored PDFs under `/uploads`
/// - CORS restricted to `allowed_origins`, with credentials
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
/// - JSON 404 for anything else
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let public = Router::new()
        .route("/health", get(http::http_health))
        .route("/auth/register", post(http::http_register))
        .route("/auth/login", post(http::http_login));

    let protected = Router::new()
        .route("/auth/me", get(http::http_me))
        .route(
            "/papers",
            get(http::http_list_papers)
                .post(http::http_upload_paper)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/papers/:id",
            get(http::http_get_paper)
                .put(http::http_update_paper)
                .delete(http::http_delete_paper),
        )
        .route("/papers/:id/download", post(http::http_download_paper))
        .route("/papers/:id/upvote", post(http::http_upvote_paper))
        .route("/papers/:id/save", post(http::http_save_paper))
        .route("/papers/:id/questions/:number/solution", post(http::http_solve_question))
        .route("/ai/generate-solution", post(http::http_generate_solution))
        .route("/ai/solutions/:paper_id", get(http::http_saved_solutions))
        .route("/ai/summarize", post(http::http_summarize))
        .route("/youtube/search", post(http::http_search_videos))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::authorize));

    let uploads = ServeDir::new(state.files.dir());

    Router::new()
        .nest("/api", public.merge(protected))
        .nest_service("/uploads", uploads)
        .fallback(http::http_not_found)
        .with_state(state)
        .layer(cors(allowed_origins))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(target: "examverse_backend", origin = %o, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::issue_token;
    use crate::domain::Role;
    use crate::store::Store;
    use crate::testutil::{sample_paper, sample_user, test_state, FakeGenerator, TEST_SECRET};

    const BOUNDARY: &str = "examverse-test-boundary";

    struct Harness {
        app: Router,
        state: Arc<AppState>,
        _tmp: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = test_state(tmp.path());
        state.ai = Some(FakeGenerator::answering("Entropy measures disorder."));
        let state = Arc::new(state);
        let app = build_router(state.clone(), &["http://localhost:3000".to_string()]);
        Harness { app, state, _tmp: tmp }
    }

    impl Harness {
        async fn user(&self, id: &str, role: Role) -> String {
            let email = format!("{id}@mit.edu");
            self.state.store.insert_user(sample_user(id, &email, role)).await.unwrap();
            issue_token(id, TEST_SECRET, 30).unwrap()
        }

        async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
            let resp: Response = self.app.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }
    }

    fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
        Request::builder().method(method).uri(uri).header("authorization", format!("Bearer {token}"))
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let builder = match token {
            Some(t) => authed(method, uri, t),
            None => Request::builder().method(method).uri(uri),
        };
        builder.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap()
    }

    fn multipart_body(fields: &[(&str, &str)], pdf: Option<&[u8]>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
        if let Some(pdf) = pdf {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf\"; filename=\"midterm.pdf\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(pdf);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_req(token: &str, body: Vec<u8>) -> Request<Body> {
        authed("POST", "/api/papers", token)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    const PAPER_FIELDS: [(&str, &str); 4] =
        [("title", "Midterm 2023"), ("subject", "Physics"), ("year", "2023"), ("course", "BSc")];

    #[tokio::test]
    async fn health_is_public() {
        let h = harness().await;
        let (status, body) =
            h.send(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "ExamVerse API is running");
    }

    #[tokio::test]
    async fn api_requires_token() {
        let h = harness().await;
        let (status, body) =
            h.send(Request::builder().uri("/api/papers").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = h.send(authed("GET", "/api/papers", "not-a-jwt").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let h = harness().await;
        let (status, body) = h.send(Request::builder().uri("/nope").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn register_login_me() {
        let h = harness().await;
        let (status, body) = h
            .send(json_req(
                "POST",
                "/api/auth/register",
                None,
                json!({"name": "Ada", "email": "ada@mit.edu", "password": "secret123",
                       "collegeName": "MIT", "course": "BSc", "year": "2"}),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "ada@mit.edu");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = h
            .send(json_req("POST", "/api/auth/login", None, json!({"email": "ada@mit.edu", "password": "secret123"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = h.send(authed("GET", "/api/auth/me", &token).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ada");

        let (status, body) = h
            .send(json_req("POST", "/api/auth/login", None, json!({"email": "ada@mit.edu", "password": "wrong!!"})))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn student_upload_is_forbidden_whatever_the_payload() {
        let h = harness().await;
        let token = h.user("stud", Role::Student).await;

        let (status, _) = h.send(upload_req(&token, multipart_body(&PAPER_FIELDS, Some(b"%PDF-1.4")))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h.send(json_req("POST", "/api/papers", Some(&token), json!({"title": 1}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn faculty_upload_then_engage() {
        let h = harness().await;
        let prof = h.user("prof", Role::Faculty).await;
        let stud = h.user("stud", Role::Student).await;

        let (status, body) = h.send(upload_req(&prof, multipart_body(&PAPER_FIELDS, Some(b"%PDF-1.4 not really")))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["paper"]["questions"], json!([]));
        assert_eq!(body["paper"]["examType"], "college");
        assert_eq!(body["paper"]["hasFacultySolution"], false);
        let id = body["paper"]["_id"].as_str().unwrap().to_string();

        // stored file is served
        let url = body["paper"]["pdfURL"].as_str().unwrap().to_string();
        let resp = h.app.clone().oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let get = |t: &str| authed("GET", &format!("/api/papers/{id}"), t).body(Body::empty()).unwrap();
        assert_eq!(h.send(get(&stud)).await.1["paper"]["views"], 1);
        let (_, body) = h.send(get(&stud)).await;
        assert_eq!(body["paper"]["views"], 2);
        assert_eq!(body["paper"]["uploadedBy"]["collegeName"], "MIT");

        let upvote = || authed("POST", &format!("/api/papers/{id}/upvote"), &stud).body(Body::empty()).unwrap();
        let (_, body) = h.send(upvote()).await;
        assert_eq!((body["upvotes"].clone(), body["hasUpvoted"].clone()), (json!(1), json!(true)));
        let (_, body) = h.send(upvote()).await;
        assert_eq!((body["upvotes"].clone(), body["hasUpvoted"].clone()), (json!(0), json!(false)));

        let (_, body) =
            h.send(authed("POST", &format!("/api/papers/{id}/download"), &stud).body(Body::empty()).unwrap()).await;
        assert_eq!(body["downloads"], 1);

        let (_, body) =
            h.send(authed("POST", &format!("/api/papers/{id}/save"), &stud).body(Body::empty()).unwrap()).await;
        assert_eq!(body["isSaved"], true);
        assert_eq!(body["savedPapers"], json!([id.clone()]));

        let (status, body) = h
            .send(json_req(
                "POST",
                "/api/ai/generate-solution",
                Some(&stud),
                json!({"question": "What is entropy?", "paperId": id}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isAIGenerated"], true);
        let (_, body) =
            h.send(authed("GET", &format!("/api/ai/solutions/{id}"), &stud).body(Body::empty()).unwrap()).await;
        assert_eq!(body["solutions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_and_missing_file() {
        let h = harness().await;
        let prof = h.user("prof", Role::Faculty).await;

        let (status, body) = h.send(upload_req(&prof, multipart_body(&PAPER_FIELDS, None))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please upload a PDF file");

        let mut fields = PAPER_FIELDS.to_vec();
        fields.push(("examType", "olympiad"));
        let (status, _) = h.send(upload_req(&prof, multipart_body(&fields, Some(b"%PDF")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let h = harness().await;
        let prof = h.user("prof", Role::Faculty).await;
        let big = vec![b'x'; MAX_PDF_BYTES + 1];
        let (status, _) = h.send(upload_req(&prof, multipart_body(&PAPER_FIELDS, Some(&big)))).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn non_owner_cannot_update_or_delete() {
        let h = harness().await;
        let _owner = h.user("owner", Role::Faculty).await;
        let other = h.user("other", Role::Faculty).await;
        h.state.store.insert_paper(sample_paper("p1", "owner")).await.unwrap();

        let (status, body) =
            h.send(json_req("PUT", "/api/papers/p1", Some(&other), json!({"solutionText": "mine now"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to update this paper");

        let (status, _) = h.send(authed("DELETE", "/api/papers/p1", &other).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            h.send(authed("DELETE", "/api/papers/missing", &other).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin_with_credentials() {
        let h = harness().await;
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/papers")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "GET")
            .body(Body::empty())
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.headers().get("access-control-allow-origin").unwrap(), "http://localhost:3000");
        assert_eq!(resp.headers().get("access-control-allow-credentials").unwrap(), "true");
    }
}
