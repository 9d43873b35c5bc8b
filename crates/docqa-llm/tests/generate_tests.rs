use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use docqa_core::traits::Generator;
use docqa_core::Error;
use docqa_llm::OllamaGenerator;

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn generate_sends_non_streaming_request() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/api/generate",
            post(|State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                seen.lock().unwrap().push(body);
                Json(json!({ "model": "llama3", "response": "Boil it for one minute.", "done": true }))
            }),
        )
        .with_state(seen.clone());
    let base = spawn_stub(router).await;

    let generator = OllamaGenerator::new(&base, "llama3", Duration::from_secs(5));
    let answer = generator.generate("How do I purify water?").await.expect("generate");

    assert_eq!(answer, "Boil it for one minute.");
    let requests = seen.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["model"], "llama3");
    assert_eq!(requests[0]["prompt"], "How do I purify water?");
    assert_eq!(requests[0]["stream"], false);
}

#[tokio::test]
async fn generate_surfaces_server_error_message() {
    let router = Router::new().route(
        "/api/generate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "model runner crashed" }))) }),
    );
    let base = spawn_stub(router).await;

    let generator = OllamaGenerator::new(&base, "llama3", Duration::from_secs(5));
    match generator.generate("q").await {
        Err(Error::Generation(msg)) => {
            assert!(msg.contains("model runner crashed"), "{msg}");
            assert!(msg.contains("500"), "{msg}");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn generate_times_out_on_slow_server() {
    let router = Router::new().route(
        "/api/generate",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "response": "too late" }))
        }),
    );
    let base = spawn_stub(router).await;

    let generator = OllamaGenerator::new(&base, "llama3", Duration::from_millis(200));
    let err = generator.generate("q").await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)), "{err:?}");
}
