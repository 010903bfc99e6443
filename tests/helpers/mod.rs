//! In-process mock servers for the external analysis services.
#![allow(dead_code)]

use asset_compliance::services::pipeline::Pipeline;
use asset_compliance::services::retry::RetryPolicy;
use asset_compliance::services::transcription::TranscriptionClient;
use asset_compliance::services::vision::VisionClient;
use asset_compliance::services::vocabulary::VocabularyClient;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header::RETRY_AFTER, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One canned HTTP reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub retry_after: Option<&'static str>,
    pub body: Value,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body,
        }
    }

    pub fn status(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            retry_after: None,
            body,
        }
    }

    pub fn with_retry_after(mut self, value: &'static str) -> Self {
        self.retry_after = Some(value);
        self
    }
}

/// Replies served in order; the last one repeats once the rest are used.
#[derive(Clone, Default)]
pub struct Script {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl Script {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Default::default()
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn respond(&self, request: Option<Value>) -> Response {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if let Some(body) = request {
            self.requests.lock().unwrap().push(body);
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };

        match reply {
            Some(reply) => {
                let mut response = (reply.status, Json(reply.body)).into_response();
                if let Some(value) = reply.retry_after {
                    response
                        .headers_mut()
                        .insert(RETRY_AFTER, HeaderValue::from_static(value));
                }
                response
            }
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Media bucket plus vision, transcription and chat endpoints on one server.
///
/// Routes: `GET /media/{name}`, `GET /stream/{chunks}`, `POST /vision/models/{action}`,
/// `POST /stt/transcript`, `GET /stt/transcript/{id}`, `POST /llm/chat/completions`.
///
/// `/stream/{chunks}` sends that many `STREAM_CHUNK_BYTES` chunks with no
/// Content-Length, counting each chunk as it is produced.
#[derive(Clone, Default)]
pub struct MockServices {
    pub media: Arc<HashMap<String, Vec<u8>>>,
    pub vision: Script,
    pub transcript_submit: Script,
    pub transcript_poll: Script,
    pub chat: Script,
    pub streamed_chunks: Arc<AtomicUsize>,
}

pub const STREAM_CHUNK_BYTES: usize = 64 * 1024;

impl MockServices {
    pub fn with_media(mut self, name: &str, bytes: Vec<u8>) -> Self {
        let mut media = (*self.media).clone();
        media.insert(name.to_string(), bytes);
        self.media = Arc::new(media);
        self
    }

    /// Serve on an ephemeral local port and return the base URL.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/media/{name}", get(media))
            .route("/stream/{chunks}", get(stream))
            .route("/vision/models/{action}", post(vision))
            .route("/stt/transcript", post(transcript_submit))
            .route("/stt/transcript/{id}", get(transcript_poll))
            .route("/llm/chat/completions", post(chat))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Mock server has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock server error");
        });

        format!("http://{addr}")
    }
}

async fn media(State(mock): State<MockServices>, Path(name): Path<String>) -> Response {
    match mock.media.get(&name) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stream(State(mock): State<MockServices>, Path(chunks): Path<usize>) -> Response {
    let counter = mock.streamed_chunks.clone();
    let body = futures::stream::iter(0..chunks).map(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, std::io::Error>(Bytes::from(vec![0u8; STREAM_CHUNK_BYTES]))
    });
    Body::from_stream(body).into_response()
}

async fn vision(State(mock): State<MockServices>, Json(body): Json<Value>) -> Response {
    mock.vision.respond(Some(body))
}

async fn transcript_submit(State(mock): State<MockServices>, Json(body): Json<Value>) -> Response {
    mock.transcript_submit.respond(Some(body))
}

async fn transcript_poll(State(mock): State<MockServices>, Path(_id): Path<String>) -> Response {
    mock.transcript_poll.respond(None)
}

async fn chat(State(mock): State<MockServices>, Json(body): Json<Value>) -> Response {
    mock.chat.respond(Some(body))
}

/// Retry policy with millisecond delays so backoff does not slow the tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20))
}

/// Inline media ceiling used by `pipeline`.
pub const MOCK_INLINE_LIMIT: u64 = 1024 * 1024;

/// A pipeline whose three clients point at a `MockServices` base URL.
pub fn pipeline(base: &str) -> Pipeline {
    let vision = VisionClient::new(
        &format!("{base}/vision"),
        "gemini-test",
        "vision-key",
        MOCK_INLINE_LIMIT,
        fast_retry(),
    )
    .expect("vision client");
    let transcription = TranscriptionClient::new(
        &format!("{base}/stt"),
        "stt-key",
        Duration::from_millis(5),
        Duration::from_secs(5),
        fast_retry(),
    )
    .expect("transcription client");
    let vocabulary = VocabularyClient::new(&format!("{base}/llm"), "gpt-test", "llm-key", fast_retry())
        .expect("vocabulary client");

    Pipeline::new(vision, transcription, vocabulary)
}
