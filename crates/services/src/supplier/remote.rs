use std::collections::HashSet;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use quiz_core::model::{Difficulty, Question, QuestionId};

use super::{QuestionSupplier, QuizRequest};
use crate::error::SupplyError;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const GENERATE_PATH: &str = "quizzes/generate";

#[derive(Clone, Debug)]
pub struct RemoteSupplierConfig {
    base_url: Url,
    api_token: Option<String>,
    timeout: Duration,
}

impl RemoteSupplierConfig {
    /// # Errors
    ///
    /// Returns `url::ParseError` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Reads `QUIZ_API_BASE_URL`, `QUIZ_API_TOKEN` and `QUIZ_API_TIMEOUT_SECS`.
    ///
    /// Returns `None` when no usable base URL is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let raw = env::var("QUIZ_API_BASE_URL").ok()?;
        if raw.trim().is_empty() {
            return None;
        }
        let mut config = match Self::new(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("ignoring QUIZ_API_BASE_URL={raw:?}: {err}");
                return None;
            }
        };
        if let Ok(token) = env::var("QUIZ_API_TOKEN") {
            config = config.with_token(token);
        }
        if let Some(secs) = env::var("QUIZ_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Some(config)
    }

    /// Bearer token sent with every request. Blank tokens are ignored.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.api_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Fetches generated questions from the quiz HTTP API.
///
/// Transport failures, timeouts, `5xx` and `429` replies count as unavailable
/// so a [`super::FallbackSupplier`] can take over.
#[derive(Clone)]
pub struct RemoteSupplier {
    client: Client,
    config: RemoteSupplierConfig,
}

impl RemoteSupplier {
    /// # Errors
    ///
    /// Returns `SupplyError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: RemoteSupplierConfig) -> Result<Self, SupplyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SupplyError::Unavailable(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &RemoteSupplierConfig {
        &self.config
    }

    fn endpoint(&self) -> Result<Url, SupplyError> {
        self.config
            .base_url
            .join(GENERATE_PATH)
            .map_err(|e| SupplyError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl QuestionSupplier for RemoteSupplier {
    async fn supply(&self, request: &QuizRequest) -> Result<Vec<Question>, SupplyError> {
        let url = self.endpoint()?;
        let payload = GenerateRequest {
            topic: request.topic(),
            difficulty: request.difficulty().as_str(),
            num_questions: request.count(),
        };
        debug!("requesting {} questions from {url}", request.count());

        let mut builder = self.client.post(url).json(&payload);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| SupplyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SupplyError::Unavailable(format!("server replied {status}")));
        }
        if !status.is_success() {
            return Err(SupplyError::HttpStatus(status));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SupplyError::Decode(e.to_string()))?;
        if body.questions.is_empty() {
            return Err(SupplyError::Empty);
        }

        let wires: Vec<WireQuestion> = body.questions.into_iter().take(request.count()).collect();
        let ids = assign_ids(&wires)?;
        wires
            .into_iter()
            .zip(ids)
            .enumerate()
            .map(|(index, (wire, id))| {
                wire.into_question(id, request.difficulty())
                    .map_err(|source| SupplyError::InvalidQuestion { index, source })
            })
            .collect()
    }
}

/// Keeps explicit ids and fills the gaps with the smallest unused ones.
fn assign_ids(wires: &[WireQuestion]) -> Result<Vec<QuestionId>, SupplyError> {
    let mut taken = HashSet::new();
    for (index, wire) in wires.iter().enumerate() {
        if let Some(id) = wire.id {
            if !taken.insert(id) {
                return Err(SupplyError::DuplicateQuestion {
                    index,
                    id: QuestionId::new(id),
                });
            }
        }
    }

    let mut next = 0_u64;
    Ok(wires
        .iter()
        .map(|wire| {
            let id = wire.id.unwrap_or_else(|| {
                next += 1;
                while taken.contains(&next) {
                    next += 1;
                }
                next
            });
            QuestionId::new(id)
        })
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    topic: &'a str,
    difficulty: &'static str,
    num_questions: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    questions: Vec<WireQuestion>,
}

#[derive(Debug, Deserialize)]
struct WireQuestion {
    id: Option<u64>,
    question: String,
    options: Vec<String>,
    correct: usize,
    explanation: Option<String>,
    points: Option<u32>,
    difficulty: Option<String>,
    category: Option<String>,
}

impl WireQuestion {
    fn into_question(
        self,
        id: QuestionId,
        requested: Difficulty,
    ) -> Result<Question, quiz_core::model::QuestionError> {
        let difficulty = self
            .difficulty
            .as_deref()
            .and_then(|raw| raw.parse::<Difficulty>().ok())
            .unwrap_or(requested);
        let points = self.points.unwrap_or_else(|| difficulty.base_points());

        let mut question = Question::new(
            id,
            self.question,
            self.options,
            self.correct,
            points,
        )?
        .with_difficulty(difficulty);
        if let Some(explanation) = self.explanation {
            question = question.with_explanation(explanation);
        }
        if let Some(category) = self.category {
            question = question.with_category(category);
        }
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    async fn stub(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{addr}/api"), handle)
    }

    fn supplier(base: &str) -> RemoteSupplier {
        let config = RemoteSupplierConfig::new(base)
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        RemoteSupplier::new(config).unwrap()
    }

    fn request(count: usize) -> QuizRequest {
        QuizRequest::new("Programming", Difficulty::Hard, count).unwrap()
    }

    const TWO_QUESTIONS: &str = r#"{"questions":[
        {"id":7,"question":"What does CPU stand for?","options":["Central Processing Unit","Core Power Unit"],"correct":0,"explanation":"The processor.","points":120,"difficulty":"easy","category":"Hardware"},
        {"question":"Which is a stack operation?","options":["enqueue","push","shift"],"correct":1}
    ]}"#;

    #[test]
    fn base_url_gets_trailing_slash() {
        let config = RemoteSupplierConfig::new("http://localhost:5000/api").unwrap();
        assert_eq!(config.base_url().as_str(), "http://localhost:5000/api/");
        assert_eq!(
            config.base_url().join(GENERATE_PATH).unwrap().as_str(),
            "http://localhost:5000/api/quizzes/generate"
        );
    }

    #[test]
    fn blank_token_is_ignored() {
        let config = RemoteSupplierConfig::new("http://localhost/")
            .unwrap()
            .with_token("  ");
        assert!(config.api_token.is_none());
    }

    #[tokio::test]
    async fn posts_request_and_maps_questions() {
        let (base, server) = stub("200 OK", TWO_QUESTIONS).await;
        let config = RemoteSupplierConfig::new(&base).unwrap().with_token("tok");
        let supplier = RemoteSupplier::new(config).unwrap();

        let questions = supplier.supply(&request(2)).await.unwrap();
        let raw = server.await.unwrap();

        let lowered = raw.to_lowercase();
        assert!(raw.starts_with("POST /api/quizzes/generate "));
        assert!(lowered.contains("authorization: bearer tok"));
        assert!(raw.contains(r#""numQuestions":2"#));
        assert!(raw.contains(r#""difficulty":"Hard""#));

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id(), QuestionId::new(7));
        assert_eq!(questions[0].points(), 120);
        assert_eq!(questions[0].difficulty(), Some(Difficulty::Easy));
        assert_eq!(questions[0].category(), Some("Hardware"));
        assert_eq!(questions[1].id(), QuestionId::new(1));
        assert_eq!(questions[1].points(), Difficulty::Hard.base_points());
        assert_eq!(questions[1].correct_index(), 1);
    }

    #[tokio::test]
    async fn extra_questions_are_truncated() {
        let (base, server) = stub("200 OK", TWO_QUESTIONS).await;
        let questions = supplier(&base).supply(&request(1)).await.unwrap();
        server.await.unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let (base, server) = stub("503 Service Unavailable", "{}").await;
        let err = supplier(&base).supply(&request(1)).await.unwrap_err();
        server.await.unwrap();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn client_errors_keep_status() {
        let (base, server) = stub("400 Bad Request", "{}").await;
        let err = supplier(&base).supply(&request(1)).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, SupplyError::HttpStatus(StatusCode::BAD_REQUEST)));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let (base, server) = stub("200 OK", "not json").await;
        let err = supplier(&base).supply(&request(1)).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, SupplyError::Decode(_)));
    }

    #[tokio::test]
    async fn empty_list_is_rejected() {
        let (base, server) = stub("200 OK", r#"{"questions":[]}"#).await;
        let err = supplier(&base).supply(&request(1)).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, SupplyError::Empty));
    }

    #[tokio::test]
    async fn invalid_question_reports_index() {
        let body = r#"{"questions":[{"question":"Broken?","options":["a","b"],"correct":5}]}"#;
        let (base, server) = stub("200 OK", body).await;
        let err = supplier(&base).supply(&request(1)).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, SupplyError::InvalidQuestion { index: 0, .. }));
    }

    #[tokio::test]
    async fn generated_ids_skip_explicit_ones() {
        let body = r#"{"questions":[
            {"question":"First?","options":["a","b"],"correct":0},
            {"id":1,"question":"Second?","options":["a","b"],"correct":1},
            {"question":"Third?","options":["a","b"],"correct":0}
        ]}"#;
        let (base, server) = stub("200 OK", body).await;
        let questions = supplier(&base).supply(&request(3)).await.unwrap();
        server.await.unwrap();
        let ids: Vec<u64> = questions.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[tokio::test]
    async fn repeated_explicit_ids_are_rejected() {
        let body = r#"{"questions":[
            {"id":4,"question":"First?","options":["a","b"],"correct":0},
            {"id":4,"question":"Second?","options":["a","b"],"correct":1}
        ]}"#;
        let (base, server) = stub("200 OK", body).await;
        let err = supplier(&base).supply(&request(2)).await.unwrap_err();
        server.await.unwrap();
        assert!(matches!(err, SupplyError::DuplicateQuestion { index: 1, .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = supplier(&format!("http://{addr}/"))
            .supply(&request(1))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
