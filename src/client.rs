use crate::candidates::CandidateList;
use crate::errors::{ApiError, StoreError, TransportError};
use crate::models::ErrorBody;
use crate::notices::NoticeBoard;
use crate::session::Session;
use crate::transport::{HttpTransport, Method, OutboundRequest, RawResponse, Transport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

pub const AUTH_FAILURE_STATUSES: [u16; 2] = [401, 403];

/// Statuses that mean "this base is the wrong server", not "the call failed".
/// 404 is included: a base without the API answers every route with it.
pub const RETRYABLE_STATUSES: [u16; 4] = [404, 502, 503, 504];

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";
pub const UNREACHABLE_MESSAGE: &str =
    "Unable to reach the backend API. Please confirm it is running on port 8081.";

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// No-content response, or a success without a JSON body.
    Empty,
    Json(Value),
}

impl Payload {
    /// The payload as JSON; `Empty` becomes `{}`.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Empty => Value::Object(Default::default()),
            Payload::Json(value) => value,
        }
    }

    pub fn decode<R: DeserializeOwned>(self) -> Result<Option<R>, ApiError> {
        match self {
            Payload::Empty => Ok(None),
            Payload::Json(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(ApiError::Decode),
        }
    }
}

/// Outcome of one attempt against one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Success(Payload),
    Retry { status: u16 },
    AuthFailure { status: u16, message: String },
    ServerError { status: u16, message: String },
    NetworkError(String),
}

/// Classifies the result of sending to one candidate. `is_last` turns a
/// retryable status into a terminal server error.
pub fn classify(result: Result<RawResponse, TransportError>, is_last: bool) -> Attempt {
    let response = match result {
        Ok(response) => response,
        Err(err) => return Attempt::NetworkError(err.0),
    };
    let status = response.status;

    if (200..300).contains(&status) {
        if status == 204 || response.body.is_empty() {
            return Attempt::Success(Payload::Empty);
        }
        return match serde_json::from_slice(&response.body) {
            Ok(Value::Null) => Attempt::Success(Payload::Empty),
            Ok(value) => Attempt::Success(Payload::Json(value)),
            Err(err) => {
                warn!("expected JSON response but received none: {err}");
                Attempt::Success(Payload::Empty)
            }
        };
    }

    let message = serde_json::from_slice::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("Request failed with status {status}"));

    if AUTH_FAILURE_STATUSES.contains(&status) {
        Attempt::AuthFailure { status, message }
    } else if RETRYABLE_STATUSES.contains(&status) && !is_last {
        Attempt::Retry { status }
    } else {
        Attempt::ServerError { status, message }
    }
}

/// API client that fails over across candidate base addresses.
///
/// Owns the candidate order and the session token. A success on any
/// candidate promotes it to the front so later calls try it first.
#[derive(Debug)]
pub struct ApiClient<T = HttpTransport> {
    transport: T,
    candidates: CandidateList,
    session: Session,
    notices: NoticeBoard,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(
        transport: T,
        candidates: CandidateList,
        session: Session,
        notices: NoticeBoard,
    ) -> Self {
        Self {
            transport,
            candidates,
            session,
            notices,
        }
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub async fn sign_in(&mut self, token: String) -> Result<(), StoreError> {
        self.session.sign_in(token).await
    }

    /// Drops the session token, in memory and in the store.
    pub async fn clear_session(&mut self) {
        self.session.clear().await;
    }

    pub async fn request(
        &mut self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> Result<Payload, ApiError> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(ApiError::Encode)?;
        self.execute(endpoint, method, body).await
    }

    pub async fn request_with<B: Serialize>(
        &mut self,
        endpoint: &str,
        method: Method,
        body: &B,
    ) -> Result<Payload, ApiError> {
        let body = serde_json::to_vec(body).map_err(ApiError::Encode)?;
        self.execute(endpoint, method, Some(body)).await
    }

    async fn execute(
        &mut self,
        endpoint: &str,
        method: Method,
        body: Option<Vec<u8>>,
    ) -> Result<Payload, ApiError> {
        debug!(bases = ?self.candidates.as_slice(), "{method} {endpoint}: trying API bases in order");

        let total = self.candidates.len();
        let mut last_network_error = None;

        for index in 0..total {
            let Some(base) = self.candidates.get(index).map(str::to_string) else {
                break;
            };
            let request = OutboundRequest {
                method,
                url: format!("{base}{endpoint}"),
                bearer: self.session.token().map(str::to_string),
                body: body.clone(),
            };
            let is_last = index + 1 == total;

            match classify(self.transport.send(&request).await, is_last) {
                Attempt::Success(payload) => {
                    if index > 0 {
                        info!("promoting API base {base}");
                        self.candidates.promote(index);
                    }
                    return Ok(payload);
                }
                Attempt::Retry { status } => {
                    warn!("{status} from {}; trying next API base", request.url);
                }
                Attempt::NetworkError(detail) => {
                    warn!("network error talking to {base}: {detail}");
                    last_network_error = Some(detail);
                }
                Attempt::AuthFailure { status, message } => {
                    warn!("authentication failed ({status}); clearing stored token");
                    self.session.clear().await;
                    self.notices.error(SESSION_EXPIRED_MESSAGE).await;
                    return Err(ApiError::AuthenticationFailure { status, message });
                }
                Attempt::ServerError { status, message } => {
                    error!("{method} {} failed with {status}: {message}", request.url);
                    self.notices.error(message.clone()).await;
                    return Err(ApiError::ServerError { status, message });
                }
            }
        }

        error!(
            last_error = last_network_error.as_deref().unwrap_or("none"),
            "all API base URLs failed; is the backend running?"
        );
        self.notices.error(UNREACHABLE_MESSAGE).await;
        Err(ApiError::Unreachable {
            message: UNREACHABLE_MESSAGE.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::SessionStore;
    use crate::session::tests::temp_store_path;
    use serde_json::json;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    type Reply = Result<RawResponse, TransportError>;

    #[derive(Default)]
    struct Script {
        replies: HashMap<String, VecDeque<Reply>>,
        sent: Vec<OutboundRequest>,
    }

    /// Answers from per-base queues; an exhausted queue refuses the connection.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport {
        inner: Arc<Mutex<Script>>,
    }

    impl ScriptedTransport {
        pub(crate) fn reply(&self, base: &str, status: u16, body: &str) -> &Self {
            self.push(
                base,
                Ok(RawResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
            )
        }

        pub(crate) fn refuse(&self, base: &str) -> &Self {
            self.push(base, Err(TransportError("connection refused".into())))
        }

        fn push(&self, base: &str, reply: Reply) -> &Self {
            self.inner
                .lock()
                .unwrap()
                .replies
                .entry(base.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        pub(crate) fn sent(&self) -> Vec<OutboundRequest> {
            self.inner.lock().unwrap().sent.clone()
        }

        pub(crate) fn sent_urls(&self) -> Vec<String> {
            self.sent().into_iter().map(|request| request.url).collect()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
            let mut script = self.inner.lock().unwrap();
            script.sent.push(request.clone());
            let base = script
                .replies
                .keys()
                .find(|base| {
                    request
                        .url
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                })
                .cloned();
            base.and_then(|base| script.replies.get_mut(&base)?.pop_front())
                .unwrap_or_else(|| Err(TransportError("connection refused".into())))
        }
    }

    pub(crate) async fn client_with(
        transport: &ScriptedTransport,
        bases: &[&str],
        token: Option<&str>,
    ) -> ApiClient<ScriptedTransport> {
        client_at(temp_store_path("client"), transport, bases, token).await
    }

    async fn client_at(
        store_path: std::path::PathBuf,
        transport: &ScriptedTransport,
        bases: &[&str],
        token: Option<&str>,
    ) -> ApiClient<ScriptedTransport> {
        let mut session = Session::new(SessionStore::open(store_path).await);
        if let Some(token) = token {
            session.sign_in(token.to_string()).await.unwrap();
        }
        ApiClient::new(
            transport.clone(),
            CandidateList::from_bases(bases.iter().copied()),
            session,
            NoticeBoard::new(),
        )
    }

    const A: &str = "http://a.test";
    const B: &str = "http://b.test";
    const C: &str = "http://c.test";

    #[tokio::test]
    async fn success_on_third_candidate_promotes_it() {
        let transport = ScriptedTransport::default();
        transport
            .reply(A, 503, "")
            .reply(B, 503, "")
            .reply(C, 200, r#"{"id":7}"#);
        let mut client = client_with(&transport, &[A, B, C], None).await;

        let payload = client.request("/api/expenses", Method::Get, None).await.unwrap();

        assert_eq!(payload, Payload::Json(json!({ "id": 7 })));
        assert_eq!(client.candidates().as_slice(), [C, A, B]);
        assert_eq!(client.notices().error_message().await, None);
    }

    #[tokio::test]
    async fn promoted_candidate_is_tried_first_next_time() {
        let transport = ScriptedTransport::default();
        transport.refuse(A).reply(B, 200, "[]").reply(B, 200, "[]");
        let mut client = client_with(&transport, &[A, B], None).await;

        client.request("/api/expenses", Method::Get, None).await.unwrap();
        client.request("/api/expenses", Method::Get, None).await.unwrap();

        assert_eq!(
            transport.sent_urls(),
            [
                "http://a.test/api/expenses",
                "http://b.test/api/expenses",
                "http://b.test/api/expenses",
            ]
        );
    }

    #[tokio::test]
    async fn auth_failure_stops_and_clears_token() {
        let transport = ScriptedTransport::default();
        transport
            .reply(A, 401, r#"{"message":"jwt expired"}"#)
            .reply(B, 200, "{}");
        let store_path = temp_store_path("expired");
        let mut client = client_at(store_path.clone(), &transport, &[A, B], Some("tok")).await;
        assert_eq!(SessionStore::open(&store_path).await.get("token"), Some("tok"));

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();

        assert!(matches!(
            err,
            ApiError::AuthenticationFailure { status: 401, ref message } if message == "jwt expired"
        ));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(client.session().token(), None);
        assert_eq!(SessionStore::open(&store_path).await.get("token"), None);
        assert_eq!(client.candidates().as_slice(), [A, B]);
        assert_eq!(
            client.notices().error_message().await.as_deref(),
            Some(SESSION_EXPIRED_MESSAGE)
        );
    }

    #[tokio::test]
    async fn forbidden_on_single_candidate_is_auth_failure() {
        let transport = ScriptedTransport::default();
        transport.reply(A, 403, "");
        let mut client = client_with(&transport, &[A], Some("tok")).await;

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(client.session().token(), None);
        assert_eq!(client.candidates().as_slice(), [A]);
    }

    #[tokio::test]
    async fn retryable_status_everywhere_ends_in_server_error() {
        let transport = ScriptedTransport::default();
        transport.reply(A, 503, "").reply(B, 503, "").reply(C, 503, "");
        let mut client = client_with(&transport, &[A, B, C], None).await;

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();

        assert_eq!(transport.sent().len(), 3);
        assert!(matches!(err, ApiError::ServerError { status: 503, .. }));
        assert_eq!(err.to_string(), "Request failed with status 503");
        assert_eq!(client.candidates().as_slice(), [A, B, C]);
    }

    #[tokio::test]
    async fn network_failure_everywhere_is_unreachable() {
        let transport = ScriptedTransport::default();
        transport.refuse(A).refuse(B);
        let mut client = client_with(&transport, &[A, B], None).await;

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();

        assert!(matches!(err, ApiError::Unreachable { .. }));
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(
            client.notices().error_message().await.as_deref(),
            Some(UNREACHABLE_MESSAGE)
        );
    }

    #[tokio::test]
    async fn last_candidate_decides_kind_of_exhaustion() {
        let transport = ScriptedTransport::default();
        transport.reply(A, 503, "").refuse(B);
        let mut client = client_with(&transport, &[A, B], None).await;

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unreachable { .. }));

        let transport = ScriptedTransport::default();
        transport.refuse(A).reply(B, 404, "");
        let mut client = client_with(&transport, &[A, B], None).await;

        let err = client.request("/api/expenses", Method::Get, None).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError { status: 404, .. }));
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(client.candidates().as_slice(), [A, B]);
    }

    #[tokio::test]
    async fn non_retryable_status_stops_with_server_message() {
        let transport = ScriptedTransport::default();
        transport
            .reply(A, 400, r#"{"message":"amount must be positive"}"#)
            .reply(B, 200, "{}");
        let mut client = client_with(&transport, &[A, B], None).await;

        let err = client
            .request("/api/expenses", Method::Post, Some(&json!({ "amount": -1 })))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::ServerError { status: 400, .. }));
        assert_eq!(err.to_string(), "amount must be positive");
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn no_content_yields_empty_payload() {
        let transport = ScriptedTransport::default();
        transport.reply(A, 204, "");
        let mut client = client_with(&transport, &[A], None).await;

        let payload = client.request("/api/expenses/1", Method::Delete, None).await.unwrap();

        assert_eq!(payload, Payload::Empty);
        assert_eq!(payload.into_value(), json!({}));
    }

    #[tokio::test]
    async fn headers_follow_token_and_body() {
        let transport = ScriptedTransport::default();
        transport.reply(A, 200, "[]").reply(A, 201, r#"{"id":1}"#);
        let mut client = client_with(&transport, &[A], Some("tok")).await;

        client.request("/api/expenses", Method::Get, None).await.unwrap();
        client
            .request_with("/api/expenses", Method::Post, &json!({ "amount": 3 }))
            .await
            .unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].bearer.as_deref(), Some("tok"));
        assert!(sent[0].body.is_none());
        assert_eq!(sent[1].method, Method::Post);
        assert_eq!(sent[1].body.as_deref(), Some(br#"{"amount":3}"#.as_slice()));
    }

    #[test]
    fn classify_covers_each_outcome() {
        let reply = |status: u16, body: &str| {
            Ok(RawResponse {
                status,
                body: body.as_bytes().to_vec(),
            })
        };

        assert_eq!(
            classify(reply(200, "not json"), false),
            Attempt::Success(Payload::Empty)
        );
        assert_eq!(
            classify(reply(200, "null"), false),
            Attempt::Success(Payload::Empty)
        );
        assert_eq!(classify(reply(404, ""), false), Attempt::Retry { status: 404 });
        assert_eq!(
            classify(reply(404, ""), true),
            Attempt::ServerError {
                status: 404,
                message: "Request failed with status 404".into()
            }
        );
        assert_eq!(
            classify(reply(500, r#"{"message":"db down"}"#), false),
            Attempt::ServerError {
                status: 500,
                message: "db down".into()
            }
        );
        assert!(matches!(
            classify(reply(403, ""), false),
            Attempt::AuthFailure { status: 403, .. }
        ));
        assert_eq!(
            classify(Err(TransportError("reset".into())), true),
            Attempt::NetworkError("reset".into())
        );
    }
}
