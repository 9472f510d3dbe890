//! Connection
//!
//! Gremlin Server 연결 상태 머신
//!
//! ```text
//! Disconnected → Connected → (SessionOpen) → (TransactionOpen ⇄ SessionOpen) → Disconnected
//! ```
//!
//! 하나의 연결은 한 번에 하나의 요청만 처리합니다. 모든 요청 메서드가
//! `&mut self` 를 받으므로 응답 스트림(206 → 200)을 끝까지 읽기 전에는 다음
//! 요청을 보낼 수 없습니다.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use uuid::Uuid;

use super::config::ConnectionConfig;
use super::error::{DriverError, DriverResult, StatusCode};
use super::message::{Args, Message, DEFAULT_OP};
use super::response::ResponseEnvelope;
use super::types::{MapKey, Value};
use super::workload::Workload;
use crate::protocol::{Frame, Opcode, UpgradeRequest, WebSocketStream};
use crate::serializer::{GraphSon3, JsonSerializer};

/// 세션 프로세서 이름
pub const SESSION_PROCESSOR: &str = "session";

/// 인증 op
pub const AUTHENTICATION_OP: &str = "authentication";

/// 세션 종료 op
pub const CLOSE_OP: &str = "close";

// ============================================================================
// Connection
// ============================================================================

/// Gremlin Server 연결
///
/// `S` 는 TCP, TLS, 인메모리 스트림 등 임의의 비동기 바이트 스트림입니다.
/// TLS 는 호출자가 직접 만든 스트림을 [`Connection::open_with_stream`] 으로
/// 넘겨 사용합니다.
pub struct Connection<S = TcpStream> {
    /// 연결 설정
    config: ConnectionConfig,
    /// 요청 템플릿
    message: Message,
    /// WebSocket 스트림 (연결 전/해제 후 `None`)
    stream: Option<WebSocketStream<S>>,
    /// 세션 ID
    session: Option<Uuid>,
    /// 트랜잭션 진행 여부
    in_transaction: bool,
}

impl Connection<TcpStream> {
    /// TCP 로 연결하고 WebSocket 업그레이드 수행
    ///
    /// 이미 연결되어 있으면 아무것도 하지 않습니다.
    pub async fn open(&mut self) -> DriverResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let address = self.config.address();
        tracing::debug!(%address, "connecting to gremlin server");

        let connect = TcpStream::connect(&address);
        let stream = match self.config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                DriverError::timeout(format!("Connect to {} timed out after {:?}", address, limit))
            })?,
            None => connect.await,
        }
        .map_err(|e| DriverError::connection(format!("Failed to connect to {}: {}", address, e)))?;

        stream.set_nodelay(true).ok();

        self.open_with_stream(stream).await
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// 새 연결 (GraphSON3 기본, JSON 보조 직렬화기 등록)
    pub fn new(config: ConnectionConfig) -> Self {
        let mut message = Message::new();
        message.register_serializer(Arc::new(GraphSon3::new()), true);
        message.register_serializer(Arc::new(JsonSerializer::new()), false);

        Self {
            config,
            message,
            stream: None,
            session: None,
            in_transaction: false,
        }
    }

    /// 이미 연결된 스트림 위에서 WebSocket 업그레이드 수행
    ///
    /// 이미 연결되어 있으면 아무것도 하지 않습니다. 업그레이드에 실패하면
    /// 스트림은 버려집니다.
    pub async fn open_with_stream(&mut self, stream: S) -> DriverResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        let request = UpgradeRequest::new(
            self.config.host.clone(),
            self.config.port,
            self.config.path.clone(),
            self.config.ssl,
        );
        let mut stream = WebSocketStream::new(stream)
            .with_read_timeout(self.config.timeout)
            .with_max_frame_size(self.config.max_frame_size);
        stream.handshake(&request).await?;

        tracing::debug!(host = %self.config.host, port = self.config.port, "connection opened");
        self.stream = Some(stream);
        Ok(())
    }

    // ========================================================================
    // 요청
    // ========================================================================

    /// 요청을 보내고 전체 결과 행을 반환
    ///
    /// - `query` 가 `None` 이면 템플릿의 쿼리를 그대로 사용
    /// - `processor` 가 `""` 이면 템플릿의 프로세서를 사용
    /// - `op` 가 `"eval"` 이면 템플릿의 op 를 사용
    ///
    /// 597 오류는 설정된 횟수만큼 재시도합니다. 성공/실패와 관계없이
    /// 템플릿은 초기화됩니다.
    pub async fn send(
        &mut self,
        query: Option<&str>,
        processor: &str,
        op: &str,
        args: Args,
    ) -> DriverResult<Vec<Value>> {
        self.prepare(query, processor, op, args);

        let workload = self.workload();
        let result = workload
            .linear_retry_with(&mut *self, |conn| Box::pin(conn.dispatch(true)))
            .await;

        self.message.clear();
        result
    }

    /// 쿼리 하나를 기본 설정으로 실행
    pub async fn query(&mut self, gremlin: &str) -> DriverResult<Vec<Value>> {
        self.send(Some(gremlin), "", DEFAULT_OP, Args::new()).await
    }

    /// 서버 오류를 무시하는 전송
    ///
    /// `expect_response` 가 참이면 응답을 끝까지 읽어 버립니다. 로컬 오류는
    /// 그대로 반환합니다. 재시도하지 않습니다.
    pub async fn run(
        &mut self,
        query: Option<&str>,
        processor: &str,
        op: &str,
        args: Args,
        expect_response: bool,
    ) -> DriverResult<()> {
        self.prepare(query, processor, op, args);
        let result = self.dispatch(expect_response).await;
        self.message.clear();

        match result {
            Err(e) if e.is_server() => {
                tracing::debug!(error = %e, "ignoring server error");
                Ok(())
            }
            other => other.map(|_| ()),
        }
    }

    // ========================================================================
    // 트랜잭션
    // ========================================================================

    /// 트랜잭션 시작
    ///
    /// 이미 트랜잭션 중이면 롤백하고 상태를 닫은 뒤 오류를 반환합니다.
    pub async fn transaction_start(&mut self) -> DriverResult<()> {
        self.require_graph()?;

        if self.in_transaction {
            let rollback = format!("{}.tx().rollback()", self.config.graph);
            if let Err(e) = self.send(Some(&rollback), "", DEFAULT_OP, Args::new()).await {
                tracing::warn!(error = %e, "rollback of previous transaction failed");
            }
            self.in_transaction = false;
            return Err(DriverError::transaction(
                "Already in transaction, rolling changes back",
            ));
        }

        let session = self.session();
        self.in_transaction = true;

        let open = format!(
            "if(!{graph}.tx().isOpen()) {graph}.tx().open()",
            graph = self.config.graph
        );
        if let Err(e) = self.send(Some(&open), SESSION_PROCESSOR, DEFAULT_OP, Args::new()).await {
            self.in_transaction = false;
            return Err(e);
        }

        tracing::debug!(%session, "transaction started");
        Ok(())
    }

    /// 트랜잭션 종료 (`commit` 이 거짓이면 롤백)
    ///
    /// 스크립트 결과와 관계없이 트랜잭션 상태는 닫힙니다.
    pub async fn transaction_stop(&mut self, commit: bool) -> DriverResult<()> {
        if !self.in_transaction || self.session.is_none() {
            return Err(DriverError::transaction("No ongoing transaction/session"));
        }

        let action = if commit { "commit" } else { "rollback" };
        let script = format!("{}.tx().{}()", self.config.graph, action);
        let result = self.send(Some(&script), SESSION_PROCESSOR, DEFAULT_OP, Args::new()).await;
        self.in_transaction = false;

        tracing::debug!(action, ok = result.is_ok(), "transaction stopped");
        result.map(|_| ())
    }

    /// 트랜잭션 안에서 작업 실행 (재시도 포함)
    ///
    /// 매 시도마다 트랜잭션을 시작하고 작업을 실행한 뒤, 트랜잭션이 아직 열려
    /// 있으면 커밋합니다. 작업이 실패하면 롤백하고 원래 오류를 반환합니다.
    ///
    /// ```ignore
    /// let created = conn
    ///     .transaction(|conn| Box::pin(async move { conn.query("g.addV('person')").await }))
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&mut self, mut work: F) -> DriverResult<T>
    where
        F: for<'a> FnMut(&'a mut Self) -> BoxFuture<'a, DriverResult<T>>,
    {
        let workload = self.workload();
        let mut remaining = workload.budget();

        loop {
            let error = match self.transaction_attempt(&mut work).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !workload.retry_after(&error, &mut remaining).await {
                return Err(error);
            }
        }
    }

    async fn transaction_attempt<T, F>(&mut self, work: &mut F) -> DriverResult<T>
    where
        F: for<'a> FnMut(&'a mut Self) -> BoxFuture<'a, DriverResult<T>>,
    {
        self.transaction_start().await?;

        match work(&mut *self).await {
            Ok(value) => {
                if self.in_transaction {
                    self.transaction_stop(true).await?;
                }
                Ok(value)
            }
            Err(e) => {
                if self.in_transaction {
                    if let Err(rollback) = self.transaction_stop(false).await {
                        tracing::warn!(error = %rollback, "rollback after failed transaction work failed");
                    }
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // 세션 / 종료
    // ========================================================================

    /// 서버 세션 종료
    ///
    /// 서버 응답을 읽어 버리며 서버 오류는 무시합니다. 로컬 세션 ID 는 항상
    /// 지워집니다.
    pub async fn close_session(&mut self) -> DriverResult<()> {
        self.end_session(true).await
    }

    /// 연결 종료
    ///
    /// 열린 트랜잭션은 롤백하고, 세션을 닫고, close 프레임을 보낸 뒤 스트림을
    /// 해제합니다. 롤백과 세션 종료 실패는 로그만 남깁니다. 이미 끊긴
    /// 연결에서 호출해도 오류가 아닙니다.
    pub async fn close(&mut self) -> DriverResult<()> {
        if self.stream.is_none() {
            self.session = None;
            self.in_transaction = false;
            return Ok(());
        }

        if self.in_transaction {
            if let Err(e) = self.transaction_stop(false).await {
                tracing::warn!(error = %e, "rollback failed while closing connection");
            }
        }

        if let Err(e) = self.end_session(false).await {
            tracing::warn!(error = %e, "session close failed while closing connection");
        }

        let result = match self.stream.take() {
            Some(mut stream) => stream.close().await.map_err(DriverError::from),
            None => Ok(()),
        };

        self.session = None;
        self.in_transaction = false;
        tracing::debug!("connection closed");
        result
    }

    async fn end_session(&mut self, expect_response: bool) -> DriverResult<()> {
        let Some(session) = self.session else {
            return Ok(());
        };

        let mut message = Message::with_registry(self.message.registry().clone());
        message.op = CLOSE_OP.to_string();
        message.processor = SESSION_PROCESSOR.to_string();
        message.set_argument("session", session.to_string());

        let result = match message.build_message() {
            Ok(payload) => {
                self.exchange(payload, message.request_id(), expect_response)
                    .await
            }
            Err(e) => Err(e),
        };
        self.session = None;
        tracing::debug!(%session, "session closed");

        match result {
            Err(e) if e.is_server() => Ok(()),
            other => other.map(|_| ()),
        }
    }

    // ========================================================================
    // 상태 조회
    // ========================================================================

    /// 연결 여부
    pub fn is_connected(&self) -> bool {
        self.stream.as_ref().is_some_and(|stream| stream.is_open())
    }

    /// 트랜잭션 진행 여부
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// 세션 ID (없으면 새로 생성)
    pub fn session(&mut self) -> Uuid {
        *self.session.get_or_insert_with(|| {
            let session = Uuid::new_v4();
            tracing::debug!(%session, "session created");
            session
        })
    }

    /// 현재 세션 ID
    pub fn session_id(&self) -> Option<Uuid> {
        self.session
    }

    /// 세션 존재 여부
    pub fn is_session_open(&self) -> bool {
        self.session.is_some()
    }

    /// 요청 템플릿
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// 요청 템플릿 (수정용)
    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// 연결 설정
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    // ========================================================================
    // 내부
    // ========================================================================

    fn workload(&self) -> Workload {
        Workload::new(self.config.retry_attempts, self.config.retry_interval)
    }

    fn require_graph(&self) -> DriverResult<()> {
        if self.config.graph.is_empty() {
            return Err(DriverError::transaction("A graph object needs to be specified"));
        }
        Ok(())
    }

    /// 템플릿에 요청 내용 반영 (세션, 별칭 포함)
    fn prepare(&mut self, query: Option<&str>, processor: &str, op: &str, mut args: Args) {
        if let Some(query) = query {
            self.message.gremlin = Some(query.to_string());
        }
        if op != DEFAULT_OP {
            self.message.op = op.to_string();
        }
        if !processor.is_empty() {
            self.message.processor = processor.to_string();
        }

        if self.in_transaction || self.message.processor == SESSION_PROCESSOR {
            let session = self.session();
            if processor.is_empty() {
                self.message.processor = SESSION_PROCESSOR.to_string();
            }
            self.message.set_argument("session", session.to_string());
        }

        self.merge_aliases(&mut args);
        self.message.set_arguments(args);
    }

    /// 설정된 별칭을 `aliases` 인자에 병합 (설정값 우선)
    fn merge_aliases(&self, args: &mut Args) {
        if self.config.aliases.is_empty() {
            return;
        }

        let aliases = args
            .entry("aliases".to_string())
            .or_insert_with(Value::empty_map);
        if !matches!(aliases, Value::Map(_)) {
            *aliases = Value::empty_map();
        }
        if let Value::Map(map) = aliases {
            for (name, target) in &self.config.aliases {
                map.insert(MapKey::from(name.as_str()), Value::from(target.as_str()));
            }
        }
    }

    /// 템플릿을 직렬화해 전송
    async fn dispatch(&mut self, expect_response: bool) -> DriverResult<Vec<Value>> {
        let payload = self.message.build_message()?;
        tracing::trace!(
            request_id = ?self.message.request_id(),
            op = %self.message.op,
            processor = %self.message.processor,
            "sending request"
        );
        let request_id = self.message.request_id();
        self.exchange(payload, request_id, expect_response).await
    }

    /// 요청 한 번의 송수신
    ///
    /// 전송 계층 오류가 나면 스트림을 버립니다.
    async fn exchange(
        &mut self,
        payload: Bytes,
        request_id: Option<Uuid>,
        expect_response: bool,
    ) -> DriverResult<Vec<Value>> {
        let result = match self.write(payload).await {
            Ok(()) if expect_response => self.read_response(request_id).await,
            Ok(()) => Ok(Vec::new()),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            if e.is_transport_failure() {
                self.release_transport(e);
            }
        }
        result
    }

    async fn write(&mut self, payload: Bytes) -> DriverResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DriverError::connection("Not connected"))?;
        stream.send_frame(Frame::binary(payload)).await?;
        Ok(())
    }

    /// 응답 읽기 루프
    ///
    /// 206 은 행을 누적하고 다음 프레임을 읽으며, 200 에서 누적된 행을
    /// 반환합니다. 407 을 받으면 인증 요청을 보낸 뒤 이어지는 응답을 원래
    /// 요청의 응답으로 읽습니다. 도중에 실패하면 누적된 행은 버려집니다.
    ///
    /// 다른 요청 ID 의 응답은 건너뜁니다. 해석할 수 없는 프레임을 받으면
    /// 남은 응답 프레임의 경계를 알 수 없으므로 전송 계층을 버립니다.
    async fn read_response(&mut self, request_id: Option<Uuid>) -> DriverResult<Vec<Value>> {
        let mut rows = Vec::new();
        let mut accepted: Vec<Uuid> = request_id.into_iter().collect();
        let mut authenticated = false;

        loop {
            let response = match self.read_envelope().await {
                Ok(response) => response,
                Err(e) => {
                    if !e.is_transport_failure() {
                        self.release_transport(&e);
                    }
                    return Err(e);
                }
            };
            if !answers(&response, &accepted) {
                tracing::warn!(
                    request_id = ?response.request_id,
                    code = response.code(),
                    "discarding response for another request"
                );
                continue;
            }

            match response.code() {
                StatusCode::AUTHENTICATE if !authenticated => {
                    authenticated = true;
                    rows.clear();
                    accepted.extend(self.authenticate().await?);
                }
                StatusCode::NO_CONTENT if self.config.empty_set => return Ok(Vec::new()),
                StatusCode::PARTIAL_CONTENT => {
                    tracing::trace!(rows = response.result.data.len(), "partial response");
                    rows.extend(response.result.data);
                }
                StatusCode::SUCCESS => {
                    rows.extend(response.result.data);
                    return Ok(rows);
                }
                _ => return Err(response.status.to_server_error().into()),
            }
        }
    }

    async fn read_envelope(&mut self) -> DriverResult<ResponseEnvelope> {
        let frame = {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| DriverError::connection("Not connected"))?;
            stream.recv_message().await?
        };

        let binary = frame.opcode == Opcode::Binary && self.config.accept_diff_response_format;
        let value = self.message.parse(&frame.payload, binary)?;
        ResponseEnvelope::from_value(value)
    }

    /// SASL 인증 요청 전송 (보낸 요청 ID 반환)
    async fn authenticate(&mut self) -> DriverResult<Option<Uuid>> {
        let username = self.config.username.as_deref().unwrap_or_default().trim();
        let password = self.config.password.as_deref().unwrap_or_default().trim();
        let sasl = STANDARD.encode(format!("\0{}\0{}", username, password));

        let mut message = Message::with_registry(self.message.registry().clone());
        message.op = AUTHENTICATION_OP.to_string();
        message.set_argument("sasl", sasl);
        message.set_argument("saslMechanism", self.config.sasl_mechanism.clone());
        if let Some(session) = self.session {
            message.processor = SESSION_PROCESSOR.to_string();
            message.set_argument("session", session.to_string());
        }

        tracing::debug!(mechanism = %self.config.sasl_mechanism, "answering authentication challenge");
        let payload = message.build_message()?;
        self.write(payload).await?;
        Ok(message.request_id())
    }

    fn release_transport(&mut self, error: &DriverError) {
        if let Some(mut stream) = self.stream.take() {
            stream.abort();
            tracing::debug!(%error, "transport released after failure");
        }
    }
}

/// 응답이 기다리는 요청의 것인지 확인
///
/// ID 가 없는 응답은 받아들입니다.
fn answers(response: &ResponseEnvelope, accepted: &[Uuid]) -> bool {
    match response.request_id.as_deref() {
        None | Some("") => true,
        Some(_) if accepted.is_empty() => true,
        Some(id) => Uuid::parse_str(id).is_ok_and(|id| accepted.contains(&id)),
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.config.address())
            .field("connected", &self.stream.is_some())
            .field("session", &self.session)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
