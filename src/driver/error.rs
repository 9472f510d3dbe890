//! Driver Error Types
//!
//! 드라이버 에러 정의
//!
//! 에러는 두 종류로 나뉩니다: 로컬(내부) 에러와 서버 에러.
//! 서버 에러는 상태 코드, 메시지, 속성 맵을 담고 있으며
//! 코드 597 만 재시도 대상입니다.

use std::fmt;
use std::io;
use thiserror::Error;

use super::types::{Map, MapKey, Value};
use crate::protocol::ProtocolError;
use crate::serializer::SerializerError;

// ============================================================================
// DriverError - 드라이버 에러
// ============================================================================

/// 드라이버 에러
#[derive(Error, Debug)]
pub enum DriverError {
    /// 연결 에러
    #[error("Connection error: {0}")]
    Connection(String),

    /// 핸드셰이크 에러
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// 프로토콜 에러
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 타임아웃 에러
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 직렬화 에러
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializerError),

    /// 등록되지 않은 MIME 타입
    #[error("No serializer found for mimeType: {mime}")]
    NoSerializer {
        /// 요청된 MIME 타입
        mime: String,
    },

    /// 기본 직렬화기 없음
    #[error("No default serializer set")]
    NoDefaultSerializer,

    /// 세션 에러
    #[error("Session error: {0}")]
    Session(String),

    /// 트랜잭션 에러
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 서버 에러
    #[error("Server error: {0}")]
    Server(ServerError),
}

impl DriverError {
    /// 연결 에러 생성
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// 프로토콜 에러 생성
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// 타임아웃 에러 생성
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// 세션 에러 생성
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// 트랜잭션 에러 생성
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// MIME 타입 조회 실패 에러 생성
    pub fn no_serializer(mime: impl Into<String>) -> Self {
        Self::NoSerializer { mime: mime.into() }
    }

    /// 서버 에러 생성
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::Server(ServerError::new(code, message))
    }

    /// 서버 에러 여부
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// 로컬(내부) 에러 여부
    pub fn is_internal(&self) -> bool {
        !self.is_server()
    }

    /// 서버 상태 코드
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Server(err) => Some(err.code),
            _ => None,
        }
    }

    /// 재시도 가능 여부 (서버 코드 597 만 해당)
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Server(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// 전송 계층이 더 이상 쓸 수 없는 에러인지 여부
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Protocol(_) | Self::Timeout(_) | Self::Io(_)
        )
    }
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => DriverError::Io(e),
            ProtocolError::Handshake(e) => DriverError::Handshake(e.to_string()),
            ProtocolError::Timeout(_) => DriverError::Timeout(err.to_string()),
            ProtocolError::ConnectionClosed => {
                DriverError::Connection("Connection closed by server".to_string())
            }
            other => DriverError::Protocol(other.to_string()),
        }
    }
}

impl From<ServerError> for DriverError {
    fn from(err: ServerError) -> Self {
        DriverError::Server(err)
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 드라이버 결과 타입
pub type DriverResult<T> = Result<T, DriverError>;

// ============================================================================
// StatusCode - 응답 상태 코드
// ============================================================================

/// Gremlin Server 응답 상태 코드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// 성공
    pub const SUCCESS: u16 = 200;
    /// 결과 없음
    pub const NO_CONTENT: u16 = 204;
    /// 부분 응답 (스트리밍)
    pub const PARTIAL_CONTENT: u16 = 206;
    /// 인증 실패
    pub const UNAUTHORIZED: u16 = 401;
    /// 인증 요청
    pub const AUTHENTICATE: u16 = 407;
    /// 잘못된 요청
    pub const MALFORMED_REQUEST: u16 = 498;
    /// 잘못된 요청 인자
    pub const INVALID_REQUEST_ARGUMENTS: u16 = 499;
    /// 서버 에러
    pub const SERVER_ERROR: u16 = 500;
    /// 스크립트 평가 에러 (재시도 대상)
    pub const SCRIPT_EVALUATION_ERROR: u16 = 597;
    /// 서버 타임아웃
    pub const SERVER_TIMEOUT: u16 = 598;
    /// 서버 직렬화 에러
    pub const SERVER_SERIALIZATION_ERROR: u16 = 599;

    /// 상태 코드 설명
    pub fn description(self) -> &'static str {
        match self.0 {
            Self::NO_CONTENT => {
                "The server processed the request but there is no result to return (e.g. an Iterator with no elements)."
            }
            Self::UNAUTHORIZED => {
                "The request attempted to access resources that the requesting user did not have access to"
            }
            Self::AUTHENTICATE => {
                "A challenge from the server for the client to authenticate its request."
            }
            Self::MALFORMED_REQUEST => {
                "The request message was not properly formatted which means it could not be parsed at all or the 'op' code was not recognized such that Gremlin Server could properly route it for processing. Check the message format and retry the request"
            }
            Self::INVALID_REQUEST_ARGUMENTS => {
                "The request message was parseable, but the arguments supplied in the message were in conflict or incomplete. Check the message format and retry the request."
            }
            Self::SERVER_ERROR => {
                "A general server error occurred that prevented the request from being processed."
            }
            Self::SCRIPT_EVALUATION_ERROR => {
                "The script submitted for processing evaluated in the ScriptEngine with errors and could not be processed. Check the script submitted for syntax errors or other problems and then resubmit."
            }
            Self::SERVER_TIMEOUT => {
                "The server exceeded one of the timeout settings for the request and could therefore only partially responded or did not respond at all."
            }
            Self::SERVER_SERIALIZATION_ERROR => {
                "The server was not capable of serializing an object that was returned from the script supplied on the request. Either transform the object into something Gremlin Server can process within the script or install mapper serialization classes to Gremlin Server."
            }
            _ => "UNKNOWN ERROR",
        }
    }

    /// 성공 계열 (200, 204, 206) 여부
    pub fn is_success(self) -> bool {
        matches!(self.0, Self::SUCCESS | Self::NO_CONTENT | Self::PARTIAL_CONTENT)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ServerError - 서버 에러
// ============================================================================

/// 서버가 반환한 에러
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    /// 상태 코드
    pub code: u16,
    /// 서버 메시지
    pub message: String,
    /// 상태 속성
    pub attributes: Map,
}

impl ServerError {
    /// 새 에러 생성
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            attributes: Map::new(),
        }
    }

    /// 속성 설정
    pub fn with_attributes(mut self, attributes: Map) -> Self {
        self.attributes = attributes;
        self
    }

    /// 상태 코드 설명
    pub fn description(&self) -> &'static str {
        StatusCode(self.code).description()
    }

    /// 재시도 가능 여부
    pub fn is_retryable(&self) -> bool {
        self.code == StatusCode::SCRIPT_EVALUATION_ERROR
    }

    /// 인증 에러 여부
    pub fn is_authentication_error(&self) -> bool {
        self.code == StatusCode::UNAUTHORIZED
    }

    /// 속성 조회
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(&MapKey::from(name))
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.description(), self.message)
    }
}

impl std::error::Error for ServerError {}

// ============================================================================
// Tests
// ============================================================================
