//! Connection Config
//!
//! 연결 설정 및 빌더

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use crate::protocol::frame::DEFAULT_MAX_FRAME_SIZE;

/// 기본 포트
pub const DEFAULT_PORT: u16 = 8182;

/// 기본 경로
pub const DEFAULT_PATH: &str = "/gremlin";

/// 기본 SASL 메커니즘
pub const DEFAULT_SASL_MECHANISM: &str = "PLAIN";

// ============================================================================
// ConnectionConfig - 연결 설정
// ============================================================================

/// 연결 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
    /// WebSocket 경로
    pub path: String,
    /// 사용자명
    pub username: Option<String>,
    /// 비밀번호
    pub password: Option<String>,
    /// 그래프 객체 이름 (트랜잭션 스크립트에 사용)
    pub graph: String,
    /// 별칭 매핑 (이름 -> 서버측 그래프 변수)
    pub aliases: IndexMap<String, String>,
    /// TLS 사용 여부
    pub ssl: bool,
    /// SASL 메커니즘
    pub sasl_mechanism: String,
    /// 연결 타임아웃
    pub connect_timeout: Option<Duration>,
    /// 읽기 타임아웃
    pub timeout: Option<Duration>,
    /// 재시도 횟수 (0 또는 1 이면 재시도 없음)
    pub retry_attempts: u32,
    /// 재시도 간격
    pub retry_interval: Duration,
    /// 204 응답을 빈 결과로 처리
    pub empty_set: bool,
    /// 바이너리 응답의 MIME 헤더를 해석
    pub accept_diff_response_format: bool,
    /// 최대 프레임 크기
    pub max_frame_size: usize,
}

impl ConnectionConfig {
    /// 호스트/포트로 새 설정 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// URI에서 파싱 (`ws://host:port/path`, `wss://...`)
    pub fn from_uri(uri: &str) -> DriverResult<Self> {
        let (ssl, rest) = if let Some(rest) = uri.strip_prefix("wss://") {
            (true, rest)
        } else if let Some(rest) = uri.strip_prefix("ws://") {
            (false, rest)
        } else {
            (false, uri)
        };

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, DEFAULT_PATH),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| DriverError::configuration(format!("Invalid port in {}", uri)))?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(DriverError::configuration(format!("Missing host in {}", uri)));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
            ssl,
            ..Self::default()
        })
    }

    /// 빌더 시작
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder {
            config: Self::default(),
        }
    }

    /// 소켓 주소
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 인증 정보 설정 여부
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            username: None,
            password: None,
            graph: "graph".to_string(),
            aliases: IndexMap::new(),
            ssl: false,
            sasl_mechanism: DEFAULT_SASL_MECHANISM.to_string(),
            connect_timeout: None,
            timeout: None,
            retry_attempts: 1,
            retry_interval: Duration::from_micros(200),
            empty_set: false,
            accept_diff_response_format: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ============================================================================
// ConnectionConfigBuilder - 설정 빌더
// ============================================================================

/// 연결 설정 빌더
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    /// 호스트 설정
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// 포트 설정
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// 경로 설정
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// 인증 정보 설정
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = Some(username.into());
        self.config.password = Some(password.into());
        self
    }

    /// 그래프 객체 이름 설정
    pub fn with_graph(mut self, graph: impl Into<String>) -> Self {
        self.config.graph = graph.into();
        self
    }

    /// 별칭 추가
    pub fn with_alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.config.aliases.insert(name.into(), target.into());
        self
    }

    /// TLS 설정
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.config.ssl = ssl;
        self
    }

    /// SASL 메커니즘 설정
    pub fn with_sasl_mechanism(mut self, mechanism: impl Into<String>) -> Self {
        self.config.sasl_mechanism = mechanism.into();
        self
    }

    /// 연결 타임아웃 설정
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// 읽기 타임아웃 설정
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// 재시도 횟수 설정
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    /// 재시도 간격 설정
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    /// 204 를 빈 결과로 처리
    pub fn with_empty_set(mut self, empty_set: bool) -> Self {
        self.config.empty_set = empty_set;
        self
    }

    /// 바이너리 응답 MIME 해석 설정
    pub fn with_accept_diff_response_format(mut self, accept: bool) -> Self {
        self.config.accept_diff_response_format = accept;
        self
    }

    /// 최대 프레임 크기 설정
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.config.max_frame_size = size;
        self
    }

    /// 빌드
    pub fn build(self) -> ConnectionConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.address(), "localhost:8182");
        assert_eq!(config.path, "/gremlin");
        assert_eq!(config.sasl_mechanism, "PLAIN");
        assert_eq!(config.retry_attempts, 1);
        assert!(!config.empty_set);
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_from_uri() {
        let config = ConnectionConfig::from_uri("ws://db.example.com:9000/custom").unwrap();
        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 9000);
        assert_eq!(config.path, "/custom");
        assert!(!config.ssl);

        let config = ConnectionConfig::from_uri("wss://secure.example.com").unwrap();
        assert!(config.ssl);
        assert_eq!(config.port, 8182);
        assert_eq!(config.path, "/gremlin");

        let config = ConnectionConfig::from_uri("localhost:8183").unwrap();
        assert_eq!(config.port, 8183);
    }

    #[test]
    fn test_from_uri_invalid() {
        assert!(ConnectionConfig::from_uri("ws://host:notaport").is_err());
        assert!(ConnectionConfig::from_uri("ws://:8182").is_err());
    }

    #[test]
    fn test_builder() {
        let config = ConnectionConfig::builder()
            .with_host("gremlin")
            .with_port(8183)
            .with_credentials("user", "pass")
            .with_graph("tx_graph")
            .with_alias("g", "social.g")
            .with_timeout(Duration::from_secs(5))
            .with_retry_attempts(5)
            .with_empty_set(true)
            .build();

        assert_eq!(config.address(), "gremlin:8183");
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.graph, "tx_graph");
        assert_eq!(config.aliases.get("g").map(String::as_str), Some("social.g"));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.retry_attempts, 5);
        assert!(config.empty_set);
        assert!(config.has_credentials());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ConnectionConfig =
            serde_json::from_str(r#"{"host": "remote", "retry_attempts": 3, "empty_set": true}"#)
                .unwrap();
        assert_eq!(config.host, "remote");
        assert_eq!(config.port, 8182);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.empty_set);
    }
}
