//! Driver Module
//!
//! Gremlin Server 클라이언트 (연결, 세션, 트랜잭션)
//!
//! # 구성
//!
//! - [`Connection`]: WebSocket 연결과 요청/응답 상태 머신
//! - [`ConnectionConfig`]: 호스트, 인증, 별칭, 타임아웃, 재시도 설정
//! - [`Message`]: 요청 템플릿과 직렬화기 레지스트리
//! - [`Workload`]: 597 오류 선형 재시도
//! - [`Value`]: 요청 인자와 결과 행의 네이티브 값
//!
//! # Example
//!
//! ```ignore
//! use gremlin_driver::driver::{Connection, ConnectionConfig};
//! use gremlin_driver::args;
//!
//! let config = ConnectionConfig::builder()
//!     .with_host("localhost")
//!     .with_credentials("stephen", "password")
//!     .with_retry_attempts(5)
//!     .build();
//!
//! let mut conn: Connection = Connection::new(config);
//! conn.open().await?;
//!
//! // 바인딩과 함께 실행
//! conn.message_mut().bind_value("name", "marko");
//! let rows = conn.send(Some("g.V().has('name', name)"), "", "eval", args!{}).await?;
//!
//! // 세션 트랜잭션
//! conn.transaction_start().await?;
//! conn.query("g.addV('person')").await?;
//! conn.transaction_stop(true).await?;
//!
//! conn.close().await?;
//! ```

mod connection;
mod error;
mod response;
mod workload;
pub mod config;
pub mod message;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports
pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{Connection, AUTHENTICATION_OP, CLOSE_OP, SESSION_PROCESSOR};
pub use error::{DriverError, DriverResult, ServerError, StatusCode};
pub use message::{Args, Message, RequestMessage, DEFAULT_OP};
pub use response::{ResponseEnvelope, ResponseResult, ResponseStatus};
pub use types::{Map, MapKey, Value};
pub use workload::Workload;

/// 요청 인자 맵 생성 매크로
#[macro_export]
macro_rules! args {
    () => {
        $crate::driver::Args::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::driver::Args::new();
        $(
            map.insert(::std::string::String::from($key), $crate::driver::Value::from($value));
        )+
        map
    }};
}
