//! Response Envelope
//!
//! 서버 응답 문서 `{requestId, status, result}` 해석

use super::error::{DriverResult, ServerError, StatusCode};
use super::types::{Map, MapKey, Value};
use crate::serializer::SerializerError;

// ============================================================================
// ResponseStatus
// ============================================================================

/// 응답 상태
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseStatus {
    /// 상태 코드
    pub code: u16,
    /// 서버 메시지
    pub message: String,
    /// 부가 속성
    pub attributes: Map,
}

impl ResponseStatus {
    /// 200 / 206 여부
    pub fn is_success(&self) -> bool {
        StatusCode(self.code).is_success()
    }

    /// 206 (스트리밍 중간 응답)
    pub fn is_partial(&self) -> bool {
        self.code == StatusCode::PARTIAL_CONTENT
    }

    /// 서버 오류로 변환
    pub fn to_server_error(&self) -> ServerError {
        ServerError::new(self.code, self.message.clone()).with_attributes(self.attributes.clone())
    }
}

// ============================================================================
// ResponseResult
// ============================================================================

/// 응답 결과
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseResult {
    /// 결과 행
    pub data: Vec<Value>,
    /// 메타데이터
    pub meta: Map,
}

// ============================================================================
// ResponseEnvelope
// ============================================================================

/// 하나의 응답 프레임에 담긴 문서
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseEnvelope {
    /// 요청 ID
    pub request_id: Option<String>,
    /// 상태
    pub status: ResponseStatus,
    /// 결과
    pub result: ResponseResult,
}

impl ResponseEnvelope {
    /// 역직렬화된 값에서 생성
    ///
    /// `status.code` 가 없으면 형식 오류입니다. `result.data` 가 null 이면
    /// 빈 목록, 목록이 아니면 단일 행으로 취급합니다.
    pub fn from_value(value: Value) -> DriverResult<Self> {
        let mut root = match value {
            Value::Map(root) => root,
            other => {
                return Err(SerializerError::InvalidFormat(format!(
                    "Response must be a map, got {}",
                    other.type_name()
                ))
                .into())
            }
        };

        let request_id = match root.shift_remove(&MapKey::from("requestId")) {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };

        let status = match root.shift_remove(&MapKey::from("status")) {
            Some(Value::Map(status)) => parse_status(status)?,
            _ => {
                return Err(SerializerError::InvalidFormat("Response has no status".to_string()).into())
            }
        };

        let result = match root.shift_remove(&MapKey::from("result")) {
            Some(Value::Map(result)) => parse_result(result),
            _ => ResponseResult::default(),
        };

        Ok(Self {
            request_id,
            status,
            result,
        })
    }

    /// 상태 코드
    pub fn code(&self) -> u16 {
        self.status.code
    }
}

fn parse_status(mut status: Map) -> DriverResult<ResponseStatus> {
    let code = status
        .get(&MapKey::from("code"))
        .and_then(Value::as_int)
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| {
            SerializerError::InvalidFormat("Response status has no valid code".to_string())
        })?;

    let message = match status.shift_remove(&MapKey::from("message")) {
        Some(Value::String(message)) => message,
        _ => String::new(),
    };

    let attributes = match status.shift_remove(&MapKey::from("attributes")) {
        Some(Value::Map(attributes)) => attributes,
        _ => Map::new(),
    };

    Ok(ResponseStatus {
        code,
        message,
        attributes,
    })
}

fn parse_result(mut result: Map) -> ResponseResult {
    let data = match result.shift_remove(&MapKey::from("data")) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::List(rows)) => rows,
        Some(other) => vec![other],
    };

    let meta = match result.shift_remove(&MapKey::from("meta")) {
        Some(Value::Map(meta)) => meta,
        _ => Map::new(),
    };

    ResponseResult { data, meta }
}

// ============================================================================
// Tests
// ============================================================================
