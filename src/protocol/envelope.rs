//! Request/response envelope: `[mime length: u8][mime bytes][body]`.

use bytes::{BufMut, Bytes, BytesMut};

use super::{ProtocolError, ProtocolResult};

/// Prefix a serialized body with its mime header.
pub fn pack(mime_type: &str, body: &[u8]) -> ProtocolResult<Bytes> {
    let mime_len = u8::try_from(mime_type.len()).map_err(|_| {
        ProtocolError::InvalidFrame(format!("mime type longer than 255 bytes: {}", mime_type))
    })?;

    let mut buf = BytesMut::with_capacity(1 + mime_type.len() + body.len());
    buf.put_u8(mime_len);
    buf.put_slice(mime_type.as_bytes());
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Split a payload into its mime type and body.
pub fn unpack(payload: &[u8]) -> ProtocolResult<(&str, &[u8])> {
    let (&mime_len, rest) = payload
        .split_first()
        .ok_or_else(|| ProtocolError::InvalidFrame("empty envelope".to_string()))?;

    let mime_len = mime_len as usize;
    if rest.len() < mime_len {
        return Err(ProtocolError::InvalidFrame(format!(
            "envelope declares {} mime bytes, only {} available",
            mime_len,
            rest.len()
        )));
    }

    let (mime, body) = rest.split_at(mime_len);
    let mime = std::str::from_utf8(mime)
        .map_err(|_| ProtocolError::InvalidFrame("mime type is not UTF-8".to_string()))?;
    Ok((mime, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let packed = pack("application/json", b"{}").unwrap();
        assert_eq!(packed[0], 16);
        assert_eq!(&packed[1..17], b"application/json");
        assert_eq!(&packed[17..], b"{}");
    }

    #[test]
    fn test_unpack() {
        let packed = pack("application/vnd.gremlin-v3.0+json", b"[1]").unwrap();
        let (mime, body) = unpack(&packed).unwrap();
        assert_eq!(mime, "application/vnd.gremlin-v3.0+json");
        assert_eq!(body, b"[1]");
    }

    #[test]
    fn test_unpack_truncated() {
        assert!(unpack(&[]).is_err());
        assert!(unpack(&[10, b'a', b'b']).is_err());
    }

    #[test]
    fn test_mime_too_long() {
        let mime = "x".repeat(256);
        assert!(pack(&mime, b"").is_err());
    }
}
