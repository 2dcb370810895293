//! WebSocket opening handshake (RFC 6455 section 4.2.2).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use heapless::String;
use sha1::{Digest, Sha1};

const HANDSHAKE_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Base64 of a SHA-1 digest.
pub const ACCEPT_LEN: usize = 28;

/// `Sec-WebSocket-Accept` value for a client's `Sec-WebSocket-Key`.
pub fn accept_key(key: &str) -> Option<String<ACCEPT_LEN>> {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(HANDSHAKE_GUID);
    let digest = hasher.finalize();

    let mut encoded = [0u8; ACCEPT_LEN];
    let n = STANDARD.encode_slice(digest, &mut encoded).ok()?;
    let mut accept = String::new();
    accept.push_str(core::str::from_utf8(&encoded[..n]).ok()?).ok()?;
    Some(accept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc6455_sample_key() {
        let accept = accept_key("dGhlIHNhbXBsZSBub25jZQ==").unwrap();
        assert_eq!(accept.as_str(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn accept_is_always_full_width() {
        let accept = accept_key("x3JJHMbDL1EzLkh9GBhXDw==").unwrap();
        assert_eq!(accept.as_str(), "HSmrc0sMlYUkAGmm5OPpG2HaGWk=");
        assert_eq!(accept.len(), ACCEPT_LEN);
    }
}
