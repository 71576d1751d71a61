//! Time zone lookup by public address
//!
//! A plain HTTP request to `ip-api.com` answers `{"timezone":"<IANA>"}` for
//! the caller's address. The request asks the server to close the
//! connection, so the response ends at EOF.

use alloc::format;
use alloc::string::String;

use serde::Deserialize;

pub const LOOKUP_HOST: &str = "ip-api.com";
pub const LOOKUP_PORT: u16 = 80;
pub const LOOKUP_PATH: &str = "/json/?fields=timezone";

/// Largest response accepted
pub const MAX_LOOKUP_RESPONSE_LEN: usize = 1024;

/// Errors reading the lookup response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LookupError {
    /// Header incomplete, or a status other than 200
    Status,
    /// Body is not JSON or has no zone name
    Malformed,
}

#[derive(Deserialize)]
struct LookupBody {
    #[serde(default)]
    timezone: Option<String>,
}

/// `GET` request for the lookup endpoint
pub fn lookup_request() -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         Accept: application/json\r\n\
         Connection: close\r\n\r\n",
        LOOKUP_PATH, LOOKUP_HOST
    )
}

/// Extract the IANA zone name from a complete response
pub fn parse_lookup_response(buf: &[u8]) -> Result<String, LookupError> {
    let end = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or(LookupError::Status)?;

    let status = buf[..end]
        .split(|b| *b == b'\n')
        .next()
        .unwrap_or_default();
    let mut parts = status.split(|b| *b == b' ');
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();
    if !version.starts_with(b"HTTP/1.") || code != b"200" {
        return Err(LookupError::Status);
    }

    let body: LookupBody =
        serde_json::from_slice(&buf[end + 4..]).map_err(|_| LookupError::Malformed)?;
    body.timezone
        .filter(|tz| !tz.is_empty())
        .ok_or(LookupError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_line() {
        let req = lookup_request();
        assert!(req.starts_with("GET /json/?fields=timezone HTTP/1.1\r\nHost: ip-api.com\r\n"));
        assert!(req.contains("Connection: close\r\n"));
        assert!(req.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_ok() {
        let resp = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{\"timezone\":\"Europe/Berlin\"}";
        assert_eq!(parse_lookup_response(resp).unwrap(), "Europe/Berlin");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            parse_lookup_response(b"HTTP/1.1 429 Too Many Requests\r\n\r\n{}"),
            Err(LookupError::Status)
        );
        assert_eq!(
            parse_lookup_response(b"HTTP/1.1 200 OK\r\nContent-"),
            Err(LookupError::Status)
        );
        assert_eq!(
            parse_lookup_response(b"HTTP/1.1 200 OK\r\n\r\n{\"status\":\"fail\"}"),
            Err(LookupError::Malformed)
        );
        assert_eq!(
            parse_lookup_response(b"HTTP/1.1 200 OK\r\n\r\n{\"timezone\":\"\"}"),
            Err(LookupError::Malformed)
        );
        assert_eq!(
            parse_lookup_response(b"HTTP/1.1 200 OK\r\n\r\nnot json"),
            Err(LookupError::Malformed)
        );
    }
}
