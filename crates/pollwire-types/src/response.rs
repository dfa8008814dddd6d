use bytes::Bytes;

use crate::header::HeaderMap;

/// A fully buffered HTTP response as delivered through `poll`.
///
/// The shape mirrors what the host receives: numeric status code, the
/// human-readable status line (e.g. `"200 OK"`), headers in arrival order
/// with duplicates preserved, and the complete body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub code: u16,
    pub status: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Build the status line from a code and optional canonical reason.
    pub fn status_line(code: u16, reason: Option<&str>) -> String {
        match reason {
            Some(reason) => format!("{code} {reason}"),
            None => code.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_with_reason() {
        assert_eq!(HttpResponse::status_line(200, Some("OK")), "200 OK");
        assert_eq!(
            HttpResponse::status_line(404, Some("Not Found")),
            "404 Not Found"
        );
    }

    #[test]
    fn status_line_without_reason() {
        assert_eq!(HttpResponse::status_line(599, None), "599");
    }
}
