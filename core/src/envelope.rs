//! Per-call wrapper tracking whether a request was already replayed.

use crate::http::HttpRequest;

/// A prepared request plus its "already retried" marker.
///
/// One envelope lives for exactly one logical `ApiClient::send` call. The
/// marker only ever moves from `false` to `true`, which caps every call at one
/// replay per renewal cycle.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    request: HttpRequest,
    retried: bool,
}

impl RequestEnvelope {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn into_request(self) -> HttpRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    #[test]
    fn starts_unretried_and_marks_once() {
        let request = HttpRequest {
            method: HttpMethod::Get,
            path: "http://localhost:8080/api/orders".to_string(),
            headers: Vec::new(),
            body: None,
            with_credentials: true,
        };
        let mut envelope = RequestEnvelope::new(request.clone());
        assert!(!envelope.is_retried());

        envelope.mark_retried();
        envelope.mark_retried();
        assert!(envelope.is_retried());
        assert_eq!(envelope.into_request(), request);
    }
}
