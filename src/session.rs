// Per-call request context.
//
// A `Session` is constructed once by the embedding application and passed
// explicitly into every client call. It owns the auth token and the
// product identity headers; there is no process-global session state.

use axum::http::header::{InvalidHeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};

use crate::region::USER_REGION_HEADER;

pub const PRODUCT_ID_HEADER: &str = "x-op-product-id";
pub const HOST_PRODUCT_HEADER: &str = "x-host-product";
pub const ACCOUNT_TYPE_HEADER: &str = "x-account-type";

const DEFAULT_HOST_PRODUCT: &str = "os";
const DEFAULT_ACCOUNT_TYPE: &str = "External";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session field is not a valid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// Identity and routing context for outbound chat API calls.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token forwarded as-is in `authorization`. `None` sends no
    /// auth header; the backend rejects the call.
    pub auth_token: Option<String>,
    /// Opaque, already URL-safe product identity blob from the host app.
    pub product_id: String,
    pub host_product: String,
    pub account_type: String,
    /// Routed region; resolved server-side to a backend base URL.
    pub region: Option<String>,
}

impl Session {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            auth_token: None,
            product_id: product_id.into(),
            host_product: DEFAULT_HOST_PRODUCT.to_string(),
            account_type: DEFAULT_ACCOUNT_TYPE.to_string(),
            region: None,
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Header set for JSON API calls.
    pub fn request_headers(&self) -> Result<HeaderMap, SessionError> {
        let mut headers = self.base_headers()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Header set for multipart uploads. Content type is left to the HTTP
    /// client, which sets the multipart boundary itself.
    pub fn multipart_headers(&self) -> Result<HeaderMap, SessionError> {
        self.base_headers()
    }

    fn base_headers(&self) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(PRODUCT_ID_HEADER, HeaderValue::from_str(&self.product_id)?);
        headers.insert(
            HOST_PRODUCT_HEADER,
            HeaderValue::from_str(&self.host_product)?,
        );
        headers.insert(
            ACCOUNT_TYPE_HEADER,
            HeaderValue::from_str(&self.account_type)?,
        );
        if let Some(token) = &self.auth_token {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(token)?);
        }
        if let Some(region) = &self.region {
            headers.insert(USER_REGION_HEADER, HeaderValue::from_str(region)?);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("product-blob")
            .with_auth_token("Bearer abc123")
            .with_region("eu")
    }

    #[test]
    fn request_headers_carry_identity_and_region() {
        let headers = session().request_headers().unwrap();
        assert_eq!(headers[PRODUCT_ID_HEADER], "product-blob");
        assert_eq!(headers[HOST_PRODUCT_HEADER], "os");
        assert_eq!(headers[ACCOUNT_TYPE_HEADER], "External");
        assert_eq!(headers[AUTHORIZATION], "Bearer abc123");
        assert_eq!(headers[USER_REGION_HEADER], "eu");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn no_auth_header_without_token() {
        let headers = Session::new("p").request_headers().unwrap();
        assert!(!headers.contains_key(AUTHORIZATION));
        assert!(!headers.contains_key(USER_REGION_HEADER));
    }

    #[test]
    fn multipart_headers_omit_content_type() {
        let headers = session().multipart_headers().unwrap();
        assert!(!headers.contains_key(CONTENT_TYPE));
        assert_eq!(headers[ACCOUNT_TYPE_HEADER], "External");
    }

    #[test]
    fn invalid_header_value_is_an_error() {
        let result = Session::new("bad\nvalue").request_headers();
        assert!(result.is_err());
    }
}
