// Device HTTP client
//
// Wraps `reqwest::Client` with the device authentication dance: a request
// goes out bare, a 401 is answered once with Basic or Digest credentials
// derived from the `WWW-Authenticate` challenge, and a second 401 is final.
// Gen1 and Gen2 clients build their endpoints on top of this.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::{Position, Url};

use crate::auth::{Challenge, Credentials, epoch_cnonce};
use crate::error::Error;
use crate::schema::{self, Schema, SchemaValidator, StructuralValidator};
use crate::transport::TransportConfig;

/// HTTP transport shared by both device generations.
///
/// Every typed response passes the injected [`SchemaValidator`] before it
/// is decoded, so a malformed body fails with `SchemaValidation` rather
/// than a transport error.
#[derive(Clone)]
pub struct HttpProtocolClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
    validator: Arc<dyn SchemaValidator>,
}

impl HttpProtocolClient {
    /// Create a client for the device at `base_url` (e.g. `http://192.168.1.20/`).
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, base_url, credentials))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            validator: Arc::new(StructuralValidator),
        }
    }

    /// Replace the schema validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn validator(&self) -> &dyn SchemaValidator {
        self.validator.as_ref()
    }

    /// Resolve a device-relative path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `url`, validate the body against `schema`, decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url, schema: Schema) -> Result<T, Error> {
        let body = self.get_text(url).await?;
        schema::decode(self.validator(), &body, schema)
    }

    /// GET `url` and return the raw body.
    pub async fn get_text(&self, url: Url) -> Result<String, Error> {
        self.dispatch(&url, None, false).await
    }

    /// Send one GET. On a 401 with `handling_authentication == false`,
    /// answer the challenge and recurse exactly once with the flag set.
    async fn dispatch(
        &self,
        url: &Url,
        authorization: Option<&str>,
        handling_authentication: bool,
    ) -> Result<String, Error> {
        debug!(url = %url, authenticated = authorization.is_some(), "GET");

        let mut request = self.http.get(url.clone());
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let resp = request.send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            if handling_authentication {
                warn!(url = %url, "Device rejected credentials after challenge response");
                return Err(Error::Authentication {
                    message: "credentials rejected by device".into(),
                });
            }

            let Some(credentials) = self.credentials.as_ref() else {
                return Err(Error::Authentication {
                    message: "device requires authentication but no credentials are configured"
                        .into(),
                });
            };

            let challenge = resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .and_then(Challenge::parse);

            let header = match challenge {
                Some(Challenge::Digest(digest)) => {
                    let uri = &url[Position::BeforePath..];
                    debug!(realm = %digest.realm, algorithm = digest.algorithm.as_str(), "Answering digest challenge");
                    digest.authorization(credentials, "GET", uri, &epoch_cnonce())
                }
                Some(Challenge::Basic { .. }) | None => {
                    debug!("Answering basic challenge");
                    credentials.basic_header()
                }
            };

            return Box::pin(self.dispatch(url, Some(&header), true)).await;
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "Device returned error status");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

impl std::fmt::Debug for HttpProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProtocolClient")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}
