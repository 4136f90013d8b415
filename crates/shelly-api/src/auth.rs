// Device authentication
//
// Gen1 devices challenge with HTTP Basic; Gen2 devices with Digest
// (SHA-256, RFC 7616 style), both over HTTP and inside WebSocket RPC
// error frames. This module parses challenges and computes responses;
// the transports decide when to use them.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Username/password pair for a device.
///
/// Gen2 devices always authenticate as `admin`; Gen1 devices use the
/// username configured on the device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// `Authorization` header value for HTTP Basic.
    pub fn basic_header(&self) -> String {
        let token = BASE64.encode(format!(
            "{}:{}",
            self.username,
            self.password.expose_secret()
        ));
        format!("Basic {token}")
    }
}

// ── Digest algorithm ─────────────────────────────────────────────────

/// Hash function named by the challenge. MD5 unless SHA-256 is stated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    fn from_token(token: Option<&str>) -> Self {
        match token {
            Some(t) if t.eq_ignore_ascii_case("SHA-256") => Self::Sha256,
            _ => Self::Md5,
        }
    }

    /// Token as written in `algorithm=` parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha256 => "SHA-256",
        }
    }

    /// Lowercase hex digest of `input`.
    pub fn hash(self, input: &str) -> String {
        match self {
            Self::Md5 => format!("{:x}", md5::compute(input.as_bytes())),
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(input.as_bytes());
                hex::encode(hasher.finalize())
            }
        }
    }

    /// `HA1 = hash(username:realm:password)`
    pub fn ha1(self, credentials: &Credentials, realm: &str) -> String {
        self.hash(&format!(
            "{}:{realm}:{}",
            credentials.username,
            credentials.password.expose_secret()
        ))
    }

    /// `response = hash(HA1:nonce:nc:cnonce:auth:HA2)`
    pub fn response(self, ha1: &str, nonce: &str, nc: &str, cnonce: &str, ha2: &str) -> String {
        self.hash(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"))
    }
}

// ── Challenges ───────────────────────────────────────────────────────

/// Parsed `WWW-Authenticate` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
    Basic { realm: Option<String> },
    Digest(DigestChallenge),
}

impl Challenge {
    /// Parse a `WWW-Authenticate` header value. Returns `None` for schemes
    /// we cannot answer or digest challenges without realm/nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(' ').unwrap_or((header, ""));

        if scheme.eq_ignore_ascii_case("Basic") {
            let mut params = auth_params(rest);
            return Some(Self::Basic {
                realm: params.remove("realm"),
            });
        }

        if scheme.eq_ignore_ascii_case("Digest") {
            return DigestChallenge::from_params(&auth_params(rest)).map(Self::Digest);
        }

        None
    }
}

/// Realm/nonce pair issued by the device, plus the negotiated options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: Option<String>,
    pub algorithm: DigestAlgorithm,
}

impl DigestChallenge {
    fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            qop: params.get("qop").cloned(),
            algorithm: DigestAlgorithm::from_token(params.get("algorithm").map(String::as_str)),
        })
    }

    /// Build the `Authorization: Digest ...` value for one request.
    ///
    /// `nc` is always the first use of the nonce; `cnonce` is supplied by the
    /// caller (current epoch seconds in production).
    pub fn authorization(
        &self,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        const NC: &str = "00000001";

        let alg = self.algorithm;
        let ha1 = alg.ha1(credentials, &self.realm);
        let ha2 = alg.hash(&format!("{method}:{uri}"));
        let response = alg.response(&ha1, &self.nonce, NC, cnonce, &ha2);

        format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
             algorithm={}, response=\"{response}\", qop=auth, nc={NC}, cnonce=\"{cnonce}\"",
            credentials.username,
            self.realm,
            self.nonce,
            alg.as_str(),
        )
    }
}

/// Current epoch seconds, used as the client nonce.
pub fn epoch_cnonce() -> String {
    chrono::Utc::now().timestamp().to_string()
}

static AUTH_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_-]+)\s*=\s*(?:"([^"]*)"|([^\s,]+))"#).expect("static regex")
});

/// Scan `key="value"` / `key=value` tokens out of a challenge.
fn auth_params(input: &str) -> HashMap<String, String> {
    AUTH_PARAM
        .captures_iter(input)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_owned();
            Some((key, value))
        })
        .collect()
}
