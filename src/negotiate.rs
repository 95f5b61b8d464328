//! Credential negotiation with single-slot caching.
//!
//! The negotiator performs the first half of the two-step handshake: it
//! fetches a short-lived credential from the session endpoint, keyed by the
//! opening question and voice. A byte-identical repeat of the last successful
//! request is served from the cache without a network call, so toggling a
//! session off and on with an unchanged opening line does not re-pay
//! negotiation latency.
//!
//! The cache has no expiry. If the remote side treats credentials as
//! one-time-use, a reused credential fails later during the SDP exchange and
//! surfaces there as a transport error.

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{Result, SessionError};

/// Short-lived bearer secret authorizing one realtime session.
#[derive(Debug, Clone)]
pub struct Credential {
    secret: SecretString,
    voice: String,
}

impl Credential {
    /// Build a credential from the issued secret value and the voice it was
    /// negotiated for.
    pub fn new(secret: impl Into<String>, voice: impl Into<String>) -> Self {
        Self { secret: SecretString::from(secret.into()), voice: voice.into() }
    }

    /// The bearer secret. Never logged.
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// The voice this credential was negotiated for.
    pub fn voice(&self) -> &str {
        &self.voice
    }
}

/// Wire shape of the credential endpoint response.
#[derive(Debug, serde::Deserialize)]
struct CredentialResponse {
    client_secret: ClientSecret,
}

#[derive(Debug, serde::Deserialize)]
struct ClientSecret {
    value: String,
}

struct CacheEntry {
    question: String,
    voice: String,
    credential: Credential,
}

/// Negotiates session credentials against the credential endpoint.
///
/// Single writer, single reader: the cache slot is owned here and touched
/// from nowhere else.
pub struct SessionNegotiator {
    http: reqwest::Client,
    endpoint: Url,
    cache: Mutex<Option<CacheEntry>>,
}

impl SessionNegotiator {
    /// Create a negotiator for the given credential endpoint.
    pub fn new(endpoint: Url) -> Self {
        Self { http: reqwest::Client::new(), endpoint, cache: Mutex::new(None) }
    }

    /// Whether a byte-identical request is currently cached.
    pub fn is_cached(&self, question: &str, voice: &str) -> bool {
        self.cached(question, voice).is_some()
    }

    fn cached(&self, question: &str, voice: &str) -> Option<Credential> {
        let guard = self.cache.lock();
        guard
            .as_ref()
            .filter(|e| e.question == question && e.voice == voice)
            .map(|e| e.credential.clone())
    }

    /// Obtain a credential for the given opening question and voice.
    ///
    /// Returns the cached credential when the request exactly equals the
    /// previous successful one; otherwise fetches a fresh credential and
    /// overwrites the cache before returning.
    pub async fn negotiate(&self, question: &str, voice: &str) -> Result<Credential> {
        if let Some(credential) = self.cached(question, voice) {
            tracing::info!(voice, "credential cache hit, skipping negotiation");
            return Ok(credential);
        }

        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("voice", voice).append_pair("question", question);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::negotiation(format!("credential request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::negotiation(format!(
                "credential endpoint returned status {status}"
            )));
        }

        let body: CredentialResponse = response
            .json()
            .await
            .map_err(|e| SessionError::negotiation(format!("unusable credential response: {e}")))?;

        if body.client_secret.value.is_empty() {
            return Err(SessionError::negotiation("credential response carried an empty secret"));
        }

        let credential = Credential::new(body.client_secret.value, voice);

        let mut guard = self.cache.lock();
        *guard = Some(CacheEntry {
            question: question.to_string(),
            voice: voice.to_string(),
            credential: credential.clone(),
        });

        tracing::info!(voice, "negotiated fresh session credential");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_secret() {
        let credential = Credential::new("super-secret", "echo");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn cache_miss_on_empty_negotiator() {
        let negotiator =
            SessionNegotiator::new(Url::parse("http://localhost:9/session").unwrap());
        assert!(!negotiator.is_cached("hello", "echo"));
    }
}
