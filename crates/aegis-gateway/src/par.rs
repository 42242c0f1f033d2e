//! Pushed authorization requests (RFC 9126)
//!
//! Registration validates the pushed body and, when a request object rides
//! along, fully validates it before anything is persisted - a malformed
//! object aborts registration with no partial state. Reads re-check expiry
//! on every access; an expired record answers exactly like an absent one.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use aegis_protocol::{
    Client, Domain, OAuth2Error, OAuth2Result, Parameters, PushedAuthorizationRequest,
    REQUEST_URI_PREFIX,
};

use crate::config::GatewayConfig;
use crate::crypto::{RequestObject, RequestObjectProcessor};
use crate::storage::ParRepository;

/// Successful registration outcome, as the HTTP layer serializes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParResponse {
    /// The minted `request_uri` (URN form).
    pub request_uri: String,
    /// Seconds until the record expires; always positive at mint time.
    pub expires_in: i64,
}

/// The pushed-authorization-request service.
pub struct PushedAuthorizationRequestService {
    repository: Arc<dyn ParRepository>,
    processor: Arc<dyn RequestObjectProcessor>,
    issuer: String,
    validity_ms: i64,
}

impl PushedAuthorizationRequestService {
    /// Service over the given collaborators. `validity_ms` bounds the
    /// lifetime of every registered record.
    pub fn new(
        repository: Arc<dyn ParRepository>,
        processor: Arc<dyn RequestObjectProcessor>,
        issuer: impl Into<String>,
        validity_ms: i64,
    ) -> Self {
        Self {
            repository,
            processor,
            issuer: issuer.into(),
            validity_ms,
        }
    }

    /// Service tuned from the gateway configuration (`issuer`,
    /// `par_validity_ms`).
    pub fn from_config(
        repository: Arc<dyn ParRepository>,
        processor: Arc<dyn RequestObjectProcessor>,
        config: &GatewayConfig,
    ) -> Self {
        Self::new(
            repository,
            processor,
            config.issuer.clone(),
            config.par_validity_ms,
        )
    }

    /// Register a pushed parameter set for `client`.
    ///
    /// The body's `client_id` must match the authenticated client, and a
    /// `request_uri` parameter is forbidden (no recursive PAR). When a
    /// `request` object is present it is fully validated first; nothing is
    /// persisted on failure.
    ///
    /// # Errors
    ///
    /// `invalid_request` on the body checks, `invalid_request_object` on
    /// request-object validation, `server_error` on storage failure.
    pub async fn register_parameters(
        &self,
        parameters: Parameters,
        client: &Client,
    ) -> OAuth2Result<ParResponse> {
        match parameters.get("client_id") {
            Some(client_id) if client_id == client.client_id => {}
            _ => {
                return Err(OAuth2Error::invalid_request(
                    "client_id parameter does not match the authenticated client",
                ));
            }
        }
        if parameters.contains_key("request_uri") {
            return Err(OAuth2Error::invalid_request(
                "request_uri is not allowed in a pushed authorization request",
            ));
        }
        if let Some(request) = parameters.get("request") {
            self.read_request_object(request, client).await?;
        }

        let expire_at = Utc::now() + Duration::milliseconds(self.validity_ms);
        let par = PushedAuthorizationRequest {
            id: Uuid::new_v4().to_string(),
            // Stored against the internal client id, not the public one.
            client: client.id.clone(),
            parameters,
            expire_at,
        };
        let request_uri = par.request_uri();
        self.repository.create(par).await?;

        let expires_in = (expire_at - Utc::now()).num_seconds().max(1);
        debug!(client_id = %client.client_id, request_uri = %request_uri, "Pushed authorization request registered");
        Ok(ParResponse {
            request_uri,
            expires_in,
        })
    }

    /// Resolve a `request_uri` back into a validated request object.
    ///
    /// An absent record and an expired one answer identically with
    /// `invalid_request_uri`. When the stored parameters carry a `request`
    /// object it is re-validated; otherwise a domain mandating the plain
    /// FAPI profile rejects the read, and any other domain gets a plain
    /// object synthesized from the stored parameters with audience = issuer
    /// and expiration = the record's expiry.
    ///
    /// # Errors
    ///
    /// `invalid_request` on a malformed URI or a FAPI-profile violation,
    /// `invalid_request_uri` on absent/expired records,
    /// `invalid_request_object` on re-validation failure.
    pub async fn read_from_uri(
        &self,
        request_uri: &str,
        client: &Client,
        domain: &Domain,
    ) -> OAuth2Result<RequestObject> {
        let id = request_uri
            .strip_prefix(REQUEST_URI_PREFIX)
            .ok_or_else(|| OAuth2Error::invalid_request("Invalid request_uri"))?;

        let par = self
            .repository
            .find_by_id(id)
            .await?
            .filter(|par| !par.is_expired(Utc::now()))
            .filter(|par| par.client == client.id)
            .ok_or_else(|| {
                OAuth2Error::invalid_request_uri("The request_uri is invalid or has expired")
            })?;

        if let Some(request) = par.parameters.get("request") {
            return self.read_request_object(request, client).await;
        }
        if domain.plain_fapi_profile {
            return Err(OAuth2Error::invalid_request(
                "A request object is required for this domain",
            ));
        }

        let mut claims = serde_json::Map::new();
        for (name, value) in par.parameters.iter() {
            claims.insert(name.to_string(), serde_json::Value::String(value.to_string()));
        }
        claims.insert(
            "aud".into(),
            serde_json::Value::String(self.issuer.clone()),
        );
        claims.insert(
            "exp".into(),
            serde_json::Value::from(par.expire_at.timestamp()),
        );
        Ok(RequestObject {
            claims,
            signed: false,
            algorithm: None,
        })
    }

    /// Decrypt and verify `raw` as an RFC 9101 request object for `client`.
    ///
    /// The validated claim set must not nest another `request` or
    /// `request_uri`.
    ///
    /// # Errors
    ///
    /// `invalid_request_object` on any decryption, signature or nesting
    /// failure.
    pub async fn read_request_object(
        &self,
        raw: &str,
        client: &Client,
    ) -> OAuth2Result<RequestObject> {
        let decrypted = self.processor.decrypt(raw, client).await?;
        let object = self.processor.verify(&decrypted, client).await?;
        if object.claim("request").is_some() || object.claim("request_uri").is_some() {
            return Err(OAuth2Error::invalid_request_object(
                "The request object must not contain request or request_uri claims",
            ));
        }
        Ok(object)
    }

    /// Delete a registered record. An empty id is a successful no-op, which
    /// keeps the delete contract idempotent for callers that cleaned up
    /// already.
    ///
    /// # Errors
    ///
    /// Storage failures only.
    pub async fn delete_request_uri(&self, id: &str) -> OAuth2Result<()> {
        if id.is_empty() {
            return Ok(());
        }
        self.repository.delete(id).await
    }
}

impl std::fmt::Debug for PushedAuthorizationRequestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushedAuthorizationRequestService")
            .field("issuer", &self.issuer)
            .field("validity_ms", &self.validity_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::JwtProcessor;
    use crate::storage::InMemoryParRepository;

    fn client() -> Client {
        Client {
            id: "internal-1".into(),
            domain: "dom-1".into(),
            client_id: "app".into(),
            ..Client::default()
        }
    }

    fn service(repository: Arc<InMemoryParRepository>) -> PushedAuthorizationRequestService {
        PushedAuthorizationRequestService::new(
            repository,
            Arc::new(JwtProcessor::new()),
            "https://issuer.example",
            60_000,
        )
    }

    #[tokio::test]
    async fn registers_and_reads_back_plain_parameters() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        let client = client();

        let params: Parameters = [
            ("client_id", "app"),
            ("response_type", "code"),
            ("scope", "openid"),
        ]
        .into_iter()
        .collect();

        let response = service.register_parameters(params, &client).await.unwrap();
        assert!(response.request_uri.starts_with(REQUEST_URI_PREFIX));
        assert!(response.expires_in > 0);

        let object = service
            .read_from_uri(&response.request_uri, &client, &Domain::new("dom-1", "Dom"))
            .await
            .unwrap();
        assert!(!object.signed);
        assert_eq!(object.claim("scope"), Some(&serde_json::json!("openid")));
        assert_eq!(
            object.claim("aud"),
            Some(&serde_json::json!("https://issuer.example"))
        );
    }

    #[tokio::test]
    async fn client_id_mismatch_is_rejected() {
        let service = service(Arc::new(InMemoryParRepository::new()));
        let params: Parameters = [("client_id", "someone-else")].into_iter().collect();
        let err = service
            .register_parameters(params, &client())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn nested_request_uri_aborts_before_persistence() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        let params: Parameters = [
            ("client_id", "app"),
            ("request_uri", "urn:ietf:params:oauth:request_uri:x"),
        ]
        .into_iter()
        .collect();

        let err = service
            .register_parameters(params, &client())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn malformed_request_object_aborts_before_persistence() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        let params: Parameters = [("client_id", "app"), ("request", "not-a-jwt")]
            .into_iter()
            .collect();

        let err = service
            .register_parameters(params, &client())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request_object");
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn absent_and_expired_records_answer_identically() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        let client = client();
        let domain = Domain::new("dom-1", "Dom");

        let absent = service
            .read_from_uri(
                &format!("{REQUEST_URI_PREFIX}missing"),
                &client,
                &domain,
            )
            .await
            .unwrap_err();

        repository
            .create(PushedAuthorizationRequest {
                id: "expired".into(),
                client: client.id.clone(),
                parameters: [("client_id", "app")].into_iter().collect(),
                expire_at: Utc::now() - Duration::seconds(1),
            })
            .await
            .unwrap();
        let expired = service
            .read_from_uri(
                &format!("{REQUEST_URI_PREFIX}expired"),
                &client,
                &domain,
            )
            .await
            .unwrap_err();

        assert_eq!(absent.to_string(), expired.to_string());
        assert_eq!(expired.error_code(), "invalid_request_uri");
    }

    #[tokio::test]
    async fn another_clients_record_is_not_readable() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        repository
            .create(PushedAuthorizationRequest {
                id: "theirs".into(),
                client: "internal-2".into(),
                parameters: Parameters::new(),
                expire_at: Utc::now() + Duration::seconds(60),
            })
            .await
            .unwrap();

        let err = service
            .read_from_uri(
                &format!("{REQUEST_URI_PREFIX}theirs"),
                &client(),
                &Domain::new("dom-1", "Dom"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request_uri");
    }

    #[tokio::test]
    async fn plain_fapi_domain_requires_a_request_object() {
        let repository = Arc::new(InMemoryParRepository::new());
        let service = service(repository.clone());
        let client = client();
        repository
            .create(PushedAuthorizationRequest {
                id: "plain".into(),
                client: client.id.clone(),
                parameters: [("client_id", "app")].into_iter().collect(),
                expire_at: Utc::now() + Duration::seconds(60),
            })
            .await
            .unwrap();

        let mut domain = Domain::new("dom-1", "Dom");
        domain.plain_fapi_profile = true;
        let err = service
            .read_from_uri(&format!("{REQUEST_URI_PREFIX}plain"), &client, &domain)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn foreign_uri_scheme_is_rejected() {
        let service = service(Arc::new(InMemoryParRepository::new()));
        let err = service
            .read_from_uri("https://attacker.example/object", &client(), &Domain::new("dom-1", "Dom"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn lifetime_and_audience_come_from_the_configuration() {
        let config = GatewayConfig {
            issuer: "https://cfg.example".into(),
            par_validity_ms: 5_000,
            ..GatewayConfig::default()
        };
        let service = PushedAuthorizationRequestService::from_config(
            Arc::new(InMemoryParRepository::new()),
            Arc::new(JwtProcessor::new()),
            &config,
        );
        let client = client();

        let params: Parameters = [("client_id", "app")].into_iter().collect();
        let response = service.register_parameters(params, &client).await.unwrap();
        assert!(response.expires_in <= 5);

        let object = service
            .read_from_uri(&response.request_uri, &client, &Domain::new("dom-1", "Dom"))
            .await
            .unwrap();
        assert_eq!(object.claim("aud"), Some(&serde_json::json!("https://cfg.example")));
    }

    #[tokio::test]
    async fn empty_id_delete_is_a_no_op() {
        let service = service(Arc::new(InMemoryParRepository::new()));
        assert!(service.delete_request_uri("").await.is_ok());
    }
}
