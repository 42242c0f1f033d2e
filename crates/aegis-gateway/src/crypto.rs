//! Token cryptography seams
//!
//! Abstract contracts for request-object decryption/verification and access-
//! token signature verification, with `jsonwebtoken`-backed defaults. Every
//! crypto failure crossing these boundaries is normalized into the OAuth2
//! taxonomy - internals (parser messages, key details) are logged, never
//! surfaced to clients.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use aegis_protocol::{Client, OAuth2Error, OAuth2Result, TokenClaims};

/// Decoded and validated request object (RFC 9101), or the plain fallback
/// synthesized from stored pushed-authorization parameters.
#[derive(Debug, Clone)]
pub struct RequestObject {
    /// The claim set.
    pub claims: serde_json::Map<String, serde_json::Value>,
    /// Whether the object carried a verified signature.
    pub signed: bool,
    /// Signature algorithm, when signed.
    pub algorithm: Option<String>,
}

impl RequestObject {
    /// Convenience claim accessor.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&serde_json::Value> {
        self.claims.get(name)
    }
}

/// Collaborator boundary: request-object decryption and signature checking.
#[async_trait]
pub trait RequestObjectProcessor: Send + Sync {
    /// Decrypt `raw` if it is an encrypted JWT, returning the inner signed
    /// JWT; pass through otherwise.
    ///
    /// # Errors
    ///
    /// `invalid_request_object` for any decryption failure; crypto internals
    /// are never leaked.
    async fn decrypt(&self, raw: &str, client: &Client) -> OAuth2Result<String>;

    /// Verify `raw` against the client's registered signing algorithm and
    /// JWK set, returning the validated claims.
    ///
    /// A registered `request_object_signing_alg` pins the algorithm exactly.
    /// When the client has no registration, any supported signed algorithm is
    /// accepted; `"none"` is rejected either way.
    ///
    /// # Errors
    ///
    /// `invalid_request_object` on unsigned objects, algorithm mismatch,
    /// unknown `kid`, or signature failure.
    async fn verify(&self, raw: &str, client: &Client) -> OAuth2Result<RequestObject>;
}

/// `jsonwebtoken`-backed [`RequestObjectProcessor`].
///
/// Supports RSA, EC and octet JWKs resolved by `kid`. Encrypted request
/// objects (JWE compact serialization) are rejected; embedders with JWE key
/// material supply their own processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtProcessor;

impl JwtProcessor {
    /// New processor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn decoding_key(jwk: &serde_json::Value) -> OAuth2Result<DecodingKey> {
        let kty = jwk.get("kty").and_then(|v| v.as_str()).unwrap_or_default();
        let field = |name: &str| {
            jwk.get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| OAuth2Error::invalid_request_object("Invalid key in client JWK set"))
        };
        match kty {
            "RSA" => DecodingKey::from_rsa_components(field("n")?, field("e")?)
                .map_err(|_| OAuth2Error::invalid_request_object("Invalid key in client JWK set")),
            "EC" => DecodingKey::from_ec_components(field("x")?, field("y")?)
                .map_err(|_| OAuth2Error::invalid_request_object("Invalid key in client JWK set")),
            "oct" => {
                let secret = URL_SAFE_NO_PAD.decode(field("k")?).map_err(|_| {
                    OAuth2Error::invalid_request_object("Invalid key in client JWK set")
                })?;
                Ok(DecodingKey::from_secret(&secret))
            }
            _ => Err(OAuth2Error::invalid_request_object(
                "Unsupported key type in client JWK set",
            )),
        }
    }

    fn resolve_jwk<'a>(client: &'a Client, kid: &str) -> OAuth2Result<&'a serde_json::Value> {
        client
            .jwk_set
            .as_ref()
            .and_then(|set| set.get("keys"))
            .and_then(|keys| keys.as_array())
            .and_then(|keys| {
                keys.iter()
                    .find(|key| key.get("kid").and_then(|v| v.as_str()) == Some(kid))
            })
            .ok_or_else(|| {
                OAuth2Error::invalid_request_object("No matching key found in client JWK set")
            })
    }
}

/// Raw (unvalidated) peek at a compact JWT header.
fn peek_header(raw: &str) -> OAuth2Result<serde_json::Value> {
    let header_segment = raw
        .split('.')
        .next()
        .ok_or_else(|| OAuth2Error::invalid_request_object("Malformed request object"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(header_segment)
        .map_err(|_| OAuth2Error::invalid_request_object("Malformed request object"))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| OAuth2Error::invalid_request_object("Malformed request object"))
}

#[async_trait]
impl RequestObjectProcessor for JwtProcessor {
    async fn decrypt(&self, raw: &str, _client: &Client) -> OAuth2Result<String> {
        // JWE compact serialization has five segments.
        if raw.split('.').count() == 5 {
            return Err(OAuth2Error::invalid_request_object(
                "Unable to decrypt the request object",
            ));
        }
        Ok(raw.to_string())
    }

    async fn verify(&self, raw: &str, client: &Client) -> OAuth2Result<RequestObject> {
        let header = peek_header(raw)?;
        let alg = header
            .get("alg")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OAuth2Error::invalid_request_object("Malformed request object"))?
            .to_string();

        if alg.eq_ignore_ascii_case("none") {
            return Err(OAuth2Error::invalid_request_object(
                "The request object must be signed",
            ));
        }
        // No registered algorithm means no pinning; the key lookup below
        // still binds the object to the client's JWK set.
        if let Some(registered) = &client.request_object_signing_alg {
            if registered != &alg {
                return Err(OAuth2Error::invalid_request_object(
                    "Invalid request object signing algorithm",
                ));
            }
        }

        let algorithm: Algorithm = alg.parse().map_err(|_| {
            OAuth2Error::invalid_request_object("Unsupported request object signing algorithm")
        })?;

        let kid = header
            .get("kid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OAuth2Error::invalid_request_object("Missing kid in request object"))?;
        let key = Self::decoding_key(Self::resolve_jwk(client, kid)?)?;

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<serde_json::Value>(raw, &key, &validation).map_err(|e| {
            debug!(client_id = %client.client_id, error = %e, "Request object signature verification failed");
            OAuth2Error::invalid_request_object("Invalid request object signature")
        })?;

        let claims = data
            .claims
            .as_object()
            .cloned()
            .ok_or_else(|| OAuth2Error::invalid_request_object("Malformed request object"))?;

        Ok(RequestObject {
            claims,
            signed: true,
            algorithm: Some(alg),
        })
    }
}

/// Per-domain HS256 signing secrets shared by the token signer and verifier.
#[derive(Default)]
pub struct SigningKeys {
    secrets: DashMap<String, String>,
}

impl SigningKeys {
    /// Empty key registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the signing secret for a domain.
    pub fn insert(&self, domain: impl Into<String>, secret: impl Into<String>) {
        self.secrets.insert(domain.into(), secret.into());
    }

    /// Signing secret for `domain`, if registered.
    #[must_use]
    pub fn secret(&self, domain: &str) -> Option<String> {
        self.secrets.get(domain).map(|entry| entry.clone())
    }
}

// Manual Debug impl to prevent signing secrets from landing in logs
impl std::fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeys")
            .field("domains", &self.secrets.len())
            .finish()
    }
}

/// Collaborator boundary: access-token signature verification.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Cryptographically verify `token` for `client`, including expiry.
    ///
    /// # Errors
    ///
    /// `invalid_token` for any verification failure (bad signature, expired,
    /// malformed) - causes are logged, not surfaced.
    async fn verify(&self, token: &str, client: &Client) -> OAuth2Result<TokenClaims>;
}

/// HS256 [`TokenVerifier`] over the per-domain [`SigningKeys`].
#[derive(Debug)]
pub struct HmacTokenVerifier {
    keys: std::sync::Arc<SigningKeys>,
}

impl HmacTokenVerifier {
    /// Verifier over the shared key registry.
    #[must_use]
    pub fn new(keys: std::sync::Arc<SigningKeys>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl TokenVerifier for HmacTokenVerifier {
    async fn verify(&self, token: &str, client: &Client) -> OAuth2Result<TokenClaims> {
        let secret = self
            .keys
            .secret(&client.domain)
            .ok_or_else(|| OAuth2Error::invalid_token("The access token is invalid"))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(domain = %client.domain, error = %e, "Access token verification failed");
                OAuth2Error::invalid_token("The access token is invalid")
            })
    }
}

/// Structurally decode a token's claims without verifying anything.
///
/// Introspection uses this to learn the domain and audience hints it needs to
/// resolve the verifying client; nothing read here is trusted yet.
///
/// # Errors
///
/// `invalid_token` when the compact serialization or payload JSON is
/// malformed.
pub fn decode_claims_unverified(token: &str) -> OAuth2Result<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
        _ => return Err(OAuth2Error::invalid_token("The access token is invalid")),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| OAuth2Error::invalid_token("The access token is invalid"))?;
    serde_json::from_slice(&bytes)
        .map_err(|_| OAuth2Error::invalid_token("The access token is invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn hs256_client(kid: &str, secret: &[u8]) -> Client {
        Client {
            id: "internal-1".into(),
            domain: "dom-1".into(),
            client_id: "app".into(),
            request_object_signing_alg: Some("HS256".into()),
            jwk_set: Some(serde_json::json!({
                "keys": [{
                    "kty": "oct",
                    "kid": kid,
                    "k": URL_SAFE_NO_PAD.encode(secret),
                }]
            })),
            ..Client::default()
        }
    }

    fn signed_request_object(kid: &str, secret: &[u8], claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[tokio::test]
    async fn verifies_signed_request_object() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let client = hs256_client("k1", secret);
        let raw = signed_request_object("k1", secret, serde_json::json!({"scope": "openid"}));

        let object = JwtProcessor::new().verify(&raw, &client).await.unwrap();
        assert!(object.signed);
        assert_eq!(object.claim("scope"), Some(&serde_json::json!("openid")));
    }

    #[tokio::test]
    async fn rejects_algorithm_mismatch() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let mut client = hs256_client("k1", secret);
        client.request_object_signing_alg = Some("RS256".into());
        let raw = signed_request_object("k1", secret, serde_json::json!({}));

        let err = JwtProcessor::new().verify(&raw, &client).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_request_object");
    }

    #[tokio::test]
    async fn unregistered_client_accepts_any_signed_algorithm() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let mut client = hs256_client("k1", secret);
        client.request_object_signing_alg = None;
        let raw = signed_request_object("k1", secret, serde_json::json!({"scope": "openid"}));

        let object = JwtProcessor::new().verify(&raw, &client).await.unwrap();
        assert!(object.signed);
        assert_eq!(object.algorithm.as_deref(), Some("HS256"));
    }

    #[tokio::test]
    async fn rejects_unknown_kid() {
        let secret = b"0123456789abcdef0123456789abcdef";
        let client = hs256_client("k1", secret);
        let raw = signed_request_object("other", secret, serde_json::json!({}));

        assert!(JwtProcessor::new().verify(&raw, &client).await.is_err());
    }

    #[tokio::test]
    async fn rejects_unsigned_object() {
        let client = hs256_client("k1", b"secret");
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(br"{}");
        let raw = format!("{header}.{payload}.");

        let err = JwtProcessor::new().verify(&raw, &client).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid_request_object: The request object must be signed");
    }

    #[tokio::test]
    async fn jwe_is_rejected_at_decrypt() {
        let client = hs256_client("k1", b"secret");
        let err = JwtProcessor::new()
            .decrypt("a.b.c.d.e", &client)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_request_object");
    }

    #[test]
    fn unverified_decode_reads_domain_hint() {
        let claims = TokenClaims {
            jti: "t1".into(),
            aud: "app".into(),
            domain: "dom-1".into(),
            iat: 100,
            exp: 200,
            ..TokenClaims::default()
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"s"),
        )
        .unwrap();

        let decoded = decode_claims_unverified(&token).unwrap();
        assert_eq!(decoded.domain, "dom-1");
        assert_eq!(decoded.aud, "app");
    }

    #[test]
    fn unverified_decode_rejects_garbage() {
        assert!(decode_claims_unverified("not-a-jwt").is_err());
        assert!(decode_claims_unverified("a.b").is_err());
    }
}
