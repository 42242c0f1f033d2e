//! # Aegis Protocol - Source-of-Truth Types
//!
//! Core data model and error taxonomy for the Aegis multi-tenant OAuth 2.0 /
//! OpenID Connect authorization gateway. Every crate in the workspace builds
//! on the types defined here; nothing in this crate performs I/O.
//!
//! ## Architecture
//!
//! - [`error`] - Unified [`OAuth2Error`] taxonomy with fixed RFC 6749 error codes
//! - [`client`] - Tenant-scoped OAuth [`Client`] registrations and [`GrantType`]
//! - [`request`] - Ephemeral [`AuthorizationRequest`] / [`TokenRequest`] value
//!   objects and the ordered first-wins [`Parameters`] multi-map
//! - [`code`] - Persisted single-use [`AuthorizationCode`] projection
//! - [`par`] - Persisted [`PushedAuthorizationRequest`] records (RFC 9126)
//! - [`domain`] - Tenant root [`Domain`] driving per-tenant deployment
//! - [`plugin`] - Tenant plugin configuration records (extension grants,
//!   bot detection, authorization engines)
//! - [`token`] - JWT claim view, persisted access-token records, token responses
//! - [`event`] - Typed deployment events exchanged over the gateway event bus
//! - [`user`] - Resource-owner representation
//!
//! ## Standards Compliance
//!
//! - **RFC 6749** - OAuth 2.0 Authorization Framework
//! - **RFC 7519** - JSON Web Token (JWT)
//! - **RFC 7636** - Proof Key for Code Exchange (PKCE)
//! - **RFC 7662** - OAuth 2.0 Token Introspection
//! - **RFC 9126** - OAuth 2.0 Pushed Authorization Requests

pub mod client;
pub mod code;
pub mod domain;
pub mod error;
pub mod event;
pub mod par;
pub mod plugin;
pub mod request;
pub mod token;
pub mod user;

#[doc(inline)]
pub use client::{Client, GrantType};
#[doc(inline)]
pub use code::AuthorizationCode;
#[doc(inline)]
pub use domain::{Domain, DomainEvent};
#[doc(inline)]
pub use error::{OAuth2Error, OAuth2Result};
#[doc(inline)]
pub use event::{Event, EventKind, ReferenceType};
#[doc(inline)]
pub use par::{PushedAuthorizationRequest, REQUEST_URI_PREFIX};
#[doc(inline)]
pub use plugin::{AuthorizationEngine, BotDetection, ExtensionGrant, PluginRecord};
#[doc(inline)]
pub use request::{AuthorizationRequest, Parameters, TokenRequest};
#[doc(inline)]
pub use token::{AccessToken, TokenClaims, TokenResponse};
#[doc(inline)]
pub use user::User;
