//! # Aegis Gateway
//!
//! The multi-tenant OAuth 2.0 / OIDC protocol engine behind the HTTP layer.
//! Every component works on one security domain at a time and communicates
//! through the typed collaborator traits in [`storage`], [`crypto`] and
//! [`token`], so embedders swap persistence and key material without touching
//! protocol logic.
//!
//! ## Components
//!
//! - [`resolver`] - pure validation of `/authorize` and `/token` requests
//!   against the client registration
//! - [`granter`] - the token-granter hierarchy; authorization-code redemption
//!   (single-use, PKCE, redirect-URI re-check) and tenant extension grants
//! - [`par`] - pushed authorization requests (RFC 9126)
//! - [`introspection`] - two-tier token introspection (RFC 7662)
//! - [`plugins`] - per-domain lifecycle managers for tenant-configured
//!   extension grants, bot detections and authorization engines
//! - [`sync`] - convergence of the locally served domain set with storage,
//!   driving the [`events`] bus
//!
//! ## Example
//!
//! ```
//! use aegis_gateway::pkce;
//!
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! assert!(pkce::valid_code_verifier(verifier));
//! assert_eq!(
//!     pkce::s256_challenge(verifier),
//!     "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
//! );
//! ```

pub mod codes;
pub mod config;
pub mod context;
pub mod crypto;
pub mod events;
pub mod granter;
pub mod introspection;
pub mod par;
pub mod pkce;
pub mod plugins;
pub mod resolver;
pub mod storage;
pub mod sync;
pub mod token;

pub use codes::AuthorizationCodeService;
pub use config::GatewayConfig;
pub use context::{AuthenticationFlowContext, FlowContextService, InMemoryFlowContextService};
pub use crypto::{
    HmacTokenVerifier, JwtProcessor, RequestObject, RequestObjectProcessor, SigningKeys,
    TokenVerifier,
};
pub use events::{EventBus, EventListener};
pub use granter::{
    AuthorizationCodeTokenGranter, CompositeTokenGranter, ExtensionTokenGranter, GranterSupport,
    TokenGranter,
};
pub use introspection::IntrospectionTokenService;
pub use par::{ParResponse, PushedAuthorizationRequestService};
pub use plugins::{
    AuthorizationEngineManager, AuthorizationEngineProvider, BotDetectionManager,
    BotDetectionProvider, ExtensionGrantManager, ExtensionGrantProvider, LogOnlyReadinessSink,
    PluginStatus, ProviderFactory, ReadinessSink, global_factory,
};
pub use resolver::{AuthorizationRequestResolver, TokenRequestResolver};
pub use sync::{ShardingTags, SyncManager};
pub use token::{JwtTokenService, TokenService};

// The protocol types are part of this crate's public API.
pub use aegis_protocol as protocol;
