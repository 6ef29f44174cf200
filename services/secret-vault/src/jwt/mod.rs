pub mod claims;
pub mod error;
pub mod jwk_cache;
pub mod token;
pub mod validator;

pub use claims::{Audience, Claims};
pub use error::AuthError;
pub use jwk_cache::{Jwk, JwkCache, Jwks};
pub use token::{ClaimRequirements, SignatureValidated, Token, TokenState, Unvalidated, Validated};
pub use validator::{AuthContext, Gatekeeper, GatekeeperConfig, TokenVerifier, strip_bearer};
