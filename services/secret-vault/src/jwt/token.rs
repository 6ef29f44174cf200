//! Type-State JWT Token with compile-time validation guarantees
//!
//! Claims can only be read from a token that has passed both signature and
//! claim validation.

use std::marker::PhantomData;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation, decode, decode_header};

use crate::jwt::claims::Claims;
use crate::jwt::error::AuthError;
use crate::jwt::jwk_cache::JwkCache;

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for token validation states
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Unvalidated token - just parsed, not verified
#[derive(Debug)]
pub struct Unvalidated;
impl private::Sealed for Unvalidated {}
impl TokenState for Unvalidated {
    fn state_name() -> &'static str {
        "Unvalidated"
    }
}

/// Signature validated - cryptographic verification passed
#[derive(Debug)]
pub struct SignatureValidated;
impl private::Sealed for SignatureValidated {}
impl TokenState for SignatureValidated {
    fn state_name() -> &'static str {
        "SignatureValidated"
    }
}

/// Fully validated - signature + claims verified
#[derive(Debug)]
pub struct Validated;
impl private::Sealed for Validated {}
impl TokenState for Validated {
    fn state_name() -> &'static str {
        "Validated"
    }
}

/// What a token's claims must satisfy.
#[derive(Debug, Clone, Copy)]
pub struct ClaimRequirements<'a> {
    /// Audience that must appear in `aud`
    pub audience: &'a str,
    /// Exact `iss` value
    pub issuer: &'a str,
    /// Current time, Unix seconds
    pub now: i64,
}

/// Type-state token wrapper that enforces validation at compile time
#[derive(Debug)]
pub struct Token<State: TokenState> {
    raw: String,
    header: Header,
    claims: Claims,
    _state: PhantomData<State>,
}

impl Token<Unvalidated> {
    /// Parses the header of a raw compact JWT.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let header =
            decode_header(raw).map_err(|e| AuthError::malformed(format!("Invalid header: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            claims: Claims::default(),
            _state: PhantomData,
        })
    }

    /// Get the key ID from the token header
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Get the algorithm from the token header
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Rejects tokens not signed with `expected`.
    pub fn require_algorithm(self, expected: Algorithm) -> Result<Self, AuthError> {
        if self.header.alg == expected {
            Ok(self)
        } else {
            Err(AuthError::UnexpectedAlgorithm {
                found: format!("{:?}", self.header.alg),
            })
        }
    }

    /// Resolves the signing key through `cache` and verifies the signature.
    pub async fn validate_signature(
        self,
        cache: &JwkCache,
    ) -> Result<Token<SignatureValidated>, AuthError> {
        let kid = self
            .kid()
            .ok_or_else(|| AuthError::malformed("Missing kid in header"))?;

        let decoding_key = cache.get_key(kid).await?;
        self.validate_signature_with_key(&decoding_key)
    }

    /// Verifies the signature against a known key.
    pub fn validate_signature_with_key(
        self,
        key: &DecodingKey,
    ) -> Result<Token<SignatureValidated>, AuthError> {
        // Time and audience checks happen in `validate_claims`.
        let mut validation = Validation::new(self.header.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(&self.raw, key, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm => AuthError::UnexpectedAlgorithm {
                found: format!("{:?}", self.header.alg),
            },
            _ => AuthError::malformed(format!("Signature validation failed: {e}")),
        })?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            claims: token_data.claims,
            _state: PhantomData,
        })
    }
}

impl Token<SignatureValidated> {
    /// Checks expiry, not-before, audience and issuer, in that order.
    pub fn validate_claims(
        self,
        requirements: ClaimRequirements<'_>,
    ) -> Result<Token<Validated>, AuthError> {
        let claims = &self.claims;

        if claims.is_expired_at(requirements.now) {
            return Err(AuthError::TokenExpired {
                expired_at: claims.exp.unwrap_or_default(),
            });
        }
        if claims.is_premature_at(requirements.now) {
            return Err(AuthError::TokenNotYetValid {
                valid_from: claims.nbf.unwrap_or_default(),
            });
        }
        if !claims.has_audience(requirements.audience) {
            return Err(AuthError::AudienceMismatch);
        }
        if claims.iss != requirements.issuer {
            return Err(AuthError::IssuerMismatch {
                found: claims.iss.clone(),
            });
        }

        Ok(Token {
            raw: self.raw,
            header: self.header,
            claims: self.claims,
            _state: PhantomData,
        })
    }
}

impl Token<Validated> {
    /// Access claims - only available on fully validated tokens
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Get the subject claim
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claims.sub.as_deref()
    }

    /// Get the issuer claim
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    /// Get the key ID that signed the token
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }
}

impl<S: TokenState> Token<S> {
    /// Get the current state name
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::claims::Audience;

    fn signed_token(claims: &Claims) -> Token<SignatureValidated> {
        Token {
            raw: String::new(),
            header: Header::new(Algorithm::RS256),
            claims: claims.clone(),
            _state: PhantomData,
        }
    }

    fn good_claims() -> Claims {
        Claims {
            iss: "https://idp.example.com/".to_string(),
            aud: Some(Audience::Single("api".to_string())),
            exp: Some(2_000),
            ..Claims::default()
        }
    }

    fn requirements(now: i64) -> ClaimRequirements<'static> {
        ClaimRequirements {
            audience: "api",
            issuer: "https://idp.example.com/",
            now,
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Token::<Unvalidated>::parse("not-a-jwt"),
            Err(AuthError::TokenMalformed { .. })
        ));
    }

    #[test]
    fn test_valid_claims_pass() {
        let token = signed_token(&good_claims()).validate_claims(requirements(1_000)).unwrap();
        assert_eq!(token.issuer(), "https://idp.example.com/");
        assert_eq!(token.state_name(), "Validated");
    }

    #[test]
    fn test_expired_token() {
        let err = signed_token(&good_claims())
            .validate_claims(requirements(3_000))
            .unwrap_err();
        assert_eq!(err, AuthError::TokenExpired { expired_at: 2_000 });
    }

    #[test]
    fn test_premature_token() {
        let claims = Claims {
            nbf: Some(1_500),
            ..good_claims()
        };
        let err = signed_token(&claims).validate_claims(requirements(1_000)).unwrap_err();
        assert_eq!(err, AuthError::TokenNotYetValid { valid_from: 1_500 });
    }

    #[test]
    fn test_wrong_audience() {
        let claims = Claims {
            aud: Some(Audience::Many(vec!["other".to_string()])),
            ..good_claims()
        };
        let err = signed_token(&claims).validate_claims(requirements(1_000)).unwrap_err();
        assert_eq!(err, AuthError::AudienceMismatch);
    }

    #[test]
    fn test_wrong_issuer() {
        let claims = Claims {
            iss: "https://evil.example.com/".to_string(),
            ..good_claims()
        };
        let err = signed_token(&claims).validate_claims(requirements(1_000)).unwrap_err();
        assert!(matches!(err, AuthError::IssuerMismatch { .. }));
    }
}
