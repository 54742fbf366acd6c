//! `stockroom-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the api crate feeds it tokens and
//! credentials, infra implements `CredentialDirectory`.

pub mod authorize;
pub mod claims;
pub mod identity_claim;
pub mod login;
pub mod password;
pub mod permissions;
pub mod profile;
pub mod registration;
pub mod token;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{SessionClaims, TokenKind, TokenValidationError, validate_claims};
pub use identity_claim::{ClaimCommand, ClaimEvent, IdentityClaim, IdentityKind, claim_id, normalize_key};
pub use login::{CredentialDirectory, LoginError, StoredCredential, exchange_credentials};
pub use password::{CredentialError, hash_secret, verify_against_dummy, verify_secret};
pub use permissions::Permission;
pub use profile::{
    AdminFlagChanged, RecordSignIn, RegisterUser, SetAdmin, UserCommand, UserEvent, UserProfile,
    UserRegistered, UserSignedIn,
};
pub use registration::{MIN_NAME_LEN, MIN_SECRET_LEN, RegistrationRequest, ValidRegistration};
pub use token::{Hs256Jwt, JwtValidator, SessionSubject, SessionTokens, TokenError, TokenIssuer};
