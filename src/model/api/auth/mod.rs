mod provider;
mod request;
mod token;

#[cfg(test)]
pub use provider::StaticIdentityProvider;
pub use provider::{FirebaseIdentityProvider, Identities, IdentityProvider, VerifiedIdentity};
pub use request::SessionRequest;
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
