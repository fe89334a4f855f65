use std::{fmt::Display, str::FromStr};

use phonenumber::PhoneNumber;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A voter or host identity, as verified by the identity provider.
///
/// Emails are trimmed and lower-cased; phone numbers are normalised to E.164,
/// so that the same person always produces the same identity string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identity {
    Email(String),
    Phone(PhoneNumber),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Identity is empty")]
    Empty,
    #[error("`{0}` is neither an email address nor a phone number")]
    Unrecognised(String),
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        if let Some((local, domain)) = trimmed.split_once('@') {
            let well_formed = !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.contains(char::is_whitespace);
            return if well_formed {
                Ok(Self::Email(trimmed.to_lowercase()))
            } else {
                Err(IdentityError::Unrecognised(trimmed.to_string()))
            };
        }
        phonenumber::parse(None, trimmed)
            .map(Self::Phone)
            .map_err(|_| IdentityError::Unrecognised(trimmed.to_string()))
    }
}

impl TryFrom<String> for Identity {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email(email) => write!(f, "{email}"),
            // `PhoneNumber` displays as E.164.
            Self::Phone(phone) => write!(f, "{phone}"),
        }
    }
}
