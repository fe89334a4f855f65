use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::error;
use mongodb::error::Error as DbError;
use reqwest::Error as HttpError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::{json, Json},
    Request,
};
use rust_xlsxwriter::XlsxError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Identity provider request failed: {0}")]
    IdentityProvider(#[from] HttpError),
    #[error("Failed to render spreadsheet: {0}")]
    Export(#[from] XlsxError),
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Shorthand for a 404 naming the thing that wasn't found.
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.as_ref()))
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Export(_) => Status::InternalServerError,
            Self::IdentityProvider(_) => Status::BadGateway,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Rejected(rejection) => rejection.status(),
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Never leak internal details to the client.
        let message = if status.class() == StatusClass::ServerError {
            error!("{} {}: {self}", req.method(), req.uri());
            status.reason().unwrap_or("Internal server error").to_string()
        } else {
            self.to_string()
        };
        let body = json!({
            "ok": false,
            "error": message,
        });
        (status, Json(body)).respond_to(req)
    }
}

/// Reasons a vote submission may be refused by the admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Missing identity: an email address or phone number is required to vote")]
    MissingIdentity,
    #[error("Invalid identity: expected an email address or phone number")]
    InvalidIdentity,
    #[error("Your email address or phone number has not been verified")]
    UnverifiedIdentity,
    #[error("You have already voted in this election")]
    DuplicateIdentity,
    #[error("This device has already been used to vote in this election")]
    DuplicateDevice,
    #[error("Too many votes from this network")]
    NetworkLimitExceeded,
    #[error("Election not found")]
    ElectionNotFound,
    #[error("This election has been closed")]
    ElectionClosed,
    #[error("No candidates selected")]
    NoSelections,
    #[error("Selections do not match the election's positions and candidates")]
    InvalidSelection,
}

impl Rejection {
    pub fn status(self) -> Status {
        match self {
            Self::MissingIdentity
            | Self::InvalidIdentity
            | Self::ElectionClosed
            | Self::NoSelections
            | Self::InvalidSelection => Status::BadRequest,
            Self::UnverifiedIdentity => Status::Forbidden,
            Self::DuplicateIdentity | Self::DuplicateDevice => Status::Conflict,
            Self::NetworkLimitExceeded => Status::TooManyRequests,
            Self::ElectionNotFound => Status::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_follow_status_taxonomy() {
        let cases = [
            (Rejection::MissingIdentity, 400),
            (Rejection::DuplicateIdentity, 409),
            (Rejection::DuplicateDevice, 409),
            (Rejection::NetworkLimitExceeded, 429),
            (Rejection::ElectionNotFound, 404),
            (Rejection::ElectionClosed, 400),
            (Rejection::UnverifiedIdentity, 403),
        ];
        for (rejection, code) in cases {
            assert_eq!(Error::from(rejection).status().code, code, "{rejection:?}");
        }
    }

    #[test]
    fn not_found_names_the_missing_thing() {
        let err = Error::not_found("Election 42");
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.to_string(), "Election 42 not found");
    }
}
