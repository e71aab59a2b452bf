use thiserror::Error;

use crate::config::ConfigError;
use crate::core::{CoreError, InvalidField};
use crate::services::{AssetError, GeocodeError, LocationError, SessionError};
use crate::store::StoreError;
use crate::sync::SyncError;

pub use crate::core::{Effect, Transience};

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<InvalidField> for Error {
    fn from(err: InvalidField) -> Self {
        Error::Core(err.into())
    }
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Core(e) => e.transience(),
            Error::Store(e) => e.transience(),
            Error::Sync(e) => e.transience(),
            Error::Session(e) => e.transience(),
            Error::Asset(e) => e.transience(),
            Error::Location(e) => e.transience(),
            Error::Geocode(e) => e.transience(),
            Error::Config(e) => e.transience(),
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Core(e) => e.effect(),
            Error::Store(e) => e.effect(),
            Error::Sync(e) => e.effect(),
            Error::Session(e) => e.effect(),
            Error::Asset(e) => e.effect(),
            Error::Location(e) => e.effect(),
            Error::Geocode(e) => e.effect(),
            Error::Config(e) => e.effect(),
        }
    }

    /// Text for the alert shown to the user. Nothing is retried on their
    /// behalf; the message says whether trying again may help.
    pub fn user_message(&self) -> String {
        match self {
            Error::Core(CoreError::InvalidField(field)) => {
                format!("Check the {} field: {}.", field.field, field.reason)
            }
            Error::Core(err) => format!("The data is not valid: {err}."),
            Error::Session(SessionError::InvalidCredentials) => {
                "Invalid user or password.".to_string()
            }
            Error::Session(SessionError::MissingCredential { field }) => {
                format!("Enter your {field}.")
            }
            Error::Session(SessionError::NotSignedIn) => "Sign in to continue.".to_string(),
            Error::Store(StoreError::PermissionDenied { .. }) => {
                "You do not have permission to change the census.".to_string()
            }
            Error::Store(StoreError::NotFound { .. }) => {
                "That tree no longer exists.".to_string()
            }
            Error::Asset(AssetError::Capture { .. }) => "Could not take the photo.".to_string(),
            Error::Asset(err) => format!("Could not save the photo: {err}."),
            Error::Location(LocationError::PermissionDenied) => {
                "Allow location access to register a tree.".to_string()
            }
            Error::Location(_) => "Could not get the current location.".to_string(),
            err if err.transience().is_retryable() => {
                format!("The census service is unreachable, try again: {err}.")
            }
            err => format!("Something went wrong: {err}."),
        }
    }
}
