//! Core errors: malformed identifiers, rejected form fields, undecodable
//! documents.
//!
//! Everything here is a refusal of input. None of it is retryable and none
//! of it happens after a side effect.

use thiserror::Error;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (network blip, backend briefly unavailable).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Nothing was written.
    None,
    /// Something was written (a blob, a document).
    Some,
    /// The request may or may not have reached the backend.
    Unknown,
}

crate::enum_str! {
    impl Effect {
        pub fn as_str(&self) -> &'static str;
        fn parse_str(raw: &str) -> Option<Self>;
        variants {
            None => ["none"],
            Some => ["some"],
            Unknown => ["unknown"],
        }
    }
}

/// Which kind of key an [`InvalidId`] was meant to be.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IdKind {
    Tree,
    Species,
    Sector,
    Creator,
}

crate::enum_str! {
    impl IdKind {
        pub fn as_str(&self) -> &'static str;
        fn parse_str(raw: &str) -> Option<Self>;
        variants {
            Tree => ["tree"],
            Species => ["species"],
            Sector => ["sector"],
            Creator => ["creator"],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} id `{raw}` is invalid: {reason}")]
pub struct InvalidId {
    pub kind: IdKind,
    pub raw: String,
    pub reason: String,
}

/// A registration/update form field that failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("field {field} is invalid: {reason}")]
pub struct InvalidField {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidField {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A stored document that does not fit the typed model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("document `{key}` in {collection} does not decode: {reason}")]
pub struct DecodeError {
    pub collection: &'static str,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    InvalidField(#[from] InvalidField),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
