//! Registration form state across submit attempts.

use crate::core::{TreeDraft, TreeId};
use crate::services::geo::{GeolocationOptions, Geolocator};
use crate::services::media::{Camera, Photo};
use crate::services::registry::TreeRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

/// The alert shown after an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl FormMessage {
    fn success(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Success,
            text: text.into(),
        }
    }

    fn error(err: &crate::Error) -> Self {
        Self {
            kind: MessageKind::Error,
            text: err.user_message(),
        }
    }
}

/// Draft, pending photo and last message.
///
/// A successful submit clears the draft and photo. A failed one keeps both so
/// the user can correct and resubmit.
#[derive(Debug, Default)]
pub struct RegistrationForm {
    pub draft: TreeDraft,
    photo: Option<Photo>,
    message: Option<FormMessage>,
}

impl RegistrationForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }

    pub fn message(&self) -> Option<&FormMessage> {
        self.message.as_ref()
    }

    pub fn dismiss_message(&mut self) {
        self.message = None;
    }

    /// Fills latitude/longitude from the device. On failure the previous
    /// position is kept.
    pub fn locate(&mut self, geolocator: &dyn Geolocator, options: &GeolocationOptions) -> bool {
        match geolocator.current_position(options) {
            Ok(position) => {
                self.draft.latitude = Some(position.latitude);
                self.draft.longitude = Some(position.longitude);
                true
            }
            Err(err) => {
                self.message = Some(FormMessage::error(&err.into()));
                false
            }
        }
    }

    /// Replaces the pending photo. On failure the previous one is kept.
    pub fn capture_photo(&mut self, camera: &dyn Camera, quality: u8) -> bool {
        match camera.capture(quality) {
            Ok(photo) => {
                self.photo = Some(photo);
                true
            }
            Err(err) => {
                self.message = Some(FormMessage::error(&err.into()));
                false
            }
        }
    }

    pub fn submit(&mut self, registry: &TreeRegistry) -> crate::Result<TreeId> {
        match registry.register(&self.draft, self.photo.as_ref()) {
            Ok(id) => {
                self.draft = TreeDraft::default();
                self.photo = None;
                self.message = Some(FormMessage::success("Tree registered."));
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(code = %self.draft.code, "registration failed: {err}");
                self.message = Some(FormMessage::error(&err));
                Err(err)
            }
        }
    }
}
