//! Census operations outside the live tree list: sign-in, registration,
//! photos, positions, the form catalog.

pub mod catalog;
pub mod clock;
pub mod form;
pub mod geo;
pub mod media;
pub mod registry;
pub mod session;

pub use catalog::Catalog;
pub use clock::{ManualClock, SystemTimeSource, TimeSource};
pub use form::{FormMessage, MessageKind, RegistrationForm};
pub use geo::{
    FixedLocation, GeocodeError, GeolocationOptions, Geolocator, LocationError,
    NominatimGeocoder, ReverseGeocoder,
};
pub use media::{
    AssetError, BlobStore, Camera, ImageCompressor, MemoryBlobStore, Passthrough, Photo,
    PhotoPipeline, StoredPhoto,
};
pub use registry::TreeRegistry;
pub use session::{
    Credentials, MemorySessionService, Route, Session, SessionError, SessionService,
    require_session,
};
