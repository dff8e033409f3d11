//! PKCS#15 card personalization engine.
//!
//! The engine takes a blank (or partially personalized) card behind a
//! [`cardsmith_card::CardSession`], a declarative [`Profile`] of the
//! target layout and a vendor [`CardOps`] driver, and drives the card to
//! a state where the PKCS#15 directory files describe every object that
//! was stored. The card's file hierarchy is created lazily and every
//! write runs through the access control engine.

mod allocator;
mod auth;
mod directory;
mod encode;
mod error;
mod keys;
mod object;
mod ops;
mod personalizer;
mod profile;
mod request;
mod types;
mod vendor;

pub use auth::AuthCtx;
pub use encode::{encode_df, encode_odf, encode_tokeninfo};
pub use error::{Error, Result};
pub use keys::KeyMaterial;
pub use object::{Catalog, DirectoryObject, KeyInfo, ObjectPayload, PinInfo};
pub use ops::{CardOps, ops_by_name};
pub use personalizer::{InputRequestFn, Personalizer};
pub use profile::{AuthKey, KeyTemplate, PinPolicy, PinRole, Profile, ProfileBuilder};
pub use request::KeyRequest;
pub use types::{Algorithm, DfType, KeyUsage, ObjectId, ObjectKind, PinFlags};
pub use vendor::SoftOps;
