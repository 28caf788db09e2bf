//! Array intake module
//!
//! Caller arrays of any kind and dimensionality are checked and coerced here
//! into the 2-D element kinds a DM3 image can store.

mod coerce;
pub mod types;

pub use coerce::{coerce, coerced_kind};
pub use types::{ElementKind, InputArray, PixelArray};
