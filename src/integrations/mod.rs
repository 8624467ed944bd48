//! External integrations.
//!
//! Only Strava upload for now; the core never depends on this module.

pub mod strava;

pub use strava::{StravaClient, StravaToken, SyncError, UploadResponse};
