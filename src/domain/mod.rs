pub mod account;
pub mod branch;
pub mod cluster;
pub mod family;
pub mod person;
pub mod report;

pub use account::*;
pub use branch::*;
pub use cluster::*;
pub use family::*;
pub use person::*;
pub use report::*;

use serde::{Deserialize, Deserializer};

/// Update payloads tell a missing field (`None`, left alone) from an
/// explicit `null` (`Some(None)`, cleared).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
