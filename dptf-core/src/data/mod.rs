//! Domain description types
//!
//! Static facts about a domain that decide which control facades exist.

mod types;

pub use types::{DomainInterfaces, DomainProperties, DomainType};
