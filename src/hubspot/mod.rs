// src/hubspot/mod.rs
// HubSpot CRM access layer

mod client;
mod filters;
mod types;

pub use client::{DEFAULT_MAX_ENTITIES, HubSpotClient, MAX_PAGE_SIZE};
pub use filters::{FilterOperator, FilterTerm, operator_for, terms_from_pairs};
pub use types::{
    EntityKind, ListPage, PropertyDescriptor, PropertyOption, PropertyType, Record,
};
