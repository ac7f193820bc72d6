//! Entity storage and capability records
//!
//! Entities are add-only within a scene generation. Each holds at most one
//! record per [`CapabilityKind`]; lookups by kind are constant time.

pub mod component;
pub mod components;
pub mod entity;
pub mod world;

pub use component::{CapabilityKind, CapabilityMask, Component};
pub use entity::{Entity, EntityHandle};
pub use world::{EntityStore, StoreError};
