//! Domain of the hostel room booking system: blocks, floors and rooms,
//! user profiles and the rules deciding who may book what.

pub mod error;
pub mod memory;
pub mod model;
pub mod policy;
pub mod service;
pub mod store;

pub use error::{BookingError, StoreError};
pub use memory::MemoryStore;
pub use service::HostelService;
pub use store::HostelStore;
