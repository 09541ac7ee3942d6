//! Bare-metal provider integration for gocy
//!
//! The heart of this crate is the [`ReservationEngine`], which makes sure every
//! VIP a constellation declares is backed by exactly one provider reservation,
//! no matter how many times it runs.

#![warn(missing_docs)]

pub mod addresses;
pub mod capacity;
pub mod client;
pub mod cpem;
pub mod devices;
pub mod matcher;
pub mod reservation;
pub mod store;
pub mod types;

pub use addresses::ReservedVips;
pub use client::{MetalApi, MetalClient, DEFAULT_API_URL};
pub use cpem::CpemConfig;
pub use reservation::{ReconcileContext, ReservationEngine, Source, VipOutcome};
pub use store::RecordStore;
pub use types::{CapacityServer, Device, IpRequest, IpReservation};
