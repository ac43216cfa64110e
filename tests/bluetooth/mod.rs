//! Bluetooth test modules
//!
//! `common_utils` builds simulations and fixtures shared by the other
//! modules; each remaining module covers one part of the API surface.

pub mod common_utils;

pub mod availability;
pub mod characteristic_properties;
pub mod discovery;
pub mod isolation;
