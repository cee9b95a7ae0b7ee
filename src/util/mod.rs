//! Shared utilities (length-encoded integers, bitmap views, region swaps).

pub mod bitmap;
pub mod lenenc;
pub mod rotate;
