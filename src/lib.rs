//! Booking lifecycle and walker-availability engine for a dog-walking
//! marketplace. The engine guarantees that a walker is never committed to two
//! overlapping engagements, enforces the booking status state machine under
//! concurrent requests, and keeps booking state correct when the pricing or
//! notification collaborators fail.

pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod store;
