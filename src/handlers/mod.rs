// HTTP boundary for the messaging-gateway allocator.

pub mod allocation;
pub mod connection;
pub mod messages;
pub mod occupancy;
pub mod pairing;
pub mod webhook;
