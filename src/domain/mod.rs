//! Domain types and the ports through which the application talks to the
//! outside world (gateway, inventory, clock and storage).

pub mod job;
pub mod order;
pub mod payment;
pub mod ports;
