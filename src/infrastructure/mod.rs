//! Concrete adapters for the domain ports, plus the in-process queue and
//! dead letter queue shared by checkout and the worker pool.

pub mod clock;
pub mod dead_letter;
pub mod fraud;
pub mod gateway;
pub mod in_memory;
pub mod inventory;
pub mod queue;
