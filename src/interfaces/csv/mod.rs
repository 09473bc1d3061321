//! CSV adapters used by the command line interface.

pub mod checkout_reader;
pub mod order_writer;
