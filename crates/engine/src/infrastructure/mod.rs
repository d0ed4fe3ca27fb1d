//! Infrastructure - collaborator ports and their in-process adapters

pub mod memory;
pub mod ports;
