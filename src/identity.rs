//! Driven adapters for the hosted identity provider
pub mod gotrue_driven_ports;
