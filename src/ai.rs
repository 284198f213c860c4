//! Driven adapters for hosted generative models
pub mod gemini_driven_ports;
