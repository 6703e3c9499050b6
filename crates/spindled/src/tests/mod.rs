//! Test suites for the Spindle server.

mod support;
mod transport_behaviour;
