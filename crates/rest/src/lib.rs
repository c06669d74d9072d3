//! HTTP transport: server wiring, routing, and request/response mapping.

pub mod app;
