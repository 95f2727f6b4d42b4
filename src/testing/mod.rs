//! Test support for the bridge
//!
//! `mock` provides an in-memory host with failure injection; `scenarios`
//! drives complete attach/detach cycles against it.


mod scenarios;
