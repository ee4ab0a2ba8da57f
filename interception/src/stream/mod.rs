//! Streaming-vs-batch response routing and wire framing.
//!
//! The router behaves identically in both modes: finalize, then extract
//! and dispatch embedded commands, then reinject handler output. In
//! streaming mode reinjection happens through additional delta frames; in
//! batch mode it is appended in place on the payload's text field.

pub mod frames;
pub mod router;

pub use frames::DONE_FRAME;
pub use router::ResponseRouter;
