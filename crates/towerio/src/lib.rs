//! `towerio`: frame IO for the tower wire protocol.
//!
//! One frame = `u32` little-endian byte length + payload. The length prefix
//! covers the payload only, and a frame is only ever surfaced whole: the
//! reader buffers until the full body is available, the writer emits prefix
//! and payload back to back.

pub mod frame;
