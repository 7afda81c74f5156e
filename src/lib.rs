//! ID3 metadata manipulation.
//!
//! Minuet reads, edits, and writes the ID3 tag formats found in and around
//! MPEG audio: the fixed 128-byte ID3v1.0/v1.1 trailer and the frame-based
//! ID3v2.2/v2.3/v2.4 header, including conversion of a tag between the
//! ID3v2 versions when it is re-saved.

#![forbid(unsafe_code)]

#[macro_use]
mod core;

pub mod genres;
pub mod id3v1;
pub mod id3v2;
pub mod string;
