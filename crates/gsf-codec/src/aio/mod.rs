//! Async variant of the codec.
//!
//! The shapes mirror the blocking API one for one: every raw read and
//! write is an await point, and block payloads are decoded by the same
//! pure parsers the blocking path uses, so the two cannot diverge.
//!
//! A decoder is bound to one reader and must not be shared between
//! concurrent contexts. Cancelling an in-flight operation leaves the
//! underlying stream at an unspecified offset; reopen or re-seek before
//! reusing it.

mod decoder;
mod encoder;
mod read;
mod sink;

pub use decoder::{AsyncGrainIter, AsyncGsfDecoder};
pub use encoder::AsyncGsfEncoder;
pub use read::AsyncBlockReader;
pub use sink::{AsyncGsfSink, AsyncSeekableSink, AsyncStreamSink};
