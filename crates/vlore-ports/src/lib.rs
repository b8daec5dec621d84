//! External engine interfaces for the VidLore backend.
//!
//! The core consumes five engines through narrow traits: the video
//! platform (metadata + audio download), the speech transcriber, the
//! sentence-embedding model, the noun-phrase NLP engine and the ANN
//! index. Engines are constructed once at startup and shared as
//! `Arc<dyn ...>` handles; no component reaches for a global.

pub mod ann;
pub mod embedder;
pub mod error;
pub mod nlp;
pub mod transcriber;
pub mod video_source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use ann::AnnIndex;
pub use embedder::Embedder;
pub use error::{PortError, PortResult};
pub use nlp::{NounPhrase, NounPhraseEngine};
pub use transcriber::{Transcriber, Transcription};
pub use video_source::VideoSource;
