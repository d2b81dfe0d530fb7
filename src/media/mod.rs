/// Media storage and document caching
///
/// Persists uploads under the public static root, produces public URLs for
/// stored or externally hosted media, and mirrors remote documents to local
/// storage under deterministic names.
///
/// - [`PathSandbox`]: keeps every resolved path inside the storage root
/// - [`UploadStore`]: validated image/document uploads with random names
/// - [`MediaUrlResolver`]: stored path or external URL to a servable URL
/// - [`DocumentCache`]: at-most-once download per (URL, hint) with a byte ceiling

pub mod cache;
pub mod fetch;
pub mod policy;
pub mod resolver;
pub mod sandbox;
pub mod source;
pub mod spool;
pub mod upload;

pub use cache::DocumentCache;
pub use fetch::{DocumentFetcher, HttpFetcher, RemoteDocument};
pub use policy::{RelativeMediaPath, UploadKind, MAX_DOCUMENT_BYTES, MAX_IMAGE_BYTES};
pub use resolver::MediaUrlResolver;
pub use sandbox::PathSandbox;
pub use source::{ChunkSource, ReaderSource, StreamSource};
pub use upload::{DeleteOutcome, UploadStore};
