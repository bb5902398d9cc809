pub mod digest;
pub mod crypto;
pub mod value;
pub mod codec;
pub mod block;
pub mod error;
pub mod savefile;
pub mod format;
pub mod scan;

pub use block::{Block, BlockCheck};
pub use codec::{PayloadCodec, PayloadError, TaggedCodec};
pub use crypto::{Transform, NoTransform, XorTransform, KeystreamTransform};
pub use digest::{Digest, IntegrityHasher, Md5Hasher, Blake3Hasher};
pub use error::{SaveError, Section};
pub use format::SaveFormat;
pub use savefile::{SaveFile, LoadOptions, SaveOptions, IntegrityPolicy, IntegrityWarning, SAVE_VERSION};
pub use scan::ScanReport;
pub use value::{Table, Value};
