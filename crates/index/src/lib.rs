mod artifacts;
mod error;
mod flat;
mod matrix;

pub use artifacts::{ArtifactPaths, EncoderFingerprint, Hit, IndexBundle, IndexManifest};
pub use error::{IndexError, Result};
pub use flat::{squared_l2, FlatL2Index, Neighbor};
pub use matrix::EmbeddingMatrix;
