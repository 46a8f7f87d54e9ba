use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::error::{CrackError, CrackResult};

const BUFFER_CAPACITY: usize = 1024 * 1024;

/// A trained model that can be persisted to disk with bincode.
pub trait Artifact: Serialize + DeserializeOwned {
    /// Checks the artifact after it has been loaded.
    fn validate(&self) -> CrackResult<()> {
        Ok(())
    }

    /// Stores this artifact to the given path.
    fn store(&self, path: &Path) -> CrackResult<()> {
        let file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let buf_writer = BufWriter::with_capacity(BUFFER_CAPACITY, file);
        bincode::serialize_into(buf_writer, self).map_err(|_| CrackError::Serialize)?;
        debug!(path = %path.display(), "stored artifact");

        Ok(())
    }

    /// Loads an artifact from the given path.
    fn load(path: &Path) -> CrackResult<Self> {
        let file = File::open(path)?;
        let buf_reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let artifact: Self =
            bincode::deserialize_from(buf_reader).map_err(|_| CrackError::Deserialize)?;
        artifact.validate()?;

        Ok(artifact)
    }
}
