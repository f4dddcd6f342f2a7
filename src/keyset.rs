use std::path::PathBuf;

use thiserror::Error as ThisError;
use tracing::debug;

use crate::endpoint::{Endpoint, EndpointError};

#[derive(Debug, ThisError)]
pub enum KeysetError {
    #[error("unable to read key file {path}: {source}")]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// How the candidate key set is chosen. Picked once from configuration and
/// immutable for the run. The full-keyspace sweep is `Pattern("*")`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyFilter {
    Pattern(String),
    File(PathBuf),
}

impl KeyFilter {
    /// A key file names exactly the keys to migrate; iterating it once per
    /// logical database would migrate every key N times.
    pub fn per_database(&self) -> bool {
        matches!(self, KeyFilter::Pattern(_))
    }
}

/// Produces the candidate keys for the currently selected database on the
/// source. Pattern mode matches server-side; file mode reads one key per
/// line, keeps duplicates (migration is idempotent, redundant work is
/// harmless) and skips blank lines.
pub async fn candidate_keys<S: Endpoint>(
    filter: &KeyFilter,
    source: &mut S,
) -> Result<Vec<String>, KeysetError> {
    match filter {
        KeyFilter::Pattern(pattern) => {
            let keys = source.keys(pattern).await?;
            debug!(pattern = %pattern, count = keys.len(), "enumerated keys");
            Ok(keys)
        }
        KeyFilter::File(path) => {
            let contents =
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| KeysetError::File {
                        path: path.clone(),
                        source,
                    })?;
            let keys: Vec<String> = contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
            debug!(path = %path.display(), count = keys.len(), "read keys from file");
            Ok(keys)
        }
    }
}
