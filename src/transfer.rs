use tracing::debug;

use crate::endpoint::Endpoint;

/// Why a key was skipped rather than migrated or failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum SkipReason {
    #[strum(serialize = "vanished before dump")]
    VanishedBeforeDump,
    #[strum(serialize = "vanished before ttl query")]
    VanishedBeforeTtl,
}

/// Result of migrating one key. Pure data; rendering is the caller's
/// concern so transfers behave identically in interactive, batch and test
/// modes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Migrated { key: String },
    Skipped { key: String, reason: SkipReason },
    Failed { key: String, reason: String },
}

/// Moves one key: dump at the source, re-query the remaining TTL, restore
/// at the destination. The TTL is read immediately before the restore and
/// applied as time-remaining, so the destination expiry is relative to the
/// restore instant rather than the source's original deadline.
///
/// Each key gets exactly one attempt. Every error below the connection
/// level is absorbed into the outcome so one bad key never stops the run.
pub async fn transfer<S, D>(
    key: &str,
    source: &mut S,
    destination: &mut D,
    replace: bool,
) -> TransferOutcome
where
    S: Endpoint,
    D: Endpoint,
{
    let key = key.to_string();

    let payload = match source.dump(&key).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            // Enumerated but expired or deleted before we got to it.
            return TransferOutcome::Skipped {
                key,
                reason: SkipReason::VanishedBeforeDump,
            };
        }
        Err(e) => {
            return TransferOutcome::Failed {
                key,
                reason: format!("dump failed: {e}"),
            };
        }
    };

    let ttl = match source.remaining_ttl(&key).await {
        Ok(Some(ttl)) => ttl,
        Ok(None) => {
            // Gone between dump and TTL query; restoring now would
            // resurrect a key the source already dropped.
            return TransferOutcome::Skipped {
                key,
                reason: SkipReason::VanishedBeforeTtl,
            };
        }
        Err(e) => {
            return TransferOutcome::Failed {
                key,
                reason: format!("ttl query failed: {e}"),
            };
        }
    };

    match destination.restore(&key, ttl, &payload, replace).await {
        Ok(()) => {
            debug!(key = %key, ?ttl, bytes = payload.len(), "migrated");
            TransferOutcome::Migrated { key }
        }
        Err(e) => TransferOutcome::Failed {
            key,
            reason: format!("restore failed: {e}"),
        },
    }
}
