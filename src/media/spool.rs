/// Bounded transfer of a chunk source onto disk
use crate::{
    error::{MediaError, MediaResult},
    media::source::ChunkSource,
};
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

/// What to do when the destination already exists at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Move the spooled file over the destination
    Replace,
    /// Leave the existing file in place and discard the spooled copy
    KeepExisting,
}

/// Result of a successful spool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spooled {
    /// Bytes read from the source
    pub size: u64,
    /// False when `KeepExisting` found another writer's file already in place
    pub written: bool,
}

/// Copy `source` into `destination` without ever exceeding `max_bytes`
///
/// Bytes go to a hidden temporary file next to the destination and are
/// renamed into place only after the whole source was read. Any failure
/// removes the temporary file, so the destination never holds a partial
/// transfer.
pub async fn spool_to_file(
    source: &mut dyn ChunkSource,
    destination: &Path,
    max_bytes: u64,
    mode: CommitMode,
) -> MediaResult<Spooled> {
    let temp_path = temp_path_for(destination)?;

    let size = match copy_bounded(source, &temp_path, max_bytes).await {
        Ok(size) => size,
        Err(e) => {
            discard(&temp_path).await;
            return Err(e);
        }
    };

    if mode == CommitMode::KeepExisting && fs::try_exists(destination).await.unwrap_or(false) {
        discard(&temp_path).await;
        return Ok(Spooled {
            size,
            written: false,
        });
    }

    if let Err(e) = fs::rename(&temp_path, destination).await {
        discard(&temp_path).await;
        return Err(MediaError::Io(e));
    }

    Ok(Spooled {
        size,
        written: true,
    })
}

async fn copy_bounded(
    source: &mut dyn ChunkSource,
    temp_path: &Path,
    max_bytes: u64,
) -> MediaResult<u64> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await?;

    let mut total: u64 = 0;
    while let Some(chunk) = source.next_chunk().await? {
        total += chunk.len() as u64;
        if total > max_bytes {
            return Err(MediaError::PayloadTooLarge { max: max_bytes });
        }
        file.write_all(&chunk).await?;
    }

    if total == 0 {
        return Err(MediaError::EmptyPayload);
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(total)
}

fn temp_path_for(destination: &Path) -> MediaResult<PathBuf> {
    let dir = destination
        .parent()
        .ok_or_else(|| MediaError::InvalidPath(destination.display().to_string()))?;
    Ok(dir.join(format!(".{}.part", uuid::Uuid::new_v4().simple())))
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove temporary file {}: {}", path.display(), e);
        }
    }
}
