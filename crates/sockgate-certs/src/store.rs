//! Load-or-generate over the certificate directory.
//!
//! A pair is either fully present (both files readable), fully absent (both
//! files missing), or broken. Broken pairs are reported, never regenerated.
//!
//! Generation runs under an exclusive `flock` on the directory's lock file
//! and re-checks the cache once the lock is held, so concurrent first runs
//! agree on a single pair. Each file is written to a temporary sibling with
//! owner-only permissions, synced, then renamed into place key first: an
//! interrupted commit leaves a key without its certificate, which the next
//! load rejects.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, info};

use crate::bundle::PemPair;
use crate::error::{CertError, Result};
use crate::layout::{Artifact, LOCK_FILENAME, PairPaths};

/// Read a pair from disk.
///
/// `Ok(None)` only when both files are missing. When exactly one is missing
/// its not-found error is returned as is.
pub(crate) fn read_pair(paths: &PairPaths) -> Result<Option<PemPair>> {
    match (fs::read(&paths.cert), fs::read(&paths.key)) {
        (Ok(cert), Ok(key)) => Ok(Some(PemPair { cert, key })),
        (Err(cert_err), Err(key_err))
            if cert_err.kind() == io::ErrorKind::NotFound
                && key_err.kind() == io::ErrorKind::NotFound =>
        {
            Ok(None)
        }
        (Err(source), _) => Err(CertError::Read {
            path: paths.cert.clone(),
            source,
        }),
        (Ok(_), Err(source)) => Err(CertError::Read {
            path: paths.key.clone(),
            source,
        }),
    }
}

/// Return the cached pair for `artifact`, or generate one.
///
/// With `persist` unset the directory is only read; whatever `generate`
/// returns is handed back as is.
pub(crate) fn load_or_generate<F>(
    dir: &Path,
    artifact: Artifact,
    persist: bool,
    generate: F,
) -> Result<PemPair>
where
    F: FnOnce() -> Result<PemPair>,
{
    let paths = artifact.paths_in(dir);
    if let Some(pair) = read_pair(&paths)? {
        debug!(kind = artifact.label(), cert = %paths.cert.display(), "Loaded cached certificate");
        return Ok(pair);
    }

    if !persist {
        return generate();
    }

    let _lock = lock_dir(dir)?;
    if let Some(pair) = read_pair(&paths)? {
        debug!(
            kind = artifact.label(),
            cert = %paths.cert.display(),
            "Certificate was written while waiting for the directory lock"
        );
        return Ok(pair);
    }

    let pair = generate()?;
    commit_pair(dir, &paths, &pair)?;
    info!(
        kind = artifact.label(),
        cert = %paths.cert.display(),
        key = %paths.key.display(),
        "Generated certificate"
    );
    Ok(pair)
}

fn lock_dir(dir: &Path) -> Result<Flock<File>> {
    let path = dir.join(LOCK_FILENAME);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .mode(0o600)
        .open(&path)
        .map_err(|source| CertError::Lock {
            path: path.clone(),
            source,
        })?;
    Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| CertError::Lock {
        path,
        source: io::Error::from(errno),
    })
}

fn commit_pair(dir: &Path, paths: &PairPaths, pair: &PemPair) -> Result<()> {
    let key_tmp = write_temp(dir, &paths.key, &pair.key)?;
    let cert_tmp = write_temp(dir, &paths.cert, &pair.cert)?;

    key_tmp
        .persist(&paths.key)
        .map_err(|e| CertError::Write {
            path: paths.key.clone(),
            source: e.error,
        })?;
    cert_tmp
        .persist(&paths.cert)
        .map_err(|e| CertError::Write {
            path: paths.cert.clone(),
            source: e.error,
        })?;
    Ok(())
}

/// Write `contents` to a 0600 temporary file next to `target`.
fn write_temp(dir: &Path, target: &Path, contents: &[u8]) -> Result<tempfile::NamedTempFile> {
    let write_err = |source| CertError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".sockgate-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    Ok(tmp)
}
