use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::CurtainError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn read_maybe_gzip(path: &Path) -> Result<Vec<u8>, CurtainError> {
    let bytes = fs::read(path)
        .map_err(|err| CurtainError::Filesystem(format!("read {}: {err}", path.display())))?;
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes);
    }
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut inflated = Vec::with_capacity(bytes.len() * 4);
    decoder
        .read_to_end(&mut inflated)
        .map_err(|err| CurtainError::Filesystem(format!("inflate {}: {err}", path.display())))?;
    Ok(inflated)
}
