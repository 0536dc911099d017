use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

const BROTLI_QUALITY: u32 = 11;
const BROTLI_WINDOW: u32 = 22;
const ZSTD_LEVEL: i32 = 19;
const PROBE: &[u8] = b"export const probe = 1;";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSizes {
    pub raw: u64,
    pub gzip: u64,
    pub brotli: Option<u64>,
    pub zstd: Option<u64>,
}

impl ChunkSizes {
    /// Sums every chunk. An optional algorithm only gets a total when every
    /// chunk was measured with it.
    pub fn total<'a>(sizes: impl IntoIterator<Item = &'a ChunkSizes>) -> ChunkSizes {
        let mut total = ChunkSizes {
            brotli: Some(0),
            zstd: Some(0),
            ..ChunkSizes::default()
        };

        for chunk in sizes {
            total.raw += chunk.raw;
            total.gzip += chunk.gzip;
            total.brotli = total.brotli.zip(chunk.brotli).map(|(a, b)| a + b);
            total.zstd = total.zstd.zip(chunk.zstd).map(|(a, b)| a + b);
        }

        total
    }
}

type Compressor = fn(&[u8]) -> io::Result<u64>;

/// Per-session compressor availability. Brotli is probed once; zstd is
/// initialized on first use and stays off for the session after any failure.
#[derive(Debug)]
pub struct CompressionSupport {
    brotli: OnceLock<bool>,
    zstd: OnceLock<bool>,
    zstd_failed: AtomicBool,
    brotli_fn: Compressor,
    zstd_fn: Compressor,
}

impl Default for CompressionSupport {
    fn default() -> Self {
        Self::with_compressors(brotli_size, zstd_size)
    }
}

impl CompressionSupport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_compressors(brotli_fn: Compressor, zstd_fn: Compressor) -> Self {
        CompressionSupport {
            brotli: OnceLock::new(),
            zstd: OnceLock::new(),
            zstd_failed: AtomicBool::new(false),
            brotli_fn,
            zstd_fn,
        }
    }

    pub fn brotli_supported(&self) -> bool {
        *self.brotli.get_or_init(|| match (self.brotli_fn)(PROBE) {
            Ok(_) => true,
            Err(err) => {
                warn!("brotli unavailable, sizes will omit it: {err}");
                false
            }
        })
    }

    pub fn zstd_supported(&self) -> bool {
        let initialized = *self.zstd.get_or_init(|| match (self.zstd_fn)(PROBE) {
            Ok(_) => true,
            Err(err) => {
                warn!("zstd unavailable, sizes will omit it: {err}");
                false
            }
        });
        initialized && !self.zstd_failed.load(Ordering::Relaxed)
    }

    pub fn measure(&self, code: &str) -> io::Result<ChunkSizes> {
        let bytes = code.as_bytes();

        let brotli = if self.brotli_supported() {
            (self.brotli_fn)(bytes).ok()
        } else {
            None
        };

        let zstd = if self.zstd_supported() {
            match (self.zstd_fn)(bytes) {
                Ok(size) => Some(size),
                Err(err) => {
                    warn!("zstd failed, disabling it for this session: {err}");
                    self.zstd_failed.store(true, Ordering::Relaxed);
                    None
                }
            }
        } else {
            None
        };

        Ok(ChunkSizes {
            raw: bytes.len() as u64,
            gzip: gzip_size(bytes)?,
            brotli,
            zstd,
        })
    }
}

pub fn gzip_size(bytes: &[u8]) -> io::Result<u64> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len() as u64)
}

pub fn brotli_size(bytes: &[u8]) -> io::Result<u64> {
    let mut writer = brotli::CompressorWriter::new(Vec::new(), 4096, BROTLI_QUALITY, BROTLI_WINDOW);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(writer.into_inner().len() as u64)
}

pub fn zstd_size(bytes: &[u8]) -> io::Result<u64> {
    Ok(zstd::bulk::compress(bytes, ZSTD_LEVEL)?.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_every_algorithm() {
        let support = CompressionSupport::new();
        let code = "export function add(a, b) { return a + b; }\n".repeat(50);
        let sizes = support.measure(&code).unwrap();

        assert_eq!(sizes.raw, code.len() as u64);
        assert!(sizes.gzip > 0 && sizes.gzip < sizes.raw);
        assert!(sizes.brotli.is_some_and(|size| size < sizes.raw));
        assert!(sizes.zstd.is_some_and(|size| size < sizes.raw));
        assert!(support.brotli_supported());
        assert!(support.zstd_supported());
    }

    fn unavailable(_: &[u8]) -> io::Result<u64> {
        Err(io::Error::other("compressor missing"))
    }

    // Passes the startup probe, then fails on real input.
    fn fails_after_probe(bytes: &[u8]) -> io::Result<u64> {
        if bytes == PROBE {
            Ok(1)
        } else {
            Err(io::Error::other("compressor crashed"))
        }
    }

    #[test]
    fn unsupported_brotli_stays_off() {
        let support = CompressionSupport::with_compressors(unavailable, zstd_size);
        let first = support.measure("export const a = 1;").unwrap();
        let second = support.measure("export const b = 2;").unwrap();

        assert!(!support.brotli_supported());
        assert_eq!(first.brotli, None);
        assert_eq!(second.brotli, None);
        assert!(second.zstd.is_some());

        let total = ChunkSizes::total([&first, &second]);
        assert_eq!(total.brotli, None);
        assert!(total.zstd.is_some());
    }

    #[test]
    fn zstd_failure_disables_it_for_the_session() {
        let support = CompressionSupport::with_compressors(brotli_size, fails_after_probe);
        assert!(support.zstd_supported());

        let first = support.measure("export const a = 1;").unwrap();
        assert_eq!(first.zstd, None);
        assert!(!support.zstd_supported());

        let second = support.measure("export const b = 2;").unwrap();
        assert_eq!(second.zstd, None);
        assert!(second.brotli.is_some());

        let total = ChunkSizes::total([&first, &second]);
        assert_eq!(total.zstd, None);
        assert!(total.brotli.is_some());
    }

    #[test]
    fn totals_are_all_or_nothing() {
        let a = ChunkSizes {
            raw: 10,
            gzip: 5,
            brotli: Some(4),
            zstd: Some(3),
        };
        let b = ChunkSizes {
            raw: 20,
            gzip: 8,
            brotli: None,
            zstd: Some(6),
        };

        let total = ChunkSizes::total([&a, &b]);
        assert_eq!(total.raw, 30);
        assert_eq!(total.gzip, 13);
        assert_eq!(total.brotli, None);
        assert_eq!(total.zstd, Some(9));
    }

    #[test]
    fn empty_total_is_zero() {
        let total = ChunkSizes::total(std::iter::empty());
        assert_eq!(total.raw, 0);
        assert_eq!(total.brotli, Some(0));
    }
}
