//! TDR (TapeDeck Recording) artifact format.
//!
//! One artifact per named session, holding the serialized record log:
//!
//! ```text
//! ┌──────────────────────────┐
//! │ Header (16 bytes)        │  magic "TDR1", version, record count
//! ├──────────────────────────┤
//! │ Record 0                 │  offset f64 LE + length-prefixed payload
//! │ Record 1                 │
//! │ ...                      │
//! └──────────────────────────┘
//! ```
//!
//! Records stream through `Read`/`Write` one at a time, so artifacts with
//! tens of thousands of records never need more memory than the log itself.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use log::{info, warn};

use tapedeck_core::{Error, Record, Result, TimestampedLog};

/// Magic bytes for a TDR artifact
pub const TDR_MAGIC: [u8; 4] = *b"TDR1";

/// Current format version
pub const TDR_VERSION: u16 = 1;

/// Header size in bytes (fixed)
pub const HEADER_SIZE: usize = 16;

/// Artifact file extension
pub const TDR_EXTENSION: &str = "tdr";

/// Artifact header (16 bytes fixed size)
#[derive(Debug, Clone)]
pub struct TdrHeader {
    /// Format version (currently 1)
    pub version: u16,
    /// Number of records that follow the header
    pub record_count: u64,
}

impl TdrHeader {
    /// Write header to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; HEADER_SIZE];

        // Magic (4 bytes)
        buf[0..4].copy_from_slice(&TDR_MAGIC);
        // Version (2 bytes)
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        // Reserved (2 bytes, already zeroed)
        // Record count (8 bytes)
        buf[8..16].copy_from_slice(&self.record_count.to_le_bytes());

        writer.write_all(&buf)
    }

    /// Read header from reader
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut buf)
            .map_err(|e| truncated_or_io(e, "header"))?;

        if buf[0..4] != TDR_MAGIC {
            return Err(Error::Corrupt("bad magic bytes".to_string()));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > TDR_VERSION {
            return Err(Error::Corrupt(format!(
                "unsupported TDR version: {}",
                version
            )));
        }

        Ok(Self {
            version,
            record_count: u64::from_le_bytes([
                buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
            ]),
        })
    }
}

fn write_record<W: Write>(writer: &mut W, record: &Record) -> io::Result<()> {
    // Offset (8 bytes)
    writer.write_all(&record.offset.to_le_bytes())?;
    // Payload length (4 bytes)
    writer.write_all(&(record.payload.len() as u32).to_le_bytes())?;
    // Payload
    writer.write_all(&record.payload)
}

fn read_record<R: Read>(reader: &mut R) -> Result<Record> {
    let mut offset_buf = [0u8; 8];
    reader
        .read_exact(&mut offset_buf)
        .map_err(|e| truncated_or_io(e, "record offset"))?;
    let offset = f64::from_le_bytes(offset_buf);

    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .map_err(|e| truncated_or_io(e, "payload length"))?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .map_err(|e| truncated_or_io(e, "payload"))?;

    Ok(Record { offset, payload })
}

fn truncated_or_io(e: io::Error, what: &str) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::Corrupt(format!("truncated while reading {}", what))
    } else {
        Error::Io(e)
    }
}

/// Stream a log out to a writer.
pub fn write_artifact<W: Write>(writer: &mut W, log: &TimestampedLog) -> io::Result<()> {
    let header = TdrHeader {
        version: TDR_VERSION,
        record_count: log.len() as u64,
    };
    header.write(writer)?;
    for record in log.records() {
        write_record(writer, record)?;
    }
    writer.flush()
}

/// Stream a log in from a reader. Does not repair ordering.
pub fn read_artifact<R: Read>(reader: &mut R) -> Result<TimestampedLog> {
    let header = TdrHeader::read(reader)?;
    let mut records = Vec::with_capacity(header.record_count.min(1 << 20) as usize);
    for _ in 0..header.record_count {
        records.push(read_record(reader)?);
    }
    Ok(TimestampedLog::from_records(records))
}

/// Load the artifact at `path`, repairing out-of-order offsets.
///
/// Fails with [`Error::ArtifactNotFound`] when no artifact exists. A log
/// whose offsets are out of order is stably sorted and used anyway; that is
/// a data-quality anomaly, not an error.
pub fn load_artifact(path: &Path) -> Result<TimestampedLog> {
    if !path.exists() {
        return Err(Error::ArtifactNotFound {
            name: artifact_name(path),
        });
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut log = read_artifact(&mut reader)?;

    if log.ensure_sorted() {
        warn!(
            "artifact {} had out-of-order offsets, repaired by stable sort",
            path.display()
        );
    }

    info!("loaded {} records from {}", log.len(), path.display());
    Ok(log)
}

/// Persist `log` at `path`. Returns whether anything was written.
///
/// An empty log writes nothing and returns `false`. With `merge`, a prior
/// artifact at the same path is loaded and the new records are appended
/// after it (prior records first, order as stored).
pub fn save_artifact(path: &Path, log: &TimestampedLog, merge: bool) -> Result<bool> {
    if log.is_empty() {
        return Ok(false);
    }

    let merged;
    let to_write = if merge && path.exists() {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut prior = read_artifact(&mut reader)?;
        info!(
            "merging {} new records after {} prior ones in {}",
            log.len(),
            prior.len(),
            path.display()
        );
        for record in log.records() {
            prior.append(record.offset, record.payload.clone());
        }
        merged = prior;
        &merged
    } else {
        log
    };

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_artifact(&mut writer, to_write)?;

    info!(
        "saved {} records to {}",
        to_write.len(),
        path.display()
    );
    Ok(true)
}

fn artifact_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sample_log() -> TimestampedLog {
        let mut log = TimestampedLog::new();
        log.append(0.0, b"alpha".to_vec());
        log.append(0.5, b"beta".to_vec());
        log.append(1.25, vec![0u8; 128]);
        log
    }

    #[test]
    fn test_header_roundtrip() {
        let header = TdrHeader {
            version: 1,
            record_count: 42,
        };

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let mut cursor = Cursor::new(buf);
        let read_header = TdrHeader::read(&mut cursor).unwrap();
        assert_eq!(read_header.version, header.version);
        assert_eq!(read_header.record_count, header.record_count);
    }

    #[test]
    fn test_artifact_roundtrip() {
        let log = sample_log();

        let mut buf = Vec::new();
        write_artifact(&mut buf, &log).unwrap();

        let mut cursor = Cursor::new(buf);
        let restored = read_artifact(&mut cursor).unwrap();
        assert_eq!(restored, log);
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut buf = Vec::new();
        write_artifact(&mut buf, &sample_log()).unwrap();
        buf[0] = b'X';

        let mut cursor = Cursor::new(buf);
        match read_artifact(&mut cursor) {
            Err(Error::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_truncated_artifact_is_corrupt() {
        let mut buf = Vec::new();
        write_artifact(&mut buf, &sample_log()).unwrap();
        buf.truncate(buf.len() - 3);

        let mut cursor = Cursor::new(buf);
        match read_artifact(&mut cursor) {
            Err(Error::Corrupt(_)) => {}
            other => panic!("expected Corrupt, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_load_missing_artifact_is_not_found() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.tdr");
        match load_artifact(&path) {
            Err(Error::ArtifactNotFound { name }) => assert_eq!(name, "missing"),
            other => panic!("expected ArtifactNotFound, got {:?}", other.map(|l| l.len())),
        }
    }

    #[test]
    fn test_load_repairs_out_of_order_offsets() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("unsorted.tdr");

        let mut log = TimestampedLog::new();
        log.append(3.0, b"A".to_vec());
        log.append(1.0, b"B".to_vec());
        log.append(2.0, b"C".to_vec());
        assert!(save_artifact(&path, &log, false).unwrap());

        let loaded = load_artifact(&path).unwrap();
        let payloads: Vec<&[u8]> = loaded
            .records()
            .iter()
            .map(|r| r.payload.as_slice())
            .collect();
        assert_eq!(
            payloads,
            vec![b"B".as_slice(), b"C".as_slice(), b"A".as_slice()]
        );

        // Loading an already-sorted artifact is a no-op w.r.t. order.
        assert!(save_artifact(&path, &loaded, false).unwrap());
        let reloaded = load_artifact(&path).unwrap();
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn test_merge_append_preserves_write_order_on_ties() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("merged.tdr");

        let mut first = TimestampedLog::new();
        first.append(0.0, b"x".to_vec());
        assert!(save_artifact(&path, &first, false).unwrap());

        let mut second = TimestampedLog::new();
        second.append(0.0, b"y".to_vec());
        assert!(save_artifact(&path, &second, true).unwrap());

        let merged = load_artifact(&path).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.records()[0].payload, b"x");
        assert_eq!(merged.records()[1].payload, b"y");
    }

    #[test]
    fn test_save_without_merge_overwrites() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("overwrite.tdr");

        let mut first = TimestampedLog::new();
        first.append(0.0, b"old".to_vec());
        assert!(save_artifact(&path, &first, false).unwrap());

        let mut second = TimestampedLog::new();
        second.append(0.0, b"new".to_vec());
        assert!(save_artifact(&path, &second, false).unwrap());

        let loaded = load_artifact(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records()[0].payload, b"new");
    }

    #[test]
    fn test_empty_log_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.tdr");

        let log = TimestampedLog::new();
        assert!(!save_artifact(&path, &log, false).unwrap());
        assert!(!path.exists());
    }
}
