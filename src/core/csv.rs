//! Periodic CSV output of per-tag totals.
//!
//! Stats are accumulated in a bounded column table during frame updates and
//! written as one row of megabyte values every write interval. The first line
//! of the file is a reserved block of spaces; whenever new columns appear the
//! writer seeks back and rewrites the titles in place, so earlier rows never
//! need rewriting.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::api::names::NameTable;
use crate::api::stats::{STAT_TRACKED_TOTAL, STAT_UNTAGGED};
use crate::api::tag::{Tag, TagKind};
use crate::diagnostics::{self, LLM310};
use crate::llm_fatal;
use crate::sync::mutex::Mutex;
use crate::util::size::to_mb;

/// Header bytes reserved per column.
const HEADER_BYTES_PER_COLUMN: usize = 32;

/// A CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvColumn {
    /// Accumulated bytes for a tag.
    Tag(Tag),
    /// Accumulated untagged bytes.
    Untagged,
    /// The tracker's tracked total.
    TrackedTotal,
    /// Available physical memory at the last update.
    AvailablePhysical,
}

impl CsvColumn {
    /// Column title.
    pub fn title(&self, names: &dyn NameTable) -> String {
        match *self {
            CsvColumn::Tag(tag) => match tag.kind() {
                TagKind::Untagged => STAT_UNTAGGED.to_string(),
                TagKind::Builtin(builtin) => builtin.csv_name().to_string(),
                TagKind::User(raw) => format!("User {}", raw),
                TagKind::Name(id) => names.resolve(id).unwrap_or_else(|| tag.to_string()),
            },
            CsvColumn::Untagged => STAT_UNTAGGED.to_string(),
            CsvColumn::TrackedTotal => STAT_TRACKED_TOTAL.to_string(),
            CsvColumn::AvailablePhysical => "AVAILABLE_PHYSICAL".to_string(),
        }
    }
}

struct Columns {
    values: Box<[(CsvColumn, i64)]>,
    len: usize,
}

impl Columns {
    fn slot(&mut self, column: CsvColumn) -> &mut i64 {
        let len = self.len;
        if let Some(i) = self.values[..len].iter().position(|(c, _)| *c == column) {
            return &mut self.values[i].1;
        }
        if len == self.values.len() {
            llm_fatal!(LLM204, "limit={} adding {:?}", len, column);
        }
        self.values[len] = (column, 0);
        self.len += 1;
        &mut self.values[len].1
    }
}

struct Output {
    file: Option<File>,
    last_write: Instant,
    written_columns: usize,
    snapshot: Vec<(CsvColumn, i64)>,
}

/// Per-tracker CSV writer.
pub struct CsvWriter {
    path: PathBuf,
    interval: Duration,
    header_reserve: usize,
    enabled: AtomicBool,
    columns: Mutex<Columns>,
    output: Mutex<Output>,
}

impl CsvWriter {
    /// Create a disabled writer targeting `<directory>/<file_stem>.csv`.
    pub fn new(directory: &Path, file_stem: &str, interval: Duration, max_columns: usize) -> Self {
        Self {
            path: directory.join(format!("{}.csv", file_stem)),
            interval,
            header_reserve: max_columns * HEADER_BYTES_PER_COLUMN,
            enabled: AtomicBool::new(false),
            columns: Mutex::new(Columns {
                values: vec![(CsvColumn::Untagged, 0); max_columns].into_boxed_slice(),
                len: 0,
            }),
            output: Mutex::new(Output {
                file: None,
                last_write: Instant::now(),
                written_columns: 0,
                snapshot: Vec::with_capacity(max_columns),
            }),
        }
    }

    /// Output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether stats are being collected and written.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turn collection and output on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Add to a column. Fatal (LLM204) when the column table is full.
    pub fn add_stat(&self, column: CsvColumn, delta: i64) {
        if self.is_enabled() {
            *self.columns.lock().slot(column) += delta;
        }
    }

    /// Set a column.
    pub fn set_stat(&self, column: CsvColumn, value: i64) {
        if self.is_enabled() {
            *self.columns.lock().slot(column) = value;
        }
    }

    /// Current value of a column.
    pub fn stat(&self, column: CsvColumn) -> Option<i64> {
        let columns = self.columns.lock();
        columns.values[..columns.len]
            .iter()
            .find(|(c, _)| *c == column)
            .map(|&(_, v)| v)
    }

    /// Write a row if the interval has elapsed. Returns whether a row was written.
    pub fn update(&self, names: &dyn NameTable) -> bool {
        if !self.is_enabled() {
            return false;
        }
        {
            let output = self.output.lock();
            if output.file.is_some() && output.last_write.elapsed() < self.interval {
                return false;
            }
        }
        self.flush(names)
    }

    /// Write a row now. Returns whether a row was written.
    ///
    /// An I/O error emits LLM310 and disables the writer.
    pub fn flush(&self, names: &dyn NameTable) -> bool {
        if !self.is_enabled() {
            return false;
        }
        match self.write_row(names) {
            Ok(()) => true,
            Err(err) => {
                let context = format!("{}: {}", self.path.display(), err);
                diagnostics::emit_with_context(&LLM310, &context);
                self.set_enabled(false);
                false
            }
        }
    }

    fn write_row(&self, names: &dyn NameTable) -> io::Result<()> {
        let mut guard = self.output.lock();
        let output = &mut *guard;

        output.snapshot.clear();
        {
            let columns = self.columns.lock();
            output.snapshot.extend_from_slice(&columns.values[..columns.len]);
        }

        if output.file.is_none() {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir)?;
            }
            let mut file = File::create(&self.path)?;
            file.write_all(" ".repeat(self.header_reserve).as_bytes())?;
            file.write_all(b"\n")?;
            output.file = Some(file);
            output.written_columns = 0;
        }
        let Some(file) = output.file.as_mut() else {
            return Ok(());
        };

        if output.snapshot.len() != output.written_columns {
            let mut header = String::new();
            for (column, _) in &output.snapshot {
                let _ = write!(header, "{},", column.title(names));
            }
            if header.len() > self.header_reserve {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!(
                        "column titles need {} bytes, {} reserved",
                        header.len(),
                        self.header_reserve
                    ),
                ));
            }
            let offset = file.stream_position()?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(header.as_bytes())?;
            file.seek(SeekFrom::Start(offset))?;
            output.written_columns = output.snapshot.len();
        }

        let mut row = String::with_capacity(output.snapshot.len() * 8 + 1);
        for &(_, value) in &output.snapshot {
            let _ = write!(row, "{:.2},", to_mb(value));
        }
        row.push('\n');
        file.write_all(row.as_bytes())?;
        file.flush()?;

        output.last_write = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::names::StdNameTable;
    use crate::api::tag::BuiltinTag;
    use crate::util::size::mb;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("llmtrack-csv-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_columns_accumulate() {
        let writer = CsvWriter::new(Path::new("."), "LLM", Duration::ZERO, 4);
        writer.add_stat(CsvColumn::Untagged, 10);
        assert_eq!(writer.stat(CsvColumn::Untagged), None, "disabled writers collect nothing");

        writer.set_enabled(true);
        writer.add_stat(CsvColumn::Untagged, 10);
        writer.add_stat(CsvColumn::Untagged, 5);
        writer.set_stat(CsvColumn::TrackedTotal, 99);
        writer.set_stat(CsvColumn::TrackedTotal, 100);
        assert_eq!(writer.stat(CsvColumn::Untagged), Some(15));
        assert_eq!(writer.stat(CsvColumn::TrackedTotal), Some(100));
    }

    #[test]
    #[should_panic(expected = "LLM204")]
    fn test_column_limit_is_fatal() {
        let writer = CsvWriter::new(Path::new("."), "LLM", Duration::ZERO, 2);
        writer.set_enabled(true);
        for raw in 1..=3 {
            writer.add_stat(CsvColumn::Tag(Tag::from_raw(raw)), 1);
        }
    }

    #[test]
    fn test_rows_and_header_rewrite() {
        let dir = temp_dir("rows");
        let names = StdNameTable::new();
        let writer = CsvWriter::new(&dir, "LLMPlatform", Duration::ZERO, 8);
        writer.set_enabled(true);

        writer.add_stat(CsvColumn::Tag(BuiltinTag::Malloc.into()), mb(2) as i64);
        assert!(writer.flush(&names));
        writer.add_stat(CsvColumn::Tag(names.tag("Textures")), mb(1) as i64);
        assert!(writer.flush(&names));

        let text = fs::read_to_string(dir.join("LLMPlatform.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].trim_end(), "Malloc,Textures,");
        assert_eq!(lines[0].len(), 8 * HEADER_BYTES_PER_COLUMN);
        assert_eq!(lines[1], "2.00,");
        assert_eq!(lines[2], "2.00,1.00,");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_interval_gates_rows() {
        let dir = temp_dir("interval");
        let names = StdNameTable::new();
        let writer = CsvWriter::new(&dir, "LLM", Duration::from_secs(3600), 4);
        writer.set_enabled(true);
        writer.set_stat(CsvColumn::TrackedTotal, 0);

        assert!(writer.update(&names), "first update creates the file");
        assert!(!writer.update(&names));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_io_error_disables_writer() {
        let dir = temp_dir("blocked");
        fs::create_dir_all(dir.parent().unwrap()).unwrap();
        // A file where the directory should be.
        fs::write(&dir, b"not a directory").unwrap();

        let names = StdNameTable::new();
        let writer = CsvWriter::new(&dir, "LLM", Duration::ZERO, 4);
        writer.set_enabled(true);
        writer.set_stat(CsvColumn::TrackedTotal, 1);

        diagnostics::suppress_diagnostics(true);
        assert!(!writer.flush(&names));
        diagnostics::suppress_diagnostics(false);
        assert!(!writer.is_enabled());

        let _ = fs::remove_file(&dir);
    }
}
