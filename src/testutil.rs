//! Fixture helpers shared by the unit tests.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// State 1: three accidents, one with both coordinates unreported.
/// State 6: three accidents, one with an unreported latitude.
pub const SAMPLE_2013: &str = "\
STATE,MONTH,LATITUDE,LONGITUD,FATALS
1,1,32.5,-86.2,1
1,1,99.9999,999.9999,2
1,2,33.1,-87.0,1
6,3,34.05,-118.25,1
6,3,36.7,-119.8,1
6,12,99.9999,-120.1,1
";

/// State 2 has a single accident with no usable coordinates.
pub const SAMPLE_2014: &str = "\
STATE,MONTH,LATITUDE,LONGITUD,FATALS
1,1,31.0,-85.5,1
1,4,30.7,-88.1,1
6,4,38.5,-121.5,2
56,4,41.1,-104.8,1
2,7,99.9999,999.9999,1
";

pub fn write_bz2(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut encoder = BzEncoder::new(file, Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
    path
}

pub fn write_plain(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Write the 2013 and 2014 fixtures as `accident_<year>.csv.bz2`.
pub fn write_sample_years(dir: &Path) {
    write_bz2(dir, "accident_2013.csv.bz2", SAMPLE_2013);
    write_bz2(dir, "accident_2014.csv.bz2", SAMPLE_2014);
}

pub fn init_test_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fars_explorer=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Shared in-memory sink for formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber scoped to this thread and return what it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new("debug"))
        .with_ansi(false)
        .with_writer(buffer.clone())
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (out, logs)
}
