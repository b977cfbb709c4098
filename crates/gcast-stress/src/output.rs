use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// JSONL file sink. Set once in main(), read by `events::emit`.
static JSONL: OnceLock<Mutex<BufWriter<File>>> = OnceLock::new();

/// Open `<dir>/<name>_<mode>_<YYYYMMDD-HHMMSS>.jsonl` for appending and make
/// it the process-wide sink.
pub fn open_jsonl(dir: &Path, name: &str, mode: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("{name}_{mode}_{timestamp}.jsonl"));

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    JSONL
        .set(Mutex::new(BufWriter::new(file)))
        .map_err(|_| io::Error::new(io::ErrorKind::AlreadyExists, "JSONL sink already set"))?;
    Ok(path)
}

/// Append one line to the sink, if one is open.
pub fn write_line(line: &str) {
    if let Some(sink) = JSONL.get() {
        if let Ok(mut w) = sink.lock() {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }
}
