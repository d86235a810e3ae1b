use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;

/// Where JSON documents are written.
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn stdout() -> Self {
        Output::Stdout(io::stdout().lock())
    }

    /// Creates (or truncates) the file at `path`, and its directory if missing.
    pub fn create(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let file = File::create(&path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    fn target(&self) -> String {
        match self {
            Output::Stdout(_) => "stdout".to_owned(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    /// Writes `value` as pretty JSON followed by a newline, then flushes.
    pub fn write_json<T>(mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize + ?Sized,
    {
        serde_json::to_writer_pretty(&mut self, value)
            .and_then(|()| writeln!(self).map_err(serde_json::Error::io))
            .with_context(|| format!("Failed to write JSON to {}", self.target()))?;
        self.flush()
            .with_context(|| format!("Failed to flush {}", self.target()))
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(writer) => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(writer) => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

/// Reads a JSON document; `kind` names the file in error messages.
pub fn read_json_file<T>(kind: &str, path: &Path) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let file = File::open(path)
        .with_context(|| format!("Failed to open {kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {kind} file: {}", path.display()))
}

/// Turns a key into a path under `dir` with extension `ext`.
///
/// Keys that already carry the directory prefix or the extension keep them,
/// so `0`, `levels/0` and `levels/0.json` all name the same file.
pub fn keyed_path(root: &Path, dir: &str, key: &str, ext: &str) -> PathBuf {
    let key = key.strip_prefix(&format!("{dir}/")).unwrap_or(key);
    let key = key.strip_suffix(&format!(".{ext}")).unwrap_or(key);
    root.join(dir).join(format!("{key}.{ext}"))
}
