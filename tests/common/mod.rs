#![allow(dead_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use filetime::FileTime;
use flate2::Compression;
use flate2::write::GzEncoder;
use manrender::config::{RenderConfig, RenderConfigBuilder};
use manrender::context::RunContext;
use manrender::convert::{ConvertError, Converter};
use walkdir::WalkDir;

pub fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 3600)
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
}

/// A serving directory in a temporary location.
pub struct ServingTree {
    dir: TempDir,
}

impl ServingTree {
    pub fn new() -> Self {
        ServingTree {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn child(&self, relative: &str) -> ChildPath {
        self.dir.child(relative)
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.child(relative).path().to_path_buf()
    }

    /// Write a compressed manpage at `relative` with an mtime of `mtime`.
    pub fn manpage(&self, relative: &str, roff: &str, mtime: SystemTime) -> PathBuf {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(roff.as_bytes()).unwrap();
        let child = self.dir.child(relative);
        std::fs::create_dir_all(child.path().parent().unwrap()).unwrap();
        child.write_binary(&encoder.finish().unwrap()).unwrap();
        set_mtime(child.path(), mtime);
        child.path().to_path_buf()
    }

    #[cfg(unix)]
    pub fn symlink(&self, relative: &str, target: &str, mtime: SystemTime) -> PathBuf {
        let child = self.dir.child(relative);
        std::fs::create_dir_all(child.path().parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, child.path()).unwrap();
        let time = FileTime::from_system_time(mtime);
        filetime::set_symlink_file_times(child.path(), time, time).unwrap();
        child.path().to_path_buf()
    }

    /// A fresh run over this tree.
    pub fn context(&self) -> RunContext {
        self.context_with(|config| config)
    }

    pub fn context_with(
        &self,
        f: impl FnOnce(RenderConfigBuilder) -> RenderConfigBuilder,
    ) -> RunContext {
        let config = RenderConfig::builder()
            .serving_dir(self.root())
            .walk_concurrency(4)
            .render_concurrency(1)
            .gzip_level(6)
            .base_url("https://manpages.example.org");
        RunContext::prepare(f(config).build().unwrap()).unwrap()
    }

    /// Relative paths of all files below the root whose name ends in `suffix`.
    pub fn files_ending_with(&self, suffix: &str) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(self.root())
            .into_iter()
            .map(|entry| entry.unwrap())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(suffix))
            .map(|entry| {
                entry
                    .path()
                    .strip_prefix(self.root())
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        files.sort();
        files
    }

    /// Rendered manpage pages, without package indexes.
    pub fn pages(&self) -> Vec<String> {
        self.files_ending_with(".html.gz")
            .into_iter()
            .filter(|path| !path.ends_with("index.html.gz") && !path.starts_with("contents-"))
            .collect()
    }

    pub fn read_gz(&self, relative: &str) -> String {
        let mut plain = String::new();
        let file = std::fs::File::open(self.path(relative)).unwrap();
        io::Read::read_to_string(&mut flate2::read::GzDecoder::new(file), &mut plain).unwrap();
        plain
    }
}

/// Converter double shared by all workers of a run.
#[derive(Clone, Default)]
pub struct FakeConverters {
    calls: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl FakeConverters {
    /// Every call after the first `n` fails like a crashed converter.
    pub fn failing_after(n: usize) -> Self {
        FakeConverters {
            calls: Arc::default(),
            fail_after: Some(n),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> impl Fn() -> Result<FakeConverter, ConvertError> + Sync + use<> {
        let converters = self.clone();
        move || {
            Ok(FakeConverter {
                calls: Arc::clone(&converters.calls),
                fail_after: converters.fail_after,
            })
        }
    }
}

pub struct FakeConverter {
    calls: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl Converter for FakeConverter {
    fn convert(&mut self, source: &[u8]) -> Result<String, ConvertError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after.is_some_and(|limit| n > limit) {
            return Err(ConvertError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "converter died",
            )));
        }
        let text = String::from_utf8_lossy(source);
        if text.contains(".BROKEN") {
            return Err(ConvertError::Rejected("unknown macro .BROKEN".to_string()));
        }
        Ok(format!("<pre>{}</pre>", text.lines().next().unwrap_or_default()))
    }
}
