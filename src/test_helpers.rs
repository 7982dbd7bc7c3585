//! Serving directory fixtures shared by the unit tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::SystemTime;

use filetime::FileTime;
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use crate::config::{RenderConfig, RenderConfigBuilder};
use crate::context::RunContext;
use crate::document::html_name;
use crate::queue::{JobSender, RenderJob, work_queue};
use crate::templates::{CONTENT_BEGIN, CONTENT_END};

pub(crate) struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Fixture {
            dir: TempDir::new().unwrap(),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a gzipped manpage source and set its modification time.
    pub(crate) fn manpage(
        &self,
        suite: &str,
        package: &str,
        file: &str,
        mtime: SystemTime,
    ) -> PathBuf {
        let dir = self.root().join(suite).join(package);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file);
        let name = file.split('.').next().unwrap_or(file).to_uppercase();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        writeln!(encoder, ".TH {name} 1\n.SH NAME\n{name} \\- test page").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
        path
    }

    /// Create a relative symlink `file -> target` and set the link's own
    /// modification time.
    #[cfg(unix)]
    pub(crate) fn symlink(
        &self,
        suite: &str,
        package: &str,
        file: &str,
        target: &str,
        mtime: SystemTime,
    ) -> PathBuf {
        let dir = self.root().join(suite).join(package);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file);
        std::os::unix::fs::symlink(target, &path).unwrap();
        let time = FileTime::from_system_time(mtime);
        filetime::set_symlink_file_times(&path, time, time).unwrap();
        path
    }

    /// Write a rendered page next to `source` and set its modification time.
    pub(crate) fn output(&self, source: &Path, mtime: SystemTime) -> PathBuf {
        let file_name = source.file_name().unwrap().to_str().unwrap();
        let path = source.with_file_name(html_name(file_name));
        let page = format!("<html>{CONTENT_BEGIN}<p>previous</p>{CONTENT_END}</html>");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(page.as_bytes()).unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
        path
    }

    fn config(&self) -> RenderConfigBuilder {
        RenderConfig::builder()
            .serving_dir(self.root())
            .walk_concurrency(4)
            .render_concurrency(1)
            .gzip_level(1)
            .base_url("https://manpages.example.org")
    }

    pub(crate) fn context(&self) -> RunContext {
        self.context_with(|config| config)
    }

    pub(crate) fn context_with(
        &self,
        f: impl FnOnce(RenderConfigBuilder) -> RenderConfigBuilder,
    ) -> RunContext {
        RunContext::prepare(f(self.config()).build().unwrap()).unwrap()
    }
}

/// Run `f` with a sender whose jobs are collected by a consumer thread.
pub(crate) fn collect_jobs(ctx: &RunContext, f: impl FnOnce(&JobSender)) -> Vec<RenderJob> {
    let (tx, rx) = work_queue(ctx.cancel_token());
    thread::scope(|scope| {
        let consumer = scope.spawn(move || {
            let mut jobs = Vec::new();
            while let Some(job) = rx.recv() {
                jobs.push(job);
            }
            jobs
        });
        f(&tx);
        drop(tx);
        consumer.join().unwrap()
    })
}
