//! Render workers.
//!
//! Each worker owns one [`Converter`] and one [`PageEncoder`] for its whole
//! lifetime and processes jobs from the shared queue until the queue is
//! closed or the run is cancelled. The first conversion or filesystem
//! failure ends the worker with an error; the converter is terminated on
//! every exit path.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, trace, warn};

use crate::atomic::write_atomically;
use crate::context::RunContext;
use crate::convert::{ConvertError, Converter};
use crate::document::{Document, HTML_SUFFIX, SOURCE_SUFFIX};
use crate::error::{RenderError, Result};
use crate::queue::{JobReceiver, RenderJob};
use crate::templates::{self, Content};

/// Gzip encoder state reused across the pages of one worker.
#[derive(Debug)]
pub struct PageEncoder {
    level: Compression,
    buf: Vec<u8>,
}

impl PageEncoder {
    pub fn new(level: Compression) -> Self {
        PageEncoder {
            level,
            buf: Vec::new(),
        }
    }

    /// Compress `page`; the returned slice is valid until the next call.
    pub fn compress(&mut self, page: &[u8]) -> io::Result<&[u8]> {
        let mut buf = mem::take(&mut self.buf);
        buf.clear();
        let mut encoder = GzEncoder::new(buf, self.level);
        encoder.write_all(page)?;
        self.buf = encoder.finish()?;
        Ok(&self.buf)
    }
}

/// Consume jobs until the queue is exhausted or the run is cancelled.
pub fn render_worker<C: Converter>(
    ctx: &RunContext,
    jobs: &JobReceiver,
    mut converter: C,
) -> Result<()> {
    let mut encoder = PageEncoder::new(ctx.config().compression());
    let mut result = Ok(());
    while let Some(job) = jobs.recv() {
        if let Err(err) = render_job(ctx, &mut converter, &mut encoder, &job) {
            result = Err(err);
            break;
        }
    }
    converter.terminate();
    result
}

/// Render one page and account for it.
pub fn render_job<C: Converter + ?Sized>(
    ctx: &RunContext,
    converter: &mut C,
    encoder: &mut PageEncoder,
    job: &RenderJob,
) -> Result<()> {
    let reused = job.reuse.as_deref().and_then(reusable_fragment);
    let converted;
    let content = match &reused {
        Some(fragment) => {
            trace!("reusing content for {}", job.dest.display());
            Content::Fragment(fragment)
        }
        None => {
            let source = read_source(&job.src)?;
            converted = match converter.convert(&source) {
                Ok(fragment) => Ok(fragment),
                Err(ConvertError::Rejected(message)) => {
                    warn!("cannot convert {}: {message}", job.src.display());
                    Err(message)
                }
                Err(source) => {
                    return Err(RenderError::ConvertError {
                        path: job.src.clone(),
                        source,
                    });
                }
            };
            match &converted {
                Ok(fragment) => Content::Fragment(fragment),
                Err(message) => Content::Failed(message),
            }
        }
    };

    let registry = ctx.registry();
    let versions: Vec<&Document> = job.versions.iter().map(|&id| registry.get(id)).collect();
    let page = templates::manpage_page(ctx.config().base_url(), &job.document, &versions, content);

    let compressed = encoder
        .compress(page.as_bytes())
        .map_err(|source| RenderError::io(&job.dest, source))?;
    let written = write_atomically(&job.dest, None, |w| w.write_all(compressed))?;
    let shared = job.versions.len() > 1;
    ctx.stats().record_render(&job.dest, written, shared);
    debug!("rendered {}", job.dest.display());
    Ok(())
}

/// Uncompressed contents of a manpage source.
pub fn read_source(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|source| RenderError::io(path, source))?;
    let mut source = Vec::new();
    GzDecoder::new(BufReader::new(file))
        .read_to_end(&mut source)
        .map_err(|err| RenderError::io(path, err))?;
    Ok(source)
}

/// The converted fragment of a previously rendered page, if that page is
/// readable, carries content markers and is not older than its own source.
fn reusable_fragment(page_path: &Path) -> Option<String> {
    let page_mtime = fs::metadata(page_path).and_then(|m| m.modified()).ok()?;
    let source_mtime = source_of(page_path)
        .and_then(|src| fs::metadata(src).and_then(|m| m.modified()).ok())?;
    if page_mtime < source_mtime {
        debug!("not reusing outdated {}", page_path.display());
        return None;
    }

    let mut page = String::new();
    let file = File::open(page_path).ok()?;
    if let Err(err) = GzDecoder::new(BufReader::new(file)).read_to_string(&mut page) {
        debug!("not reusing {}: {err}", page_path.display());
        return None;
    }
    templates::extract_fragment(&page).map(str::to_string)
}

/// `x.1.html.gz` -> `x.1.gz`
fn source_of(page_path: &Path) -> Option<PathBuf> {
    let name = page_path.file_name()?.to_str()?;
    let stem = name.strip_suffix(HTML_SUFFIX)?;
    Some(page_path.with_file_name(format!("{stem}{SOURCE_SUFFIX}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::queue::work_queue;
    use crate::test_helpers::Fixture;

    /// Converter that echoes the first line of the source.
    #[derive(Default)]
    struct EchoConverter {
        calls: usize,
        fail_with: Option<fn() -> ConvertError>,
    }

    impl Converter for EchoConverter {
        fn convert(&mut self, source: &[u8]) -> std::result::Result<String, ConvertError> {
            self.calls += 1;
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            let text = String::from_utf8_lossy(source);
            Ok(format!("<pre>{}</pre>", text.lines().next().unwrap_or_default()))
        }
    }

    fn read_page(path: &Path) -> String {
        let mut page = String::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut page)
            .unwrap();
        page
    }

    fn job_for(
        fixture: &Fixture,
        ctx: &RunContext,
        src: &Path,
        reuse: Option<PathBuf>,
    ) -> RenderJob {
        let relative = src.strip_prefix(fixture.root()).unwrap().to_str().unwrap();
        let serving_path = relative.strip_suffix(SOURCE_SUFFIX).unwrap();
        let id = ctx.registry().lookup(serving_path).unwrap();
        let document = ctx.registry().get(id).clone();
        RenderJob {
            dest: fixture.root().join(document.html_path()),
            src: src.to_path_buf(),
            versions: ctx.registry().variants(&document.name),
            document,
            modified: fs::metadata(src).unwrap().modified().unwrap(),
            reuse,
        }
    }

    #[test]
    fn test_page_encoder_reuses_buffer() {
        let mut encoder = PageEncoder::new(Compression::fast());
        let first = encoder.compress(b"first page").unwrap().to_vec();
        let second = encoder.compress(b"second page").unwrap().to_vec();

        let mut plain = String::new();
        GzDecoder::new(&first[..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, "first page");
        plain.clear();
        GzDecoder::new(&second[..]).read_to_string(&mut plain).unwrap();
        assert_eq!(plain, "second page");
    }

    #[test]
    fn test_render_job_converts_and_accounts() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let ctx = fixture.context();
        let job = job_for(&fixture, &ctx, &src, None);

        let mut converter = EchoConverter::default();
        let mut encoder = PageEncoder::new(Compression::fast());
        render_job(&ctx, &mut converter, &mut encoder, &job).unwrap();

        assert_eq!(converter.calls, 1);
        let page = read_page(&job.dest);
        assert_eq!(templates::extract_fragment(&page), Some("<pre>.TH BASH 1</pre>"));
        let stats = ctx.stats().snapshot();
        assert_eq!(stats.rendered, 1);
        assert_eq!(stats.html_bytes, fs::metadata(&job.dest).unwrap().len());
    }

    #[test]
    fn test_reuse_skips_converter() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let html = fixture.output(&src, hour_ago + Duration::from_secs(1));
        let ctx = fixture.context();
        let job = job_for(&fixture, &ctx, &src, Some(html.clone()));

        let mut converter = EchoConverter::default();
        let mut encoder = PageEncoder::new(Compression::fast());
        render_job(&ctx, &mut converter, &mut encoder, &job).unwrap();

        assert_eq!(converter.calls, 0);
        assert_eq!(templates::extract_fragment(&read_page(&html)), Some("<p>previous</p>"));
    }

    #[test]
    fn test_outdated_or_missing_reuse_falls_back_to_conversion() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let html = fixture.output(&src, hour_ago - Duration::from_secs(1));
        let ctx = fixture.context();
        let mut converter = EchoConverter::default();
        let mut encoder = PageEncoder::new(Compression::fast());

        let job = job_for(&fixture, &ctx, &src, Some(html));
        render_job(&ctx, &mut converter, &mut encoder, &job).unwrap();
        assert_eq!(converter.calls, 1);

        let missing = fixture.root().join("stable/bash/missing.1.html.gz");
        let job = job_for(&fixture, &ctx, &src, Some(missing));
        render_job(&ctx, &mut converter, &mut encoder, &job).unwrap();
        assert_eq!(converter.calls, 2);
    }

    #[test]
    fn test_rejected_document_gets_error_page() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let ctx = fixture.context();
        let job = job_for(&fixture, &ctx, &src, None);

        let mut converter = EchoConverter {
            fail_with: Some(|| ConvertError::Rejected("unknown macro".to_string())),
            ..Default::default()
        };
        let mut encoder = PageEncoder::new(Compression::fast());
        render_job(&ctx, &mut converter, &mut encoder, &job).unwrap();

        let page = read_page(&job.dest);
        assert!(page.contains("unknown macro"));
        assert_eq!(templates::extract_fragment(&page), None);
    }

    #[test]
    fn test_converter_failure_is_fatal() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let ctx = fixture.context();
        let job = job_for(&fixture, &ctx, &src, None);

        let mut converter = EchoConverter {
            fail_with: Some(|| ConvertError::Protocol("garbage".to_string())),
            ..Default::default()
        };
        let mut encoder = PageEncoder::new(Compression::fast());
        let result = render_job(&ctx, &mut converter, &mut encoder, &job);

        assert!(matches!(result, Err(RenderError::ConvertError { .. })));
        assert!(!job.dest.exists());
    }

    #[test]
    fn test_worker_terminates_converter_on_error() {
        let fixture = Fixture::new();
        let hour_ago = SystemTime::now() - Duration::from_secs(3600);
        let src = fixture.manpage("stable", "bash", "bash.1.gz", hour_ago);
        let ctx = fixture.context();
        let job = job_for(&fixture, &ctx, &src, None);

        struct Tracked<'a>(&'a mut bool);
        impl Converter for Tracked<'_> {
            fn convert(&mut self, _: &[u8]) -> std::result::Result<String, ConvertError> {
                Err(ConvertError::Io(io::Error::other("broken pipe")))
            }
            fn terminate(&mut self) {
                *self.0 = true;
            }
        }

        let (tx, rx) = work_queue(ctx.cancel_token());
        let mut terminated = false;
        let flag = &mut terminated;
        std::thread::scope(|scope| {
            let rx = Arc::clone(&rx);
            let ctx = &ctx;
            let worker = scope.spawn(move || render_worker(ctx, &rx, Tracked(flag)));
            tx.send(job).unwrap();
            drop(tx);
            assert!(worker.join().unwrap().is_err());
        });
        assert!(terminated);
    }
}
