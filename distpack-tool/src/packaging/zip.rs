use anyhow::{Context, Result};
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use tokio::io::AsyncWriteExt;
use tokio::runtime::{Builder, Runtime};
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::debug;

use super::{ArchiveJob, ArchiveStats, Archiver, entry_name};
use crate::sink;

/// Compression algorithm to use when creating the ZIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compressor {
    Deflate,
    Stored,
}

impl Compressor {
    pub fn from_flag(compress: bool) -> Self {
        if compress {
            Compressor::Deflate
        } else {
            Compressor::Stored
        }
    }

    fn compression(self) -> Compression {
        match self {
            Compressor::Deflate => Compression::Deflate,
            Compressor::Stored => Compression::Stored,
        }
    }
}

/// Built-in zip writer. Owns the tokio runtime its async I/O runs on, so
/// callers stay synchronous.
pub struct ZipArchiver {
    compressor: Compressor,
    runtime: Runtime,
}

impl ZipArchiver {
    pub fn new(compressor: Compressor) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building tokio runtime")?;
        Ok(Self {
            compressor,
            runtime,
        })
    }
}

impl Archiver for ZipArchiver {
    fn name(&self) -> &str {
        "zip"
    }

    fn archive(&self, job: &ArchiveJob) -> Result<ArchiveStats> {
        let part = sink::part_path(&job.output);
        match self
            .runtime
            .block_on(write_zip(&part, job, self.compressor))
        {
            Ok(stats) => {
                sink::commit(&part, &job.output)?;
                Ok(stats)
            }
            Err(e) => {
                sink::discard(&part);
                Err(e)
            }
        }
    }
}

async fn write_zip(
    path: &std::path::Path,
    job: &ArchiveJob,
    compressor: Compressor,
) -> Result<ArchiveStats> {
    let file = sink::create_file_writer(path).await?;
    let mut writer = ZipFileWriter::with_tokio(file);
    let mut stats = ArchiveStats::default();

    for source in &job.sources {
        for file_path in &source.files {
            let name = entry_name(&source.name, &source.path, file_path);
            debug!(entry = %name, "adding");

            let input = tokio::fs::File::open(file_path)
                .await
                .with_context(|| format!("opening {}", file_path.display()))?;

            let builder = ZipEntryBuilder::new(name.clone().into(), compressor.compression());
            let mut entry = writer
                .write_entry_stream(builder)
                .await
                .with_context(|| format!("starting entry {name}"))?;
            let copied = futures::io::copy(input.compat(), &mut entry)
                .await
                .with_context(|| format!("writing entry {name}"))?;
            entry
                .close()
                .await
                .with_context(|| format!("finishing entry {name}"))?;

            stats.files += 1;
            stats.bytes += copied;
        }
    }

    let mut file = writer
        .close()
        .await
        .context("finishing archive")?
        .into_inner();
    // tokio defers the last write to a blocking task; flush before the rename.
    file.flush().await.context("flushing archive")?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_utils::list_files;
    use crate::packaging::SourceFolder;
    use crate::testutil::TempTree;

    fn source(tree: &TempTree, name: &str) -> SourceFolder {
        let path = tree.path().join(name);
        SourceFolder {
            name: name.to_string(),
            files: list_files(tree.path(), &path, &[]).unwrap(),
            path,
        }
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_stored_archive_holds_prefixed_entries() {
        let tree = TempTree::new("zip-stored");
        tree.file("bin/FreeCAD.exe", "binary");
        tree.file("Mod/Draft/Init.py", "print('draft')");

        let job = ArchiveJob {
            label: "combined".into(),
            output: tree.path().join("out/all.zip"),
            sources: vec![source(&tree, "bin"), source(&tree, "Mod")],
        };

        let archiver = ZipArchiver::new(Compressor::Stored).unwrap();
        let stats = archiver.archive(&job).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.bytes, ("binary".len() + "print('draft')".len()) as u64);

        let bytes = std::fs::read(&job.output).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert!(contains(&bytes, "bin/FreeCAD.exe"));
        assert!(contains(&bytes, "Mod/Draft/Init.py"));
        assert!(contains(&bytes, "print('draft')"));
        assert!(!sink::part_path(&job.output).exists());
    }

    #[test]
    fn test_deflate_archive_is_written() {
        let tree = TempTree::new("zip-deflate");
        tree.file("doc/readme.txt", &"FreeCAD ".repeat(500));

        let job = ArchiveJob {
            label: "doc".into(),
            output: tree.path().join("doc.zip"),
            sources: vec![source(&tree, "doc")],
        };

        let archiver = ZipArchiver::new(Compressor::Deflate).unwrap();
        let stats = archiver.archive(&job).unwrap();
        assert_eq!(stats.bytes, 4000);

        let size = std::fs::metadata(&job.output).unwrap().len();
        assert!(size < 4000, "deflated archive should be smaller, got {size}");
    }

    #[test]
    fn test_empty_folder_produces_empty_archive() {
        let tree = TempTree::new("zip-empty");
        tree.dir("include");

        let job = ArchiveJob {
            label: "include".into(),
            output: tree.path().join("include.zip"),
            sources: vec![source(&tree, "include")],
        };

        let stats = ZipArchiver::new(Compressor::Stored)
            .unwrap()
            .archive(&job)
            .unwrap();
        assert_eq!(stats, ArchiveStats::default());
        assert!(job.output.exists());
    }

    #[test]
    fn test_failed_write_leaves_no_archive() {
        let tree = TempTree::new("zip-fail");
        tree.dir("lib");

        let job = ArchiveJob {
            label: "lib".into(),
            output: tree.path().join("lib.zip"),
            sources: vec![SourceFolder {
                name: "lib".into(),
                path: tree.path().join("lib"),
                files: vec![tree.path().join("lib/vanished.so")],
            }],
        };

        let err = ZipArchiver::new(Compressor::Stored)
            .unwrap()
            .archive(&job)
            .unwrap_err();
        assert!(err.to_string().contains("opening"));
        assert!(!job.output.exists());
        assert!(!sink::part_path(&job.output).exists());
    }
}
