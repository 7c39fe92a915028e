use glob::{Pattern, glob};
use std::fs::File;
use std::io;
use std::io::{Cursor, Seek, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("{} does not exist", path.display())]
    Missing { path: PathBuf },
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot walk {}: {source}", path.display())]
    Walk { path: PathBuf, source: io::Error },
    #[error("{} is not valid UTF-8", path.display())]
    NonUtf8Path { path: PathBuf },
    #[error("invalid directory pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("zip: {0}")]
    Zip(#[from] ZipError),
}

/// How a configured single file is named inside the archive.
///
/// Directories are always stored under their base name followed by the path
/// relative to them. `BaseName` drops the parent path of single files, which
/// is what existing deployments expect (`docker/Dockerfile` lands at
/// `Dockerfile`, next to `Dockerrun.aws.json`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EntryNaming {
    #[default]
    BaseName,
    RelativePath,
}

/// Packs configured project paths into an in-memory zip archive.
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    root: PathBuf,
    naming: EntryNaming,
}

impl ArchiveBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            naming: EntryNaming::default(),
        }
    }

    pub fn entry_naming(mut self, naming: EntryNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Builds the archive. `progress` receives each archive path right before
    /// the file is written.
    pub fn build(
        &self,
        files: &[String],
        progress: Option<&mut dyn FnMut(&str)>,
    ) -> Result<Vec<u8>, PackagingError> {
        let mut writer = ArchiveWriter {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            progress,
        };

        for entry in files {
            let path = self.root.join(entry);
            let metadata = std::fs::symlink_metadata(&path).map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    PackagingError::Missing { path: path.clone() }
                } else {
                    PackagingError::Read {
                        path: path.clone(),
                        source,
                    }
                }
            })?;

            let name = match self.naming {
                EntryNaming::BaseName => base_name(&path)?,
                EntryNaming::RelativePath => relative_name(entry),
            };

            if metadata.is_dir() {
                writer.add_directory(&path, &name)?;
            } else {
                writer.add_file(&path, &name)?;
            }
        }

        Ok(writer.zip.finish()?.into_inner())
    }
}

struct ArchiveWriter<'p, W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
    progress: Option<&'p mut dyn FnMut(&str)>,
}

impl<W: Write + Seek> ArchiveWriter<'_, W> {
    fn add_directory(&mut self, directory: &Path, name: &str) -> Result<(), PackagingError> {
        let directory_str = directory
            .to_str()
            .ok_or_else(|| PackagingError::NonUtf8Path {
                path: directory.to_path_buf(),
            })?;
        let pattern = format!("{}/**/*", Pattern::escape(directory_str));

        for found in glob(&pattern)? {
            let path = found.map_err(|e| PackagingError::Walk {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if !path.is_file() {
                continue;
            }

            let relative = path
                .strip_prefix(directory)
                .map(relative_components)
                .unwrap_or_default();
            let archive_path = if name.is_empty() {
                relative
            } else {
                format!("{name}/{relative}")
            };

            self.add_file(&path, &archive_path)?;
        }

        Ok(())
    }

    fn add_file(&mut self, source: &Path, name: &str) -> Result<(), PackagingError> {
        if let Some(progress) = &mut self.progress {
            progress(name);
        }

        let read_error = |source_error| PackagingError::Read {
            path: source.to_path_buf(),
            source: source_error,
        };

        let mut file = File::open(source).map_err(read_error)?;
        self.zip.start_file(name, self.options)?;
        io::copy(&mut file, &mut self.zip).map_err(read_error)?;

        Ok(())
    }
}

fn base_name(path: &Path) -> Result<String, PackagingError> {
    let name = match path.file_name() {
        Some(name) => Some(name.to_os_string()),
        // `..` and friends have no file name until resolved.
        None => path
            .canonicalize()
            .map_err(|source| PackagingError::Read {
                path: path.to_path_buf(),
                source,
            })?
            .file_name()
            .map(|name| name.to_os_string()),
    };

    match name {
        Some(name) => name
            .into_string()
            .map_err(|_| PackagingError::NonUtf8Path {
                path: path.to_path_buf(),
            }),
        None => Ok(String::new()),
    }
}

fn relative_name(entry: &str) -> String {
    relative_components(Path::new(entry))
}

fn relative_components(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
