/// File organization: moving top-level files into their category directories.
///
/// A batch runs in fixed phases. Every category directory is created first,
/// then the root is listed (one level, subdirectories skipped), then each file
/// is relocated on a bounded pool of worker threads. A file that cannot be
/// moved is recorded as a failure and stays where it was; it never stops the
/// rest of the batch.
use crate::category::{Category, extension_of};
use crate::config::Configuration;
use crate::resolver;
use rayon::ThreadPoolBuilder;
use serde_json::{Value, json};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Upper bound on relocations running at the same time.
pub const MAX_CONCURRENT_MOVES: usize = 5;

/// Errors that abort a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// Failed to create a category directory. Raised before any file moves.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Failed to list the root directory. Raised before any file moves.
    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for batch-level operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// Why a single file could not be moved.
#[derive(Debug, thiserror::Error)]
pub enum RelocateError {
    #[error("could not check destinations in {}: {source}", .dir.display())]
    Resolve {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not move to {}: {source}", .destination.display())]
    Rename {
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file that was left in place, with the reason.
#[derive(Debug, thiserror::Error)]
#[error("failed to move file {file_name}: {cause}")]
pub struct MoveFailure {
    pub file_name: String,
    #[source]
    pub cause: RelocateError,
}

/// One file to relocate, captured while listing the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    source: PathBuf,
    file_name: OsString,
    extension: String,
}

impl FileTask {
    /// Builds a task for the file at `source`.
    ///
    /// Returns `None` for paths without a final name component (e.g. `/` or `..`).
    pub fn new(source: impl Into<PathBuf>) -> Option<Self> {
        let source = source.into();
        let file_name = source.file_name()?.to_os_string();
        let extension = extension_of(&file_name.to_string_lossy()).to_string();
        Some(Self {
            source,
            file_name,
            extension,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn file_name(&self) -> &OsStr {
        &self.file_name
    }

    /// Everything from the last `.` of the file name, as written on disk.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn display_name(&self) -> Cow<'_, str> {
        self.file_name.to_string_lossy()
    }

    fn fail(&self, cause: RelocateError) -> MoveFailure {
        MoveFailure {
            file_name: self.display_name().into_owned(),
            cause,
        }
    }
}

/// A completed (or, in a dry run, planned) move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub category: Category,
}

/// Outcome of relocating one file.
pub type MoveResult = Result<Relocation, MoveFailure>;

/// The top-level entries of the root, sorted into work and non-work.
#[derive(Debug, Default)]
pub struct Scan {
    /// Files to relocate, in listing order.
    pub tasks: Vec<FileTask>,
    /// Files matched by an exclusion rule.
    pub excluded: usize,
    /// Subdirectories, which are never moved or entered.
    pub directories: usize,
}

/// Everything a batch did.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub dry_run: bool,
    pub moved: Vec<Relocation>,
    pub failures: Vec<MoveFailure>,
    pub excluded: usize,
    pub skipped_directories: usize,
}

impl BatchReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// True when every file was moved (or, for a dry run, could be placed).
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of moved files per category.
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for relocation in &self.moved {
            *counts.entry(relocation.category).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> Value {
        json!({
            "dry_run": self.dry_run,
            "moved": self.moved.iter().map(|r| {
                json!({
                    "source": r.source.to_string_lossy(),
                    "destination": r.destination.to_string_lossy(),
                    "category": r.category.name(),
                })
            }).collect::<Vec<_>>(),
            "failures": self.failures.iter().map(|f| {
                json!({
                    "file": f.file_name,
                    "error": f.cause.to_string(),
                })
            }).collect::<Vec<_>>(),
            "failure_count": self.failure_count(),
            "excluded": self.excluded,
            "skipped_directories": self.skipped_directories,
        })
    }
}

/// Runs batches against one configuration.
///
/// Resolving a destination and renaming into it happen under a lock held per
/// destination directory, so two workers never claim the same free name.
pub struct Organizer<'a> {
    config: &'a Configuration,
    dir_locks: HashMap<PathBuf, Mutex<()>>,
}

impl<'a> Organizer<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        let dir_locks = config
            .registry()
            .directories()
            .map(|(_, dir)| (dir.to_path_buf(), Mutex::new(())))
            .collect();
        Self { config, dir_locks }
    }

    pub fn config(&self) -> &Configuration {
        self.config
    }

    /// Runs a complete batch: set-up, listing, relocation and reporting.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dlsort::config::Configuration;
    /// use dlsort::file_organizer::Organizer;
    ///
    /// let config = Configuration::new("/home/me/Downloads");
    /// let report = Organizer::new(&config).organize()?;
    /// println!("moved {}, failed {}", report.moved.len(), report.failure_count());
    /// # Ok::<(), dlsort::file_organizer::OrganizeError>(())
    /// ```
    pub fn organize(&self) -> OrganizeResult<BatchReport> {
        self.organize_with(|task| self.relocate(task))
    }

    /// Runs a complete batch with a caller-supplied relocation step.
    pub fn organize_with<F>(&self, relocate: F) -> OrganizeResult<BatchReport>
    where
        F: Fn(&FileTask) -> MoveResult + Sync,
    {
        self.prepare_directories()?;
        let scan = self.scan()?;
        self.run_batch(scan, relocate)
    }

    /// Creates every category directory, including missing parents.
    pub fn prepare_directories(&self) -> OrganizeResult<()> {
        for (category, dir) in self.config.registry().directories() {
            fs::create_dir_all(dir).map_err(|source| OrganizeError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source,
            })?;
            tracing::trace!(%category, dir = %dir.display(), "category directory ready");
        }
        Ok(())
    }

    /// Lists the root one level deep.
    ///
    /// Any error while listing, including on a single entry, fails the scan.
    /// Configuration files in the root are left in place and counted as
    /// excluded.
    pub fn scan(&self) -> OrganizeResult<Scan> {
        let root = self.config.root();
        let canonical_root = fs::canonicalize(root).ok();
        let mut scan = Scan::default();
        for entry in fs::read_dir(root).map_err(read_failed(root))? {
            let entry = entry.map_err(read_failed(root))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(read_failed(&path))?;

            if file_type.is_dir() {
                tracing::trace!(dir = %path.display(), "skipping subdirectory");
                scan.directories += 1;
                continue;
            }
            let file_name = entry.file_name();
            if self
                .config
                .is_settings_file(canonical_root.as_deref(), &file_name)
            {
                tracing::debug!(file = %path.display(), "leaving configuration file in place");
                scan.excluded += 1;
                continue;
            }
            if self.config.exclusions().excludes(&file_name) {
                tracing::debug!(file = %path.display(), "excluded by configuration");
                scan.excluded += 1;
                continue;
            }
            if let Some(task) = FileTask::new(path) {
                scan.tasks.push(task);
            }
        }

        tracing::debug!(
            files = scan.tasks.len(),
            excluded = scan.excluded,
            directories = scan.directories,
            "scanned {}",
            root.display()
        );
        Ok(scan)
    }

    /// Moves one file into its category directory.
    ///
    /// The directory must already exist. On failure the file is untouched.
    pub fn relocate(&self, task: &FileTask) -> MoveResult {
        let registry = self.config.registry();
        let category = registry.category_of(&task.extension().to_lowercase());
        let dir = registry.directory(category);

        let _guard = self.dir_locks.get(dir).map(lock);
        let destination = resolver::resolve(dir, task.file_name()).map_err(|source| {
            task.fail(RelocateError::Resolve {
                dir: dir.to_path_buf(),
                source,
            })
        })?;

        fs::rename(task.source(), &destination).map_err(|source| {
            task.fail(RelocateError::Rename {
                destination: destination.clone(),
                source,
            })
        })?;

        tracing::debug!(
            from = %task.source().display(),
            to = %destination.display(),
            %category,
            "moved file"
        );
        Ok(Relocation {
            source: task.source().to_path_buf(),
            destination,
            category,
        })
    }

    /// Relocates every task of a scan on a pool of [`MAX_CONCURRENT_MOVES`]
    /// threads and waits for all of them.
    ///
    /// Failures are logged one per line once the pool has drained.
    pub fn run_batch<F>(&self, scan: Scan, relocate: F) -> OrganizeResult<BatchReport>
    where
        F: Fn(&FileTask) -> MoveResult + Sync,
    {
        let pool = ThreadPoolBuilder::new()
            .num_threads(MAX_CONCURRENT_MOVES)
            .thread_name(|i| format!("dlsort-mover-{i}"))
            .build()?;

        let moved = Mutex::new(Vec::with_capacity(scan.tasks.len()));
        let failures = Mutex::new(Vec::new());

        pool.scope(|scope| {
            for task in scan.tasks {
                let (relocate, moved, failures) = (&relocate, &moved, &failures);
                scope.spawn(move |_| match relocate(&task) {
                    Ok(relocation) => lock(moved).push(relocation),
                    Err(failure) => lock(failures).push(failure),
                });
            }
        });

        let report = BatchReport {
            dry_run: false,
            moved: moved.into_inner().unwrap_or_else(PoisonError::into_inner),
            failures: failures.into_inner().unwrap_or_else(PoisonError::into_inner),
            excluded: scan.excluded,
            skipped_directories: scan.directories,
        };

        for failure in &report.failures {
            tracing::error!(file = %failure.file_name, error = %failure.cause, "failed to move file");
        }
        tracing::debug!(
            moved = report.moved.len(),
            failed = report.failure_count(),
            "finished organizing {}",
            self.config.root().display()
        );
        Ok(report)
    }

    /// Works out where every file would go without touching the filesystem.
    ///
    /// Destinations picked for earlier files count as taken, so the plan shows
    /// the suffixes a real run would produce. No directories are created.
    pub fn plan(&self) -> OrganizeResult<BatchReport> {
        let scan = self.scan()?;
        let registry = self.config.registry();
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut report = BatchReport {
            dry_run: true,
            excluded: scan.excluded,
            skipped_directories: scan.directories,
            ..Default::default()
        };

        for task in &scan.tasks {
            let category = registry.category_of(&task.extension().to_lowercase());
            let dir = registry.directory(category);
            let resolved = resolver::resolve_with(dir, task.file_name(), |candidate| {
                Ok(claimed.contains(candidate) || resolver::path_exists(candidate)?)
            });

            match resolved {
                Ok(destination) => {
                    claimed.insert(destination.clone());
                    report.moved.push(Relocation {
                        source: task.source().to_path_buf(),
                        destination,
                        category,
                    });
                }
                Err(source) => report.failures.push(task.fail(RelocateError::Resolve {
                    dir: dir.to_path_buf(),
                    source,
                })),
            }
        }
        Ok(report)
    }
}

fn read_failed(path: &Path) -> impl FnOnce(io::Error) -> OrganizeError {
    let path = path.to_path_buf();
    move |source| OrganizeError::ReadDirFailed { path, source }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
