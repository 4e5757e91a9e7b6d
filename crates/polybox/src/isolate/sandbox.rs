//! Sandbox lifecycle and execution
//!
//! A [`Sandbox`] is one initialized isolate box: a fresh working directory
//! exposed to the child as `/box`, with resource limits and directory
//! bindings fixed at acquisition. Boxes are leased from a [`BoxPool`] so
//! concurrent jobs never share a box id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::process::Command;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::isolate::IsolateError;
use crate::isolate::command::{IsolateAction, IsolateCommand};
use crate::isolate::meta::MetaFile;
use crate::types::{MountConfig, ResourceLimits, SandboxMeta};

/// Outcome of one sandboxed run.
///
/// `isolator_exit` is the isolator's own exit code; a non-zero child exit is
/// reported through `meta`, not here.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code of the isolate process itself
    pub isolator_exit: i32,

    /// Captured standard output, truncated to the configured cap
    pub stdout: Vec<u8>,

    /// Captured standard error, truncated to the configured cap
    pub stderr: Vec<u8>,

    /// Structured metadata parsed from the meta file
    pub meta: SandboxMeta,
}

impl RunOutcome {
    /// Whether the sandboxed child ran to completion with exit code 0.
    #[must_use]
    pub fn child_succeeded(&self) -> bool {
        self.meta.is_success()
    }
}

fn truncate_capture(mut bytes: Vec<u8>, cap: Option<u64>) -> Vec<u8> {
    if let Some(cap) = cap {
        bytes.truncate(cap as usize);
    }
    bytes
}

/// One initialized isolate box.
///
/// Call [`release()`](Self::release) on every exit path; the `Drop`
/// implementation only performs best-effort cleanup from a spawned thread
/// and logs a warning when it has to.
#[derive(Debug)]
pub struct Sandbox {
    /// Box ID
    id: u32,

    /// Host path of the box root (the directory containing `box/`)
    box_root: PathBuf,

    /// Path to the isolate binary
    isolate_path: PathBuf,

    /// Limits applied to every run in this box
    limits: ResourceLimits,

    /// Directory bindings applied to every run in this box
    mounts: Vec<MountConfig>,

    /// Whether the box still needs cleanup
    initialized: bool,

    /// Pool permit, released when the sandbox drops
    _permit: Option<OwnedSemaphorePermit>,
}

impl Sandbox {
    /// Initialize a fresh box with the given limits and directory bindings.
    #[instrument(skip(isolate_path, limits, mounts))]
    pub async fn acquire(
        id: u32,
        isolate_path: impl Into<PathBuf>,
        limits: ResourceLimits,
        mounts: Vec<MountConfig>,
    ) -> Result<Self, IsolateError> {
        let isolate_path = isolate_path.into();

        let args = IsolateCommand::new(&isolate_path, id)
            .action(IsolateAction::Init)
            .build();
        debug!(?args, "initializing isolate box");

        let output = run_isolate(&args).await?;
        if !output.status.success() {
            return Err(IsolateError::InitFailed {
                id,
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // `isolate --init` prints the box root on stdout
        let box_root = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        if !box_root.exists() {
            return Err(IsolateError::InitFailed {
                id,
                message: format!("box path does not exist: {}", box_root.display()),
            });
        }

        debug!(?box_root, "box initialized");

        Ok(Self {
            id,
            box_root,
            isolate_path,
            limits,
            mounts,
            initialized: true,
            _permit: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Host-side path of the directory the child sees as `/box`.
    pub fn path(&self) -> PathBuf {
        self.box_root.join("box")
    }

    /// Host path of a file inside the box, rejecting traversal.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, IsolateError> {
        if name.contains("..") || name.starts_with('/') {
            return Err(IsolateError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.path().join(name))
    }

    /// Path of a file as seen from inside the sandbox.
    pub fn sandbox_path(&self, name: &str) -> Result<PathBuf, IsolateError> {
        if name.contains("..") || name.starts_with('/') {
            return Err(IsolateError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(PathBuf::from("/box").join(name))
    }

    /// Write a file into the box.
    #[instrument(skip(self, content))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), IsolateError> {
        let path = self.file_path(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(?path, len = content.len(), "wrote file to box");
        Ok(())
    }

    /// Write a file into the box with mode 0700.
    pub async fn write_executable(&self, name: &str, content: &[u8]) -> Result<(), IsolateError> {
        use std::os::unix::fs::PermissionsExt;

        self.write_file(name, content).await?;
        let path = self.file_path(name)?;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).await?;
        Ok(())
    }

    /// Read a file from the box; `None` when it is missing or unreadable.
    pub async fn try_read_file(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.file_path(name).ok()?;
        tokio::fs::read(&path).await.ok()
    }

    /// Launch `argv` inside the box and wait for it to finish.
    ///
    /// The child's environment is exactly `env`; nothing is inherited from
    /// the host. Standard streams go through files inside the box, so the
    /// captures come back even when the child is killed.
    #[instrument(skip(self, argv, env, stdin))]
    pub async fn run(
        &self,
        argv: Vec<String>,
        env: &HashMap<String, String>,
        stdin: Option<&[u8]>,
    ) -> Result<RunOutcome, IsolateError> {
        let meta_path = self.file_path("meta.txt")?;

        // Isolate cannot read from /dev/null when --stdin is given, so the
        // stdin file always exists, even if empty.
        self.write_file("stdin.txt", stdin.unwrap_or_default())
            .await?;

        let command = IsolateCommand::new(&self.isolate_path, self.id)
            .action(IsolateAction::Run)
            .limits(self.limits.clone())
            .mounts(self.mounts.iter().cloned())
            .envs(env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .meta_file(&meta_path)
            .stdin(self.sandbox_path("stdin.txt")?)
            .stdout(self.sandbox_path("stdout.txt")?)
            .stderr(self.sandbox_path("stderr.txt")?)
            .working_dir("/box")
            .command(argv);

        let args = command.build();
        debug!(?args, "running isolate command");

        let output = run_isolate(&args).await?;
        let isolator_exit = output.status.code().unwrap_or(-1);

        if !meta_path.exists() {
            // No meta file means the isolator never got to the child.
            return Err(IsolateError::SetupFailed {
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        let meta = MetaFile::load(&meta_path).await?.to_meta();

        let stdout = truncate_capture(
            self.try_read_file("stdout.txt").await.unwrap_or_default(),
            self.limits.stdout_cap,
        );
        let stderr = truncate_capture(
            self.try_read_file("stderr.txt").await.unwrap_or_default(),
            self.limits.stderr_cap,
        );

        debug!(
            isolator_exit,
            status = %meta.status,
            time = meta.time,
            memory = meta.memory,
            "run complete"
        );

        Ok(RunOutcome {
            isolator_exit,
            stdout,
            stderr,
            meta,
        })
    }

    /// Tear the box down.
    ///
    /// Must be called on every exit path; the return value indicates whether
    /// the isolator accepted the cleanup.
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self))]
    pub async fn release(&mut self) -> Result<(), IsolateError> {
        if !self.initialized {
            return Ok(());
        }

        let args = IsolateCommand::new(&self.isolate_path, self.id)
            .action(IsolateAction::Cleanup)
            .build();
        debug!(?args, "cleaning up isolate box");

        let output = run_isolate(&args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(id = self.id, stderr = %stderr, "cleanup failed");
            return Err(IsolateError::CleanupFailed {
                id: self.id,
                message: stderr.into_owned(),
            });
        }

        self.initialized = false;
        debug!("box cleaned up");
        Ok(())
    }

    pub(crate) fn with_permit(mut self, permit: OwnedSemaphorePermit) -> Self {
        self._permit = Some(permit);
        self
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.initialized {
            warn!(
                box_id = self.id,
                box_root = %self.box_root.display(),
                "Sandbox dropped without explicit release; attempting best-effort cleanup"
            );

            let isolate_path = self.isolate_path.clone();
            let id = self.id;
            std::thread::spawn(move || {
                let args = IsolateCommand::new(&isolate_path, id)
                    .action(IsolateAction::Cleanup)
                    .build();
                if let Some(program) = args.first() {
                    match std::process::Command::new(program).args(&args[1..]).output() {
                        Ok(output) if output.status.success() => {
                            debug!(box_id = id, "best-effort cleanup succeeded");
                        }
                        Ok(output) => {
                            let stderr = String::from_utf8_lossy(&output.stderr);
                            warn!(box_id = id, stderr = %stderr, "best-effort cleanup failed");
                        }
                        Err(e) => {
                            warn!(box_id = id, error = %e, "best-effort cleanup spawn failed");
                        }
                    }
                }
            });
        }
    }
}

async fn run_isolate(args: &[String]) -> Result<std::process::Output, IsolateError> {
    let program = args
        .first()
        .ok_or_else(|| IsolateError::CommandFailed("empty command arguments".to_owned()))?;
    Command::new(program)
        .args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(IsolateError::SpawnFailed)
}

/// Pool of isolate box ids for concurrent jobs.
#[derive(Debug)]
pub struct BoxPool {
    /// First box id handed out
    start_id: u32,

    /// Number of boxes in the pool
    count: u32,

    /// Path to the isolate binary
    isolate_path: PathBuf,

    /// Limits concurrent boxes to the pool size
    semaphore: Arc<Semaphore>,

    /// Next box id (wraps around the pool)
    next_id: AtomicU32,
}

impl BoxPool {
    pub fn new(start_id: u32, count: u32, isolate_path: impl Into<PathBuf>) -> Self {
        Self {
            start_id,
            count,
            isolate_path: isolate_path.into(),
            semaphore: Arc::new(Semaphore::new(count as usize)),
            next_id: AtomicU32::new(start_id),
        }
    }

    /// Lease a box id and initialize a sandbox on it.
    #[instrument(skip(self, limits, mounts))]
    pub async fn acquire(
        &self,
        limits: ResourceLimits,
        mounts: Vec<MountConfig>,
    ) -> Result<Sandbox, IsolateError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IsolateError::PoolExhausted)?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = self.start_id + (id - self.start_id) % self.count;
        debug!(id, "acquired box from pool");

        let sandbox = Sandbox::acquire(id, &self.isolate_path, limits, mounts).await?;
        Ok(sandbox.with_permit(permit))
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> u32 {
        self.count
    }
}
