//! Background thread that owns git2::Repository for its lifetime.
//!
//! git2::Repository is not `Sync`, so it is opened inside the thread and never
//! shared. Callers hand the thread boxed jobs over a crossbeam channel; each job
//! answers on its own tokio oneshot, so async code can simply `.await` git work.

use std::cell::RefCell;
use std::path::{Component, Path, PathBuf};

use crossbeam_channel::{Receiver, Sender};
use git2::{Commit, Delta, Diff, DiffFormat, DiffOptions, ErrorCode, Repository, Tree};

use crate::error::RevflowError;
use crate::git::types::{CommitSummary, DiffSnapshot, FileSummary};

/// Upper bound on commits reported for one pull request.
const MAX_HISTORY: usize = 200;

type GitJob = Box<dyn FnOnce(&Repository) + Send>;

/// Cloneable handle to the git background thread.
///
/// Dropping the last handle closes the channel and ends the thread.
#[derive(Clone)]
pub struct GitHandle {
    tx: Sender<GitJob>,
    workdir: PathBuf,
}

/// Opens the repository containing `path` on a dedicated thread.
///
/// Blocks until the repository is open so that a missing or bare repository is
/// reported here rather than on the first request.
///
/// # Errors
///
/// Returns `RevflowError::Git` when no repository with a working directory is
/// found, or `RevflowError::Io` when the thread cannot be spawned.
pub fn spawn_git_worker(path: impl Into<PathBuf>) -> Result<GitHandle, RevflowError> {
    let path = path.into();
    let (tx, rx) = crossbeam_channel::unbounded::<GitJob>();
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

    std::thread::Builder::new()
        .name("revflow-git".to_owned())
        .spawn(move || git_worker_loop(path, rx, ready_tx))?;

    let workdir = ready_rx.recv().map_err(|_| RevflowError::GitWorkerGone)??;
    Ok(GitHandle { tx, workdir })
}

/// Entry point for the background thread that owns the git Repository.
///
/// Reports the open result on `ready`, then runs jobs until every sender is dropped.
fn git_worker_loop(
    path: PathBuf,
    rx: Receiver<GitJob>,
    ready: Sender<Result<PathBuf, git2::Error>>,
) {
    let repo = match Repository::discover(&path) {
        Ok(r) => r,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let workdir = match repo.workdir() {
        Some(w) => w.to_path_buf(),
        None => {
            let _ = ready.send(Err(git2::Error::from_str("bare repositories are not supported")));
            return;
        }
    };
    if ready.send(Ok(workdir)).is_err() {
        return;
    }

    for job in rx {
        job(&repo);
    }
}

impl GitHandle {
    /// Root of the working copy.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Runs `job` on the git thread and awaits its result.
    async fn call<T, F>(&self, job: F) -> Result<T, RevflowError>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T, RevflowError> + Send + 'static,
    {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        let boxed: GitJob = Box::new(move |repo| {
            let _ = reply_tx.send(job(repo));
        });
        self.tx.send(boxed).map_err(|_| RevflowError::GitWorkerGone)?;
        reply_rx.await.map_err(|_| RevflowError::GitWorkerGone)?
    }

    /// Name of the checked-out branch, or `None` on a detached HEAD.
    pub async fn current_branch(&self) -> Result<Option<String>, RevflowError> {
        self.call(|repo| {
            if repo.head_detached()? {
                return Ok(None);
            }
            let head = repo.head()?;
            Ok(head.shorthand().map(str::to_owned))
        })
        .await
    }

    /// Resolves a branch or revision (falling back to `origin/<rev>`) to a commit id.
    pub async fn resolve_commit(&self, rev: &str) -> Result<String, RevflowError> {
        let rev = rev.to_owned();
        self.call(move |repo| Ok(resolve(repo, &rev)?.id().to_string())).await
    }

    /// First-parent commits on `head` since it forked from `base`, oldest first.
    pub async fn commit_history(
        &self,
        base: &str,
        head: &str,
    ) -> Result<Vec<CommitSummary>, RevflowError> {
        let base = base.to_owned();
        let head = head.to_owned();
        self.call(move |repo| {
            let head_commit = resolve(repo, &head)?;
            let base_commit = resolve(repo, &base)?;
            let fork = repo
                .merge_base(base_commit.id(), head_commit.id())
                .unwrap_or_else(|_| base_commit.id());

            let mut walk = repo.revwalk()?;
            walk.push(head_commit.id())?;
            walk.hide(fork)?;
            walk.simplify_first_parent()?;
            walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;

            let mut commits = Vec::new();
            for oid in walk.take(MAX_HISTORY) {
                let commit = repo.find_commit(oid?)?;
                commits.push(CommitSummary {
                    id: commit.id().to_string(),
                    summary: commit.summary().unwrap_or("").to_owned(),
                });
            }
            Ok(commits)
        })
        .await
    }

    /// Diff of `head` against its merge base with `base` (`git diff base...head`).
    pub async fn diff(&self, base: &str, head: &str) -> Result<DiffSnapshot, RevflowError> {
        let base = base.to_owned();
        let head = head.to_owned();
        self.call(move |repo| {
            let head_commit = resolve(repo, &head)?;
            let base_commit = resolve(repo, &base)?;
            let fork = repo
                .merge_base(base_commit.id(), head_commit.id())
                .unwrap_or_else(|_| base_commit.id());
            let old_tree = repo.find_commit(fork)?.tree()?;
            let new_tree = head_commit.tree()?;

            let mut opts = DiffOptions::new();
            let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;
            Ok(DiffSnapshot {
                patch: patch_text(&diff)?,
                files: extract_files(&diff),
            })
        })
        .await
    }

    /// Checks out `branch` (local, else remote-tracking as a detached HEAD).
    ///
    /// Uses a safe checkout, so local modifications that would be overwritten
    /// make this fail instead of being lost.
    pub async fn checkout(&self, branch: &str) -> Result<(), RevflowError> {
        let branch = branch.to_owned();
        self.call(move |repo| {
            let (object, reference) = match repo.revparse_ext(&branch) {
                Ok(found) => found,
                Err(_) => repo.revparse_ext(&format!("origin/{branch}"))?,
            };
            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.safe();
            repo.checkout_tree(&object, Some(&mut checkout))?;
            match reference {
                Some(r) if r.is_branch() => {
                    let name = r
                        .name()
                        .ok_or_else(|| git2::Error::from_str("branch name is not valid UTF-8"))?;
                    repo.set_head(name)?;
                }
                _ => repo.set_head_detached(object.peel_to_commit()?.id())?,
            }
            Ok(())
        })
        .await
    }

    /// True if tracked files have uncommitted modifications.
    pub async fn is_dirty(&self) -> Result<bool, RevflowError> {
        self.call(|repo| {
            let mut opts = git2::StatusOptions::new();
            opts.include_untracked(false).include_ignored(false);
            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(!statuses.is_empty())
        })
        .await
    }

    /// URL of remote `name`, or `None` when the remote does not exist.
    pub async fn remote_url(&self, name: &str) -> Result<Option<String>, RevflowError> {
        let name = name.to_owned();
        self.call(move |repo| match repo.find_remote(&name) {
            Ok(remote) => Ok(remote.url().map(str::to_owned)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    /// Paths that differ from `HEAD`: staged, modified, deleted or untracked.
    ///
    /// Untracked directories are listed file by file. Ignored files and
    /// submodules are left out.
    pub async fn changed_paths(&self) -> Result<Vec<String>, RevflowError> {
        self.call(|repo| {
            let mut opts = git2::StatusOptions::new();
            opts.include_untracked(true)
                .recurse_untracked_dirs(true)
                .include_ignored(false)
                .exclude_submodules(true);
            let statuses = repo.statuses(Some(&mut opts))?;
            Ok(statuses
                .iter()
                .filter_map(|entry| entry.path().map(str::to_owned))
                .collect())
        })
        .await
    }

    /// Contents of `rel` as committed at `rev`. `None` if the file is not in
    /// that commit.
    pub async fn file_at(&self, rev: &str, rel: &str) -> Result<Option<Vec<u8>>, RevflowError> {
        let rel = contained(rel)?.to_path_buf();
        let rev = rev.to_owned();
        self.call(move |repo| {
            let tree = resolve(repo, &rev)?.tree()?;
            blob_at(repo, &tree, &rel)
        })
        .await
    }

    /// Contents of `rel` in the `HEAD` commit. `None` if absent or if `HEAD`
    /// has no commits yet.
    pub async fn head_file(&self, rel: &str) -> Result<Option<Vec<u8>>, RevflowError> {
        let rel = contained(rel)?.to_path_buf();
        self.call(move |repo| {
            let tree = match repo.head() {
                Ok(head) => head.peel_to_tree()?,
                Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            blob_at(repo, &tree, &rel)
        })
        .await
    }

    /// Raw bytes of a working-copy file. `None` if it does not exist.
    pub async fn read_bytes(&self, rel: &str) -> Result<Option<Vec<u8>>, RevflowError> {
        let path = self.workdir_path(rel)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Restores a working-copy file to `contents`; `None` removes the file.
    pub async fn write_file(&self, rel: &str, contents: Option<&[u8]>) -> Result<(), RevflowError> {
        let path = self.workdir_path(rel)?;
        match contents {
            Some(c) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, c).await?
            }
            None => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    /// Lines `start..=end` (1-based) of `rel` as committed at `rev`.
    ///
    /// `None` when the file is not in that commit or the range lies outside it.
    pub async fn read_lines_at(
        &self,
        rev: &str,
        rel: &str,
        start: u32,
        end: u32,
    ) -> Result<Option<String>, RevflowError> {
        let Some(bytes) = self.file_at(rev, rel).await? else {
            return Ok(None);
        };
        Ok(slice_lines(&String::from_utf8_lossy(&bytes), start, end))
    }

    /// Joins `rel` onto the working copy, refusing absolute or escaping paths.
    fn workdir_path(&self, rel: &str) -> Result<PathBuf, RevflowError> {
        Ok(self.workdir.join(contained(rel)?))
    }
}

/// `rel` as a path, provided it stays inside the repository root.
fn contained(rel: &str) -> Result<&Path, RevflowError> {
    let candidate = Path::new(rel);
    let inside = candidate
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.is_empty() || !inside {
        return Err(RevflowError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("path '{rel}' is outside the working copy"),
        )));
    }
    Ok(candidate)
}

/// Blob contents at `rel` in `tree`, `None` when there is no such file.
fn blob_at(
    repo: &Repository,
    tree: &Tree<'_>,
    rel: &Path,
) -> Result<Option<Vec<u8>>, RevflowError> {
    let entry = match tree.get_path(rel) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let object = entry.to_object(repo)?;
    Ok(object.as_blob().map(|blob| blob.content().to_vec()))
}

/// Resolves `rev` to a commit, trying `origin/<rev>` when the plain name is unknown.
fn resolve<'r>(repo: &'r Repository, rev: &str) -> Result<Commit<'r>, git2::Error> {
    let object = match repo.revparse_single(rev) {
        Ok(o) => o,
        Err(_) => repo.revparse_single(&format!("origin/{rev}"))?,
    };
    object.peel_to_commit()
}

/// Renders a diff as unified patch text.
fn patch_text(diff: &Diff<'_>) -> Result<String, git2::Error> {
    let mut out = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        let content = String::from_utf8_lossy(line.content());
        match line.origin() {
            origin @ ('+' | '-' | ' ') => {
                out.push(origin);
                out.push_str(&content);
            }
            _ => out.push_str(&content),
        }
        true
    })?;
    Ok(out)
}

/// Collects per-file status info and real added/removed line counts from diff deltas.
///
/// Uses `diff.foreach()` with the file and line callbacks so that line-origin
/// characters (`'+'` / `'-'`) are counted per file in a single pass. The file
/// callback fires once per delta in order, so `files.last_mut()` in the line
/// callback always refers to the current file.
fn extract_files(diff: &Diff<'_>) -> Vec<FileSummary> {
    let files: RefCell<Vec<FileSummary>> = RefCell::new(Vec::new());

    let _ = diff.foreach(
        &mut |delta, _progress| {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .unwrap_or(Path::new("unknown"))
                .to_string_lossy()
                .into_owned();
            let status = match delta.status() {
                Delta::Added => 'A',
                Delta::Deleted => 'D',
                Delta::Renamed => 'R',
                _ => 'M',
            };
            files.borrow_mut().push(FileSummary { path, status, added: 0, removed: 0 });
            true
        },
        None,
        None,
        Some(&mut |_delta, _hunk, line| {
            let mut files = files.borrow_mut();
            if let Some(f) = files.last_mut() {
                match line.origin() {
                    '+' => f.added += 1,
                    '-' => f.removed += 1,
                    _ => {}
                }
            }
            true
        }),
    );

    files.into_inner()
}

/// Returns lines `start..=end` (1-based, inclusive) of `content`.
fn slice_lines(content: &str, start: u32, end: u32) -> Option<String> {
    if start == 0 || end < start {
        return None;
    }
    let lines: Vec<&str> = content
        .lines()
        .skip(start as usize - 1)
        .take((end - start) as usize + 1)
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
