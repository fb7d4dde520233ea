//! Destination directory creation, once per path.
//!
//! Every rendered or copied file needs its parent directory. With all files
//! in flight at once, the first caller for a path creates it and everyone
//! else waits for that attempt instead of issuing their own.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

type CreateFn = Arc<dyn Fn(PathBuf) -> BoxFuture<'static, io::Result<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Created,
}

enum Role {
    Creator(watch::Sender<State>),
    Waiter(watch::Receiver<State>),
}

/// A creator's claim on a path. Unless finished, dropping it forgets the
/// path and releases the waiters, even when the creating task is aborted.
struct Attempt<'a> {
    states: &'a Mutex<FxHashMap<PathBuf, watch::Receiver<State>>>,
    dir: &'a Path,
    sender: watch::Sender<State>,
    created: bool,
}

impl Attempt<'_> {
    fn finish(mut self) {
        self.sender.send_replace(State::Created);
        self.created = true;
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.created {
            self.states.lock().remove(self.dir);
        }
    }
}

pub struct DirectoryCreator {
    states: Mutex<FxHashMap<PathBuf, watch::Receiver<State>>>,
    create: CreateFn,
}

impl Default for DirectoryCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryCreator {
    /// Creates directories with [`tokio::fs::create_dir_all`].
    pub fn new() -> Self {
        Self::with_creator(|path| async move { tokio::fs::create_dir_all(path).await })
    }

    /// Use `create` for the actual syscall.
    pub fn with_creator<F, Fut>(create: F) -> Self
    where
        F: Fn(PathBuf) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
    {
        Self {
            states: Mutex::new(FxHashMap::default()),
            create: Arc::new(move |path| create(path).boxed()),
        }
    }

    /// Ensure `dir` exists.
    ///
    /// Creation failures are ignored; the writer that needs the directory
    /// reports the real problem. Cancellation of `cancel` fails only this
    /// call, unless this call is the creator, in which case every waiter
    /// for `dir` fails with [`Error::Canceled`] too.
    pub async fn create(&self, dir: &Path, cancel: &CancellationToken) -> Result<()> {
        let role = {
            let mut states = self.states.lock();
            match states.get(dir) {
                Some(state) => Role::Waiter(state.clone()),
                None => {
                    let (sender, receiver) = watch::channel(State::Pending);
                    states.insert(dir.to_path_buf(), receiver);
                    Role::Creator(sender)
                }
            }
        };

        match role {
            Role::Creator(sender) => {
                let attempt = Attempt {
                    states: &self.states,
                    dir,
                    sender,
                    created: false,
                };
                tokio::select! {
                    _ = cancel.cancelled() => Err(Error::Canceled),
                    _ = (self.create)(dir.to_path_buf()) => {
                        attempt.finish();
                        Ok(())
                    }
                }
            }
            Role::Waiter(mut receiver) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(Error::Canceled),
                    created = receiver.wait_for(|state| *state == State::Created) => {
                        created.map(|_| ()).map_err(|_| Error::Canceled)
                    }
                }
            }
        }
    }
}
