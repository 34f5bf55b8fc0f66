//! Fire-and-forget tasks, and the way back into the dispatcher.
//!
//! Slow work (persistence, mostly) runs in [`offload`]ed tasks so the
//! dispatch loop never waits on it. Such a task must not touch live
//! state directly; when it has something to apply it posts a closure
//! through an [`Invoker`], and the closure runs on the dispatcher
//! between two other requests.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatcher::{Inbound, World};
use crate::ServiceError;

/// Spawns `task` on the runtime. A panic inside it is logged with the
/// task's name and swallowed.
pub fn offload<F>(name: &'static str, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            tracing::error!(task = name, panic = panic_message(panic.as_ref()), "offloaded task panicked");
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Posts closures onto the dispatcher.
///
/// Closures run in the order they were posted.
#[derive(Clone)]
pub struct Invoker {
    inbound: mpsc::Sender<Inbound>,
}

impl Invoker {
    pub(crate) fn new(inbound: mpsc::Sender<Inbound>) -> Self {
        Self { inbound }
    }

    /// Queues `job` to run against the live [`World`].
    pub async fn invoke<F>(&self, job: F) -> Result<(), ServiceError>
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        self.inbound
            .send(Inbound::Invoke(Box::new(job)))
            .await
            .map_err(|_| ServiceError::Unavailable)
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("closed", &self.inbound.is_closed())
            .finish()
    }
}
