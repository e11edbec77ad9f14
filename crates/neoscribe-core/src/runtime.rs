//! Async runtime around the session controller.
//!
//! ## Learning: Actor Ownership
//!
//! `SessionRuntime` owns the `SessionController` inside one task. Hosts and
//! collaborators talk to it through a cloneable `SessionHandle`, which
//! queues requests on an `mpsc` channel and waits for the answer on a
//! `oneshot`. Collaborator events are fire-and-forget.
//!
//! The loop also sleeps until the shuffle controller's next deadline so
//! hidden surfaces come back after one frame without the host ticking.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use neoscribe_tabs::{Session, TabDescriptor, TabId};

use crate::command::TabCommand;
use crate::controller::{OpenOptions, SessionController};
use crate::event::{NoticeBus, SessionEvent, SessionNotice};
use crate::{SessionError, SessionResult};

/// Requests queued for the runtime. Up to 256 may be pending.
const QUEUE_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<SessionResult<T>>;

enum Request {
    Event(SessionEvent),
    Open {
        descriptor: TabDescriptor,
        reply: Reply<TabId>,
    },
    Import {
        reply: Reply<Option<TabId>>,
    },
    CreateTab {
        name: String,
        extension: Option<String>,
        reply: Reply<TabId>,
    },
    Switch {
        tab: TabId,
        reply: Reply<()>,
    },
    Close {
        tab: TabId,
        reply: Reply<()>,
    },
    Execute {
        tab: TabId,
        command: TabCommand,
        reply: Reply<()>,
    },
    Shutdown,
}

/// Drives a `SessionController` from a single task.
pub struct SessionRuntime {
    controller: SessionController,
    rx: mpsc::Receiver<Request>,
}

impl SessionRuntime {
    pub fn new(controller: SessionController) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = SessionHandle {
            tx,
            snapshots: controller.watch_snapshot(),
            notices: controller.notices().clone(),
        };
        (Self { controller, rx }, handle)
    }

    /// Runs until shutdown, until every handle is dropped, or until the
    /// last tab is closed. Returns the controller for inspection.
    pub async fn run(mut self) -> SessionController {
        tracing::info!("Session runtime started");
        loop {
            let deadline = self.controller.next_deadline();
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(Request::Shutdown) | None => break,
                    Some(request) => self.apply(request),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.controller.tick();
                }
            }
            if self.controller.exit_requested() {
                tracing::info!("Exit requested, stopping session runtime");
                break;
            }
        }
        tracing::info!("Session runtime stopped");
        self.controller
    }

    fn apply(&mut self, request: Request) {
        let controller = &mut self.controller;
        match request {
            Request::Event(event) => controller.handle(event),
            Request::Open { descriptor, reply } => {
                let _ = reply.send(controller.open(descriptor));
            }
            Request::Import { reply } => {
                let _ = reply.send(controller.import_file());
            }
            Request::CreateTab {
                name,
                extension,
                reply,
            } => {
                let _ = reply.send(controller.create_tab(&name, extension.as_deref()));
            }
            Request::Switch { tab, reply } => {
                let _ = reply.send(controller.switch_tab(tab));
            }
            Request::Close { tab, reply } => {
                let _ = reply.send(controller.close_tab(tab));
            }
            Request::Execute {
                tab,
                command,
                reply,
            } => {
                let result = controller.execute(tab, command);
                if let Err(e) = &result {
                    controller.report(Some(tab), e);
                }
                let _ = reply.send(result);
            }
            // Handled by the loop
            Request::Shutdown => {}
        }
    }
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Request>,
    snapshots: watch::Receiver<Arc<Session>>,
    notices: NoticeBus,
}

impl SessionHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Request) -> SessionResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        rx.await.map_err(|_| SessionError::RuntimeClosed)?
    }

    pub async fn open(&self, descriptor: TabDescriptor) -> SessionResult<TabId> {
        self.request(|reply| Request::Open { descriptor, reply }).await
    }

    pub async fn open_path(
        &self,
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        options: OpenOptions,
    ) -> SessionResult<TabId> {
        let mut descriptor = TabDescriptor::file(path, name).read_only(options.read_only);
        if let Some(uri) = options.uri {
            descriptor = descriptor.with_uri(uri);
        }
        if let Some(extension) = options.extension {
            descriptor = descriptor.with_extension(extension);
        }
        if options.start_editing {
            descriptor = descriptor.start_editing();
        }
        self.open(descriptor).await
    }

    pub async fn import_file(&self) -> SessionResult<Option<TabId>> {
        self.request(|reply| Request::Import { reply }).await
    }

    pub async fn create_tab(&self, name: &str, extension: Option<&str>) -> SessionResult<TabId> {
        let name = name.to_string();
        let extension = extension.map(str::to_string);
        self.request(|reply| Request::CreateTab {
            name,
            extension,
            reply,
        })
        .await
    }

    pub async fn switch_tab(&self, tab: TabId) -> SessionResult<()> {
        self.request(|reply| Request::Switch { tab, reply }).await
    }

    pub async fn close_tab(&self, tab: TabId) -> SessionResult<()> {
        self.request(|reply| Request::Close { tab, reply }).await
    }

    pub async fn execute(&self, tab: TabId, command: TabCommand) -> SessionResult<()> {
        self.request(|reply| Request::Execute {
            tab,
            command,
            reply,
        })
        .await
    }

    /// Queues a collaborator event.
    pub async fn send_event(&self, event: SessionEvent) -> SessionResult<()> {
        self.tx
            .send(Request::Event(event))
            .await
            .map_err(|_| SessionError::RuntimeClosed)
    }

    pub async fn shutdown(&self) -> SessionResult<()> {
        self.tx
            .send(Request::Shutdown)
            .await
            .map_err(|_| SessionError::RuntimeClosed)
    }

    /// Latest published session.
    pub fn snapshot(&self) -> Arc<Session> {
        self.snapshots.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<Session>> {
        self.snapshots.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }
}
