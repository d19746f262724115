use crate::config::ThumbnailConfig;
use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::thumbnails;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::thread;

type Task<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Fixed pool of worker threads draining one FIFO queue: at most
/// `max_concurrent` tasks run at a time, later submissions wait their turn.
/// Each submission gets a ticket; a task's failure (or panic) reaches only
/// that ticket and frees the slot for the next waiting task.
pub struct RenderQueue<T> {
    tx: Option<Sender<(Task<T>, Sender<Result<T>>)>>,
    workers: Vec<thread::JoinHandle<()>>,
}

pub struct JobTicket<T> {
    rx: Receiver<Result<T>>,
}

impl<T> JobTicket<T> {
    /// Blocks until this task completes.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(Error::Init("render queue shut down".to_string())))
    }
}

impl<T: Send + 'static> RenderQueue<T> {
    pub fn new(max_concurrent: usize) -> Self {
        let (tx, rx) = unbounded::<(Task<T>, Sender<Result<T>>)>();
        let workers = (0..max_concurrent.max(1))
            .map(|index| {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("render-{index}"))
                    .spawn(move || {
                        while let Ok((task, done)) = rx.recv() {
                            let result = catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|_| {
                                Err(Error::Init("render task panicked".to_string()))
                            });
                            let _ = done.send(result);
                        }
                    })
                    .expect("failed to spawn render worker")
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
        }
    }

    pub fn submit<F>(&self, task: F) -> JobTicket<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (done_tx, done_rx) = bounded(1);
        if let Some(tx) = &self.tx {
            let _ = tx.send((Box::new(task), done_tx));
        }
        JobTicket { rx: done_rx }
    }
}

impl<T> RenderQueue<T> {
    /// Stops accepting work, drains queued tasks and joins the workers.
    pub fn shutdown(&mut self) {
        self.tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl<T> Drop for RenderQueue<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Renders a thumbnail for every image that lacks one, bounded to the
/// configured concurrency, persisting each produced blob. Racing re-renders
/// of the same image reduce to last-write-wins on the blob column.
pub fn generate_missing(pool: &DbPool, root: &Path, config: &ThumbnailConfig) -> Result<usize> {
    let conn = pool.get()?;
    let pending = db::list_images_missing_thumbnail(&conn)?;
    if pending.is_empty() {
        return Ok(0);
    }
    log::info!("Rendering {} missing thumbnail(s)", pending.len());

    let queue = RenderQueue::new(config.max_concurrent_renders);
    let mut tickets = Vec::with_capacity(pending.len());
    for image in &pending {
        let source = root.join(&image.path);
        let config = config.clone();
        let ticket = queue.submit(move || {
            let data = std::fs::read(&source)?;
            thumbnails::render_thumbnail(&data, &config)
        });
        tickets.push((image.id, image.path.clone(), ticket));
    }

    let mut rendered = 0;
    for (id, path, ticket) in tickets {
        match ticket.wait() {
            Ok(blob) => {
                if let Some(id) = id {
                    db::set_thumbnail(&conn, id, &blob)?;
                    rendered += 1;
                }
            }
            // One bad source must not stop the batch
            Err(err) => log::warn!("Thumbnail render failed for {path}: {err}"),
        }
    }
    Ok(rendered)
}
