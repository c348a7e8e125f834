// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response exchange over a shared byte channel.

use std::{
    future::Future,
    io,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    task::JoinHandle,
    time,
};

use crate::{
    channel::{self, Listener},
    config::Config,
    error::{Error, Result},
    queue::{Done, Handler, Queue},
    task::{Outcome, Task},
};

/// Sends request ADUs and returns the matching response ADUs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `adu` (CRC included) and wait for the response frame.
    ///
    /// Dropping the returned future may withdraw the request, see
    /// [`SerialHelper::write`].
    async fn send(&self, adu: Vec<u8>) -> Result<Vec<u8>>;
}

/// Serializes all requests onto one byte channel.
///
/// Requests are written strictly one after another in submission order,
/// each one waiting for its response or response timeout, followed by the
/// configured queue timeout.
#[derive(Debug)]
pub struct SerialHelper {
    queue: Queue<Task>,
    next_id: AtomicU64,
    config: Config,
    dispatcher: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl SerialHelper {
    /// Take over an opened channel and start processing requests.
    ///
    /// Must be called within a tokio runtime.
    pub fn new<S>(stream: S, config: Config) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let listener = Listener::new();
        let reader = channel::spawn_reader(reader, listener.clone());
        let queue = Queue::new(config.queue_timeout);
        let dispatcher = queue.start(Dispatcher {
            writer,
            listener,
            response_timeout: config.response_timeout,
            debug: config.debug,
        });
        Self {
            queue,
            next_id: AtomicU64::new(0),
            config,
            dispatcher,
            reader,
        }
    }

    /// Open the serial port at `path` with 8N1 framing.
    #[cfg(feature = "serial")]
    pub fn open(path: &str, baud_rate: u32, config: Config) -> Result<Self> {
        let builder = tokio_serial::new(path, baud_rate);
        let stream = tokio_serial::SerialStream::open(&builder).map_err(io::Error::from)?;
        Ok(Self::new(stream, config))
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Number of requests waiting to be written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue the request ADU `payload`.
    ///
    /// The returned [`Response`] resolves with the response frame. Dropping it
    /// before the request has been dispatched withdraws the request.
    pub fn write(&self, payload: Vec<u8>) -> Response {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (task, outcome) = Task::new(id, payload);
        self.queue.push(task);
        Response {
            id,
            outcome,
            queue: self.queue.clone(),
        }
    }
}

impl Drop for SerialHelper {
    fn drop(&mut self) {
        self.queue.stop();
        self.dispatcher.abort();
        self.reader.abort();
        while let Some(mut task) = self.queue.withdraw(|_| true) {
            task.reject(Error::Aborted);
        }
    }
}

#[async_trait]
impl Transport for SerialHelper {
    async fn send(&self, adu: Vec<u8>) -> Result<Vec<u8>> {
        self.write(adu).await
    }
}

/// Response to a request written with [`SerialHelper::write`].
///
/// Dropping it before it has been sent withdraws the request.
#[derive(Debug)]
#[must_use = "dropping the response withdraws a waiting request"]
pub struct Response {
    id: u64,
    outcome: Outcome,
    queue: Queue<Task>,
}

impl Response {
    /// Withdraw the request if it is still waiting in the queue.
    ///
    /// The response then resolves to [`Error::Aborted`]. Returns `false`
    /// if the request has already been dispatched.
    pub fn abort(&self) -> bool {
        let Some(mut task) = self.queue.withdraw(|task| task.id() == self.id) else {
            return false;
        };
        task.reject(Error::Aborted);
        true
    }
}

impl Future for Response {
    type Output = Result<Vec<u8>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome)
            .poll(cx)
            // The task is gone without an outcome if the queue has been shut down.
            .map(|res| res.unwrap_or(Err(Error::Aborted)))
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Writes a dispatched task and feeds it with received bytes until it settles.
struct Dispatcher<W> {
    writer: W,
    listener: Listener,
    response_timeout: Duration,
    debug: bool,
}

async fn write_payload<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.flush().await
}

#[async_trait]
impl<W> Handler<Task> for Dispatcher<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn handle(&mut self, mut task: Task, done: Done) {
        // Attach before writing, a fast slave may answer before the write returns.
        let (listener, mut chunks) = self.listener.attach();
        if self.debug {
            debug!("Write {:02X?}", task.payload());
        }
        let writer = &mut self.writer;
        // The response timeout also covers a write that never completes.
        let _ = time::timeout(self.response_timeout, async {
            let written = write_payload(writer, task.payload()).await;
            if let Err(err) = written {
                task.reject(Error::ChannelIo(err));
                return;
            }
            while let Some(chunk) = chunks.recv().await {
                if task.receive(&chunk) {
                    break;
                }
            }
        })
        .await;
        if !task.is_settled() {
            task.reject(Error::ResponseTimeout(self.response_timeout));
        }
        drop(listener);
        done.done();
    }
}
