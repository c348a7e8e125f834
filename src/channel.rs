// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound side of the byte channel.
//!
//! A reader loop owns the read half of the channel and forwards every chunk
//! to the single attached listener. Bytes that arrive while nobody listens
//! are dropped.

use std::{io::ErrorKind, sync::Arc};

use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
    task::JoinHandle,
};

use crate::codec::rtu::MAX_FRAME_LEN;

type Chunk = Vec<u8>;

/// Slot for the one listener that receives inbound chunks.
#[derive(Debug, Clone, Default)]
pub struct Listener {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<Chunk>>>>,
}

impl Listener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener, replacing any previous one.
    ///
    /// The listener stays attached until the returned guard is dropped.
    #[must_use]
    pub fn attach(&self) -> (ListenerGuard, mpsc::UnboundedReceiver<Chunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.slot.lock().replace(tx).is_some() {
            warn!("Replaced a listener that was still attached");
        }
        let guard = ListenerGuard {
            slot: Arc::clone(&self.slot),
        };
        (guard, rx)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Forward `chunk` to the attached listener.
    ///
    /// Returns `false` if the chunk has been dropped.
    pub fn forward(&self, chunk: &[u8]) -> bool {
        match self.slot.lock().as_ref() {
            Some(tx) => tx.send(chunk.to_vec()).is_ok(),
            None => {
                trace!("No listener attached, dropping {chunk:02X?}");
                false
            }
        }
    }
}

/// Detaches the listener on drop.
#[derive(Debug)]
pub struct ListenerGuard {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<Chunk>>>>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Spawn a loop that reads `reader` and forwards all chunks to `listener`.
///
/// The loop ends at end of stream or after logging a read error.
pub fn spawn_reader<R>(mut reader: R, listener: Listener) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0; MAX_FRAME_LEN];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("Channel closed");
                    break;
                }
                Ok(n) => {
                    listener.forward(&buf[..n]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    warn!("Channel error: {err}");
                    break;
                }
            }
        }
    })
}
