//! What a link needs from the transport that opened it.

use std::sync::Arc;

use bson::Document;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatch::Dispatcher;

pub(crate) struct Link {
    /// Frames to send, fed by the transport.
    pub(crate) outgoing: mpsc::Receiver<Document>,
    /// Where the reader queues service responses. Weak, so the writer
    /// ends once the transport drops its sender.
    pub(crate) replies: mpsc::WeakSender<Document>,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

/// The two tasks driving an open link.
pub(crate) struct LinkTasks {
    pub(crate) writer: JoinHandle<()>,
    pub(crate) reader: JoinHandle<()>,
}

impl LinkTasks {
    pub(crate) fn is_alive(&self) -> bool {
        !self.writer.is_finished() && !self.reader.is_finished()
    }

    /// Stop reading immediately. The writer drains what is already queued
    /// and exits on its own.
    pub(crate) fn shutdown(self) {
        self.reader.abort();
    }
}
