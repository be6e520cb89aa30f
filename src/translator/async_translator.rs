//! Async wrapper running a [`Translator`] against a [`CanAdapter`] on a background thread.

use super::Translator;
use crate::can::CanAdapter;
use crate::diagnostics::{DiagnosticRequest, RequestHandle, RequestOptions};
use crate::error::Error;
use crate::output::{OutputMessage, OutputSink};
use crate::signals::SignalValue;
use crate::{Result, Stream};

use async_stream::stream;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

const COMMAND_BUFFER_SIZE: usize = 32;
const OUTPUT_BUFFER_SIZE: usize = 1024;

enum Command {
    AddRequest {
        bus: u8,
        request: DiagnosticRequest,
        options: RequestOptions,
        reply: oneshot::Sender<Result<RequestHandle>>,
    },
    CancelRequest {
        handle: RequestHandle,
        reply: oneshot::Sender<Result<()>>,
    },
    WriteSignal {
        name: String,
        value: SignalValue,
        reply: oneshot::Sender<Result<bool>>,
    },
}

struct BroadcastSink(broadcast::Sender<OutputMessage>);

impl OutputSink for BroadcastSink {
    fn publish(&mut self, message: OutputMessage) {
        // Nobody listening is not an error
        if self.0.send(message).is_err() {
            debug!("Dropped output message, no receivers");
        }
    }
}

fn handle_command(translator: &mut Translator, command: Command) {
    // The caller may have given up waiting for the reply
    match command {
        Command::AddRequest {
            bus,
            request,
            options,
            reply,
        } => {
            let _ = reply.send(translator.add_request(bus, request, options));
        }
        Command::CancelRequest { handle, reply } => {
            let _ = reply.send(translator.cancel_request(handle));
        }
        Command::WriteSignal { name, value, reply } => {
            let _ = reply.send(translator.write_signal(&name, &value));
        }
    }
}

fn process<T: CanAdapter>(
    mut adapter: T,
    mut translator: Translator,
    mut shutdown_receiver: oneshot::Receiver<()>,
    output_sender: broadcast::Sender<OutputMessage>,
    mut command_receiver: mpsc::Receiver<Command>,
) {
    let mut sink = BroadcastSink(output_sender);

    while shutdown_receiver.try_recv().is_err() {
        while let Ok(command) = command_receiver.try_recv() {
            handle_command(&mut translator, command);
        }

        if let Err(e) = translator.poll(&mut adapter, &mut sink, Instant::now()) {
            warn!("Translator loop error: {}", e);
        }

        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}

/// Async wrapper around a [`Translator`]. Starts a background thread owning the translator and the adapter, and uses tokio channels to communicate with it.
pub struct AsyncTranslator {
    processing_handle: Option<std::thread::JoinHandle<()>>,
    output_receiver: broadcast::Receiver<OutputMessage>,
    command_sender: mpsc::Sender<Command>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl AsyncTranslator {
    pub fn new<T: CanAdapter + Send + 'static>(adapter: T, translator: Translator) -> Self {
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (output_sender, output_receiver) = broadcast::channel(OUTPUT_BUFFER_SIZE);

        let processing_handle = std::thread::spawn(move || {
            process(adapter, translator, shutdown_receiver, output_sender, command_receiver);
        });

        AsyncTranslator {
            processing_handle: Some(processing_handle),
            output_receiver,
            command_sender,
            shutdown: Some(shutdown_sender),
        }
    }

    async fn call<R>(&self, command: impl FnOnce(oneshot::Sender<Result<R>>) -> Command) -> Result<R> {
        let (reply_sender, reply_receiver) = oneshot::channel();
        self.command_sender
            .send(command(reply_sender))
            .await
            .map_err(|_| Error::Disconnected)?;
        reply_receiver.await.map_err(|_| Error::Disconnected)?
    }

    /// Register a diagnostic request, see [`crate::diagnostics::DiagnosticsManager::add_request`].
    pub async fn add_request(&self, bus: u8, request: DiagnosticRequest, options: RequestOptions) -> Result<RequestHandle> {
        self.call(|reply| Command::AddRequest {
            bus,
            request,
            options,
            reply,
        })
        .await
    }

    pub async fn cancel_request(&self, handle: RequestHandle) -> Result<()> {
        self.call(|reply| Command::CancelRequest { handle, reply }).await
    }

    /// Write a value to a signal. Resolves once the frame is queued, not when it is on the bus.
    pub async fn write_signal(&self, name: &str, value: SignalValue) -> Result<bool> {
        let name = name.to_string();
        self.call(|reply| Command::WriteSignal { name, value, reply }).await
    }

    /// Receive all output messages published after this call.
    pub fn recv(&self) -> impl Stream<Item = OutputMessage> + Unpin {
        let mut rx = self.output_receiver.resubscribe();

        Box::pin(stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        warn!("Output receiver lagged, skipped {} messages", count);
                        continue
                    }
                }
            }
        })
    }
}

impl Drop for AsyncTranslator {
    fn drop(&mut self) {
        if let Some(handle) = self.processing_handle.take() {
            // Send shutdown signal to background thread
            if let Some(shutdown) = self.shutdown.take() {
                let _ = shutdown.send(());
            }
            if handle.join().is_err() {
                warn!("Translator thread panicked");
            }
        }
    }
}
