use std::sync::mpsc;
use std::thread;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::messages::{GenerationRequest, GenerationResponse};

type Reply = Result<GenerationResponse, EngineError>;

/// an [`Engine`] on its own named thread, so long generation steps never block
/// the caller's thread. one request in flight at a time.
pub struct EngineWorker {
    request_tx: Option<mpsc::Sender<GenerationRequest>>,
    reply_rx: mpsc::Receiver<Reply>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EngineWorker {
    /// start the worker thread; `seed` makes the run reproducible
    pub fn spawn(seed: Option<u64>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<GenerationRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<Reply>();

        let handle = thread::Builder::new().name("engine".to_owned()).spawn(move || {
            let mut engine = match seed {
                Some(seed) => Engine::with_seed(seed),
                None => Engine::new(),
            };
            // runs until the sending side is dropped
            for request in request_rx {
                profiling::scope!("engine_thread_step");
                let reply = engine.step(request);
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
            log::debug!("engine worker stopped");
        })?;

        Ok(Self {
            request_tx: Some(request_tx),
            reply_rx,
            handle: Some(handle),
        })
    }

    /// send one request and block until its response arrives
    pub fn run_step(&self, request: GenerationRequest) -> Result<GenerationResponse, EngineError> {
        let tx = self.request_tx.as_ref().ok_or(EngineError::WorkerDisconnected)?;
        tx.send(request).map_err(|_| EngineError::WorkerDisconnected)?;
        self.reply_rx.recv().map_err(|_| EngineError::WorkerDisconnected)?
    }

    /// close the request channel and wait for the thread to finish
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("engine worker panicked");
            }
        }
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
