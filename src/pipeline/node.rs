//! Core node abstraction and runner for the streaming pipeline.

use crate::pipeline::error::{ErrorReporter, NodeError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Channel payload connecting two adjacent nodes: a regular item or the
/// stop sentinel that asks the receiving node to terminate.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal<T> {
    Item(T),
    Stop,
}

/// Loop control returned by [`Node::consume`] and [`Node::generate`].
///
/// `Stop` is the self-stop used by finite producers (a file source at EOF);
/// everything else keeps running until an external stop arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Handle a node uses to push items onto its output channel.
///
/// The channel is unbounded, so emitting never blocks. A node with no
/// downstream connection keeps a private output channel; items it emits are
/// simply retained there.
pub struct Emitter<T> {
    tx: Sender<Signal<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Emitter<T> {
    pub(crate) fn new(tx: Sender<Signal<T>>) -> Self {
        Self { tx }
    }

    /// Pushes an item downstream. A disconnected downstream is ignored —
    /// the node will observe the shutdown through its own stop sentinel.
    pub fn emit(&self, item: T) {
        let _ = self.tx.send(Signal::Item(item));
    }
}

/// A processing node in the streaming pipeline.
///
/// Each node runs in its own thread and is connected to its neighbors by
/// channels. The four lifecycle hooks default to no-ops: producers override
/// `generate`, consumers override `consume`, and nodes holding resources
/// override `enter`/`exit`.
///
/// Ordering guarantee: within one node, `enter` happens-before any
/// `consume`/`generate`, and `exit` happens-after the last one, on every
/// loop-exit path. Across nodes there is no ordering beyond per-edge FIFO.
pub trait Node: Send + 'static {
    /// The input type this node receives. Producers use `()`.
    type Input: Send + 'static;
    /// The output type this node produces. Terminal consumers use `()`.
    type Output: Send + 'static;

    /// Returns the name of this node for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once before the loop starts. Open resources here.
    ///
    /// A failure is fatal: it is reported, `exit` still runs, and the node
    /// thread ends without processing any items.
    fn enter(&mut self, _out: &Emitter<Self::Output>) -> Result<(), NodeError> {
        Ok(())
    }

    /// Processes a single input item.
    fn consume(
        &mut self,
        _item: Self::Input,
        _out: &Emitter<Self::Output>,
    ) -> Result<Flow, NodeError> {
        Ok(Flow::Continue)
    }

    /// Called every loop iteration, whether or not an item was consumed,
    /// so a node can emit output even absent new input.
    fn generate(&mut self, _out: &Emitter<Self::Output>) -> Result<Flow, NodeError> {
        Ok(Flow::Continue)
    }

    /// Called once when the node is shutting down.
    fn exit(&mut self) {}
}

/// Runs a node in a dedicated thread.
pub struct NodeRunner {
    /// Handle to the spawned thread.
    handle: Option<JoinHandle<()>>,
    /// Name of the node (cached for error reporting).
    node_name: &'static str,
}

impl NodeRunner {
    /// Spawns a new node in a dedicated thread.
    ///
    /// `poll` is how long the loop waits on the input channel before calling
    /// `generate`; it replaces the busy-poll of naive step loops with a
    /// blocking timed wait.
    pub fn spawn<N: Node>(
        mut node: N,
        input_rx: Receiver<Signal<N::Input>>,
        output_tx: Sender<Signal<N::Output>>,
        error_reporter: Arc<dyn ErrorReporter>,
        poll: Duration,
    ) -> Self {
        let node_name = node.name();

        let handle = thread::spawn(move || {
            run_node(&mut node, input_rx, output_tx, error_reporter, poll);
        });

        Self {
            handle: Some(handle),
            node_name,
        }
    }

    /// Waits for the node thread to complete.
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| format!("Node '{}' thread panicked", self.node_name))
        } else {
            Ok(())
        }
    }

    /// Returns true once the node thread has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Returns the name of the node.
    pub fn name(&self) -> &'static str {
        self.node_name
    }
}

/// Main processing loop for a node.
///
/// The stop sentinel takes effect at the top of an iteration: an in-progress
/// `consume`/`generate` call always completes first. Items queued ahead of
/// the sentinel are consumed before it in FIFO order.
fn run_node<N: Node>(
    node: &mut N,
    input_rx: Receiver<Signal<N::Input>>,
    output_tx: Sender<Signal<N::Output>>,
    error_reporter: Arc<dyn ErrorReporter>,
    poll: Duration,
) {
    let node_name = node.name();
    let out = Emitter::new(output_tx);

    if let Err(e) = node.enter(&out) {
        error_reporter.report(node_name, &e);
        node.exit();
        return;
    }

    // Recoverable errors are reported and the loop keeps going; fatal
    // errors and self-stops end it.
    let handle = |result: Result<Flow, NodeError>| match result {
        Ok(flow) => flow,
        Err(e) => {
            error_reporter.report(node_name, &e);
            if e.is_fatal() { Flow::Stop } else { Flow::Continue }
        }
    };

    loop {
        match input_rx.recv_timeout(poll) {
            Ok(Signal::Stop) => break,
            Ok(Signal::Item(item)) => {
                if handle(node.consume(item, &out)) == Flow::Stop {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if handle(node.generate(&out)) == Flow::Stop {
            break;
        }
    }

    node.exit();
}
