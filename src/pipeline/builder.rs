//! Pipeline assembly: connect nodes into a linear chain, start their
//! threads, and stop them again.

use crate::defaults;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::node::{Node, NodeRunner, Signal};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type SpawnFn = Box<dyn FnOnce(Arc<dyn ErrorReporter>, Duration) -> NodeRunner + Send>;
type StopFn = Box<dyn Fn() + Send + Sync>;

/// Entry point for assembling a pipeline.
///
/// Connection is typed: each `then` rebinds the upstream node's output to
/// the downstream node's input channel, so adjacent item types must match
/// at compile time. Nothing runs until `start`.
pub struct Pipeline;

impl Pipeline {
    /// Starts a chain with a producer node (no meaningful input).
    ///
    /// The producer still gets an input channel — that is how its stop
    /// sentinel is delivered.
    pub fn source<N>(node: N) -> PipelineBuilder<N::Output>
    where
        N: Node<Input = ()>,
    {
        let (head_tx, head_rx) = unbounded::<Signal<()>>();
        let (out_tx, out_rx) = unbounded::<Signal<N::Output>>();

        let stop_tx = head_tx;
        let node_out = out_tx.clone();
        let spawn: SpawnFn = Box::new(move |reporter, poll| {
            NodeRunner::spawn(node, head_rx, node_out, reporter, poll)
        });

        PipelineBuilder {
            spawns: vec![spawn],
            stops: vec![Box::new(move || {
                let _ = stop_tx.send(Signal::Stop);
            })],
            tail_tx: out_tx,
            tail_rx: out_rx,
            reporter: Arc::new(LogReporter),
            poll: defaults::NODE_POLL,
        }
    }
}

/// A partially-assembled pipeline whose current tail emits items of type `T`.
pub struct PipelineBuilder<T: Send + 'static> {
    spawns: Vec<SpawnFn>,
    stops: Vec<StopFn>,
    tail_tx: Sender<Signal<T>>,
    tail_rx: Receiver<Signal<T>>,
    reporter: Arc<dyn ErrorReporter>,
    poll: Duration,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Connects the next node: the current tail's output channel becomes
    /// this node's input channel.
    pub fn then<N>(mut self, node: N) -> PipelineBuilder<N::Output>
    where
        N: Node<Input = T>,
    {
        let (out_tx, out_rx) = unbounded::<Signal<N::Output>>();
        let input_rx = self.tail_rx;
        let stop_tx = self.tail_tx;

        self.stops.push(Box::new(move || {
            let _ = stop_tx.send(Signal::Stop);
        }));

        let node_out = out_tx.clone();
        self.spawns.push(Box::new(move |reporter, poll| {
            NodeRunner::spawn(node, input_rx, node_out, reporter, poll)
        }));

        PipelineBuilder {
            spawns: self.spawns,
            stops: self.stops,
            tail_tx: out_tx,
            tail_rx: out_rx,
            reporter: self.reporter,
            poll: self.poll,
        }
    }

    /// Sets a custom error reporter for every node in the chain.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets how long idle nodes wait on their input channel per iteration.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Launches every node thread. The tail node's output channel is
    /// dropped; use [`start_with_tail`](Self::start_with_tail) to read it.
    pub fn start(self) -> PipelineHandle {
        self.start_with_tail().0
    }

    /// Launches every node thread and hands back the tail node's output
    /// receiver, for drivers that consume results directly instead of
    /// attaching a terminal sink node.
    pub fn start_with_tail(self) -> (PipelineHandle, Receiver<Signal<T>>) {
        let reporter = self.reporter;
        let poll = self.poll;
        let runners = self
            .spawns
            .into_iter()
            .map(|spawn| spawn(reporter.clone(), poll))
            .collect();

        (
            PipelineHandle {
                runners,
                stops: self.stops,
            },
            self.tail_rx,
        )
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    runners: Vec<NodeRunner>,
    stops: Vec<StopFn>,
}

impl PipelineHandle {
    /// Enqueues one stop sentinel onto each node's input channel.
    ///
    /// Fire-and-forget: does not wait for threads to finish. Idempotent —
    /// stopping an already-stopped pipeline is a no-op. Callers that need
    /// completion must call [`join`](Self::join).
    pub fn stop(&self) {
        for stop in &self.stops {
            stop();
        }
    }

    /// Waits up to `timeout` for every node thread to finish, joining
    /// completed ones to detect panics. After the deadline, remaining
    /// threads are detached — they die with the process.
    pub fn join(mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let poll_interval = Duration::from_millis(20);

        loop {
            let mut remaining = Vec::new();
            for runner in self.runners.drain(..) {
                if runner.is_finished() {
                    if let Err(msg) = runner.join() {
                        eprintln!("voxline: {msg}");
                    }
                } else {
                    remaining.push(runner);
                }
            }
            self.runners = remaining;

            if self.runners.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                eprintln!(
                    "voxline: shutdown timeout — {} node(s) still running, detaching",
                    self.runners.len()
                );
                break;
            }

            thread::sleep(poll_interval);
        }
    }

    /// `stop` followed by `join`.
    pub fn shutdown(self, timeout: Duration) {
        self.stop();
        self.join(timeout);
    }

    /// Returns true once every node thread has ended.
    pub fn is_finished(&self) -> bool {
        self.runners.iter().all(NodeRunner::is_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::NodeError;
    use crate::pipeline::node::{Emitter, Flow};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEST_POLL: Duration = Duration::from_millis(1);
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    struct ListProducer {
        items: Vec<i32>,
        exit_count: Arc<AtomicUsize>,
    }

    impl Node for ListProducer {
        type Input = ();
        type Output = i32;

        fn name(&self) -> &'static str {
            "list-producer"
        }

        fn generate(&mut self, out: &Emitter<i32>) -> Result<Flow, NodeError> {
            if self.items.is_empty() {
                return Ok(Flow::Stop);
            }
            out.emit(self.items.remove(0));
            Ok(Flow::Continue)
        }

        fn exit(&mut self) {
            self.exit_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct AddTen {
        exit_count: Arc<AtomicUsize>,
    }

    impl Node for AddTen {
        type Input = i32;
        type Output = i32;

        fn name(&self) -> &'static str {
            "add-ten"
        }

        fn consume(&mut self, item: i32, out: &Emitter<i32>) -> Result<Flow, NodeError> {
            out.emit(item + 10);
            Ok(Flow::Continue)
        }

        fn exit(&mut self) {
            self.exit_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Collector {
        collected: Arc<Mutex<Vec<i32>>>,
        exit_count: Arc<AtomicUsize>,
    }

    impl Node for Collector {
        type Input = i32;
        type Output = ();

        fn name(&self) -> &'static str {
            "collector"
        }

        fn consume(&mut self, item: i32, _out: &Emitter<()>) -> Result<Flow, NodeError> {
            self.collected.lock().unwrap().push(item);
            Ok(Flow::Continue)
        }

        fn exit(&mut self) {
            self.exit_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_for<F: Fn() -> bool>(condition: F) {
        let deadline = Instant::now() + TEST_TIMEOUT;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within timeout");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_three_node_chain_preserves_order() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let exits = Arc::new(AtomicUsize::new(0));

        let handle = Pipeline::source(ListProducer {
            items: vec![1, 2, 3],
            exit_count: exits.clone(),
        })
        .then(AddTen {
            exit_count: exits.clone(),
        })
        .then(Collector {
            collected: collected.clone(),
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start();

        wait_for(|| collected.lock().unwrap().len() == 3);
        handle.shutdown(TEST_TIMEOUT);

        assert_eq!(*collected.lock().unwrap(), vec![11, 12, 13]);
        assert_eq!(exits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stop_runs_every_exit_exactly_once() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let exits = Arc::new(AtomicUsize::new(0));

        // Producer with a large backlog: stopping mid-stream must still run
        // every node's exit exactly once, however many items are queued.
        let handle = Pipeline::source(ListProducer {
            items: (0..10_000).collect(),
            exit_count: exits.clone(),
        })
        .then(AddTen {
            exit_count: exits.clone(),
        })
        .then(Collector {
            collected: collected.clone(),
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start();

        handle.stop();
        handle.join(TEST_TIMEOUT);

        assert_eq!(exits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_double_stop_is_idempotent() {
        let exits = Arc::new(AtomicUsize::new(0));

        let handle = Pipeline::source(ListProducer {
            items: vec![1],
            exit_count: exits.clone(),
        })
        .then(Collector {
            collected: Arc::new(Mutex::new(Vec::new())),
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start();

        handle.stop();
        handle.stop();
        handle.join(TEST_TIMEOUT);

        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_start_with_tail_exposes_results() {
        let exits = Arc::new(AtomicUsize::new(0));

        let (handle, tail_rx) = Pipeline::source(ListProducer {
            items: vec![5, 6],
            exit_count: exits.clone(),
        })
        .then(AddTen {
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start_with_tail();

        let first = tail_rx.recv_timeout(TEST_TIMEOUT).unwrap();
        let second = tail_rx.recv_timeout(TEST_TIMEOUT).unwrap();
        assert_eq!(first, Signal::Item(15));
        assert_eq!(second, Signal::Item(16));

        handle.shutdown(TEST_TIMEOUT);
        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_finite_source_completes_pipeline_after_stop() {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let exits = Arc::new(AtomicUsize::new(0));

        let handle = Pipeline::source(ListProducer {
            items: vec![7],
            exit_count: exits.clone(),
        })
        .then(Collector {
            collected: collected.clone(),
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start();

        // Source self-stops at EOF; downstream keeps running until stopped.
        wait_for(|| collected.lock().unwrap().len() == 1);
        handle.shutdown(TEST_TIMEOUT);

        assert_eq!(*collected.lock().unwrap(), vec![7]);
        assert_eq!(exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_is_finished_after_shutdown_of_finite_chain() {
        let exits = Arc::new(AtomicUsize::new(0));

        let handle = Pipeline::source(ListProducer {
            items: vec![],
            exit_count: exits.clone(),
        })
        .with_poll_interval(TEST_POLL)
        .start();

        wait_for(|| handle.is_finished());
        handle.join(TEST_TIMEOUT);
    }
}
