#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use taskchain::chain::{ChainListener, Node, NodeHandle};

type RunHook = Box<dyn Fn(&NodeHandle) + Send + Sync>;
type Hook = Box<dyn Fn() + Send + Sync>;

/// Shared, ordered record of callback events.
///
/// Events look like `"1.run"`, `"1.cancel"`, `"1.finish"`, `"chain.start"`,
/// `"chain.finish"`.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Events that start with `prefix.`.
    pub fn events_for(&self, prefix: &str) -> Vec<String> {
        let wanted = format!("{prefix}.");
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(&wanted))
            .collect()
    }
}

/// Node that records its callbacks into an [`EventLog`].
///
/// By default it advances right after recording `run` (and running the
/// `on_run` hook). `manual()` turns that off; the test then advances through
/// `ChainNode::handle()`.
pub struct RecordingNode {
    prefix: String,
    log: EventLog,
    auto_advance: bool,
    on_run: Option<RunHook>,
    on_cancel: Option<Hook>,
    on_finish: Option<Hook>,
}

impl RecordingNode {
    pub fn new(prefix: &str, log: &EventLog) -> Self {
        Self {
            prefix: prefix.to_string(),
            log: log.clone(),
            auto_advance: true,
            on_run: None,
            on_cancel: None,
            on_finish: None,
        }
    }

    pub fn manual(mut self) -> Self {
        self.auto_advance = false;
        self
    }

    pub fn on_run(mut self, hook: impl Fn(&NodeHandle) + Send + Sync + 'static) -> Self {
        self.on_run = Some(Box::new(hook));
        self
    }

    pub fn on_cancel(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Box::new(hook));
        self
    }

    pub fn on_finish(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Box::new(hook));
        self
    }
}

impl Node for RecordingNode {
    fn on_run(&self, handle: NodeHandle) {
        self.log.push(format!("{}.run", self.prefix));
        if let Some(hook) = &self.on_run {
            hook(&handle);
        }
        if self.auto_advance {
            handle.advance().expect("advance from on_run");
        }
    }

    fn on_cancel(&self) {
        self.log.push(format!("{}.cancel", self.prefix));
        if let Some(hook) = &self.on_cancel {
            hook();
        }
    }

    fn on_finish(&self) {
        self.log.push(format!("{}.finish", self.prefix));
        if let Some(hook) = &self.on_finish {
            hook();
        }
    }

    fn name(&self) -> &str {
        &self.prefix
    }
}

/// Chain listener that records `chain.start` / `chain.finish`.
pub struct RecordingListener {
    log: EventLog,
    on_start: Option<Hook>,
}

impl RecordingListener {
    pub fn new(log: &EventLog) -> Self {
        Self {
            log: log.clone(),
            on_start: None,
        }
    }

    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(hook));
        self
    }
}

impl ChainListener for RecordingListener {
    fn on_start(&self) {
        self.log.push("chain.start");
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    fn on_finish(&self) {
        self.log.push("chain.finish");
    }
}
