//! In-memory stand-ins for the broker and the host, used by unit tests

use anyhow::Result;
use async_trait::async_trait;
use cluster_core::domain::heartbeat::HeartbeatRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

use crate::repository::{HeartbeatStore, JobQueue};
use crate::service::{ResourceMonitor, ResourceSample};

/// FIFO queue with a blocking pop
#[derive(Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<Vec<u8>>>,
    available: Notify,
    pops: AtomicUsize,
    pushes: AtomicUsize,
    fail_pops: AtomicBool,
    fail_pushes: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message as a producer would (not counted as a push)
    pub fn seed(&self, message: &str) {
        self.seed_bytes(message.as_bytes());
    }

    pub fn seed_bytes(&self, message: &[u8]) {
        self.items.lock().unwrap().push_back(message.to_vec());
        self.available.notify_one();
    }

    /// Removes and returns everything still queued
    pub fn drain(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap()
            .drain(..)
            .map(|m| String::from_utf8_lossy(&m).into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pops(&self) -> usize {
        self.pops.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    /// Makes every pop fail immediately (still counted)
    pub fn fail_pops(&self, fail: bool) {
        self.fail_pops.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.fail_pushes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn pop(&self) -> Result<Vec<u8>> {
        if self.fail_pops.load(Ordering::SeqCst) {
            self.pops.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("queue unavailable");
        }

        loop {
            let next = self.items.lock().unwrap().pop_front();
            if let Some(message) = next {
                self.pops.fetch_add(1, Ordering::SeqCst);
                return Ok(message);
            }
            self.available.notified().await;
        }
    }

    async fn push(&self, message: &[u8]) -> Result<()> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            anyhow::bail!("queue unavailable");
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.seed_bytes(message);
        Ok(())
    }
}

/// Heartbeat store that remembers every write
#[derive(Default)]
pub struct MemoryHeartbeatStore {
    current: Mutex<HashMap<String, HeartbeatRecord>>,
    writes: Mutex<Vec<HeartbeatRecord>>,
    clears: AtomicUsize,
}

impl MemoryHeartbeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, worker_name: &str) -> Option<HeartbeatRecord> {
        self.current.lock().unwrap().get(worker_name).cloned()
    }

    pub fn writes(&self) -> Vec<HeartbeatRecord> {
        self.writes.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeartbeatStore for MemoryHeartbeatStore {
    async fn write(&self, worker_name: &str, record: &HeartbeatRecord) -> Result<()> {
        self.current
            .lock()
            .unwrap()
            .insert(worker_name.to_string(), record.clone());
        self.writes.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn clear(&self, worker_name: &str) -> Result<()> {
        self.current.lock().unwrap().remove(worker_name);
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resource monitor returning a settable reading without waiting
pub struct FixedResourceMonitor {
    sample: Mutex<ResourceSample>,
    samples: AtomicUsize,
}

impl FixedResourceMonitor {
    pub fn new(cpu_percent: f32, available_mem_mb: f64) -> Self {
        Self {
            sample: Mutex::new(ResourceSample {
                cpu_percent,
                available_mem_mb,
            }),
            samples: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, cpu_percent: f32, available_mem_mb: f64) {
        *self.sample.lock().unwrap() = ResourceSample {
            cpu_percent,
            available_mem_mb,
        };
    }

    /// How many samples have been taken
    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceMonitor for FixedResourceMonitor {
    async fn sample(&self) -> ResourceSample {
        self.samples.fetch_add(1, Ordering::SeqCst);
        *self.sample.lock().unwrap()
    }
}
