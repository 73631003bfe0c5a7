//! Scripted collaborators for bridge scenarios

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether_core::{
    BridgeConfig, ClientError, GameClient, GameEvent, GameHandle, IntentGate, PostHandle,
    SessionSink, StatusSnapshot, StatusSurface, SupervisorConfig, SurfaceError,
};

/// How the next connect call behaves
#[derive(Debug, Clone)]
pub enum ConnectPlan {
    Fail,
    Succeed,
    /// Succeed, but only after the given delay
    Stall(Duration),
}

/// Game client that follows a script of connect outcomes
///
/// Once the script is exhausted every connect succeeds.
pub struct ScriptedClient {
    plans: Mutex<VecDeque<ConnectPlan>>,
    auto_spawn: bool,
    calls: AtomicUsize,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    sinks: Mutex<Vec<SessionSink>>,
    chats: Arc<Mutex<Vec<String>>>,
    quits: Arc<AtomicUsize>,
}

impl ScriptedClient {
    pub fn new(plans: Vec<ConnectPlan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            auto_spawn: true,
            calls: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
            sinks: Mutex::new(Vec::new()),
            chats: Arc::new(Mutex::new(Vec::new())),
            quits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Do not log in and spawn automatically after a successful connect
    pub fn without_spawn(mut self) -> Self {
        self.auto_spawn = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }

    pub fn quits(&self) -> usize {
        self.quits.load(Ordering::SeqCst)
    }

    pub fn chats(&self) -> Vec<String> {
        self.chats.lock().unwrap().clone()
    }

    /// Sink handed to the most recent connect call
    pub fn last_sink(&self) -> SessionSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connect call yet")
    }
}

struct ScriptedHandle {
    chats: Arc<Mutex<Vec<String>>>,
    quits: Arc<AtomicUsize>,
}

#[async_trait]
impl GameHandle for ScriptedHandle {
    async fn chat(&self, text: &str) -> Result<(), ClientError> {
        self.chats.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn quit(&self) -> Result<(), ClientError> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl GameClient for ScriptedClient {
    async fn connect(&self, sink: SessionSink) -> Result<Box<dyn GameHandle>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink.clone());

        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectPlan::Succeed);

        let result = match plan {
            ConnectPlan::Fail => Err(ClientError::Connect("connection refused".to_string())),
            ConnectPlan::Succeed => Ok(()),
            ConnectPlan::Stall(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        result?;

        if self.auto_spawn {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                sink.emit(GameEvent::Login {
                    username: "Steve".to_string(),
                });
                sink.emit(GameEvent::Spawn);
            });
        }

        Ok(Box::new(ScriptedHandle {
            chats: self.chats.clone(),
            quits: self.quits.clone(),
        }))
    }
}

/// Status surface that remembers every published text
#[derive(Default)]
pub struct RecordingSurface {
    texts: Mutex<Vec<String>>,
    deleted: AtomicUsize,
    pub fail: AtomicBool,
    /// Never answer create or update calls
    pub stall: AtomicBool,
}

impl RecordingSurface {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }

    async fn record(&self, snapshot: &StatusSnapshot) -> Result<(), SurfaceError> {
        self.texts.lock().unwrap().push(snapshot.text.clone());
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SurfaceError::Request("surface offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusSurface for RecordingSurface {
    async fn create_post(&self, snapshot: &StatusSnapshot) -> Result<PostHandle, SurfaceError> {
        self.record(snapshot).await?;
        Ok(PostHandle::new("status-1"))
    }

    async fn update_post(
        &self,
        _post: &PostHandle,
        snapshot: &StatusSnapshot,
    ) -> Result<(), SurfaceError> {
        self.record(snapshot).await
    }

    async fn delete_post(&self, _post: &PostHandle) -> Result<(), SurfaceError> {
        self.deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn bridge_config(max_reconnect_attempts: u32) -> BridgeConfig {
    BridgeConfig {
        supervisor: SupervisorConfig {
            identity: "tether".to_string(),
            max_reconnect_attempts,
            base_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            surface_timeout: Duration::from_secs(2),
        },
        status_refresh: Duration::from_secs(30),
        max_message_len: 64,
    }
}

/// Poll the gate until the snapshot satisfies `condition`
pub async fn wait_for_status<F>(gate: &IntentGate, what: &str, condition: F) -> StatusSnapshot
where
    F: Fn(&StatusSnapshot) -> bool,
{
    for _ in 0..1000 {
        let snapshot = gate.snapshot().await.expect("bridge running");
        if condition(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

/// Poll until `condition` holds
pub async fn wait_until<F>(what: &str, condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}
