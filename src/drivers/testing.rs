//! A scripted in-memory driver for tests.

use crate::config::DriverConfig;
use crate::core::{Driver, DriverError, NativePayload};
use crate::drivers::registry::RegistryError;
use async_trait::async_trait;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

/// What a `ScriptedDriver` does when asked to notify.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return `Ok(status)`.
    Deliver(bool),
    /// Raise an explained error with this message.
    Explain(String),
    /// Raise an unexpected error with this message.
    Fail(String),
    /// Panic inside `notify`.
    Panic,
    /// Never return.
    Hang,
}

/// A driver whose behaviour is fixed by a `Script`, recording every call.
///
/// The same instance is handed out by `constructor()`, so tests can observe
/// how often the registry constructed it and what it was asked to deliver.
#[derive(Debug)]
pub struct ScriptedDriver {
    name: String,
    script: Mutex<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    constructions: AtomicUsize,
    payloads: Mutex<Vec<NativePayload>>,
}

impl ScriptedDriver {
    pub fn new(name: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            constructions: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    pub fn delivering(name: &str, status: bool) -> Arc<Self> {
        Self::new(name, Script::Deliver(status))
    }

    pub fn explaining(name: &str, message: &str) -> Arc<Self> {
        Self::new(name, Script::Explain(message.to_string()))
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Self::new(name, Script::Fail(message.to_string()))
    }

    /// A driver that sleeps for `delay` before following its script.
    pub fn delayed(name: &str, script: Script, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            constructions: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    /// A registry constructor returning this very instance.
    pub fn constructor(
        self: &Arc<Self>,
    ) -> impl Fn(&DriverConfig) -> Result<Arc<dyn Driver>, RegistryError> + Send + Sync + 'static
    {
        let driver = Arc::clone(self);
        move |_config: &DriverConfig| {
            driver.constructions.fetch_add(1, Ordering::SeqCst);
            Ok(driver.clone() as Arc<dyn Driver>)
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<NativePayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, payload: &NativePayload) -> Result<bool, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Deliver(status) => Ok(status),
            Script::Explain(message) => Err(DriverError::Explained(message)),
            Script::Fail(message) => Err(DriverError::Unexpected(anyhow::anyhow!(message))),
            Script::Panic => panic!("scripted driver '{}' panicked", self.name),
            Script::Hang => {
                std::future::pending::<()>().await;
                Ok(false)
            }
        }
    }
}
