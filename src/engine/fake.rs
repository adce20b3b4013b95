//! Scriptable in-memory engine for detector and orchestrator tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::container::request::{CreateRequest, OneShotRequest};
use crate::engine::{ContainerEngine, ContainerInspect, ContainerState, EngineError, EngineOutput};

/// In-memory engine. Each field scripts one kind of response; `calls`
/// records every mutating call in order.
#[derive(Default)]
pub struct FakeEngine {
    pub sandbox_ls: Mutex<Option<Result<EngineOutput, EngineError>>>,
    pub containers: Mutex<BTreeMap<String, ContainerInspect>>,
    pub inspect_error: Mutex<Option<EngineError>>,
    pub uid_map: Mutex<Option<Result<String, EngineError>>>,
    pub probe_runtime: Mutex<Option<String>>,
    pub run_ephemeral_error: Mutex<Option<EngineError>>,
    pub volumes: Mutex<Vec<String>>,
    pub api_version: Mutex<Option<String>>,
    pub stop_error: Mutex<Option<EngineError>>,
    pub remove_error: Mutex<Option<EngineError>>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreateRequest>>,
    pub one_shots: Mutex<Vec<OneShotRequest>>,
    pub run_once_error: Mutex<Option<EngineError>>,
    next_id: Mutex<u32>,
}

impl FakeEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        *engine.api_version.lock().unwrap() = Some("1.45".to_string());
        *engine.sandbox_ls.lock().unwrap() = Some(Ok(EngineOutput {
            status: Some(0),
            stdout: "SANDBOX ID   TEMPLATE\n".to_string(),
            stderr: String::new(),
        }));
        engine
    }

    pub fn with_container(self, name: &str, state: ContainerState, labels: &[(&str, &str)], image: &str) -> Self {
        self.containers.lock().unwrap().insert(
            name.to_string(),
            ContainerInspect {
                id: format!("id-{}", name),
                state,
                labels: labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                image: image.to_string(),
                runtime: Some("runc".to_string()),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> String {
        let mut n = self.next_id.lock().unwrap();
        *n += 1;
        format!("probe-id-{}", *n)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn list_sandboxes(&self) -> Result<EngineOutput, EngineError> {
        self.sandbox_ls.lock().unwrap().take().unwrap_or_else(|| Ok(EngineOutput::default()))
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInspect>, EngineError> {
        if let Some(err) = self.inspect_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.containers.lock().unwrap().get(name).cloned())
    }

    async fn run_ephemeral(&self, name: &str, image: &str, _command: &[String]) -> Result<String, EngineError> {
        if let Some(err) = self.run_ephemeral_error.lock().unwrap().take() {
            return Err(err);
        }
        let id = self.next_id();
        self.record(format!("run_ephemeral {} {} -> {}", name, image, id));
        let runtime = self.probe_runtime.lock().unwrap().clone();
        self.containers.lock().unwrap().insert(
            id.clone(),
            ContainerInspect {
                id: id.clone(),
                state: ContainerState::Running,
                labels: BTreeMap::new(),
                image: image.to_string(),
                runtime,
            },
        );
        Ok(id)
    }

    async fn exec_capture(&self, id: &str, _command: &[String]) -> Result<String, EngineError> {
        self.record(format!("exec_capture {}", id));
        self.uid_map
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok("         0          0 4294967295\n".to_string()))
    }

    async fn create(&self, request: &CreateRequest) -> Result<String, EngineError> {
        self.record(format!("create {}", request.name));
        self.created.lock().unwrap().push(request.clone());
        self.containers.lock().unwrap().insert(
            request.name.clone(),
            ContainerInspect {
                id: format!("id-{}", request.name),
                state: ContainerState::Created,
                labels: request.labels.clone(),
                image: request.image.clone(),
                runtime: Some("runc".to_string()),
            },
        );
        Ok(format!("id-{}", request.name))
    }

    async fn run_once(&self, request: &OneShotRequest) -> Result<(), EngineError> {
        self.record(format!("run_once {}", request.command.join(" ")));
        if let Some(err) = self.run_once_error.lock().unwrap().take() {
            return Err(err);
        }
        self.one_shots.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn start_attached(&self, name: &str) -> Result<i32, EngineError> {
        self.record(format!("start_attached {}", name));
        Ok(0)
    }

    async fn exec_interactive(&self, name: &str, command: &[String]) -> Result<i32, EngineError> {
        self.record(format!("exec_interactive {} {}", name, command.join(" ")));
        Ok(0)
    }

    async fn stop(&self, name: &str) -> Result<(), EngineError> {
        self.record(format!("stop {}", name));
        if let Some(err) = self.stop_error.lock().unwrap().take() {
            return Err(err);
        }
        if let Some(c) = self.containers.lock().unwrap().get_mut(name) {
            c.state = ContainerState::Exited;
        }
        Ok(())
    }

    async fn remove(&self, id_or_name: &str, force: bool) -> Result<(), EngineError> {
        self.record(format!("remove {} force={}", id_or_name, force));
        if let Some(err) = self.remove_error.lock().unwrap().take() {
            return Err(err);
        }
        self.containers.lock().unwrap().remove(id_or_name);
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> Result<bool, EngineError> {
        Ok(self.volumes.lock().unwrap().iter().any(|v| v == name))
    }

    async fn volume_create(&self, name: &str, _labels: &BTreeMap<String, String>) -> Result<(), EngineError> {
        self.record(format!("volume_create {}", name));
        self.volumes.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn api_version(&self) -> Result<String, EngineError> {
        self.api_version.lock().unwrap().clone().ok_or_else(|| EngineError::Failed {
            op: "version".to_string(),
            code: 1,
            stderr: "unsupported".to_string(),
        })
    }
}
