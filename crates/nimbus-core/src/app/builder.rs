//! ExecutorBuilder - ワイヤリングと起動時検証
//!
//! 共有部品（設定, transport, clock, ID ソース, tokio runtime）を集めて
//! [`TaskExecutor`] を作る。検証は fail-fast: `expect_services` に渡した
//! サービスがすべて使えるエンドポイントに解決できないと `build` は失敗する。

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, info};

use super::config::{ConfigSnapshot, NimConfig};
use super::diagnostics::DiagnosticsSink;
use super::lifecycle::NimTask;
use super::registry::ServiceRegistry;
use super::worker::{DEFAULT_OUTPUT_FILE, TaskContext, render_output_name};
use crate::domain::params::OUTPUT_FILE_KEY;
use crate::domain::{NimError, Result, TaskSpec};
use crate::impls::ReqwestTransport;
use crate::ports::{Clock, IdGenerator, SystemClock, Transport, UlidGenerator};
use crate::services::{Service, ServiceContract};

/// ```ignore
/// let executor = ExecutorBuilder::new()
///     .config(NimConfig::from_json_file("nimbus.json")?)
///     .expect_services(&["rfdiffusion", "esmfold"])
///     .build()?;
/// let task = executor.create_task(spec)?;
/// ```
pub struct ExecutorBuilder {
    config: NimConfig,
    env_api_key: Option<Option<String>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    runtime: Option<Handle>,
    expected_services: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no usable endpoint for services: {0:?}")]
    MissingEndpoints(Vec<String>),

    #[error("no tokio runtime available; call build() inside a runtime or pass one with runtime()")]
    NoRuntime,

    /// デフォルトの HTTP クライアントを作れなかった
    #[error(transparent)]
    Client(#[from] NimError),
}

impl ExecutorBuilder {
    pub fn new() -> Self {
        Self {
            config: NimConfig::default(),
            env_api_key: None,
            transport: None,
            clock: Arc::new(SystemClock),
            id_generator: None,
            runtime: None,
            expected_services: None,
        }
    }

    pub fn config(mut self, config: NimConfig) -> Self {
        self.config = config;
        self
    }

    /// build 時に `NVIDIA_API_KEY` を読む代わりにこの値を使う
    pub fn env_api_key(mut self, key: Option<String>) -> Self {
        self.env_api_key = Some(key);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn expect_services(mut self, services: &[&str]) -> Self {
        self.expected_services = Some(services.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<TaskExecutor, BuildError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };

        let snapshot = match self.env_api_key {
            Some(key) => ConfigSnapshot::new(self.config, key),
            None => ConfigSnapshot::capture(self.config),
        };
        let registry = ServiceRegistry::new(snapshot);

        if let Some(expected) = &self.expected_services {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| registry.resolve_endpoint(name).is_err())
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingEndpoints(missing));
            }
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));

        Ok(TaskExecutor {
            registry: Arc::new(registry),
            transport,
            clock: self.clock,
            id_generator,
            runtime,
        })
    }
}

impl Default for ExecutorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// registry・transport・runtime を共有するタスクを作る
pub struct TaskExecutor {
    registry: Arc<ServiceRegistry>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    runtime: Handle,
}

impl TaskExecutor {
    pub fn config(&self) -> &NimConfig {
        &self.registry.snapshot().config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// `New` 状態のタスクを作る。`submit` まで何も書かない。
    pub fn create_task(&self, spec: TaskSpec) -> Result<NimTask> {
        let service_name = spec.params.service().ok_or_else(|| {
            NimError::Configuration("task parameters do not name a 'service'".to_string())
        })?;
        let service = Service::from_name(service_name);
        if service.is_generic() {
            debug!(service = %service, "no dedicated builder; forwarding parameters verbatim");
        }

        let task_id = self.id_generator.generate_task_id();
        let name = spec
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", service.name(), task_id));

        let config = self.config();
        let template = spec
            .params
            .str(OUTPUT_FILE_KEY)
            .or(spec.output_file.as_deref())
            .or(config.output_file.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_FILE);
        let rendered = render_output_name(template, &task_id, &name, service.name());
        let primary_output = spec.work_dir.join(contained(&rendered)?);

        let ctx = TaskContext {
            task_id,
            name,
            service,
            params: spec.params,
            primary_output,
            timeout: Duration::from_secs(config.timeout_secs),
            lenient_unprocessable: config.lenient_unprocessable,
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            sink: Arc::new(DiagnosticsSink::new(spec.work_dir, Arc::clone(&self.clock))),
        };
        info!(task_id = %ctx.task_id, service = %ctx.service, "task created");
        Ok(NimTask::new(ctx, self.runtime.clone(), config.abort_on_kill))
    }
}

/// 出力名は work dir からの相対パスで、work dir の外には出られない
fn contained(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.trim().is_empty() || escapes {
        return Err(NimError::Configuration(format!(
            "output file '{name}' must be a relative path inside the work directory"
        )));
    }
    Ok(path)
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
