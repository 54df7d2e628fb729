//! Shared plumbing for the local vision-language models: device selection,
//! weight download and the bounded blocking pool inference runs on.

use candle_core::Device;
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use crate::error::{RagError, RagResult};

/// Default number of concurrent inference calls per model
pub const DEFAULT_MAX_CONCURRENCY: usize = 2;

/// Where inference should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// CUDA when available, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device '{}', expected auto, cpu or cuda", other)),
        }
    }
}

impl DevicePreference {
    /// Resolve the preference to a concrete device.
    pub fn select(self) -> RagResult<Device> {
        let device = match self {
            Self::Cpu => Device::Cpu,
            Self::Cuda => Device::new_cuda(0)
                .map_err(|e| RagError::Config(format!("CUDA device unavailable: {}", e)))?,
            Self::Auto => Device::cuda_if_available(0)?,
        };

        info!(device = ?device, "Inference device selected");
        Ok(device)
    }
}

/// A model repository on the Hugging Face Hub pinned to a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    pub model_id: String,
    pub revision: String,
}

impl ModelSource {
    pub fn new(model_id: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: revision.into(),
        }
    }

    /// Download (or reuse from the local cache) one file of the repository.
    ///
    /// Blocking; call during startup or from a blocking task.
    pub fn fetch(&self, file: &str) -> RagResult<PathBuf> {
        let api = Api::new().map_err(|e| RagError::Config(format!("Hub client: {}", e)))?;
        let repo = api.repo(Repo::with_revision(
            self.model_id.clone(),
            RepoType::Model,
            self.revision.clone(),
        ));

        repo.get(file).map_err(|e| {
            RagError::Config(format!(
                "Failed to fetch {} from {}@{}: {}",
                file, self.model_id, self.revision, e
            ))
        })
    }
}

/// Runs CPU/GPU-bound work on tokio's blocking threads with a concurrency cap.
///
/// Callers beyond the cap wait for a permit.
#[derive(Debug, Clone)]
pub struct InferencePool {
    permits: Arc<Semaphore>,
}

impl InferencePool {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `work` on a blocking thread once a permit is free.
    pub async fn run<F, T>(&self, work: F) -> RagResult<T>
    where
        F: FnOnce() -> RagResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RagError::PipelineFailure("Inference pool closed".to_string()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await?
    }
}

impl Default for InferencePool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("CPU".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!("cuda".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
        assert_eq!("auto".parse::<DevicePreference>(), Ok(DevicePreference::Auto));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_cpu_device_selection() {
        assert!(DevicePreference::Cpu.select().unwrap().is_cpu());
    }

    #[tokio::test]
    async fn test_pool_returns_work_result() {
        let pool = InferencePool::new(1);
        let value = pool.run(|| Ok(21 * 2)).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_pool_propagates_work_error() {
        let pool = InferencePool::default();
        let err = pool
            .run(|| -> RagResult<()> { Err(RagError::CaptioningFailed("boom".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::CaptioningFailed(_)));
    }

    #[tokio::test]
    async fn test_pool_caps_concurrency() {
        let pool = InferencePool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let pool = pool.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    pool.run(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_pool_converts_panics() {
        let pool = InferencePool::new(1);
        let err = pool
            .run(|| -> RagResult<()> { panic!("model exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::PipelineFailure(_)));
        assert_eq!(pool.available_permits(), 1);
    }
}
