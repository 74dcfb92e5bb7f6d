//! The effect driver: one script run through its lifecycle phases.
//!
//! Cancellation is distinguished from failure: a canceled run surfaces as
//! [`EffectStatus::UpdateCanceled`], never as an error. Compilation and
//! loading failures (reported by the external script loader) map to their
//! own statuses; everything the script itself returns maps to
//! `ExecutionFailed`. Fatal outcomes retain the message and the accumulated
//! run log for display.

use std::sync::{Arc, Mutex};

use core_fusion::CommandFusionResult;

use crate::generator::GeneratorContext;
use crate::shared::SharedContextPool;

/// Lifecycle states of the driving effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectStatus {
    Initializing,
    Loading,
    Configuring,
    Updating,
    Ready,
    CompilationFailed,
    LoadingFailed,
    ExecutionFailed,
    UpdateCanceled,
}

impl EffectStatus {
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::CompilationFailed | Self::LoadingFailed | Self::ExecutionFailed
        )
    }
}

/// Script loader failures the runner classifies separately from execution
/// errors. Loaders return these through `anyhow` so the classification
/// survives the boundary.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("compilation failed: {0}")]
    Compilation(String),
    #[error("loading failed: {0}")]
    Loading(String),
}

/// One storyboard script. `shared_context_key` groups runs that observe the
/// same shared storyboard context; it defaults to the script identifier and
/// may be overridden to share across scripts.
pub trait Script: Send + Sync {
    /// Stable across reconfigurations of the same script.
    fn identifier(&self) -> &str;

    fn shared_context_key(&self) -> &str {
        self.identifier()
    }

    fn generate(&self, context: &Arc<GeneratorContext>) -> anyhow::Result<()>;
}

/// Point a run at the shared context its script's key selects: scripts with
/// identical keys observe the same layer set.
pub fn bind_shared_context(
    pool: &SharedContextPool,
    script: &dyn Script,
    context: &Arc<GeneratorContext>,
) {
    context.set_shared_context(Some(pool.context_for(script.shared_context_key())));
}

/// What one update produced: the final status, an error message for fatal
/// statuses, the drained run log, and the per-sprite fusion results of the
/// post-processing pass.
#[derive(Debug)]
pub struct EffectOutcome {
    pub status: EffectStatus,
    pub message: Option<String>,
    pub log: Vec<String>,
    pub fusion: Vec<CommandFusionResult>,
}

/// Drives scripts and exposes the last observed status.
pub struct EffectRunner {
    status: Mutex<EffectStatus>,
}

impl Default for EffectRunner {
    fn default() -> Self {
        Self {
            status: Mutex::new(EffectStatus::Initializing),
        }
    }
}

impl EffectRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> EffectStatus {
        *self.status.lock().expect("effect status lock poisoned")
    }

    fn set_status(&self, status: EffectStatus) {
        tracing::debug!(target: "effect.runner", ?status, "status_changed");
        *self.status.lock().expect("effect status lock poisoned") = status;
    }

    /// Run one update: loader result in, outcome out. The cancel token is
    /// checked before each major phase (configuration, generation, and each
    /// layer's post-processing); generation runs under the ambient binding.
    pub fn update(
        &self,
        script: anyhow::Result<&dyn Script>,
        context: &Arc<GeneratorContext>,
    ) -> EffectOutcome {
        self.set_status(EffectStatus::Loading);
        let script = match script {
            Ok(script) => script,
            Err(error) => return self.failed(context, error),
        };
        let cancel = context.cancel_token();

        if cancel.is_canceled() {
            return self.canceled(context);
        }
        self.set_status(EffectStatus::Configuring);

        if cancel.is_canceled() {
            return self.canceled(context);
        }
        self.set_status(EffectStatus::Updating);
        let generated = {
            let _scope = context.clone().activate();
            script.generate(context)
        };
        if let Err(error) = generated {
            if cancel.is_canceled() {
                return self.canceled(context);
            }
            return self.failed(context, error);
        }
        if cancel.is_canceled() {
            return self.canceled(context);
        }

        let mut fusion = Vec::new();
        for layer in context.accessed_layers() {
            if cancel.is_canceled() {
                return self.canceled(context);
            }
            fusion.extend(layer.post_process());
        }
        let fused_sprites = fusion.iter().filter(|f| f.has_fusion()).count();
        tracing::info!(
            target: "effect.runner",
            script = script.identifier(),
            sprites = fusion.len(),
            fused_sprites,
            "update_complete"
        );
        self.set_status(EffectStatus::Ready);
        EffectOutcome {
            status: EffectStatus::Ready,
            message: None,
            log: context.take_log(),
            fusion,
        }
    }

    fn canceled(&self, context: &Arc<GeneratorContext>) -> EffectOutcome {
        self.set_status(EffectStatus::UpdateCanceled);
        EffectOutcome {
            status: EffectStatus::UpdateCanceled,
            message: None,
            log: context.take_log(),
            fusion: Vec::new(),
        }
    }

    fn failed(&self, context: &Arc<GeneratorContext>, error: anyhow::Error) -> EffectOutcome {
        let status = match error.downcast_ref::<ScriptError>() {
            Some(ScriptError::Compilation(_)) => EffectStatus::CompilationFailed,
            Some(ScriptError::Loading(_)) => EffectStatus::LoadingFailed,
            None => EffectStatus::ExecutionFailed,
        };
        tracing::warn!(target: "effect.runner", ?status, error = %error, "update_failed");
        self.set_status(status);
        EffectOutcome {
            status,
            message: Some(format!("{error:#}")),
            log: context.take_log(),
            fusion: Vec::new(),
        }
    }
}
