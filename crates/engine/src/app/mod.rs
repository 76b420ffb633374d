mod loop_runner;
mod metrics;
mod scene;

pub use loop_runner::{run_loop, run_loop_with_metrics, LoopConfig, SLOW_TICK_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{Scene, SceneContext, SceneId, SceneManager, TransitionHook};
