pub mod app;
pub mod geom;
pub mod memory;

pub use app::{
    run_loop, run_loop_with_metrics, LoopConfig, LoopMetricsSnapshot, MetricsHandle, Scene,
    SceneContext, SceneId, SceneManager, TransitionHook, SLOW_TICK_ENV_VAR,
};
pub use geom::{Position, PositionInt, RangeF32, Size};
pub use memory::{MemZone, OomPolicy, ZoneError, ZoneHandle, ZONE_ALIGN};
