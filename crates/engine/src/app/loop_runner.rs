use std::env;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, SceneManager};

pub const SLOW_TICK_ENV_VAR: &str = "SCENEZONE_SLOW_TICK_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_tick_ms: u64,
    pub max_display_fps: Option<u32>,
    /// Stop after this many scene ticks; `None` runs until the process is
    /// killed. Headless hosts and tests set a limit.
    pub tick_limit: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_tick_ms: 0,
            max_display_fps: None,
            tick_limit: None,
        }
    }
}

pub fn run_loop(config: LoopConfig, manager: &mut SceneManager) {
    run_loop_with_metrics(config, manager, MetricsHandle::default());
}

pub fn run_loop_with_metrics(
    config: LoopConfig,
    manager: &mut SceneManager,
    metrics_handle: MetricsHandle,
) {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let slow_tick_delay = resolve_slow_tick_delay(config.simulated_slow_tick_ms);
    let effective_display_cap = normalize_display_fps_cap(config.max_display_fps);
    let display_frame_target = target_frame_duration(effective_display_cap);

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_tick_delay_ms = slow_tick_delay.as_millis() as u64,
        display_fps_cap = %format_display_cap(effective_display_cap),
        tick_limit = ?config.tick_limit,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_display_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut ticks_total: u64 = 0;

    loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if slow_tick_delay > Duration::ZERO {
                // Explicit debug perturbation only; this is not the pacing sleep.
                thread::sleep(slow_tick_delay);
            }
            let tick_start = Instant::now();
            manager.tick();
            metrics_accumulator.record_tick(tick_start.elapsed());
            ticks_total = ticks_total.saturating_add(1);
            if reached_tick_limit(ticks_total, config.tick_limit) {
                break;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        // Single authoritative display pacing sleep point.
        let elapsed_since_display = Instant::now().saturating_duration_since(last_display_instant);
        let cap_sleep = compute_cap_sleep(elapsed_since_display, display_frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }

        manager.display();
        metrics_accumulator.record_display();
        last_display_instant = Instant::now();

        let zone_used = manager.scene_zone().map(|zone| zone.used()).unwrap_or(0);
        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now(), zone_used) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                dps = snapshot.dps,
                tick_time_ms = snapshot.tick_time_ms,
                scene_zone_used = snapshot.scene_zone_used,
                scene = ?manager.current_scene().map(|id| id.0),
                "loop_metrics"
            );
        }

        if reached_tick_limit(ticks_total, config.tick_limit) {
            info!(ticks_total, "tick_limit_reached");
            break;
        }

        // Headless: nothing wakes us up, so sleep until the next tick is due.
        let until_next_tick = fixed_dt.saturating_sub(accumulator);
        if until_next_tick > Duration::ZERO {
            thread::sleep(until_next_tick.min(fixed_dt));
        }
    }

    manager.shutdown();
    info!(ticks_total, "shutdown");
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        let dropped_backlog = accumulator;
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn reached_tick_limit(ticks_total: u64, tick_limit: Option<u64>) -> bool {
    tick_limit.map_or(false, |limit| ticks_total >= limit)
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_display_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_display_fps: Option<u32>) -> Option<Duration> {
    max_display_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_display_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_tick_delay(config_slow_tick_ms: u64) -> Duration {
    match env::var(SLOW_TICK_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_TICK_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-tick env var value; falling back to config"
                );
                Duration::from_millis(config_slow_tick_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_tick_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_TICK_ENV_VAR,
                error = %err,
                "unable to read slow-tick env var; falling back to config"
            );
            Duration::from_millis(config_slow_tick_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::super::scene::{Scene, SceneContext, SceneId};
    use super::*;

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn tick_limit_comparison_is_inclusive() {
        assert!(!reached_tick_limit(2, Some(3)));
        assert!(reached_tick_limit(3, Some(3)));
        assert!(reached_tick_limit(4, Some(3)));
        assert!(!reached_tick_limit(u64::MAX, None));
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(None), None);
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn compute_cap_sleep_positive_when_under_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60)));
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn normalize_display_fps_cap_disables_zero() {
        assert_eq!(normalize_display_fps_cap(Some(0)), None);
        assert_eq!(normalize_display_fps_cap(Some(60)), Some(60));
    }

    struct CountingScene {
        id: SceneId,
        ticks: Rc<RefCell<u32>>,
        destroys: Rc<RefCell<u32>>,
    }

    impl Scene for CountingScene {
        fn tick(&mut self, _ctx: &mut SceneContext<'_>) -> SceneId {
            *self.ticks.borrow_mut() += 1;
            self.id
        }

        fn destroy(&mut self, _ctx: &mut SceneContext<'_>) {
            *self.destroys.borrow_mut() += 1;
        }
    }

    #[test]
    fn loop_honors_tick_limit_and_shuts_the_manager_down() {
        let ticks = Rc::new(RefCell::new(0));
        let destroys = Rc::new(RefCell::new(0));
        let id = SceneId(0);
        let mut manager = SceneManager::new(None, Box::new(|_, _| {}));
        manager.register(
            id,
            Box::new(CountingScene {
                id,
                ticks: Rc::clone(&ticks),
                destroys: Rc::clone(&destroys),
            }),
        );
        manager.request_scene_change(id);

        let config = LoopConfig {
            target_tps: 1000,
            tick_limit: Some(3),
            ..LoopConfig::default()
        };
        run_loop(config, &mut manager);

        assert_eq!(*ticks.borrow(), 3);
        assert_eq!(*destroys.borrow(), 1);
        assert_eq!(manager.current_scene(), None);
    }
}
