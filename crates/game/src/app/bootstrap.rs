use scenezone::{
    LoopConfig, MemZone, OomPolicy, SceneId, SceneManager, TransitionHook, ZoneError, ZoneHandle,
};
use thiserror::Error;
use tracing::{info, warn};

use super::config::{load_config, ConfigError, GameConfig};
use super::scenes::{FieldScene, TitleScene, FIELD_SCENE, TITLE_SCENE};

const SESSION_BLOCK_BYTES: usize = 8;

pub(crate) struct AppWiring {
    pub(crate) loop_config: LoopConfig,
    pub(crate) manager: SceneManager,
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to reserve the session block in the global zone: {0}")]
    GlobalZone(#[from] ZoneError),
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    let config = load_config()?;
    info!(
        target_tps = config.target_tps,
        global_zone_kib = config.global_zone_kib,
        scene_zone_kib = config.scene_zone_kib,
        tick_limit = ?config.tick_limit,
        "sandbox_config"
    );

    // Long-lived allocations come out of the global zone before the manager
    // exists; running out of memory here is fatal to startup.
    let mut global_zone =
        MemZone::new(vec![0u8; config.global_zone_kib * 1024].into_boxed_slice());
    let session = global_zone.alloc(SESSION_BLOCK_BYTES)?;
    global_zone.bytes_mut(session).fill(0);

    let scene_zone = MemZone::with_policy(
        vec![0u8; config.scene_zone_kib * 1024].into_boxed_slice(),
        OomPolicy::Recover,
    );

    let mut manager = SceneManager::new(Some(scene_zone), session_hook(global_zone, session));
    manager.register(
        TITLE_SCENE,
        Box::new(TitleScene::new(config.title_hold_ticks)),
    );
    manager.register(
        FIELD_SCENE,
        Box::new(FieldScene::new(
            config.field_width,
            config.field_height,
            config.field_linger_ticks,
            config.rng_seed,
        )),
    );
    manager.request_scene_change(resolve_start_scene(&config));

    let loop_config = LoopConfig {
        target_tps: config.target_tps,
        max_ticks_per_frame: config.max_ticks_per_frame,
        tick_limit: config.tick_limit,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        loop_config,
        manager,
    })
}

/// Transition hook owning the global zone: bumps the session's transition
/// counter and logs every scene change.
fn session_hook(mut global_zone: MemZone, session: ZoneHandle) -> TransitionHook {
    Box::new(move |old, new| {
        let block = global_zone.bytes_mut(session);
        let count = u64::from_le_bytes(block[..8].try_into().expect("8-byte session block")) + 1;
        block[..8].copy_from_slice(&count.to_le_bytes());
        info!(
            from = ?old.map(|id| id.0),
            to = new.0,
            transitions = count,
            "scene_changed"
        );
    })
}

fn resolve_start_scene(config: &GameConfig) -> SceneId {
    match SceneId(config.start_scene) {
        TITLE_SCENE => TITLE_SCENE,
        FIELD_SCENE => FIELD_SCENE,
        other => {
            warn!(scene_id = other.0, "unknown start scene; using title");
            TITLE_SCENE
        }
    }
}
