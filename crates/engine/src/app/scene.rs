use std::collections::HashMap;

use tracing::{debug, warn};

use crate::memory::MemZone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u16);

/// Per-hook access to the scene zone.
///
/// Hooks never see the manager itself, so a scene cannot re-enter `tick` or
/// request a change mid-transition; the id returned from [`Scene::tick`] is
/// the only in-scene switch channel.
pub struct SceneContext<'a> {
    scene_zone: Option<&'a mut MemZone>,
}

impl<'a> SceneContext<'a> {
    /// Build a context directly when driving hooks outside a manager
    /// (scene unit tests, custom hosts).
    pub fn new(scene_zone: Option<&'a mut MemZone>) -> Self {
        Self { scene_zone }
    }

    /// The zone backing the current scene's allocations, absent when the
    /// manager was built without one.
    pub fn scene_zone(&mut self) -> Option<&mut MemZone> {
        self.scene_zone.as_deref_mut()
    }

    pub fn has_scene_zone(&self) -> bool {
        self.scene_zone.is_some()
    }
}

/// A scene's lifecycle hook set. `tick` is mandatory and drives scene
/// switching by returning the id the scene wants active next frame (its own
/// id to stay); the other hooks default to no-ops.
pub trait Scene {
    fn create(&mut self, ctx: &mut SceneContext<'_>) {
        let _ = ctx;
    }

    fn tick(&mut self, ctx: &mut SceneContext<'_>) -> SceneId;

    fn display(&mut self, ctx: &mut SceneContext<'_>) {
        let _ = ctx;
    }

    fn destroy(&mut self, ctx: &mut SceneContext<'_>) {
        let _ = ctx;
    }
}

/// Invoked on every transition with `(old, new)`; `old` is `None` for the
/// first transition out of the "no scene" state.
pub type TransitionHook = Box<dyn FnMut(Option<SceneId>, SceneId)>;

/// Sequences registered scenes and reclaims the scene zone exactly once per
/// transition.
pub struct SceneManager {
    scenes: HashMap<SceneId, Box<dyn Scene>>,
    scene_zone: Option<MemZone>,
    current: Option<SceneId>,
    next: Option<SceneId>,
    on_transition: TransitionHook,
}

impl SceneManager {
    pub fn new(scene_zone: Option<MemZone>, on_transition: TransitionHook) -> Self {
        Self {
            scenes: HashMap::new(),
            scene_zone,
            current: None,
            next: None,
            on_transition,
        }
    }

    /// Install the hook set for `id`. The set is swapped as one unit; a
    /// second registration under the same id replaces the first.
    pub fn register(&mut self, id: SceneId, scene: Box<dyn Scene>) {
        if self.scenes.insert(id, scene).is_some() {
            debug!(scene_id = id.0, "scene re-registered; previous hooks replaced");
        }
    }

    /// Record a pending switch. Takes effect at the start of the next
    /// [`SceneManager::tick`]; the last request before that tick wins.
    pub fn request_scene_change(&mut self, id: SceneId) {
        self.next = Some(id);
    }

    pub fn current_scene(&self) -> Option<SceneId> {
        self.current
    }

    pub fn requested_scene(&self) -> Option<SceneId> {
        self.next
    }

    pub fn scene_zone(&self) -> Option<&MemZone> {
        self.scene_zone.as_ref()
    }

    /// Advance one frame: complete a pending transition, then run the
    /// current scene's `tick` and store its returned id as the next request.
    ///
    /// Transition order is fixed: outgoing `destroy`, scene zone `free_all`
    /// (strictly after `destroy`, which may still read zone memory), the
    /// transition hook, then incoming `create`.
    pub fn tick(&mut self) {
        let Some(requested) = self.next else {
            debug_assert!(
                self.current.is_none(),
                "pending id cleared while a scene is active"
            );
            warn!("tick called before any scene was requested");
            return;
        };

        let mut target = requested;
        if Some(target) != self.current {
            if self.scenes.contains_key(&target) {
                self.run_transition(target);
            } else {
                warn!(
                    scene_id = target.0,
                    "requested scene is not registered; change cancelled"
                );
                self.next = self.current;
                match self.current {
                    Some(id) => target = id,
                    None => return,
                }
            }
        }

        let returned = {
            let scene = self
                .scenes
                .get_mut(&target)
                .expect("current scene is registered");
            let mut ctx = SceneContext::new(self.scene_zone.as_mut());
            scene.tick(&mut ctx)
        };
        self.next = Some(returned);
    }

    /// Passthrough to the current scene's `display`. No manager state
    /// changes; safe to call any number of times between ticks.
    pub fn display(&mut self) {
        let Some(current) = self.current else {
            return;
        };
        if let Some(scene) = self.scenes.get_mut(&current) {
            let mut ctx = SceneContext::new(self.scene_zone.as_mut());
            scene.display(&mut ctx);
        }
    }

    /// Tear down the active scene (destroy hook, then zone release) and
    /// clear the active state. Dropping the manager without calling this
    /// skips the destroy hook; process exit is allowed to be that abrupt.
    pub fn shutdown(&mut self) {
        if let Some(active) = self.current.take() {
            if let Some(scene) = self.scenes.get_mut(&active) {
                let mut ctx = SceneContext::new(self.scene_zone.as_mut());
                scene.destroy(&mut ctx);
            }
            if let Some(zone) = self.scene_zone.as_mut() {
                zone.free_all();
            }
        }
        self.next = None;
    }

    fn run_transition(&mut self, target: SceneId) {
        if let Some(outgoing) = self.current {
            if let Some(scene) = self.scenes.get_mut(&outgoing) {
                let mut ctx = SceneContext::new(self.scene_zone.as_mut());
                scene.destroy(&mut ctx);
            }
            if let Some(zone) = self.scene_zone.as_mut() {
                zone.free_all();
            }
        }

        (self.on_transition)(self.current, target);
        debug!(
            from = ?self.current.map(|id| id.0),
            to = target.0,
            "scene_transition"
        );
        self.current = Some(target);

        if let Some(scene) = self.scenes.get_mut(&target) {
            let mut ctx = SceneContext::new(self.scene_zone.as_mut());
            scene.create(&mut ctx);
        }
    }
}
