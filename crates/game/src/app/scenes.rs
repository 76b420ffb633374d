use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scenezone::{PositionInt, RangeF32, Scene, SceneContext, SceneId, ZoneHandle};
use tracing::{info, trace, warn};

pub(crate) const TITLE_SCENE: SceneId = SceneId(0);
pub(crate) const FIELD_SCENE: SceneId = SceneId(1);

const FADE_STEPS: usize = 32;
const IGNITED_CELL: u8 = 255;

/// Holds on a fade ramp for a fixed number of ticks, then hands off to the
/// field scene.
pub(crate) struct TitleScene {
    hold_ticks: u64,
    ticks_run: u64,
    fade: Option<ZoneHandle>,
}

impl TitleScene {
    pub(crate) fn new(hold_ticks: u64) -> Self {
        Self {
            hold_ticks: hold_ticks.max(1),
            ticks_run: 0,
            fade: None,
        }
    }
}

impl Scene for TitleScene {
    fn create(&mut self, ctx: &mut SceneContext<'_>) {
        self.ticks_run = 0;
        self.fade = None;
        let Some(zone) = ctx.scene_zone() else {
            return;
        };
        match zone.alloc(FADE_STEPS) {
            Ok(handle) => {
                let ramp = zone.bytes_mut(handle);
                for (step, value) in ramp.iter_mut().enumerate() {
                    *value = (step * 255 / (FADE_STEPS - 1)) as u8;
                }
                self.fade = Some(handle);
                info!(zone_used = zone.used(), "title_created");
            }
            Err(err) => {
                warn!(error = %err, "fade ramp does not fit; title runs without it");
            }
        }
    }

    fn tick(&mut self, _ctx: &mut SceneContext<'_>) -> SceneId {
        self.ticks_run += 1;
        if self.ticks_run >= self.hold_ticks {
            FIELD_SCENE
        } else {
            TITLE_SCENE
        }
    }

    fn display(&mut self, ctx: &mut SceneContext<'_>) {
        let (Some(handle), Some(zone)) = (self.fade, ctx.scene_zone()) else {
            return;
        };
        let ramp = zone.bytes(handle);
        let step = (self.ticks_run as usize * ramp.len() / self.hold_ticks as usize)
            .min(ramp.len() - 1);
        trace!(fade = ramp[step], "title_display");
    }

    fn destroy(&mut self, _ctx: &mut SceneContext<'_>) {
        info!(ticks_run = self.ticks_run, "title_destroyed");
    }
}

/// Churns a cell grid allocated from the scene zone: every cell decays each
/// tick while a few random cells are re-ignited. Returns to the title scene
/// after its linger time, handing the whole grid back via the zone reset.
pub(crate) struct FieldScene {
    width: usize,
    height: usize,
    linger_ticks: u64,
    ignite_per_tick: RangeF32,
    rng: StdRng,
    cells: Option<ZoneHandle>,
    ticks_run: u64,
}

impl FieldScene {
    pub(crate) fn new(width: usize, height: usize, linger_ticks: u64, rng_seed: u64) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            linger_ticks: linger_ticks.max(1),
            ignite_per_tick: RangeF32::new(1.0, 4.0),
            rng: StdRng::seed_from_u64(rng_seed),
            cells: None,
            ticks_run: 0,
        }
    }
}

impl Scene for FieldScene {
    fn create(&mut self, ctx: &mut SceneContext<'_>) {
        self.ticks_run = 0;
        self.cells = None;
        let Some(zone) = ctx.scene_zone() else {
            warn!("field scene created without a scene zone; cells disabled");
            return;
        };
        match zone.alloc(self.width * self.height) {
            Ok(handle) => {
                // the zone hands out dirty memory
                zone.bytes_mut(handle).fill(0);
                self.cells = Some(handle);
                info!(
                    cells = self.width * self.height,
                    zone_used = zone.used(),
                    "field_created"
                );
            }
            Err(err) => {
                warn!(error = %err, "cell grid does not fit; field runs without it");
            }
        }
    }

    fn tick(&mut self, ctx: &mut SceneContext<'_>) -> SceneId {
        self.ticks_run += 1;
        if let (Some(handle), Some(zone)) = (self.cells, ctx.scene_zone()) {
            let ignite = self.ignite_per_tick.sample(&mut self.rng).round() as usize;
            let cells = zone.bytes_mut(handle);
            for cell in cells.iter_mut() {
                *cell = cell.saturating_sub(1);
            }
            for _ in 0..ignite {
                let spark = PositionInt {
                    x: self.rng.gen_range(0..self.width as i32),
                    y: self.rng.gen_range(0..self.height as i32),
                };
                cells[spark.y as usize * self.width + spark.x as usize] = IGNITED_CELL;
            }
        }

        if self.ticks_run >= self.linger_ticks {
            TITLE_SCENE
        } else {
            FIELD_SCENE
        }
    }

    fn display(&mut self, ctx: &mut SceneContext<'_>) {
        let (Some(handle), Some(zone)) = (self.cells, ctx.scene_zone()) else {
            return;
        };
        let alive = zone.bytes(handle).iter().filter(|cell| **cell > 0).count();
        trace!(alive, "field_display");
    }

    fn destroy(&mut self, _ctx: &mut SceneContext<'_>) {
        // the handle dies with the epoch; drop it before the zone reset
        self.cells = None;
        info!(ticks_run = self.ticks_run, "field_destroyed");
    }
}
