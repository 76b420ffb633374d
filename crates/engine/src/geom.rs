use rand::Rng;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionInt {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Inclusive float range with random sampling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeF32 {
    pub start: f32,
    pub end: f32,
}

impl RangeF32 {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> f32 {
        if self.start >= self.end {
            return self.start;
        }
        rng.gen_range(self.start..=self.end)
    }
}
