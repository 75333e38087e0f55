use std::fmt;

pub const SPICYNESS_MIN: f64 = 0.0;
pub const SPICYNESS_MAX: f64 = 2.0;
pub const SPICYNESS_STEP: f64 = 0.05;
pub const DEFAULT_SPICYNESS: f64 = 0.1;

// 1 / SPICYNESS_STEP; snapping divides by this to avoid accumulating float error.
const STEPS_PER_UNIT: f64 = 20.0;

/// Sampling temperature exposed to users; always within `[0, 2]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Spicyness(f64);

impl Spicyness {
    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        Self(value.clamp(SPICYNESS_MIN, SPICYNESS_MAX))
    }

    /// Value as picked on the settings slider: clamped and snapped to 0.05 steps.
    pub fn from_slider(value: f64) -> Self {
        let clamped = Self::new(value).0;
        Self((clamped * STEPS_PER_UNIT).round() / STEPS_PER_UNIT)
    }

    /// Parses a stored decimal value; `None` when the text is not a finite number.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Self::new)
    }

    /// Moves the value by whole slider steps.
    pub fn nudge(self, steps: i32) -> Self {
        Self::from_slider(self.0 + f64::from(steps) * SPICYNESS_STEP)
    }

    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for Spicyness {
    fn default() -> Self {
        Self(DEFAULT_SPICYNESS)
    }
}

impl fmt::Display for Spicyness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderMark {
    pub value: f64,
    pub label: &'static str,
}

const fn mark(value: f64, label: &'static str) -> SliderMark {
    SliderMark { value, label }
}

pub const SPICYNESS_MARKS: [SliderMark; 14] = [
    mark(0.1, ".1"),
    mark(0.2, ".2"),
    mark(0.3, ".3"),
    mark(0.4, ".4"),
    mark(0.5, ".5"),
    mark(0.6, ".6"),
    mark(0.7, ".7"),
    mark(0.8, ".8"),
    mark(0.9, ".9"),
    mark(1.0, "1"),
    mark(1.25, "1.25"),
    mark(1.5, "1.5"),
    mark(1.75, "1.75"),
    mark(2.0, "2"),
];
