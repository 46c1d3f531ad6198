use serde::{Deserialize, Serialize};

use crate::tween::{AnimatedScalar, Easing};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayTimings {
    pub fade_delay: f64,
    pub fade_duration: f32,
}

impl Default for OverlayTimings {
    fn default() -> Self {
        Self {
            fade_delay: 2.0,
            fade_duration: 3.0,
        }
    }
}

/// Full-screen black cover with a progress bar, shown until every asset has
/// loaded and then faded out.
#[derive(Debug, Clone)]
pub struct LoadingOverlay {
    timings: OverlayTimings,
    progress: f32,
    alpha: AnimatedScalar,
    loaded: bool,
    fading: bool,
}

impl LoadingOverlay {
    pub fn new(timings: OverlayTimings) -> Self {
        Self {
            timings,
            progress: 0.0,
            alpha: AnimatedScalar::new(1.0),
            loaded: false,
            fading: false,
        }
    }

    pub fn timings(&self) -> &OverlayTimings {
        &self.timings
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Records load progress. Returns `true` exactly once, on the call that
    /// first reports completion; the caller then schedules the fade.
    pub fn set_progress(&mut self, loaded: usize, total: usize) -> bool {
        self.progress = if total == 0 {
            1.0
        } else {
            (loaded as f32 / total as f32).clamp(0.0, 1.0)
        };

        if self.loaded || loaded < total {
            return false;
        }
        self.loaded = true;
        true
    }

    pub fn begin_fade(&mut self, now: f64) {
        if self.fading {
            return;
        }
        self.fading = true;
        self.alpha
            .animate_to(0.0, self.timings.fade_duration, Easing::Linear, now);
    }

    pub fn sample(&mut self, now: f64) -> f32 {
        self.alpha.sample(now)
    }

    /// Once the fade has finished the overlay is not drawn at all.
    pub fn is_visible(&self) -> bool {
        self.alpha.value() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadingOverlay, OverlayTimings};

    #[test]
    fn completion_is_reported_once() {
        let mut overlay = LoadingOverlay::new(OverlayTimings::default());
        assert!(!overlay.set_progress(1, 3));
        assert!((overlay.progress() - 1.0 / 3.0).abs() < 1e-6);
        assert!(overlay.set_progress(3, 3));
        assert!(!overlay.set_progress(3, 3));
        assert_eq!(overlay.progress(), 1.0);
    }

    #[test]
    fn empty_manifest_counts_as_loaded() {
        let mut overlay = LoadingOverlay::new(OverlayTimings::default());
        assert!(overlay.set_progress(0, 0));
        assert_eq!(overlay.progress(), 1.0);
    }

    #[test]
    fn fade_hides_overlay_after_duration() {
        let mut overlay = LoadingOverlay::new(OverlayTimings::default());
        assert!(overlay.is_visible());

        overlay.begin_fade(10.0);
        assert!((overlay.sample(11.5) - 0.5).abs() < 1e-6);
        assert!(overlay.is_visible());
        assert_eq!(overlay.sample(13.0), 0.0);
        assert!(!overlay.is_visible());

        overlay.begin_fade(20.0);
        assert_eq!(overlay.sample(20.0), 0.0);
    }
}
