use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timeline::{TaskHandle, Timeline};
use crate::tween::{AnimatedScalar, Easing};

/// The two deferred steps of the press-and-hold gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureStage {
    DimPortalLight,
    RevealPortalSurface,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTimings {
    pub dim_light_delay: f64,
    pub reveal_surface_delay: f64,
    pub ramp_duration: f32,
    pub rest_softness: f32,
    pub pressed_softness: f32,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            dim_light_delay: 0.6,
            reveal_surface_delay: 1.6,
            ramp_duration: 1.0,
            rest_softness: 5.0,
            pressed_softness: 0.0,
        }
    }
}

impl GestureTimings {
    pub fn sanitize(&mut self) {
        self.dim_light_delay = self.dim_light_delay.max(0.0);
        self.reveal_surface_delay = self.reveal_surface_delay.max(0.0);
        self.ramp_duration = self.ramp_duration.max(0.0);
        self.rest_softness = self.rest_softness.max(0.0);
        self.pressed_softness = self.pressed_softness.max(0.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectValues {
    pub surface_opacity: f32,
    pub light_softness: f32,
}

/// Portal surface opacity and portal light softness, driven by pointer
/// presses.
#[derive(Debug, Clone)]
pub struct PortalEffects {
    timings: GestureTimings,
    surface_opacity: AnimatedScalar,
    light_softness: AnimatedScalar,
    pending: Vec<TaskHandle>,
}

impl PortalEffects {
    pub fn new(timings: GestureTimings, initial_opacity: f32) -> Self {
        Self {
            surface_opacity: AnimatedScalar::new(initial_opacity.clamp(0.0, 1.0)),
            light_softness: AnimatedScalar::new(timings.rest_softness),
            timings,
            pending: Vec::new(),
        }
    }

    pub fn timings(&self) -> &GestureTimings {
        &self.timings
    }

    pub fn pointer_down<A>(&mut self, timeline: &mut Timeline<A>, now: f64)
    where
        A: From<GestureStage>,
    {
        self.cancel_pending(timeline);
        let dim = timeline.schedule(
            now,
            self.timings.dim_light_delay,
            A::from(GestureStage::DimPortalLight),
        );
        let reveal = timeline.schedule(
            now,
            self.timings.reveal_surface_delay,
            A::from(GestureStage::RevealPortalSurface),
        );
        self.pending.extend([dim, reveal]);
    }

    pub fn pointer_up<A>(&mut self, timeline: &mut Timeline<A>, now: f64) {
        self.cancel_pending(timeline);
        let duration = self.timings.ramp_duration;
        self.surface_opacity
            .animate_to(0.0, duration, Easing::Power1In, now);
        self.light_softness
            .animate_to(self.timings.rest_softness, duration, Easing::Power1Out, now);
    }

    pub fn apply(&mut self, stage: GestureStage, now: f64) {
        debug!("gesture stage {:?} at {:.2}s", stage, now);
        let duration = self.timings.ramp_duration;
        match stage {
            GestureStage::DimPortalLight => self.light_softness.animate_to(
                self.timings.pressed_softness,
                duration,
                Easing::Power1In,
                now,
            ),
            GestureStage::RevealPortalSurface => {
                self.surface_opacity
                    .animate_to(1.0, duration, Easing::Power1In, now)
            }
        }
    }

    pub fn sample(&mut self, now: f64) -> EffectValues {
        EffectValues {
            surface_opacity: self.surface_opacity.sample(now),
            light_softness: self.light_softness.sample(now),
        }
    }

    fn cancel_pending<A>(&mut self, timeline: &mut Timeline<A>) {
        for handle in self.pending.drain(..) {
            timeline.cancel(handle);
        }
    }
}
