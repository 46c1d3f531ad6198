use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    Power1In,
    Power1Out,
}

impl Easing {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::Power1In => t * t,
            Easing::Power1Out => 1.0 - (1.0 - t) * (1.0 - t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tween {
    from: f32,
    to: f32,
    start: f64,
    duration: f32,
    easing: Easing,
}

/// A scalar that can ramp towards a target over time. Starting a new ramp
/// replaces the running one, continuing from the current sampled value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatedScalar {
    value: f32,
    tween: Option<Tween>,
}

impl AnimatedScalar {
    pub fn new(value: f32) -> Self {
        Self { value, tween: None }
    }

    /// Last sampled value.
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.tween = None;
    }

    pub fn target(&self) -> f32 {
        self.tween.map_or(self.value, |tween| tween.to)
    }

    pub fn is_animating(&self) -> bool {
        self.tween.is_some()
    }

    pub fn animate_to(&mut self, target: f32, duration: f32, easing: Easing, now: f64) {
        let from = self.sample(now);
        if duration <= 0.0 {
            self.set(target);
            return;
        }
        self.tween = Some(Tween {
            from,
            to: target,
            start: now,
            duration,
            easing,
        });
    }

    pub fn sample(&mut self, now: f64) -> f32 {
        let Some(tween) = self.tween else {
            return self.value;
        };

        let elapsed = (now - tween.start).max(0.0) as f32;
        let t = elapsed / tween.duration;
        if t >= 1.0 {
            self.value = tween.to;
            self.tween = None;
        } else {
            let eased = tween.easing.apply(t);
            self.value = tween.from + (tween.to - tween.from) * eased;
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::{AnimatedScalar, Easing};

    #[test]
    fn easing_curves_hit_endpoints() {
        for easing in [Easing::Linear, Easing::Power1In, Easing::Power1Out] {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
        }
        assert_eq!(Easing::Power1In.apply(0.5), 0.25);
        assert_eq!(Easing::Power1Out.apply(0.5), 0.75);
    }

    #[test]
    fn ramp_reaches_target_and_stops() {
        let mut scalar = AnimatedScalar::new(0.0);
        scalar.animate_to(1.0, 2.0, Easing::Linear, 10.0);

        assert!((scalar.sample(11.0) - 0.5).abs() < 1e-6);
        assert_eq!(scalar.sample(12.5), 1.0);
        assert!(!scalar.is_animating());
    }

    #[test]
    fn retargeting_continues_from_current_value() {
        let mut scalar = AnimatedScalar::new(5.0);
        scalar.animate_to(0.0, 1.0, Easing::Linear, 0.0);
        assert!((scalar.sample(0.5) - 2.5).abs() < 1e-6);

        scalar.animate_to(5.0, 1.0, Easing::Linear, 0.5);
        assert!((scalar.sample(0.5) - 2.5).abs() < 1e-6);
        assert_eq!(scalar.target(), 5.0);
        assert_eq!(scalar.sample(1.5), 5.0);
    }

    #[test]
    fn zero_duration_jumps_immediately() {
        let mut scalar = AnimatedScalar::new(0.3);
        scalar.animate_to(0.9, 0.0, Easing::Power1In, 1.0);
        assert_eq!(scalar.value(), 0.9);
        assert!(!scalar.is_animating());
    }
}
