//! Tween math for the rotating dotted squares and the pulsing camera icon.
//! The view samples these with the elapsed time since the screen appeared.

use serde::Serialize;
use std::time::Duration;

use crate::navigation::Screen;

/// Starting angle of each square in a cluster, in degrees
pub const BASE_ROTATIONS: [f64; 3] = [-45.0, 10.0, 62.0];
pub const SPIN_PERIOD: Duration = Duration::from_secs(130);

pub const PULSE_SCALE: f64 = 1.06;
pub const PULSE_OPACITY: f64 = 0.7;
pub const PULSE_DURATION: Duration = Duration::from_millis(1300);

/// Linear, endlessly repeating rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub base_degrees: f64,
    pub period: Duration,
}

impl Spin {
    pub fn new(base_degrees: f64) -> Self {
        Self {
            base_degrees,
            period: SPIN_PERIOD,
        }
    }

    /// Angle at `elapsed`, normalised to [0, 360)
    pub fn angle_at(&self, elapsed: Duration) -> f64 {
        let period = self.period.as_secs_f64();
        if period <= 0.0 {
            return self.base_degrees.rem_euclid(360.0);
        }
        let turns = (elapsed.as_secs_f64() / period).fract();
        (self.base_degrees + turns * 360.0).rem_euclid(360.0)
    }
}

/// power1.inOut
pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Scale/opacity tween that plays forward then backward, forever
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub to_scale: f64,
    pub to_opacity: f64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PulseSample {
    pub scale: f64,
    pub opacity: f64,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            to_scale: PULSE_SCALE,
            to_opacity: PULSE_OPACITY,
            duration: PULSE_DURATION,
        }
    }
}

impl Pulse {
    /// Tween progress in [0, 1]. Odd legs run backward.
    pub fn progress_at(&self, elapsed: Duration) -> f64 {
        let leg = self.duration.as_secs_f64();
        if leg <= 0.0 {
            return 0.0;
        }
        let position = elapsed.as_secs_f64() / leg;
        let t = position.fract();
        let t = if (position as u64) % 2 == 1 { 1.0 - t } else { t };
        ease_in_out_quad(t)
    }

    pub fn sample(&self, elapsed: Duration) -> PulseSample {
        let p = self.progress_at(elapsed);
        PulseSample {
            scale: 1.0 + (self.to_scale - 1.0) * p,
            opacity: 1.0 + (self.to_opacity - 1.0) * p,
        }
    }
}

/// One cluster of three squares at a shared opacity ramp
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub spins: [Spin; 3],
    pub opacities: [f64; 3],
}

impl Cluster {
    fn with_opacities(opacities: [f64; 3]) -> Self {
        Self {
            spins: BASE_ROTATIONS.map(Spin::new),
            opacities,
        }
    }

    pub fn sample(&self, elapsed: Duration) -> [SquareSample; 3] {
        let mut out = [SquareSample::default(); 3];
        for (i, sample) in out.iter_mut().enumerate() {
            *sample = SquareSample {
                rotation: self.spins[i].angle_at(elapsed),
                opacity: self.opacities[i],
            };
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SquareSample {
    pub rotation: f64,
    pub opacity: f64,
}

/// Decorations shown on a given screen
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub clusters: Vec<Cluster>,
    pub pulse: Option<Pulse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneFrame {
    pub clusters: Vec<[SquareSample; 3]>,
    pub pulse: Option<PulseSample>,
}

impl Scene {
    pub fn for_screen(screen: Screen) -> Self {
        match screen {
            Screen::Intake => Self {
                clusters: vec![Cluster::with_opacities([0.45, 0.62, 0.78])],
                pulse: None,
            },
            Screen::CaptureMethod => Self {
                clusters: vec![
                    Cluster::with_opacities([0.22, 0.34, 0.44]),
                    Cluster::with_opacities([0.22, 0.34, 0.44]),
                ],
                pulse: None,
            },
            Screen::CameraSetup => Self {
                clusters: vec![Cluster::with_opacities([0.3, 0.4, 0.5])],
                pulse: Some(Pulse::default()),
            },
            _ => Self::default(),
        }
    }

    pub fn sample(&self, elapsed: Duration) -> SceneFrame {
        SceneFrame {
            clusters: self.clusters.iter().map(|c| c.sample(elapsed)).collect(),
            pulse: self.pulse.map(|p| p.sample(elapsed)),
        }
    }
}
