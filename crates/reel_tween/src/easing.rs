//! Easing functions for tween actions
//!
//! Simple kinds map normalised time through [`Ease::apply`]. The shake and
//! bezier kinds need per-action parameters and are evaluated through
//! [`crate::batch::EaseCurve`] instead.

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2, PI, TAU};

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Ease {
    Linear,
    #[default]
    Smooth,

    InQuad,
    OutQuad,
    InOutQuad,

    InCubic,
    OutCubic,
    InOutCubic,

    InQuart,
    OutQuart,
    InOutQuart,

    InQuint,
    OutQuint,
    InOutQuint,

    InSine,
    OutSine,
    InOutSine,

    InExpo,
    OutExpo,
    InOutExpo,
    InExpoOutBack,

    InCirc,
    OutCirc,
    InOutCirc,

    InElastic,
    OutElastic,
    InOutElastic,

    InBack,
    OutBack,
    InOutBack,
    InBackOutExpo,
    InBackOutElastic,

    InBounce,
    OutBounce,
    InOutBounce,

    /// Noise shake along x. Extra params: `[amplitude, speed]`
    ShakeX,
    /// Noise shake along y. Extra params: `[amplitude, speed]`
    ShakeY,
    /// Noise shake along both axes. Extra params: `[amplitude, speed]`
    ShakeZ,

    /// Quadratic bezier path. Extra params: one control point per channel
    BezierQuadraticX,
    BezierQuadraticY,
    BezierQuadraticZ,

    /// Cubic bezier path. Extra params: two control points per channel
    BezierCubicX,
    BezierCubicY,
    BezierCubicZ,

    /// CSS-style timing curve with control points (x1, y1) and (x2, y2)
    CubicBezier(f32, f32, f32, f32),
}

impl Ease {
    /// Whether this kind reads the action's extra parameters
    pub fn needs_extra_params(&self) -> bool {
        self.is_shake() || self.is_bezier_quadratic() || self.is_bezier_cubic()
    }

    pub(crate) fn is_shake(&self) -> bool {
        matches!(self, Ease::ShakeX | Ease::ShakeY | Ease::ShakeZ)
    }

    pub(crate) fn is_bezier_quadratic(&self) -> bool {
        matches!(
            self,
            Ease::BezierQuadraticX | Ease::BezierQuadraticY | Ease::BezierQuadraticZ
        )
    }

    pub(crate) fn is_bezier_cubic(&self) -> bool {
        matches!(
            self,
            Ease::BezierCubicX | Ease::BezierCubicY | Ease::BezierCubicZ
        )
    }

    /// Apply the easing function to a progress value (0.0 to 1.0)
    ///
    /// Parameterised kinds (shake, bezier paths) are linear here.
    pub fn apply(&self, t: f32) -> f32 {
        match self {
            Ease::Linear => t,
            Ease::Smooth => t * t * (3.0 - 2.0 * t),

            Ease::InQuad => t * t,
            Ease::OutQuad => t * (2.0 - t),
            Ease::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    2.0 * t * (2.0 - t) - 1.0
                }
            }

            Ease::InCubic => t * t * t,
            Ease::OutCubic => (t - 1.0).powi(3) + 1.0,
            Ease::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    4.0 * (t - 1.0).powi(3) + 1.0
                }
            }

            Ease::InQuart => t.powi(4),
            Ease::OutQuart => 1.0 - (t - 1.0).powi(4),
            Ease::InOutQuart => {
                if t < 0.5 {
                    8.0 * t.powi(4)
                } else {
                    1.0 - 8.0 * (t - 1.0).powi(4)
                }
            }

            Ease::InQuint => t.powi(5),
            Ease::OutQuint => (t - 1.0).powi(5) + 1.0,
            Ease::InOutQuint => {
                if t < 0.5 {
                    16.0 * t.powi(5)
                } else {
                    16.0 * (t - 1.0).powi(5) + 1.0
                }
            }

            Ease::InSine => 1.0 - (t * FRAC_PI_2).cos(),
            Ease::OutSine => (t * FRAC_PI_2).sin(),
            Ease::InOutSine => 0.5 - 0.5 * (t * PI).cos(),

            Ease::InExpo => 2.0_f32.powf(10.0 * t - 10.0),
            Ease::OutExpo => 1.000977 - 2.0_f32.powf(-10.0 * t),
            Ease::InOutExpo => {
                if t < 0.5 {
                    0.5 * 2.0_f32.powf(20.0 * t - 10.0)
                } else {
                    1.000488 - 0.5 * 2.0_f32.powf(10.0 - 20.0 * t)
                }
            }
            Ease::InExpoOutBack => {
                if t < 0.5 {
                    0.5 * 2.0_f32.powf(20.0 * t - 10.0)
                } else {
                    back_out_half(t)
                }
            }

            Ease::InCirc => 1.0 - (1.0 - t * t).sqrt(),
            Ease::OutCirc => ((2.0 - t) * t).sqrt(),
            Ease::InOutCirc => {
                if t < 0.5 {
                    0.5 - 0.5 * (1.0 - t * t * 4.0).sqrt()
                } else {
                    let t = t - 1.0;
                    0.5 + 0.5 * (1.0 - t * t * 4.0).sqrt()
                }
            }

            Ease::InElastic => -(2.0_f32.powf(10.0 * t - 10.0)) * (20.943951 * t - 22.514747).sin(),
            Ease::OutElastic => {
                2.0_f32.powf(-10.0 * t) * (20.943951 * t - FRAC_PI_2).sin() + 0.999512
            }
            Ease::InOutElastic => {
                if t < 0.5 {
                    -0.5 * 2.0_f32.powf(20.0 * t - 10.0) * (27.925268 * t - 15.533430).sin()
                } else {
                    elastic_out_half(t)
                }
            }

            Ease::InBack => t * t * (2.70158 * t - 1.70158),
            Ease::OutBack => {
                let t = t - 1.0;
                t * t * (2.70158 * t + 1.70158) + 1.0
            }
            Ease::InOutBack => {
                if t < 0.5 {
                    back_in_half(t)
                } else {
                    back_out_half(t)
                }
            }
            Ease::InBackOutExpo => {
                if t < 0.5 {
                    back_in_half(t)
                } else {
                    1.000488 - 0.5 * 2.0_f32.powf(10.0 - 20.0 * t)
                }
            }
            Ease::InBackOutElastic => {
                if t < 0.5 {
                    back_in_half(t)
                } else {
                    elastic_out_half(t)
                }
            }

            Ease::InBounce => bounce_in(t),
            Ease::OutBounce => bounce_out(t),
            Ease::InOutBounce => {
                if t < 0.5 {
                    0.5 - 0.5 * bounce_out(1.0 - 2.0 * t)
                } else {
                    0.5 + 0.5 * bounce_out(2.0 * t - 1.0)
                }
            }

            Ease::ShakeX
            | Ease::ShakeY
            | Ease::ShakeZ
            | Ease::BezierQuadraticX
            | Ease::BezierQuadraticY
            | Ease::BezierQuadraticZ
            | Ease::BezierCubicX
            | Ease::BezierCubicY
            | Ease::BezierCubicZ => t,

            Ease::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
        }
    }
}

#[inline]
fn back_in_half(t: f32) -> f32 {
    t * t * (14.379638 * t - 5.189819)
}

#[inline]
fn back_out_half(t: f32) -> f32 {
    let t = t - 1.0;
    t * t * (14.379638 * t + 5.189819) + 1.0
}

#[inline]
fn elastic_out_half(t: f32) -> f32 {
    0.5 * 2.0_f32.powf(10.0 - 20.0 * t) * (27.925268 * t - 15.533430).sin() + 1.000171
}

fn bounce_out(t: f32) -> f32 {
    if t < 0.363636 {
        t * t * 7.5625
    } else if t < 0.72727 {
        let t = t - 0.545454;
        t * t * 7.5625 + 0.75
    } else if t < 0.909091 {
        let t = t - 0.818182;
        t * t * 7.5625 + 0.9375
    } else {
        let t = t - 0.954545;
        t * t * 7.5625 + 0.984375
    }
}

fn bounce_in(t: f32) -> f32 {
    1.0 - bounce_out(1.0 - t)
}

/// Which noise axes a shake drives
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShakeAxis {
    X,
    Y,
    Both,
}

/// Noise shake around `to`, full amplitude for the first half then decaying to zero.
pub(crate) fn shake(from: f32, to: f32, t: f32, amplitude: f32, speed: f32, axis: ShakeAxis) -> f32 {
    let travel = t * (speed + from);
    let (sx, sy) = match axis {
        ShakeAxis::X => (travel, 0.0),
        ShakeAxis::Y => (0.0, travel),
        ShakeAxis::Both => (travel, travel),
    };

    // map to [-1, 1]
    let range = gradient_noise(sx, sy) * 2.0 - 1.0;

    if t < 0.5 {
        range * amplitude + to
    } else {
        range * amplitude * (2.0 * (1.0 - t)) + to
    }
}

/// Quadratic bezier from `from` to `to` through control point `pos`
#[inline]
pub(crate) fn bezier_quadratic(from: f32, to: f32, t: f32, pos: f32) -> f32 {
    pos + (1.0 - t).powi(2) * (from - pos) + t * t * (to - pos)
}

/// Cubic bezier from `from` to `to` with control points `pos1`, `pos2`
#[inline]
pub(crate) fn bezier_cubic(from: f32, to: f32, t: f32, pos1: f32, pos2: f32) -> f32 {
    let left = 1.0 - t;
    left.powi(3) * from + 3.0 * left * t * (left * pos1 + t * pos2) + t.powi(3) * to
}

/// 2D gradient noise in [0, 1], exactly 0.5 on integer lattice points.
fn gradient_noise(x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let ix = x0 as i32;
    let iy = y0 as i32;

    let corner = |gx: i32, gy: i32, dx: f32, dy: f32| {
        let angle = lattice_hash(gx, gy) as f32 / u32::MAX as f32 * TAU;
        angle.cos() * dx + angle.sin() * dy
    };

    let n00 = corner(ix, iy, fx, fy);
    let n10 = corner(ix + 1, iy, fx - 1.0, fy);
    let n01 = corner(ix, iy + 1, fx, fy - 1.0);
    let n11 = corner(ix + 1, iy + 1, fx - 1.0, fy - 1.0);

    let u = fade(fx);
    let v = fade(fy);
    let nx0 = n00 + (n10 - n00) * u;
    let nx1 = n01 + (n11 - n01) * u;
    let n = nx0 + (nx1 - nx0) * v;

    (n * FRAC_1_SQRT_2 + 0.5).clamp(0.0, 1.0)
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lattice_hash(x: i32, y: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343) ^ (y as u32).wrapping_mul(0xd816_3841);
    h ^= h >> 13;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^ (h >> 16)
}

/// One axis of a unit cubic bezier with fixed endpoints (0, 0) and (1, 1)
#[derive(Clone, Copy)]
struct BezierAxis {
    a: f64,
    b: f64,
    c: f64,
}

impl BezierAxis {
    fn new(p1: f32, p2: f32) -> Self {
        let (p1, p2) = (f64::from(p1), f64::from(p2));
        let c = 3.0 * p1;
        let b = 3.0 * (p2 - p1) - c;
        Self { a: 1.0 - c - b, b, c }
    }

    fn at(self, s: f64) -> f64 {
        ((self.a * s + self.b) * s + self.c) * s
    }

    fn slope(self, s: f64) -> f64 {
        (3.0 * self.a * s + 2.0 * self.b) * s + self.c
    }
}

/// CSS `cubic-bezier(x1, y1, x2, y2)` timing: solve x(s) = t, return y(s)
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    const EPSILON: f64 = 1e-7;

    if t <= 0.0 || t >= 1.0 {
        return t.clamp(0.0, 1.0);
    }

    let (x, y) = (BezierAxis::new(x1, x2), BezierAxis::new(y1, y2));
    let target = f64::from(t);

    // Newton first, bisection when the curve is too flat to converge
    let mut s = target;
    for _ in 0..8 {
        let err = x.at(s) - target;
        if err.abs() < EPSILON {
            return y.at(s) as f32;
        }

        let slope = x.slope(s);
        if slope.abs() < EPSILON {
            break;
        }
        s -= err / slope;
    }

    let (mut lo, mut hi) = (0.0, 1.0);
    s = target;
    for _ in 0..24 {
        let err = x.at(s) - target;
        if err.abs() < EPSILON {
            break;
        }

        if err < 0.0 {
            lo = s;
        } else {
            hi = s;
        }
        s = 0.5 * (lo + hi);
    }

    y.at(s) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[Ease] = &[
        Ease::Linear,
        Ease::Smooth,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::InQuart,
        Ease::OutQuart,
        Ease::InOutQuart,
        Ease::InQuint,
        Ease::OutQuint,
        Ease::InOutQuint,
        Ease::InSine,
        Ease::OutSine,
        Ease::InOutSine,
        Ease::InCirc,
        Ease::OutCirc,
        Ease::InOutCirc,
        Ease::InBack,
        Ease::OutBack,
        Ease::InOutBack,
        Ease::InBounce,
        Ease::OutBounce,
        Ease::InOutBounce,
    ];

    #[test]
    fn test_endpoints() {
        for ease in SIMPLE {
            assert!(ease.apply(0.0).abs() < 1e-3, "{:?} at 0", ease);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-3, "{:?} at 1", ease);
        }
    }

    #[test]
    fn test_expo_and_elastic_near_endpoints() {
        for ease in [
            Ease::InExpo,
            Ease::OutExpo,
            Ease::InOutExpo,
            Ease::InElastic,
            Ease::OutElastic,
            Ease::InOutElastic,
            Ease::InExpoOutBack,
            Ease::InBackOutExpo,
            Ease::InBackOutElastic,
        ] {
            assert!(ease.apply(0.0).abs() < 2e-3, "{:?} at 0", ease);
            assert!((ease.apply(1.0) - 1.0).abs() < 2e-3, "{:?} at 1", ease);
        }
    }

    #[test]
    fn test_smooth_is_default_and_symmetric() {
        assert_eq!(Ease::default(), Ease::Smooth);
        assert!((Ease::Smooth.apply(0.5) - 0.5).abs() < 1e-6);
        assert!((Ease::Smooth.apply(0.25) + Ease::Smooth.apply(0.75) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_css_cubic_bezier_linear_curve() {
        let ease = Ease::CubicBezier(0.25, 0.25, 0.75, 0.75);
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!((ease.apply(t) - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_bezier_paths_hit_endpoints() {
        assert_eq!(bezier_quadratic(2.0, 8.0, 0.0, 100.0), 2.0);
        assert_eq!(bezier_quadratic(2.0, 8.0, 1.0, 100.0), 8.0);
        assert!((bezier_cubic(2.0, 8.0, 0.0, -5.0, 5.0) - 2.0).abs() < 1e-6);
        assert!((bezier_cubic(2.0, 8.0, 1.0, -5.0, 5.0) - 8.0).abs() < 1e-6);
        // control point pulls the midpoint
        assert!(bezier_quadratic(0.0, 0.0, 0.5, 10.0) > 4.9);
    }

    #[test]
    fn test_shake_settles_on_target() {
        assert!((shake(0.0, 3.0, 1.0, 2.0, 10.0, ShakeAxis::X) - 3.0).abs() < 1e-6);
        // lattice point: zero offset
        assert!((shake(0.0, 3.0, 0.0, 2.0, 10.0, ShakeAxis::Both) - 3.0).abs() < 1e-6);
        for i in 0..20 {
            let t = i as f32 / 20.0;
            let v = shake(0.0, 0.0, t, 2.0, 7.0, ShakeAxis::Y);
            assert!(v.abs() <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_ease_names_deserialize() {
        #[derive(Deserialize)]
        struct Holder {
            ease: Ease,
        }
        let holder: Holder = toml::from_str("ease = \"OutBounce\"").unwrap();
        assert_eq!(holder.ease, Ease::OutBounce);
    }
}
