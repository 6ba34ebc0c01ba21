//! Easing functions for property animations

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    EaseInQuad,
    EaseOutQuad,
    #[default]
    EaseInOutQuad,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    EaseInQuart,
    EaseOutQuart,
    EaseInOutQuart,
    CubicBezier(f64, f64, f64, f64),
    /// Piecewise linear through `(progress, value)` points sorted by progress
    Points(&'static [(f64, f64)]),
}

const IN_ELASTIC: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.18, 0.0),
    (0.26, -0.01),
    (0.28, -0.01),
    (0.4, 0.02),
    (0.42, 0.02),
    (0.56, -0.05),
    (0.58, -0.04),
    (0.72, 0.13),
    (0.86, -0.37),
    (1.0, 1.0),
];

const OUT_ELASTIC: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.16, 1.32),
    (0.28, 0.87),
    (0.44, 1.05),
    (0.59, 0.98),
    (0.73, 1.01),
    (0.88, 1.0),
    (1.0, 1.0),
];

const IN_OUT_ELASTIC: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.08, 0.0),
    (0.18, -0.01),
    (0.2, 0.0),
    (0.28, 0.02),
    (0.3, 0.02),
    (0.38, -0.09),
    (0.4, -0.12),
    (0.6, 1.12),
    (0.62, 1.09),
    (0.7, 0.98),
    (0.72, 0.98),
    (0.8, 1.0),
    (0.82, 1.01),
    (0.9, 1.0),
    (1.0, 1.0),
];

const IN_BOUNCE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.04, 0.02),
    (0.08, 0.01),
    (0.18, 0.06),
    (0.26, 0.02),
    (0.46, 0.25),
    (0.64, 0.02),
    (0.76, 0.56),
    (0.88, 0.89),
    (1.0, 1.0),
];

const OUT_BOUNCE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.12, 0.11),
    (0.24, 0.44),
    (0.36, 0.98),
    (0.54, 0.75),
    (0.74, 0.98),
    (0.82, 0.94),
    (0.92, 0.99),
    (0.96, 0.98),
    (1.0, 1.0),
];

const IN_OUT_BOUNCE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (0.02, 0.01),
    (0.04, 0.0),
    (0.1, 0.03),
    (0.14, 0.01),
    (0.22, 0.12),
    (0.32, 0.01),
    (0.42, 0.4),
    (0.5, 0.5),
    (0.58, 0.6),
    (0.68, 0.99),
    (0.78, 0.88),
    (0.86, 0.99),
    (0.9, 0.97),
    (0.96, 1.0),
    (0.98, 0.99),
    (1.0, 1.0),
];

impl Easing {
    /// Look an easing curve up by name, e.g. `"InOutQuad"` or `"OutBounce"`
    pub fn from_name(name: &str) -> Option<Easing> {
        let easing = match name {
            "Linear" => Easing::Linear,

            "InSine" => Easing::CubicBezier(0.47, 0.0, 0.745, 0.715),
            "OutSine" => Easing::CubicBezier(0.39, 0.575, 0.565, 1.0),
            "InOutSine" => Easing::CubicBezier(0.445, 0.05, 0.55, 0.95),

            "InQuad" => Easing::EaseInQuad,
            "OutQuad" => Easing::EaseOutQuad,
            "InOutQuad" => Easing::EaseInOutQuad,

            "InCubic" => Easing::EaseInCubic,
            "OutCubic" => Easing::EaseOutCubic,
            "InOutCubic" => Easing::EaseInOutCubic,

            "InQuart" => Easing::EaseInQuart,
            "OutQuart" => Easing::EaseOutQuart,
            "InOutQuart" => Easing::EaseInOutQuart,

            "InQuint" => Easing::CubicBezier(0.755, 0.05, 0.855, 0.06),
            "OutQuint" => Easing::CubicBezier(0.23, 1.0, 0.32, 1.0),
            "InOutQuint" => Easing::CubicBezier(0.86, 0.0, 0.07, 1.0),

            "InExpo" => Easing::CubicBezier(0.95, 0.05, 0.795, 0.035),
            "OutExpo" => Easing::CubicBezier(0.19, 1.0, 0.22, 1.0),
            "InOutExpo" => Easing::CubicBezier(1.0, 0.0, 0.0, 1.0),

            "InCirc" => Easing::CubicBezier(0.6, 0.04, 0.98, 0.335),
            "OutCirc" => Easing::CubicBezier(0.075, 0.82, 0.165, 1.0),
            "InOutCirc" => Easing::CubicBezier(0.785, 0.135, 0.15, 0.86),

            "InBack" => Easing::CubicBezier(0.6, -0.28, 0.735, 0.045),
            "OutBack" => Easing::CubicBezier(0.175, 0.885, 0.32, 1.275),
            "InOutBack" => Easing::CubicBezier(0.68, -0.55, 0.265, 1.55),

            "InElastic" => Easing::Points(IN_ELASTIC),
            "OutElastic" => Easing::Points(OUT_ELASTIC),
            "InOutElastic" => Easing::Points(IN_OUT_ELASTIC),

            "InBounce" => Easing::Points(IN_BOUNCE),
            "OutBounce" => Easing::Points(OUT_BOUNCE),
            "InOutBounce" => Easing::Points(IN_OUT_BOUNCE),

            _ => return None,
        };
        Some(easing)
    }

    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn | Easing::EaseInCubic => t * t * t,
            Easing::EaseOut | Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOut | Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::EaseInQuart => t * t * t * t,
            Easing::EaseOutQuart => 1.0 - (1.0 - t).powi(4),
            Easing::EaseInOutQuart => {
                if t < 0.5 {
                    8.0 * t * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(4) / 2.0
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, *x1, *y1, *x2, *y2),
            Easing::Points(points) => piecewise(points, t),
        }
    }
}

fn piecewise(points: &[(f64, f64)], t: f64) -> f64 {
    for pair in points.windows(2) {
        let ((x1, y1), (x2, y2)) = (pair[0], pair[1]);
        if t >= x1 && t <= x2 {
            return y1 + (y2 - y1) * (t - x1) / (x2 - x1);
        }
    }
    1.0
}

/// Cubic bezier easing calculation (matches CSS timing functions).
///
/// Uses Newton-Raphson with binary-search fallback for robustness.
fn cubic_bezier_ease(t: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    // Endpoints are always exact
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let mut p = t;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - t;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2);
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = t;
    for _ in 0..20 {
        let val = bezier_sample(p, x1, x2);
        if (val - t).abs() < 1e-7 {
            break;
        }
        if val < t {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2)
}

/// B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}
