const SAMPLES: usize = 300;
const MAX_ITERATIONS: usize = 200;

/// Fit `a`, `b` of `1 / (1 + a * x^(2b))` to the target membership curve
/// defined by `min_dist` and `spread`, using Levenberg-Marquardt least squares.
pub(super) fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let spread = spread as f64;
    let min_dist = min_dist as f64;
    let xs: Vec<f64> = (0..SAMPLES)
        .map(|i| 3.0 * spread * i as f64 / (SAMPLES - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let mut params = [1.0_f64, 1.0_f64];
    let mut lambda = 1e-3_f64;
    let mut cost = sum_squares(&xs, &ys, params);
    for _ in 0..MAX_ITERATIONS {
        let (jtj, jtr) = normal_equations(&xs, &ys, params);
        let mut improved = false;
        while lambda < 1e12 {
            let Some(step) = solve_damped(jtj, jtr, lambda) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = [params[0] + step[0], params[1] + step[1]];
            if candidate[0] <= 0.0 || candidate[1] <= 0.0 {
                lambda *= 10.0;
                continue;
            }
            let candidate_cost = sum_squares(&xs, &ys, candidate);
            if candidate_cost < cost {
                let relative = (cost - candidate_cost) / cost.max(f64::MIN_POSITIVE);
                params = candidate;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                improved = relative > 1e-12;
                break;
            }
            lambda *= 10.0;
        }
        if !improved {
            break;
        }
    }
    (params[0] as f32, params[1] as f32)
}

fn model(x: f64, [a, b]: [f64; 2]) -> f64 {
    1.0 / (1.0 + a * x.powf(2.0 * b))
}

fn sum_squares(xs: &[f64], ys: &[f64], params: [f64; 2]) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = model(x, params) - y;
            r * r
        })
        .sum()
}

fn normal_equations(xs: &[f64], ys: &[f64], [a, b]: [f64; 2]) -> ([[f64; 2]; 2], [f64; 2]) {
    let mut jtj = [[0.0; 2]; 2];
    let mut jtr = [0.0; 2];
    for (&x, &y) in xs.iter().zip(ys) {
        if x <= 0.0 {
            continue;
        }
        let u = x.powf(2.0 * b);
        let denom = 1.0 + a * u;
        let residual = 1.0 / denom - y;
        let d_a = -u / (denom * denom);
        let d_b = -a * u * 2.0 * x.ln() / (denom * denom);
        jtj[0][0] += d_a * d_a;
        jtj[0][1] += d_a * d_b;
        jtj[1][1] += d_b * d_b;
        jtr[0] += d_a * residual;
        jtr[1] += d_b * residual;
    }
    jtj[1][0] = jtj[0][1];
    (jtj, jtr)
}

fn solve_damped(jtj: [[f64; 2]; 2], jtr: [f64; 2], lambda: f64) -> Option<[f64; 2]> {
    let m00 = jtj[0][0] * (1.0 + lambda);
    let m11 = jtj[1][1] * (1.0 + lambda);
    let m01 = jtj[0][1];
    let det = m00 * m11 - m01 * m01;
    if det.abs() < 1e-300 || !det.is_finite() {
        return None;
    }
    let rhs = [-jtr[0], -jtr[1]];
    Some([
        (m11 * rhs[0] - m01 * rhs[1]) / det,
        (m00 * rhs[1] - m01 * rhs[0]) / det,
    ])
}
