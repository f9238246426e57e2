//! Least-squares line over an index-ordered series.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fits `y = slope * x + intercept` with `x` taken as the index of each value.
pub fn linear_regression(series: &[f64]) -> Regression {
    if series.len() < 2 {
        return Regression {
            slope: 0.0,
            intercept: finite_or_zero(series.first().copied().unwrap_or(0.0)),
        };
    }

    let n = series.len() as f64;
    let sum_x: f64 = (0..series.len()).map(|i| i as f64).sum();
    let sum_y: f64 = series.iter().sum();
    let sum_xy: f64 = series.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_xx: f64 = (0..series.len()).map(|i| (i as f64).powi(2)).sum();

    let slope = finite_or_zero((n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x.powi(2)));
    let intercept = finite_or_zero((sum_y - slope * sum_x) / n);

    Regression { slope, intercept }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
