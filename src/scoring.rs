//! ScoringEngine: five weighted components combine into a composite score
//! and letter grade.

use serde::{Deserialize, Serialize};

use crate::metrics::{ComplexityClass, Metrics};

/// Weights for the five scoring components. Per the Open Question in the
/// original design (intended behavior when weights don't sum to 1.0 is
/// unspecified upstream), this implementation normalizes defensively: if
/// the configured weights don't sum to 1.0, they are rescaled so they do,
/// keeping the documented `composite ∈ [0, 100]` invariant regardless of
/// misconfiguration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ScoringWeights {
    pub execution_time: f64,
    pub scan_efficiency: f64,
    pub index_quality:  f64,
    pub join_efficiency: f64,
    pub scalability:    f64
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            execution_time:  0.30,
            scan_efficiency: 0.25,
            index_quality:   0.20,
            join_efficiency: 0.15,
            scalability:     0.10
        }
    }
}

impl ScoringWeights {
    fn normalized(self) -> Self {
        let sum = self.execution_time
            + self.scan_efficiency
            + self.index_quality
            + self.join_efficiency
            + self.scalability;
        if (sum - 1.0).abs() < 1e-9 || sum <= 0.0 {
            return self;
        }
        Self {
            execution_time:  self.execution_time / sum,
            scan_efficiency: self.scan_efficiency / sum,
            index_quality:   self.index_quality / sum,
            join_efficiency: self.join_efficiency / sum,
            scalability:     self.scalability / sum
        }
    }
}

/// Letter-grade cut points, default A≥90, B≥75, C≥50, D≥25, F≥0.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GradeThresholds {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a: 90.0,
            b: 75.0,
            c: 50.0,
            d: 25.0
        }
    }
}

/// The five sub-scores plus the combined composite, all on 0-100.
#[derive(Debug, Clone, Serialize)]
pub struct Scores {
    pub execution_time:  f64,
    pub scan_efficiency: f64,
    pub index_quality:   f64,
    pub join_efficiency: f64,
    pub scalability:     f64,
    pub composite:       f64,
    pub context_override_applied: bool
}

pub fn grade_for_score(score: f64, thresholds: Option<&GradeThresholds>) -> char {
    let t = thresholds.copied().unwrap_or_default();
    if score >= t.a {
        'A'
    } else if score >= t.b {
        'B'
    } else if score >= t.c {
        'C'
    } else if score >= t.d {
        'D'
    } else {
        'F'
    }
}

fn execution_time_score(time_ms: f64) -> f64 {
    if time_ms < 1.0 {
        100.0
    } else if time_ms < 10.0 {
        lerp(time_ms, 1.0, 10.0, 100.0, 90.0)
    } else if time_ms < 100.0 {
        lerp(time_ms, 10.0, 100.0, 90.0, 70.0)
    } else if time_ms < 1000.0 {
        lerp(time_ms, 100.0, 1000.0, 70.0, 30.0)
    } else if time_ms < 10000.0 {
        lerp(time_ms, 1000.0, 10000.0, 30.0, 0.0)
    } else {
        0.0
    }
}

fn scan_efficiency_score(ratio: f64) -> f64 {
    if ratio <= 1.0 {
        100.0
    } else if ratio <= 2.0 {
        95.0
    } else if ratio <= 10.0 {
        lerp(ratio, 2.0, 10.0, 95.0, 80.0)
    } else if ratio <= 100.0 {
        lerp(ratio, 10.0, 100.0, 80.0, 50.0)
    } else if ratio <= 1000.0 {
        lerp(ratio, 100.0, 1000.0, 50.0, 20.0)
    } else {
        lerp(ratio.min(100_000.0), 1000.0, 100_000.0, 20.0, 0.0)
    }
}

fn index_quality_score(metrics: &Metrics) -> f64 {
    let mut score = 100.0;
    let mut scan_penalized = false;
    if metrics.has_table_scan {
        score -= 40.0;
        scan_penalized = true;
    }
    if !metrics.is_index_backed {
        score -= 30.0;
    }
    if metrics.has_index_merge {
        score -= 20.0;
    }
    if !metrics.has_covering_index && !scan_penalized {
        score -= 10.0;
    }
    score.max(0.0)
}

fn join_efficiency_score(metrics: &Metrics) -> f64 {
    let depth = metrics.nested_loop_depth;
    let mut score = if depth <= 2 {
        100.0
    } else if depth == 3 {
        80.0
    } else {
        (60.0 - 5.0 * depth as f64).max(20.0)
    };

    let fanout = metrics.fanout_factor;
    if fanout > 10_000 {
        score -= 30.0;
    } else if fanout > 1_000 {
        score -= 20.0;
    } else if fanout > 100 {
        score -= 10.0;
    }

    if metrics.has_weedout {
        score -= 15.0;
    }
    if metrics.has_temp_table {
        score -= 10.0;
    }
    score.max(0.0)
}

fn scalability_score(metrics: &Metrics) -> f64 {
    let mut score = match metrics.complexity {
        ComplexityClass::Constant => 100.0,
        ComplexityClass::Logarithmic | ComplexityClass::LogRange => 80.0,
        ComplexityClass::Linear => 50.0,
        ComplexityClass::Linearithmic => 30.0,
        ComplexityClass::Quadratic => 10.0
    };
    if metrics.has_early_termination {
        score = (score + 20.0).min(100.0);
    }
    score
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Score the given metrics. Weights are normalized defensively; see
/// [`ScoringWeights::normalized`].
pub fn score(metrics: &Metrics, weights: ScoringWeights, thresholds: &GradeThresholds) -> Scores {
    let weights = weights.normalized();

    let execution_time = execution_time_score(metrics.execution_time_ms);
    let scan_efficiency = scan_efficiency_score(metrics.selectivity_ratio);
    let index_quality = index_quality_score(metrics);
    let join_efficiency = join_efficiency_score(metrics);
    let scalability = scalability_score(metrics);

    let mut composite = execution_time * weights.execution_time
        + scan_efficiency * weights.scan_efficiency
        + index_quality * weights.index_quality
        + join_efficiency * weights.join_efficiency
        + scalability * weights.scalability;
    composite = composite.clamp(0.0, 100.0);

    // Context override: never lowers the composite, only raises it.
    let context_override_applied = composite < 90.0
        && metrics.has_early_termination
        && metrics.has_covering_index
        && !metrics.has_filesort
        && metrics.execution_time_ms < 10.0;
    if context_override_applied {
        composite = composite.max(95.0);
    }

    let _ = thresholds;
    Scores {
        execution_time,
        scan_efficiency,
        index_quality,
        join_efficiency,
        scalability,
        composite,
        context_override_applied
    }
}
