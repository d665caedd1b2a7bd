//! Test helpers for the photon-stream workspace
//!
//! Statistical checks shared by the test suites of the sampling engine and the
//! emission sources: sample moments, binned counts and a Kolmogorov–Smirnov
//! statistic against an arbitrary cumulative distribution.

/// Error type for test helper operations
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TestHelperError {
    #[error("Empty sample")]
    EmptySample,

    #[error("Invalid histogram edges: {0}")]
    InvalidEdges(String),
}

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Arithmetic mean of a sample.
pub fn mean(samples: &[f64]) -> Result<f64, TestHelperError> {
    if samples.is_empty() {
        return Err(TestHelperError::EmptySample);
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population variance of a sample.
pub fn variance(samples: &[f64]) -> Result<f64, TestHelperError> {
    let m = mean(samples)?;
    Ok(samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / samples.len() as f64)
}

/// Count samples per bin. Bins are `[edges[i], edges[i+1])`, the last bin is
/// closed, and samples outside the edges are ignored.
pub fn histogram(samples: &[f64], edges: &[f64]) -> Result<Vec<usize>, TestHelperError> {
    if edges.len() < 2 {
        return Err(TestHelperError::InvalidEdges(format!(
            "need at least 2 edges, got {}",
            edges.len()
        )));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(TestHelperError::InvalidEdges(
            "edges must be strictly increasing".to_string(),
        ));
    }

    let n_bins = edges.len() - 1;
    let mut counts = vec![0; n_bins];
    for &x in samples {
        if x < edges[0] || x > edges[n_bins] {
            continue;
        }
        let bin = edges.partition_point(|&e| e <= x).saturating_sub(1).min(n_bins - 1);
        counts[bin] += 1;
    }
    Ok(counts)
}

/// Kolmogorov–Smirnov statistic of a sample against the cumulative
/// distribution `cdf`.
///
/// Returns the largest distance between the empirical and theoretical CDFs.
pub fn ks_statistic<F>(samples: &[f64], cdf: F) -> Result<f64, TestHelperError>
where
    F: Fn(f64) -> f64,
{
    let n = samples.len();
    if n == 0 {
        return Err(TestHelperError::EmptySample);
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut max_diff: f64 = 0.0;
    for (i, &value) in sorted.iter().enumerate() {
        let theoretical = cdf(value);
        let before = i as f64 / n as f64;
        let after = (i + 1) as f64 / n as f64;
        max_diff = max_diff
            .max((before - theoretical).abs())
            .max((after - theoretical).abs());
    }
    Ok(max_diff)
}

/// Critical value of the KS statistic at significance `alpha`
///
/// Uses the asymptotic approximation, valid for large n.
pub fn ks_critical_value(n: usize, alpha: f64) -> f64 {
    let c_alpha = match alpha {
        a if (a - 0.10).abs() < 1e-6 => 1.22,
        a if (a - 0.05).abs() < 1e-6 => 1.36,
        a if (a - 0.01).abs() < 1e-6 => 1.63,
        a if (a - 0.001).abs() < 1e-6 => 1.95,
        _ => 1.36,
    };
    c_alpha / (n as f64).sqrt()
}
