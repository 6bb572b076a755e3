//! Elementwise and windowed operations over equal-length numeric sequences.
//!
//! Every operation taking more than one sequence checks lengths first and
//! returns [`BandtraderError::LengthMismatch`] without computing anything.
//! All functions allocate a new output and never modify their inputs.

use crate::domain::error::BandtraderError;

/// Check that every sequence has the same length and return it.
pub fn ensure_equal_length(series: &[&[f64]]) -> Result<usize, BandtraderError> {
    let Some(first) = series.first() else {
        return Err(BandtraderError::invalid_parameter(
            "series",
            "at least one series is required",
        ));
    };
    let expected = first.len();
    for s in &series[1..] {
        if s.len() != expected {
            return Err(BandtraderError::LengthMismatch {
                expected,
                found: s.len(),
            });
        }
    }
    Ok(expected)
}

fn ensure_window(length: usize) -> Result<(), BandtraderError> {
    if length == 0 {
        return Err(BandtraderError::invalid_parameter(
            "length",
            "window length must be at least 1",
        ));
    }
    Ok(())
}

/// Pointwise sum of all series.
pub fn sum_slices(series: &[&[f64]]) -> Result<Vec<f64>, BandtraderError> {
    let n = ensure_equal_length(series)?;
    let mut out = vec![0.0; n];
    for s in series {
        for (o, v) in out.iter_mut().zip(s.iter()) {
            *o += v;
        }
    }
    Ok(out)
}

/// Pointwise product of all series.
pub fn multiply_slices(series: &[&[f64]]) -> Result<Vec<f64>, BandtraderError> {
    let n = ensure_equal_length(series)?;
    let mut out = vec![1.0; n];
    for s in series {
        for (o, v) in out.iter_mut().zip(s.iter()) {
            *o *= v;
        }
    }
    Ok(out)
}

/// Pointwise mean of the inputs, used as the blended price fed to MA/EMA.
fn blended(series: &[&[f64]]) -> Result<Vec<f64>, BandtraderError> {
    let count = series.len() as f64;
    let mut out = sum_slices(series)?;
    for v in out.iter_mut() {
        *v /= count;
    }
    Ok(out)
}

/// Overwrite the first `length` points with the value at index `length`.
///
/// When the series is too short to reach `length` the head becomes 0.0.
fn fill_head(out: &mut [f64], length: usize) {
    let first_full = out.get(length).copied().unwrap_or(0.0);
    let end = length.min(out.len());
    for v in &mut out[..end] {
        *v = first_full;
    }
}

/// Trailing simple moving average of the pointwise mean of `series`.
///
/// Before the window fills, the running sum is still divided by `length`.
/// With `bias_start` the ramp-up head is replaced by the first full value.
pub fn ma(length: usize, bias_start: bool, series: &[&[f64]]) -> Result<Vec<f64>, BandtraderError> {
    ensure_window(length)?;
    let data = blended(series)?;

    let mut out = Vec::with_capacity(data.len());
    let mut sum = 0.0;
    for i in 0..data.len() {
        sum += data[i];
        if i >= length {
            sum -= data[i - length];
        }
        out.push(sum / length as f64);
    }

    if bias_start {
        fill_head(&mut out, length);
    }
    Ok(out)
}

/// Kernel weights exp(-3k/length) for lag k, normalized to sum to 1.
pub fn ema_weights(length: usize) -> Vec<f64> {
    let raw: Vec<f64> = (0..length)
        .map(|k| (-3.0 * k as f64 / length as f64).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

/// Trailing exponentially weighted average of the pointwise mean of `series`.
///
/// Lags beyond the start of the data contribute nothing; the weights are
/// not renormalized for the partial window.
pub fn ema(length: usize, bias_start: bool, series: &[&[f64]]) -> Result<Vec<f64>, BandtraderError> {
    ensure_window(length)?;
    let data = blended(series)?;
    let weights = ema_weights(length);

    let out_len = data.len();
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let mut acc = 0.0;
        for (k, w) in weights.iter().enumerate().take(i + 1) {
            acc += w * data[i - k];
        }
        out.push(acc);
    }

    if bias_start {
        fill_head(&mut out, length);
    }
    Ok(out)
}

/// Signed run length of consecutive moves in one direction.
///
/// 0 on the first point and wherever the value is unchanged; a rise after a
/// non-negative run extends it, a rise after a falling run restarts at +1,
/// and falls mirror that.
pub fn consecutive_direction(series: &[f64]) -> Vec<i32> {
    let mut out = vec![0; series.len()];
    for i in 1..series.len() {
        let prev = out[i - 1];
        out[i] = if series[i] > series[i - 1] {
            if prev >= 0 { prev + 1 } else { 1 }
        } else if series[i] < series[i - 1] {
            if prev <= 0 { prev - 1 } else { -1 }
        } else {
            0
        };
    }
    out
}

/// Backward difference; the first point is 0.
pub fn differentiate(series: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; series.len()];
    for i in 1..series.len() {
        out[i] = series[i] - series[i - 1];
    }
    out
}

pub fn multiply_slice(scale: f64, series: &[f64]) -> Vec<f64> {
    series.iter().map(|v| scale * v).collect()
}

/// Scale only the points where `gate[i] == *target`.
pub fn multiply_slice_gated<G: PartialEq>(
    scale: f64,
    series: &[f64],
    gate: &[G],
    target: &G,
) -> Result<Vec<f64>, BandtraderError> {
    if gate.len() != series.len() {
        return Err(BandtraderError::LengthMismatch {
            expected: series.len(),
            found: gate.len(),
        });
    }
    Ok(series
        .iter()
        .zip(gate)
        .map(|(v, g)| if g == target { v * scale } else { *v })
        .collect())
}

pub fn offset_slice(offset: f64, series: &[f64]) -> Vec<f64> {
    series.iter().map(|v| offset + v).collect()
}

pub fn reciprocal_slice(series: &[f64]) -> Vec<f64> {
    series.iter().map(|v| 1.0 / v).collect()
}

pub fn abs(series: &[f64]) -> Vec<f64> {
    series.iter().map(|v| v.abs()).collect()
}

/// Cumulative gain from holding only overnight: buy at close, sell next open.
pub fn market_closed_gain(open: &[f64], close: &[f64]) -> Result<Vec<f64>, BandtraderError> {
    let n = ensure_equal_length(&[open, close])?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let next = match i {
            0 => 1.0,
            _ => out[i - 1] * (open[i] / close[i - 1]),
        };
        out.push(next);
    }
    Ok(out)
}

/// Cumulative gain from holding only intraday: buy at open, sell at close.
pub fn market_open_gain(open: &[f64], close: &[f64]) -> Result<Vec<f64>, BandtraderError> {
    let n = ensure_equal_length(&[open, close])?;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let next = match i {
            0 => 1.0,
            _ => out[i - 1] * (close[i] / open[i]),
        };
        out.push(next);
    }
    Ok(out)
}
