//! Random partitioning of records into train/val/test sets and per-group sampling.
//!
//! All functions take the random generator explicitly so callers control
//! reproducibility through the seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{DatasetError, DatasetResult};
use crate::types::SplitData;

fn check_ratio(name: &str, ratio: f64) -> DatasetResult<()> {
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(DatasetError::InvalidArgument(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, ratio
        )))
    }
}

/// Check that `train_ratio` and `val_ratio` describe a valid three-way split.
pub fn validate_ratios(train_ratio: f64, val_ratio: f64) -> DatasetResult<()> {
    check_ratio("train ratio", train_ratio)?;
    check_ratio("val ratio", val_ratio)?;
    if train_ratio + val_ratio > 1.0 + f64::EPSILON {
        return Err(DatasetError::InvalidArgument(format!(
            "train ratio + val ratio must not exceed 1.0, got {}",
            train_ratio + val_ratio
        )));
    }
    Ok(())
}

/// Shuffle `items` and cut them into train/val/test.
///
/// Cuts are at `floor(train_ratio * n)` and `floor((train_ratio + val_ratio) * n)`,
/// the remainder is the test set.
pub fn split_by_ratio<T>(
    mut items: Vec<T>,
    train_ratio: f64,
    val_ratio: f64,
    rng: &mut StdRng,
) -> DatasetResult<SplitData<T>> {
    validate_ratios(train_ratio, val_ratio)?;
    items.shuffle(rng);

    let total = items.len();
    let train_end = cut_point(train_ratio, total);
    let val_end = cut_point(train_ratio + val_ratio, total).max(train_end);

    let test = items.split_off(val_end);
    let val = items.split_off(train_end);

    Ok(SplitData {
        train: items,
        val,
        test,
    })
}

/// Shuffle `items` and cut once at `floor(ratio * n)`.
///
/// Returns `(first, rest)`.
pub fn split_in_two<T>(
    mut items: Vec<T>,
    ratio: f64,
    rng: &mut StdRng,
) -> DatasetResult<(Vec<T>, Vec<T>)> {
    check_ratio("split ratio", ratio)?;
    items.shuffle(rng);
    let rest = items.split_off(cut_point(ratio, items.len()));
    Ok((items, rest))
}

// Floor, with a little slack so 0.7 + 0.2 still cuts at 90%.
fn cut_point(ratio: f64, total: usize) -> usize {
    ((ratio * total as f64 + 1e-9).floor() as usize).min(total)
}

/// Per-group quotas that sum to `total`: the first `total % groups` groups
/// get one extra item.
pub fn even_quotas(total: usize, groups: usize) -> Vec<usize> {
    if groups == 0 {
        return Vec::new();
    }
    let base = total / groups;
    let extra = total % groups;
    (0..groups).map(|i| base + usize::from(i < extra)).collect()
}

/// Draw an even share of `total` items from each group, without replacement.
///
/// Every group is checked against its quota before anything is drawn.
pub fn sample_even_quota<T: Clone>(
    groups: &[Vec<T>],
    total: usize,
    rng: &mut StdRng,
) -> DatasetResult<Vec<Vec<T>>> {
    if groups.is_empty() {
        if total == 0 {
            return Ok(Vec::new());
        }
        return Err(DatasetError::InvalidArgument(
            "cannot sample from an empty list of source groups".to_string(),
        ));
    }

    let quotas = even_quotas(total, groups.len());
    for (group, (items, &requested)) in groups.iter().zip(&quotas).enumerate() {
        if items.len() < requested {
            return Err(DatasetError::InsufficientSamples {
                group,
                available: items.len(),
                requested,
            });
        }
    }

    Ok(groups
        .iter()
        .zip(quotas)
        .map(|(items, quota)| items.choose_multiple(rng, quota).cloned().collect())
        .collect())
}
