//! Random-search hyperparameter tuning over an injected [`Trainer`].

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

use crate::capability::{CapabilityError, ExportFormat, TrainedModel, Trainer};
use crate::error::{DatasetError, DatasetResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub lr0: f64,
    pub batch_size: u32,
    pub img_size: u32,
}

/// Where trial parameters are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    /// Sampled log-uniformly.
    pub lr0: (f64, f64),
    pub batch_sizes: Vec<u32>,
    pub img_sizes: Vec<u32>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            lr0: (1e-4, 1e-1),
            batch_sizes: vec![8, 16, 32],
            img_sizes: vec![640, 768],
        }
    }
}

impl SearchSpace {
    pub fn validate(&self) -> DatasetResult<()> {
        let (low, high) = self.lr0;
        if !(low > 0.0 && low <= high && high.is_finite()) {
            return Err(DatasetError::InvalidArgument(format!(
                "lr0 range must be positive and ordered, got [{}, {}]",
                low, high
            )));
        }
        if self.batch_sizes.is_empty() || self.img_sizes.is_empty() {
            return Err(DatasetError::InvalidArgument(
                "batch size and image size choices must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Draw one parameter set. The space must have passed [`validate`](Self::validate).
    pub fn suggest(&self, rng: &mut StdRng) -> Hyperparameters {
        let (low, high) = self.lr0;
        let lr0 = if low == high {
            low
        } else {
            rng.gen_range(low.ln()..high.ln()).exp().clamp(low, high)
        };
        Hyperparameters {
            lr0,
            batch_size: self.batch_sizes.choose(rng).copied().unwrap_or(16),
            img_size: self.img_sizes.choose(rng).copied().unwrap_or(640),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub number: usize,
    pub params: Hyperparameters,
    pub value: f64,
}

/// A maximizing random-search study.
#[derive(Debug)]
pub struct Study {
    space: SearchSpace,
    rng: StdRng,
    trials: Vec<TrialRecord>,
}

impl Study {
    pub fn new(space: SearchSpace, rng: StdRng) -> DatasetResult<Self> {
        space.validate()?;
        Ok(Self {
            space,
            rng,
            trials: Vec::new(),
        })
    }

    /// Run `n_trials` trials of `objective` and return the best trial so far.
    pub fn optimize<F>(&mut self, mut objective: F, n_trials: usize) -> DatasetResult<&TrialRecord>
    where
        F: FnMut(&Hyperparameters) -> f64,
    {
        for _ in 0..n_trials {
            let params = self.space.suggest(&mut self.rng);
            let value = objective(&params);
            let number = self.trials.len();
            info!(
                "Trial {} finished with value {:.5} (lr0={:.6}, batch_size={}, img_size={})",
                number, value, params.lr0, params.batch_size, params.img_size
            );
            self.trials.push(TrialRecord {
                number,
                params,
                value,
            });
        }
        self.best_trial().ok_or_else(|| {
            DatasetError::InvalidArgument("no completed trials to choose from".to_string())
        })
    }

    /// Highest-valued trial; NaN values never win.
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials
            .iter()
            .filter(|t| !t.value.is_nan())
            .fold(None, |best: Option<&TrialRecord>, t| match best {
                Some(b) if b.value >= t.value => Some(b),
                _ => Some(t),
            })
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }
}

/// Search hyperparameters by training on `manifest` once per trial.
///
/// A failed training run scores 0.0 so the search can continue.
pub fn tune<T: Trainer>(
    trainer: &mut T,
    manifest: &Path,
    space: SearchSpace,
    n_trials: usize,
    epochs: u32,
    rng: StdRng,
) -> DatasetResult<Hyperparameters> {
    let mut study = Study::new(space, rng)?;
    let best = study.optimize(
        |params| match trainer.train(manifest, params, epochs) {
            Ok(trained) => trained.metric,
            Err(e) => {
                warn!("Training failed, scoring trial as 0.0: {}", e);
                0.0
            }
        },
        n_trials,
    )?;
    info!("Best trial {} with value {:.5}", best.number, best.value);
    Ok(best.params)
}

/// Train once with `params` and export the result.
pub fn train_and_export<T: Trainer>(
    trainer: &mut T,
    manifest: &Path,
    params: &Hyperparameters,
    epochs: u32,
    format: ExportFormat,
) -> Result<(TrainedModel<T::Model>, PathBuf), CapabilityError> {
    let trained = trainer.train(manifest, params, epochs)?;
    let exported = trainer.export(&trained.model, format)?;
    info!("Exported model to {}", exported.display());
    Ok((trained, exported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    /// Scores larger images and learning rates near 0.01 higher; fails on batch 8.
    struct FakeTrainer {
        calls: usize,
    }

    impl Trainer for FakeTrainer {
        type Model = String;

        fn train(
            &mut self,
            _manifest: &Path,
            params: &Hyperparameters,
            _epochs: u32,
        ) -> Result<TrainedModel<String>, CapabilityError> {
            self.calls += 1;
            if params.batch_size == 8 {
                return Err("out of memory".into());
            }
            let metric = params.img_size as f64 / 1000.0 - (params.lr0.log10() + 2.0).abs() * 0.01;
            Ok(TrainedModel {
                model: format!("model-{}", self.calls),
                metric,
            })
        }

        fn export(&self, model: &String, _format: ExportFormat) -> Result<PathBuf, CapabilityError> {
            Ok(PathBuf::from(format!("{}.onnx", model)))
        }
    }

    #[test]
    fn suggestions_stay_in_the_space() {
        let space = SearchSpace::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let p = space.suggest(&mut rng);
            assert!((1e-4..=1e-1).contains(&p.lr0));
            assert!(space.batch_sizes.contains(&p.batch_size));
            assert!(space.img_sizes.contains(&p.img_size));
        }
    }

    #[test]
    fn study_returns_highest_value() {
        let mut study = Study::new(SearchSpace::default(), StdRng::seed_from_u64(5)).unwrap();
        let best = study.optimize(|p| p.batch_size as f64, 20).unwrap().clone();
        assert_eq!(study.trials().len(), 20);
        assert!(study.trials().iter().all(|t| t.value <= best.value));
        assert!(study.trials().iter().any(|t| t.value == best.value));
    }

    #[test]
    fn zero_trials_is_an_error() {
        let mut study = Study::new(SearchSpace::default(), StdRng::seed_from_u64(5)).unwrap();
        assert!(study.optimize(|_| 1.0, 0).is_err());
    }

    #[test]
    fn tune_scores_failed_runs_as_zero() {
        let mut trainer = FakeTrainer { calls: 0 };
        let best = tune(
            &mut trainer,
            Path::new("dataset.yaml"),
            SearchSpace::default(),
            15,
            1,
            StdRng::seed_from_u64(9),
        )
        .unwrap();
        assert_eq!(trainer.calls, 15);
        assert_ne!(best.batch_size, 8);
    }

    #[test]
    fn invalid_space_is_rejected() {
        let space = SearchSpace {
            lr0: (0.1, 0.01),
            ..SearchSpace::default()
        };
        assert!(Study::new(space, StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn train_and_export_returns_artifact() {
        let mut trainer = FakeTrainer { calls: 0 };
        let params = Hyperparameters {
            lr0: 0.01,
            batch_size: 16,
            img_size: 640,
        };
        let (trained, path) = train_and_export(
            &mut trainer,
            Path::new("dataset.yaml"),
            &params,
            50,
            ExportFormat::default(),
        )
        .unwrap();
        assert_eq!(trained.model, "model-1");
        assert_eq!(path, PathBuf::from("model-1.onnx"));
    }
}
