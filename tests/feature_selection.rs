use bayesbound::classifier::{Classifier, ClassifierError, FittedClassifier, OutputKind, builtin_classifiers};
use bayesbound::progress::{SelectionObserver, SelectionStage};
use bayesbound::select::{SelectionConfig, evaluate_in_sample, in_sample_divergence, select_features};
use bayesbound::types::{Dataset, Label};
use ndarray::ArrayView2;

/// Label is `x0 xor x3`; the remaining columns are noise.
fn xor_dataset() -> Dataset {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..64i64 {
        let x0 = i & 1;
        let x3 = (i >> 1) & 1;
        rows.push(vec![x0, (i >> 2) % 3, (i >> 3) % 2, x3, i % 7]);
        labels.push((x0 ^ x3) as Label);
    }
    Dataset::from_rows(&rows, labels).unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Vec<(SelectionStage, &'static str, usize)>,
}

impl SelectionObserver for Recorder {
    fn on_stage_start(&mut self, stage: SelectionStage, total_rounds: usize) {
        self.events.push((stage, "start", total_rounds));
    }
    fn on_stage_advance(&mut self, stage: SelectionStage, completed_rounds: usize) {
        self.events.push((stage, "advance", completed_rounds));
    }
    fn on_stage_finish(&mut self, stage: SelectionStage) {
        self.events.push((stage, "finish", 0));
    }
}

struct FailingModel;

struct NeverPredicts;

impl Classifier for NeverPredicts {
    fn name(&self) -> &str {
        "never"
    }
    fn output(&self) -> OutputKind {
        OutputKind::Continuous
    }
    fn fit(
        &self,
        _features: ArrayView2<'_, i64>,
        _labels: &[Label],
    ) -> Result<Box<dyn FittedClassifier>, ClassifierError> {
        Ok(Box::new(FailingModel))
    }
}

impl FittedClassifier for FailingModel {
    fn predict(&self, _features: ArrayView2<'_, i64>) -> Result<Vec<f64>, ClassifierError> {
        Err(ClassifierError::Prediction("singular matrix".to_string()))
    }
}

#[test]
fn xor_pair_is_found_with_full_sampling() {
    let data = xor_dataset();
    let reference = in_sample_divergence(&data).unwrap();
    assert_eq!(reference, 1.0);

    let config = SelectionConfig {
        feature_sampling: 5,
        max_features: 5,
        seed: Some(17),
    };
    let mut recorder = Recorder::default();
    let outcome =
        select_features(&data, None, &builtin_classifiers(), &config, &mut recorder).unwrap();

    // Any single feature is useless for xor, so the pair takes two rounds at least.
    assert!(outcome.rounds.len() >= 2);
    assert_eq!(outcome.rounds.last().unwrap().divergence, 1.0);
    let selected = &outcome.selected;
    assert!(selected.contains(&0) && selected.contains(&3));

    assert_eq!(recorder.events.first(), Some(&(SelectionStage::Baseline, "start", 1)));
    assert_eq!(
        recorder.events.last(),
        Some(&(SelectionStage::Search, "finish", 0))
    );
}

#[test]
fn failing_classifier_is_reported_as_nan() {
    let data = xor_dataset();
    let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(NeverPredicts)];
    let evaluation = evaluate_in_sample(&data, &classifiers).unwrap();
    assert_eq!(evaluation.aucs.len(), 2);
    assert_eq!(evaluation.aucs[0], 1.0);
    assert!(evaluation.aucs[1].is_nan());
}
