// Guards the demo artifacts shipped under `artifacts/` so `cargo run` works out of the box.

use fake_news_api::{DiscoveryOptions, ModelCatalog, ModelRegistry, PredictionRequest, PredictionService, Verdict};
use newsguard_core::PredictionMetrics;
use std::path::PathBuf;
use std::sync::Arc;

fn bundled() -> ModelRegistry {
    let opts = DiscoveryOptions {
        artifact_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts"),
        vectorizer_file: "tfidf_vectorizer.json".into(),
        model_suffix: ".json".into(),
    };
    ModelRegistry::discover(&opts).unwrap()
}

#[test]
fn bundled_registry_loads() {
    let reg = bundled();
    assert_eq!(reg.list_models(), vec!["decision_tree", "logistic_regression", "naive_bayes"]);
    assert_eq!(reg.dim(), 12);
}

#[test]
fn bundled_models_agree_on_clear_cases() {
    let svc = PredictionService::new(Arc::new(bundled()), Arc::new(PredictionMetrics::new().unwrap()));
    for model in svc.list_models() {
        let fake = svc.predict(PredictionRequest { text: "SHOCKING conspiracy EXPOSED!!! [video]".into(), model: model.clone() }).unwrap();
        assert_eq!(fake.prediction, Verdict::Fake, "model {model}");
        let real = svc.predict(PredictionRequest { text: "(Reuters) The minister said in an official statement.".into(), model: model.clone() }).unwrap();
        assert_eq!(real.prediction, Verdict::NotFake, "model {model}");
    }
}

#[test]
fn example_config_resolves_from_workspace_root() {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace = crate_dir.join("../..");
    let example = crate_dir.join("config.example.yaml");
    let cfg = newsguard_core::config::load_config_from("fake-news-api", Some(example.as_path())).unwrap();
    assert!(cfg.artifact_dir.is_relative());
    let mut opts = DiscoveryOptions::from(&cfg);
    opts.artifact_dir = workspace.join(&cfg.artifact_dir);
    assert_eq!(ModelRegistry::discover(&opts).unwrap().len(), 3);
}
