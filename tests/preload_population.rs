use std::fs;
use std::path::Path;
use std::sync::Mutex;

use idsearch::collab::offer;
use idsearch::{
    enumerate_candidates, CancellationToken, CandidateId, CollaboratorError, DeadlinePolicy,
    DiagnosticSink, DiscardSink, IdentifyConfig, IdentifyError, Identifier, MatchResult, Outcome,
    Population, PreloadPolicy, SampleLoader, Scorer, TemplateBuilder, TemplateStore,
};

/// Reads a sample file as text.
struct TextLoader;

impl SampleLoader for TextLoader {
    type Sample = String;

    fn load(&self, path: &Path) -> Result<String, CollaboratorError> {
        fs::read_to_string(path).map_err(|err| CollaboratorError::Load(err.to_string()))
    }
}

/// Parses the sample as a single number and offers it as an artifact.
struct NumberBuilder;

impl TemplateBuilder<String> for NumberBuilder {
    type Template = f64;

    fn build(&self, sink: &dyn DiagnosticSink, sample: &String) -> Result<f64, CollaboratorError> {
        let value: f64 = sample
            .trim()
            .parse()
            .map_err(|_| CollaboratorError::Build(format!("not a number: {sample:?}")))?;
        offer(sink, "feature", "text/plain", || sample.trim().as_bytes().to_vec())?;
        Ok(value)
    }
}

/// `100 - |probe - candidate|`.
struct Closeness;

impl Scorer<f64> for Closeness {
    fn score(
        &self,
        _scope: &CancellationToken,
        probe: &f64,
        candidate: &f64,
    ) -> Result<f64, CollaboratorError> {
        Ok(100.0 - (probe - candidate).abs())
    }
}

#[derive(Default)]
struct RecordingSink {
    keys: Mutex<Vec<String>>,
}

impl DiagnosticSink for RecordingSink {
    fn accept(&self, key: &str, mime: &str, payload: &[u8]) -> Result<(), CollaboratorError> {
        assert_eq!(mime, "text/plain");
        assert!(!payload.is_empty());
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

struct RejectingSink;

impl DiagnosticSink for RejectingSink {
    fn accept(&self, key: &str, _mime: &str, _payload: &[u8]) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::SinkRejected {
            key: key.to_string(),
        })
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn population_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "1.txt", "40");
    write(dir.path(), "2.txt", "10");
    write(dir.path(), "left/3.txt", "41.5");
    write(dir.path(), "left/4.txt", "70");
    write(dir.path(), "left/deep/5.txt", "40");
    dir
}

#[test]
fn enumeration_flattens_one_level() {
    let dir = population_dir();
    let ids = enumerate_candidates(dir.path()).unwrap();
    let names: Vec<&str> = ids.iter().map(CandidateId::as_str).collect();
    assert_eq!(names, vec!["1.txt", "2.txt", "left/3.txt", "left/4.txt"]);
}

#[test]
fn enumeration_reports_missing_root() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent");
    let err = enumerate_candidates(&missing).unwrap_err();
    assert!(matches!(err, IdentifyError::Enumerate { ref path, .. } if path == &missing));
}

#[test]
fn preload_builds_every_candidate() {
    let dir = population_dir();
    let population = Population::discover(dir.path()).unwrap();
    let sink = RecordingSink::default();
    let (store, report) = TemplateStore::preload(
        &population,
        &TextLoader,
        &NumberBuilder,
        &sink,
        PreloadPolicy::Abort,
    )
    .unwrap();

    assert_eq!(store.len(), 4);
    assert_eq!(report.templates, 4);
    assert!(report.skipped.is_empty());
    assert_eq!(store.get("left/3.txt"), Some(&41.5));
    assert!(!store.contains("left/deep/5.txt"));
    assert_eq!(sink.keys.lock().unwrap().len(), 4);
    let order: Vec<&str> = store.ids().map(CandidateId::as_str).collect();
    assert_eq!(order, vec!["1.txt", "2.txt", "left/3.txt", "left/4.txt"]);
}

#[test]
fn abort_policy_fails_the_whole_preload() {
    let dir = population_dir();
    write(dir.path(), "left/bad.txt", "not-a-number");
    let population = Population::discover(dir.path()).unwrap();

    let err = TemplateStore::preload(
        &population,
        &TextLoader,
        &NumberBuilder,
        &DiscardSink,
        PreloadPolicy::Abort,
    )
    .unwrap_err();
    assert_eq!(
        err,
        IdentifyError::Population {
            candidate: CandidateId::from("left/bad.txt"),
            source: CollaboratorError::Build("not a number: \"not-a-number\"".into()),
        }
    );
}

#[test]
fn skip_policy_shrinks_the_population() {
    let dir = population_dir();
    write(dir.path(), "left/bad.txt", "not-a-number");
    let population = Population::discover(dir.path()).unwrap();
    assert_eq!(population.len(), 5);

    let (store, report) = TemplateStore::preload(
        &population,
        &TextLoader,
        &NumberBuilder,
        &DiscardSink,
        PreloadPolicy::Skip,
    )
    .unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0.as_str(), "left/bad.txt");
    assert!(!store.contains("left/bad.txt"));
}

#[test]
fn missing_sample_is_a_population_error() {
    let dir = population_dir();
    let ids = vec![CandidateId::from("1.txt"), CandidateId::from("ghost.txt")];
    let population = Population::new(dir.path(), ids).unwrap();
    let err = TemplateStore::preload(
        &population,
        &TextLoader,
        &NumberBuilder,
        &DiscardSink,
        PreloadPolicy::Abort,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        IdentifyError::Population { ref candidate, source: CollaboratorError::Load(_) }
            if candidate.as_str() == "ghost.txt"
    ));
}

#[test]
fn sink_rejection_aborts_template_construction() {
    let dir = population_dir();
    let population = Population::discover(dir.path()).unwrap();
    let err = TemplateStore::preload(
        &population,
        &TextLoader,
        &NumberBuilder,
        &RejectingSink,
        PreloadPolicy::Abort,
    )
    .unwrap_err();
    assert_eq!(
        err,
        IdentifyError::Population {
            candidate: CandidateId::from("1.txt"),
            source: CollaboratorError::SinkRejected {
                key: "feature".into()
            },
        }
    );
}

fn identifier() -> Identifier<TextLoader, NumberBuilder, Closeness> {
    Identifier::new(TextLoader, NumberBuilder, Closeness).with_config(IdentifyConfig {
        threshold: 95.0,
        deadline: DeadlinePolicy::Fixed(std::time::Duration::from_secs(5)),
        parallelism: 2,
        preload_policy: PreloadPolicy::Abort,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identify_excludes_probe_from_its_own_population() {
    let dir = population_dir();
    let population = Population::discover(dir.path()).unwrap();

    let outcome = identifier()
        .identify(&dir.path().join("1.txt"), &population)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Identified(MatchResult {
            candidate: CandidateId::from("left/3.txt"),
            score: 98.5,
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identify_excludes_own_sample_spelled_differently() {
    let dir = population_dir();
    write(dir.path(), "twin.txt", "500");
    let population = Population::discover(dir.path().join(".")).unwrap();

    // Only the probe's own sample would qualify; it must be left out.
    let probe_path = dir.path().join("left").join("..").join("twin.txt");
    let outcome = identifier()
        .identify(&probe_path, &population)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NotIdentified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identify_reports_no_match() {
    let dir = population_dir();
    let population = Population::new(
        dir.path(),
        vec![CandidateId::from("2.txt"), CandidateId::from("left/4.txt")],
    )
    .unwrap();

    let outcome = identifier()
        .identify(&dir.path().join("1.txt"), &population)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NotIdentified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn probe_failure_is_fatal() {
    let dir = population_dir();
    write(dir.path(), "broken-probe.txt", "???");
    let population = Population::discover(dir.path()).unwrap();

    let err = identifier()
        .identify(&dir.path().join("broken-probe.txt"), &population)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IdentifyError::Probe {
            source: CollaboratorError::Build(_)
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn preloaded_store_serves_many_probes() {
    let dir = population_dir();
    let population = Population::discover(dir.path()).unwrap();
    let identifier = identifier().with_sink(RecordingSink::default());
    let (store, report) = identifier.preload(&population).await.unwrap();
    assert_eq!(report.templates, 4);

    for (value, expected) in [("69", Some("left/4.txt")), ("11", Some("2.txt")), ("-300", None)] {
        let probe_dir = tempfile::tempdir().unwrap();
        write(probe_dir.path(), "probe.txt", value);
        let probe = identifier
            .build_probe(&probe_dir.path().join("probe.txt"))
            .await
            .unwrap();
        let session = identifier
            .identify_with_store(probe, std::sync::Arc::clone(&store), None)
            .await
            .unwrap();
        assert_eq!(
            session.outcome.matched().map(|m| m.candidate.as_str()),
            expected
        );
    }
}
