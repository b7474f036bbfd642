use std::sync::Arc;
use std::time::Duration;

use idsearch::collab::TemplateBuilder;
use idsearch::reference::{GraySample, ZnccScorer, ZnccTemplateBuilder};
use idsearch::{
    CandidateId, DeadlinePolicy, DiscardSink, IdentifyConfig, Outcome, Session, TemplateStore,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn noise_sample(rng: &mut StdRng, width: usize, height: usize) -> GraySample {
    let data = (0..width * height).map(|_| rng.random::<u8>()).collect();
    GraySample::new(data, width, height).unwrap()
}

fn perturb(rng: &mut StdRng, sample: &GraySample) -> GraySample {
    let data = sample
        .data()
        .iter()
        .map(|&v| (i16::from(v) + rng.random_range(-10i16..=10)).clamp(0, 255) as u8)
        .collect();
    GraySample::new(data, sample.width(), sample.height()).unwrap()
}

fn config() -> IdentifyConfig {
    IdentifyConfig {
        threshold: 90.0,
        deadline: DeadlinePolicy::Fixed(Duration::from_secs(10)),
        parallelism: 4,
        ..IdentifyConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn noisy_probe_finds_its_source() {
    let mut rng = StdRng::seed_from_u64(7);
    let builder = ZnccTemplateBuilder::new(16);
    let samples: Vec<GraySample> = (0..24).map(|_| noise_sample(&mut rng, 64, 64)).collect();
    let store = TemplateStore::from_templates(samples.iter().enumerate().map(|(idx, sample)| {
        let template = builder.build(&DiscardSink, sample).unwrap();
        (CandidateId::from(format!("finger-{idx:02}")), template)
    }))
    .unwrap();

    let probe_sample = perturb(&mut rng, &samples[13]);
    let probe = builder.build(&DiscardSink, &probe_sample).unwrap();

    let report = Session::new(config())
        .unwrap()
        .run(Arc::new(store), Arc::new(probe), None, Arc::new(ZnccScorer))
        .await
        .unwrap();
    let matched = report.outcome.matched().expect("source should be identified");
    assert_eq!(matched.candidate.as_str(), "finger-13");
    assert!(matched.score > 95.0, "score {}", matched.score);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrelated_probe_is_not_identified() {
    let mut rng = StdRng::seed_from_u64(11);
    let builder = ZnccTemplateBuilder::new(16);
    let store = TemplateStore::from_templates((0..24).map(|idx| {
        let template = builder
            .build(&DiscardSink, &noise_sample(&mut rng, 64, 64))
            .unwrap();
        (CandidateId::from(format!("finger-{idx:02}")), template)
    }))
    .unwrap();
    let probe = builder
        .build(&DiscardSink, &noise_sample(&mut rng, 64, 64))
        .unwrap();

    let report = Session::new(config())
        .unwrap()
        .run(Arc::new(store), Arc::new(probe), None, Arc::new(ZnccScorer))
        .await
        .unwrap();
    assert_eq!(report.outcome, Outcome::NotIdentified);
    assert_eq!(report.stats.received, 24);
}
