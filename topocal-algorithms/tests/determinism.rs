//! Bit-reproducibility of the clustering pass.

mod common;

use common::{emb2_chain, records, uniform_noise};
use topocal_algorithms::{ClusteringConfig, TopoClustering};

const SIGNIFICANCES: [f32; 12] = [
    5.0, 2.5, 1.0, 0.2, 6.0, 2.0, 2.2, 0.1, 4.5, 3.0, 2.1, 0.9,
];

#[test]
fn test_identical_inputs_give_bit_identical_assignment() {
    let geometry = emb2_chain(SIGNIFICANCES.len());
    let cells = records(&SIGNIFICANCES);
    let noise = uniform_noise(SIGNIFICANCES.len());
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();

    let mut first = engine.create_state(SIGNIFICANCES.len());
    let mut second = engine.create_state(SIGNIFICANCES.len());
    let n_first = engine.cluster(&geometry, &cells, &noise, &mut first).unwrap();
    let n_second = engine.cluster(&geometry, &cells, &noise, &mut second).unwrap();

    assert_eq!(n_first, n_second);
    assert_eq!(first.tags(), second.tags());
    assert_eq!(first.clusters(), second.clusters());
    assert_eq!(first.survivors(), second.survivors());
    assert_eq!(first.statistics(), second.statistics());
}

#[test]
fn test_reused_state_matches_fresh_state() {
    let geometry = emb2_chain(SIGNIFICANCES.len());
    let cells = records(&SIGNIFICANCES);
    let noise = uniform_noise(SIGNIFICANCES.len());
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();

    let mut reused = engine.create_state(SIGNIFICANCES.len());
    // Dirty the state with a different event first.
    let other = records(&[0.1; 12]);
    engine.cluster(&geometry, &other, &noise, &mut reused).unwrap();
    engine.cluster(&geometry, &cells, &noise, &mut reused).unwrap();

    let mut fresh = engine.create_state(SIGNIFICANCES.len());
    engine.cluster(&geometry, &cells, &noise, &mut fresh).unwrap();

    assert_eq!(reused.tags(), fresh.tags());
    assert_eq!(reused.clusters(), fresh.clusters());
    assert_eq!(reused.survivors(), fresh.survivors());
}
