//! Engine behavior at the edges: exemptions, restrictions, invalid cells,
//! time-cut exclusion and the per-cell invariants.

mod common;

use common::{chain, chain_with_restrictions, emb2_chain, records, uniform_noise, SIGMA};
use topocal_algorithms::{ClusteringConfig, TopoClustering};
use topocal_core::{CellRecord, GainState, QualityProvenance, Sampling};

#[test]
fn test_noise_exempt_cell_joins_despite_cell_threshold() {
    let geometry = chain(&[Sampling::EMB2, Sampling::PreSamplerB]);
    let cells = records(&[10.0, 0.1]);
    let noise = uniform_noise(2);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 1.0)).unwrap();
    let mut state = engine.create_state(2);

    engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();

    // 0.1 sigma is far below the 1 sigma cell threshold, but the
    // presampler is exempt from noise cuts.
    let tag = state.tags().get(1);
    assert!(tag.is_claimed());
    assert_eq!(tag.primary(), 0);
    assert_eq!(state.statistics().terminal, 1);
}

#[test]
fn test_noise_exempt_cell_never_seeds_or_grows() {
    // A loud exempt cell between the seed and a growable cell.
    let geometry = chain(&[Sampling::EMB2, Sampling::PreSamplerB, Sampling::EMB2]);
    let cells = records(&[10.0, 10.0, 3.0]);
    let noise = uniform_noise(3);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();
    let mut state = engine.create_state(3);

    let n = engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();

    // The exempt cell joined as a terminal member but did not seed a
    // cluster of its own and did not extend the frontier.
    assert_eq!(n, 1);
    assert_eq!(state.statistics().seeds, 1);
    assert!(state.tags().get(1).is_claimed());
    assert!(!state.tags().get(2).is_claimed());
}

#[test]
fn test_bad_cell_blocks_growth_without_aborting() {
    let geometry = emb2_chain(3);
    let mut cells = records(&[10.0, 5.0, 3.0]);
    cells[1].quality = QualityProvenance(QualityProvenance::MASKED_BAD);
    let noise = uniform_noise(3);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();
    let mut state = engine.create_state(3);

    let n = engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();

    assert_eq!(n, 1);
    assert!(!state.tags().get(1).is_claimed(), "bad cell never joins");
    assert!(!state.tags().get(2).is_claimed(), "growth stops at the bad cell");
    assert_eq!(state.statistics().usable_cells, 2);
}

#[test]
fn test_unrecognized_gain_flows_into_invalid_record() {
    // The decode path: a raw gain outside the four states is a data
    // error, and the caller substitutes a masked-bad record.
    let raw_gain = 9u8;
    let record = match GainState::from_raw(raw_gain) {
        Ok(gain) => CellRecord::new(500.0, 0.0, gain),
        Err(_) => {
            let mut bad = CellRecord::new(500.0, 0.0, GainState::High);
            bad.quality = QualityProvenance(QualityProvenance::MASKED_BAD);
            bad
        }
    };
    assert!(record.is_bad());

    let geometry = emb2_chain(2);
    let cells = vec![records(&[10.0])[0], record];
    let noise = uniform_noise(2);
    let engine = TopoClustering::new(ClusteringConfig::default()).unwrap();
    let mut state = engine.create_state(2);
    engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();
    assert!(!state.tags().get(1).is_claimed());
}

#[test]
fn test_out_of_time_seed_candidate() {
    let geometry = emb2_chain(2);
    let noise = uniform_noise(2);
    let mut cells = records(&[10.0, 5.0]);
    cells[1].time = 50.0;

    // Without the exclusion flag the candidate merely fails seeding and
    // is absorbed as a growth member.
    let config = ClusteringConfig::default()
        .with_thresholds(4.0, 2.0, 0.0)
        .with_seed_time_cut(12.5, false);
    let engine = TopoClustering::new(config).unwrap();
    let mut state = engine.create_state(2);
    let n = engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();
    assert_eq!(n, 1);
    assert!(state.tags().get(1).is_claimed());
    assert!((state.clusters()[0].energy - 1500.0).abs() < 1e-9);

    // With the flag the cell leaves the pass entirely.
    let config = ClusteringConfig::default()
        .with_thresholds(4.0, 2.0, 0.0)
        .with_seed_time_cut(12.5, true);
    let engine = TopoClustering::new(config).unwrap();
    let mut state = engine.create_state(2);
    let n = engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();
    assert_eq!(n, 1);
    assert!(!state.tags().get(1).is_claimed());
    assert_eq!(state.statistics().out_of_time_excluded, 1);
    assert!((state.clusters()[0].energy - 1000.0).abs() < 1e-9);
}

#[test]
fn test_presampler_restriction_bounds_growth() {
    let samplings = [Sampling::EMB2, Sampling::PreSamplerE, Sampling::PreSamplerE];
    let significances = [10.0, 3.0, 3.0];
    let noise = uniform_noise(3);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();

    // Unrestricted: growth runs through the presampler chain.
    let geometry = chain_with_restrictions(&samplings, false, false);
    let mut state = engine.create_state(3);
    engine
        .cluster(&geometry, &records(&significances), &noise, &mut state)
        .unwrap();
    assert!(state.tags().get(2).is_claimed());

    // Restricted: the presampler cell answers every neighbor query with
    // its (empty) next-in-sampling range, so growth stops there.
    let geometry = chain_with_restrictions(&samplings, false, true);
    let mut state = engine.create_state(3);
    engine
        .cluster(&geometry, &records(&significances), &noise, &mut state)
        .unwrap();
    assert!(state.tags().get(1).is_claimed());
    assert!(!state.tags().get(2).is_claimed());
}

#[test]
fn test_unclaimed_cells_fail_both_thresholds() {
    let geometry = emb2_chain(5);
    let significances = [10.0, 3.0, 1.5, 0.5, 0.8];
    let cells = records(&significances);
    let noise = uniform_noise(5);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 1.0)).unwrap();
    let mut state = engine.create_state(5);

    engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();

    for (cell, significance) in significances.iter().enumerate() {
        if !state.tags().get(cell).is_claimed() {
            assert!(
                significance.abs() < 2.0 && significance.abs() < 1.0,
                "unclaimed cell {cell} at {significance} sigma"
            );
        }
    }
}

#[test]
fn test_weights_sum_to_one_per_member() {
    let geometry = emb2_chain(3);
    let cells = records(&[6.0, 2.5, 5.0]);
    let noise = uniform_noise(3);
    let engine =
        TopoClustering::new(ClusteringConfig::default().with_thresholds(4.0, 2.0, 0.0)).unwrap();
    let mut state = engine.create_state(3);
    engine.cluster(&geometry, &cells, &noise, &mut state).unwrap();

    for (cell, tag) in state.tags().iter() {
        if !tag.is_claimed() {
            continue;
        }
        if tag.is_shared() {
            let weight = tag.shared_weight();
            assert!(weight > 0.0 && weight < 1.0, "cell {cell}");
            assert_ne!(tag.primary(), tag.secondary());
            assert!((weight + (1.0 - weight) - 1.0).abs() < f32::EPSILON);
        } else {
            assert!((tag.shared_weight() - 1.0).abs() < f32::EPSILON);
        }
    }
}

#[test]
fn test_two_gaussian_flag_changes_tile_significance_only() {
    use topocal_core::NoiseTable;

    // A Tile seed just above threshold under the single-Gaussian model.
    let geometry = chain(&[Sampling::TileBar0, Sampling::TileBar0]);
    let cells = records(&[4.2, 2.5]);
    let mut noise = NoiseTable::new(2);
    for cell in 0..2 {
        noise.set_sigma(cell, GainState::High, SIGMA).unwrap();
        noise
            .set_second_gaussian(cell, GainState::High, 4.0 * SIGMA, 0.3)
            .unwrap();
    }

    let plain = TopoClustering::new(ClusteringConfig::default()).unwrap();
    let mut state = plain.create_state(2);
    let n = plain.cluster(&geometry, &cells, &noise, &mut state).unwrap();
    assert_eq!(n, 1);

    // The widened effective sigma pushes the seed below threshold.
    let widened = TopoClustering::new(
        ClusteringConfig::default().with_two_gaussian_noise(true),
    )
    .unwrap();
    let mut state = widened.create_state(2);
    let n = widened.cluster(&geometry, &cells, &noise, &mut state).unwrap();
    assert_eq!(n, 0);
}
