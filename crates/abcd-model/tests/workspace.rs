//! End-to-end synthesis: in-memory event tables through the yield cache and
//! block aggregation into recorded model content.

use std::collections::BTreeSet;
use std::sync::Arc;

use abcd_core::{
    Bin, Block, BlockYields, Cut, FallbackPolicy, FlatLumiWeight, Process, ProcessKind,
    Systematic, YieldManager, YieldStore,
};
use abcd_events::EventTable;
use abcd_model::{BlindLevel, FactoryCall, RecordingBuilder, WorkspaceGenerator};
use approx::assert_relative_eq;

/// A 2×2 grid with cell populations A=100, B=50, C=40, D=15 and unit
/// per-event weights.
fn grid_table(id: &str) -> EventTable {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (count, cx, cy) in [(100usize, 0.0, 0.0), (50, 1.0, 0.0), (40, 0.0, 1.0), (15, 1.0, 1.0)] {
        x.extend(std::iter::repeat(cx).take(count));
        y.extend(std::iter::repeat(cy).take(count));
    }
    let n = x.len();
    EventTable::new(id)
        .with_column("x", x)
        .unwrap()
        .with_column("y", y)
        .unwrap()
        .with_column("weight", vec![1.0; n])
        .unwrap()
}

/// Signal populates the (1,1) cell only.
fn signal_table() -> EventTable {
    EventTable::new("sig-events")
        .with_column("x", vec![1.0; 10])
        .unwrap()
        .with_column("y", vec![1.0; 10])
        .unwrap()
        .with_column("weight", vec![1.0; 10])
        .unwrap()
}

fn abcd_block() -> Block {
    Block::new(
        "m",
        vec![
            vec![Bin::new("a", Cut::new("x==0&&y==0")), Bin::new("b", Cut::new("x==1&&y==0"))],
            vec![Bin::new("c", Cut::new("x==0&&y==1")), Bin::new("d", Cut::new("x==1&&y==1"))],
        ],
    )
}

fn manager() -> YieldManager {
    let store = Arc::new(YieldStore::with_policies(
        1.0,
        Box::new(FlatLumiWeight),
        FallbackPolicy::default(),
    ));
    YieldManager::new(store, 1.0)
}

fn generator(block: Block) -> WorkspaceGenerator {
    let background =
        Process::new("bkg", ProcessKind::Background, Arc::new(grid_table("bkg-events")));
    let signal = Process::new("sig", ProcessKind::Signal, Arc::new(signal_table()));
    let data = Process::new("data", ProcessKind::Data, Arc::new(grid_table("data-events")));
    WorkspaceGenerator::new(
        Cut::default(),
        BTreeSet::from([block]),
        BTreeSet::from([background]),
        signal,
        data,
        manager(),
    )
}

#[test]
fn block_aggregation_matches_expected_grid() {
    let background =
        Process::new("bkg", ProcessKind::Background, Arc::new(grid_table("bkg-events")));
    let by = BlockYields::new(
        &abcd_block(),
        &BTreeSet::from([background]),
        &Cut::default(),
        &manager(),
    )
    .unwrap();

    let rows = by.row_sums();
    let cols = by.col_sums();
    assert_relative_eq!(rows[0].value(), 150.0, max_relative = 1e-12);
    assert_relative_eq!(rows[1].value(), 55.0, max_relative = 1e-12);
    assert_relative_eq!(cols[0].value(), 140.0, max_relative = 1e-12);
    assert_relative_eq!(cols[1].value(), 65.0, max_relative = 1e-12);
    assert_eq!(by.max_row(), Some(0));
    assert_eq!(by.max_col(), Some(0));
    assert_relative_eq!(by.total().value(), 205.0, max_relative = 1e-12);
}

#[test]
fn synthesis_seeds_abcd_parameters_from_yields() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("norm_BLK_m") {
        Some(FactoryCall::Parameter { value, lo, hi, .. }) => {
            assert_relative_eq!(*value, 205.0, max_relative = 1e-12);
            assert_eq!(*lo, 0.0);
            assert_relative_eq!(*hi, 1025.0, max_relative = 1e-12);
        }
        other => panic!("norm parameter missing or wrong: {other:?}"),
    }

    match recorder.find("ry21_BLK_m") {
        Some(FactoryCall::Parameter { value, .. }) => {
            assert_relative_eq!(*value, 55.0 / 150.0, max_relative = 1e-12);
        }
        other => panic!("ry21 missing or wrong: {other:?}"),
    }
    match recorder.find("rx21_BLK_m") {
        Some(FactoryCall::Parameter { value, .. }) => {
            assert_relative_eq!(*value, 65.0 / 140.0, max_relative = 1e-12);
        }
        other => panic!("rx21 missing or wrong: {other:?}"),
    }

    match recorder.find("rynorm_BLK_m") {
        Some(FactoryCall::Sum { terms, .. }) => {
            assert_eq!(terms, &vec!["1.".to_string(), "ry21_BLK_m".to_string()]);
        }
        other => panic!("rynorm missing or wrong: {other:?}"),
    }
    match recorder.find("rscale_BLK_m") {
        Some(FactoryCall::Formula { expression, .. }) => {
            assert_eq!(expression, "norm_BLK_m/rnorm_BLK_m");
        }
        other => panic!("rscale missing or wrong: {other:?}"),
    }
}

#[test]
fn dominant_cell_rate_has_no_ratio_factors() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("rate_BLK_m_BIN_a_PRC_bkg") {
        Some(FactoryCall::Product { factors, .. }) => {
            assert_eq!(
                factors,
                &vec!["rscale_BLK_m".to_string(), "frac_BIN_a_PRC_bkg".to_string()]
            );
        }
        other => panic!("dominant-cell rate missing or wrong: {other:?}"),
    }

    match recorder.find("rate_BLK_m_BIN_d_PRC_bkg") {
        Some(FactoryCall::Product { factors, .. }) => {
            assert_eq!(
                factors,
                &vec![
                    "rscale_BLK_m".to_string(),
                    "rx21_BLK_m".to_string(),
                    "ry21_BLK_m".to_string(),
                    "frac_BIN_d_PRC_bkg".to_string(),
                ]
            );
        }
        other => panic!("off-dominant rate missing or wrong: {other:?}"),
    }
}

#[test]
fn blinded_observed_counts_are_summed_backgrounds() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    for (bin, expected) in [("a", 100.0), ("b", 50.0), ("c", 40.0), ("d", 15.0)] {
        match recorder.find(&format!("nobs_BLK_m_BIN_{bin}")) {
            Some(FactoryCall::Observed { value, .. }) => {
                assert_relative_eq!(*value, expected, max_relative = 1e-12);
            }
            other => panic!("nobs for {bin} missing or wrong: {other:?}"),
        }
    }
}

#[test]
fn unblinded_observed_counts_come_from_data() {
    let mut generator = generator(abcd_block());
    generator.set_blind_level(BlindLevel::Unblinded);
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("nobs_BLK_m_BIN_a") {
        Some(FactoryCall::Observed { value, .. }) => {
            assert_relative_eq!(*value, 100.0, max_relative = 1e-12);
        }
        other => panic!("nobs missing or wrong: {other:?}"),
    }
}

#[test]
fn simulation_parameters_carry_effective_counts_and_weights() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("nobsmc_BLK_m_BIN_a_PRC_bkg") {
        Some(FactoryCall::Observed { value, .. }) => {
            assert_relative_eq!(*value, 100.0, max_relative = 1e-12);
        }
        other => panic!("nobsmc missing or wrong: {other:?}"),
    }
    match recorder.find("wmc_BLK_m_BIN_a_PRC_bkg") {
        Some(FactoryCall::Constant { value, .. }) => {
            assert_relative_eq!(*value, 1.0, max_relative = 1e-12);
        }
        other => panic!("wmc missing or wrong: {other:?}"),
    }
    assert!(recorder.find("kappamc_BLK_m_BIN_d").is_some());
    assert!(recorder.find("predmc_BLK_m_BIN_d").is_some());
}

#[test]
fn signal_predictions_scale_with_the_poi() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("rate_BLK_m_BIN_d_PRC_sig") {
        Some(FactoryCall::Constant { value, .. }) => {
            assert_relative_eq!(*value, 10.0, max_relative = 1e-12);
        }
        other => panic!("signal rate missing or wrong: {other:?}"),
    }
    match recorder.find("nsig_BLK_m_BIN_d") {
        Some(FactoryCall::Product { factors, .. }) => {
            assert_eq!(
                factors,
                &vec!["r".to_string(), "rate_BLK_m_BIN_d_PRC_sig".to_string()]
            );
        }
        other => panic!("nsig missing or wrong: {other:?}"),
    }
    // Signal has no events in the dominant cell; the rate is an honest zero.
    match recorder.find("rate_BLK_m_BIN_a_PRC_sig") {
        Some(FactoryCall::Constant { value, .. }) => assert_eq!(*value, 0.0),
        other => panic!("empty signal rate missing or wrong: {other:?}"),
    }
}

#[test]
fn systematic_tags_become_log_normal_factors() {
    let mut block = abcd_block();
    block.bins_mut()[1][1].add_systematic(Systematic::new("dilep_d", 0.25));
    let mut generator = generator(block);
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    match recorder.find("strength_dilep_d_BLK_m_BIN_d") {
        Some(FactoryCall::Constant { value, .. }) => assert_eq!(*value, 0.25),
        other => panic!("strength constant missing or wrong: {other:?}"),
    }
    match recorder.find("dilep_d_BLK_m_BIN_d") {
        Some(FactoryCall::Formula { expression, .. }) => {
            assert_eq!(expression, "exp(strength_dilep_d_BLK_m_BIN_d*dilep_d)");
        }
        other => panic!("systematic formula missing or wrong: {other:?}"),
    }
    match recorder.find("nbkg_BLK_m_BIN_d") {
        Some(FactoryCall::Product { factors, .. }) => {
            assert!(factors.contains(&"dilep_d_BLK_m_BIN_d".to_string()));
            assert!(factors.contains(&"kappamc_BLK_m_BIN_d".to_string()));
            assert!(factors.contains(&"nbkg_raw_BLK_m_BIN_d".to_string()));
        }
        other => panic!("full prediction missing or wrong: {other:?}"),
    }
    assert!(generator.nuisances().contains("dilep_d"));
}

#[test]
fn parameter_sets_are_tracked() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    assert!(generator.pois().contains("r"));
    assert!(generator.nuisances().contains("norm_BLK_m"));
    assert!(generator.nuisances().contains("ry21_BLK_m"));
    assert!(generator.nuisances().contains("rx21_BLK_m"));
    assert!(generator.nuisances().contains("nmc_BLK_m_BIN_a_PRC_bkg"));
    assert!(generator.observables().contains("nobs_BLK_m_BIN_a"));
    assert!(generator.observables().contains("nobsmc_BLK_m_BIN_d_PRC_bkg"));
}

#[test]
fn recorded_content_serializes_to_json() {
    let mut generator = generator(abcd_block());
    let mut recorder = RecordingBuilder::new();
    generator.synthesize(&mut recorder).unwrap();

    let json = recorder.to_json().unwrap();
    assert!(json.contains("\"norm_BLK_m\""));
    assert!(json.contains("\"rscale_BLK_m\""));
}
