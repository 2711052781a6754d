//! End-to-end inference scenarios on classic small networks.

use bn_core::inference::{
    BeliefPropConfig, BeliefPropagator, GibbsConfig, GibbsSampler, LikelihoodWeightedSampler,
    RejectionSampler, Sampler,
};
use bn_core::learning::{Dataset, MaximumLikelihoodLearner};
use bn_core::network::BayesNet;

const PLAYER: usize = 0;
const PRIZE: usize = 1;
const MONTY: usize = 2;

/// PLAYER and PRIZE are uniform over doors A, B, C; MONTY opens a door that
/// is neither the player's pick nor the prize.
fn monty_hall() -> BayesNet {
    let mut net = BayesNet::new(&[3, 3, 3]).unwrap();
    net.add_edge(PLAYER, MONTY).unwrap();
    net.add_edge(PRIZE, MONTY).unwrap();
    let third = 1.0 / 3.0;
    net.set_probabilities(PLAYER, &[], &[third; 3]).unwrap();
    net.set_probabilities(PRIZE, &[], &[third; 3]).unwrap();
    for player in 0..3 {
        for prize in 0..3 {
            let row: Vec<f64> = (0..3)
                .map(|door| {
                    if door == player || door == prize {
                        0.0
                    } else if player == prize {
                        0.5
                    } else {
                        1.0
                    }
                })
                .collect();
            net.set_probabilities(MONTY, &[player, prize], &row).unwrap();
        }
    }
    // Player picks A, Monty opens B.
    net.set_evidence(PLAYER, 0).unwrap();
    net.set_evidence(MONTY, 1).unwrap();
    net
}

const CLOUDY: usize = 0;
const SPRINKLER: usize = 1;
const RAIN: usize = 2;
const GRASS: usize = 3;

fn wet_grass() -> BayesNet {
    let mut net = BayesNet::new(&[2, 2, 2, 2]).unwrap();
    net.add_edge(CLOUDY, SPRINKLER).unwrap();
    net.add_edge(CLOUDY, RAIN).unwrap();
    net.add_edge(SPRINKLER, GRASS).unwrap();
    net.add_edge(RAIN, GRASS).unwrap();
    net.set_probabilities(CLOUDY, &[], &[0.5, 0.5]).unwrap();
    net.set_probabilities(SPRINKLER, &[0], &[0.5, 0.5]).unwrap();
    net.set_probabilities(SPRINKLER, &[1], &[0.9, 0.1]).unwrap();
    net.set_probabilities(RAIN, &[0], &[0.8, 0.2]).unwrap();
    net.set_probabilities(RAIN, &[1], &[0.2, 0.8]).unwrap();
    net.set_probabilities(GRASS, &[0, 0], &[1.0, 0.0]).unwrap();
    net.set_probabilities(GRASS, &[0, 1], &[0.1, 0.9]).unwrap();
    net.set_probabilities(GRASS, &[1, 0], &[0.1, 0.9]).unwrap();
    net.set_probabilities(GRASS, &[1, 1], &[0.01, 0.99]).unwrap();
    net
}

fn exact_marginal(net: &BayesNet, node: usize) -> Vec<f64> {
    let joint = net.joint_table().unwrap();
    let mut m = vec![0.0; net.node(node).unwrap().state_count()];
    for (assignment, p) in joint.iter() {
        if net.consistent_with_evidence(&assignment) {
            m[assignment[node]] += p;
        }
    }
    let total: f64 = m.iter().sum();
    m.iter().map(|x| x / total).collect()
}

fn assert_close(got: &[f64], want: &[f64], tol: f64, what: &str) {
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < tol, "{what}: got {got:?}, want {want:?}");
    }
}

// ============================================================================
// Monty Hall
// ============================================================================

mod monty {
    use super::*;

    const SWITCH: [f64; 3] = [1.0 / 3.0, 0.0, 2.0 / 3.0];

    #[test]
    fn exact_posterior_by_enumeration() {
        assert_close(&exact_marginal(&monty_hall(), PRIZE), &SWITCH, 1e-12, "enumeration");
    }

    #[test]
    fn rejection_sampling() {
        let net = monty_hall();
        let marginals = RejectionSampler::seeded(17).marginal_table(&net, 60_000).unwrap();
        assert_close(marginals.variable(PRIZE).unwrap(), &SWITCH, 0.03, "rejection");
    }

    #[test]
    fn likelihood_weighting() {
        let net = monty_hall();
        let marginals = LikelihoodWeightedSampler::seeded(17)
            .marginal_table(&net, 50_000)
            .unwrap();
        assert_close(marginals.variable(PRIZE).unwrap(), &SWITCH, 0.03, "likelihood");
    }

    #[test]
    fn gibbs_sampling() {
        let net = monty_hall();
        let marginals = GibbsSampler::seeded(17).marginal_table(&net, 50_000).unwrap();
        assert_close(marginals.variable(PRIZE).unwrap(), &SWITCH, 0.03, "gibbs");
    }

    #[test]
    fn belief_propagation() {
        let net = monty_hall();
        let mut bp = BeliefPropagator::new(BeliefPropConfig::strict());
        let result = bp.propagate(&net).unwrap();
        assert!(result.converged);
        assert_close(result.marginals.variable(PRIZE).unwrap(), &SWITCH, 1e-12, "belief");
    }

    #[test]
    fn belief_propagation_single_sweep_is_exact() {
        let net = monty_hall();
        let mut bp = BeliefPropagator::new(BeliefPropConfig::single_sweep());
        let result = bp.propagate(&net).unwrap();
        assert_eq!(result.iterations, 1);
        assert_close(result.marginals.variable(PRIZE).unwrap(), &SWITCH, 1e-12, "single sweep");
    }

    #[test]
    fn most_probable_door_is_switch() {
        let net = monty_hall();
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        assert_eq!(result.marginals.most_probable_state(PRIZE).unwrap(), 2);
    }
}

// ============================================================================
// Wet grass
// ============================================================================

mod wet_grass {
    use super::*;

    #[test]
    fn no_evidence_keeps_prior_on_cloudy() {
        let net = wet_grass();
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        assert!(!result.singly_connected);
        assert_close(result.marginals.variable(CLOUDY).unwrap(), &[0.5, 0.5], 1e-9, "prior");
    }

    #[test]
    fn wet_grass_raises_cloudy() {
        let mut net = wet_grass();
        net.set_evidence(GRASS, 1).unwrap();
        let exact = exact_marginal(&net, CLOUDY);
        assert!(exact[1] > 0.5);

        // The diamond has a loop, so propagation is approximate.
        let mut bp = BeliefPropagator::default();
        let result = bp.propagate(&net).unwrap();
        let cloudy = result.marginals.variable(CLOUDY).unwrap();
        assert!(cloudy[1] > 0.5, "cloudy belief {cloudy:?}");
        assert_close(cloudy, &exact, 0.05, "loopy belief");
    }

    #[test]
    fn strict_mode_refuses_the_loop() {
        let net = wet_grass();
        let mut bp = BeliefPropagator::new(BeliefPropConfig::strict());
        assert!(bp.propagate(&net).is_err());
    }

    #[test]
    fn samplers_agree_with_enumeration() {
        let mut net = wet_grass();
        net.set_evidence(GRASS, 1).unwrap();
        let exact: Vec<Vec<f64>> = (0..3).map(|n| exact_marginal(&net, n)).collect();

        let lw = LikelihoodWeightedSampler::seeded(23)
            .marginal_table(&net, 40_000)
            .unwrap();
        let gibbs = GibbsSampler::seeded(23)
            .with_config(GibbsConfig::mixing(40_000))
            .marginal_table(&net, 40_000)
            .unwrap();
        for node in 0..3 {
            assert_close(lw.variable(node).unwrap(), &exact[node], 0.02, "likelihood");
            assert_close(gibbs.variable(node).unwrap(), &exact[node], 0.03, "gibbs");
        }
    }

    #[test]
    fn impossible_evidence_fails_instead_of_guessing() {
        // The grass is never wet with both the sprinkler and the rain off.
        let mut net = wet_grass();
        net.set_evidence(SPRINKLER, 0).unwrap();
        net.set_evidence(RAIN, 0).unwrap();
        net.set_evidence(GRASS, 1).unwrap();

        assert!(BeliefPropagator::default().propagate(&net).is_err());
        assert!(RejectionSampler::seeded(43).marginal_table(&net, 1_000).is_err());
        assert!(LikelihoodWeightedSampler::seeded(43)
            .marginal_table(&net, 1_000)
            .is_err());
    }

    #[test]
    fn explaining_away_rain() {
        let mut net = wet_grass();
        net.set_evidence(GRASS, 1).unwrap();
        let rain_given_wet = exact_marginal(&net, RAIN)[1];
        net.set_evidence(SPRINKLER, 1).unwrap();
        let rain_given_both = exact_marginal(&net, RAIN)[1];
        assert!(rain_given_both < rain_given_wet);

        let marginals = LikelihoodWeightedSampler::seeded(29)
            .marginal_table(&net, 40_000)
            .unwrap();
        assert!((marginals.probability(RAIN, 1).unwrap() - rain_given_both).abs() < 0.03);
    }
}

// ============================================================================
// Gibbs chain
// ============================================================================

#[test]
fn gibbs_chain_never_moves_evidence() {
    let mut net = wet_grass();
    net.set_evidence(GRASS, 1).unwrap();
    net.set_evidence(CLOUDY, 0).unwrap();
    let samples = GibbsSampler::seeded(31).accumulate(&net, 5_000).unwrap();
    assert_eq!(samples.len(), 5_000);
    assert!(samples.iter().all(|s| s[GRASS] == 1 && s[CLOUDY] == 0));
}

#[test]
fn gibbs_single_steps_never_move_evidence() {
    let net = monty_hall();
    let mut sampler = GibbsSampler::seeded(37);
    for i in 0..1_000 {
        let s = sampler.sample(&net).unwrap();
        assert_eq!(s[PLAYER], 0);
        assert_eq!(s[MONTY], 1);
        // The start draws PRIZE from its prior; every later state has been
        // resampled from the full conditional, which excludes door B.
        if i > 0 {
            assert_ne!(s[PRIZE], 1);
        }
    }
}

#[test]
fn gibbs_burn_in_leaves_an_impossible_start() {
    let net = monty_hall();
    for seed in 0..50 {
        let mut sampler = GibbsSampler::seeded(seed).with_config(GibbsConfig {
            burn_in: 1,
            thinning: 1,
        });
        assert_ne!(sampler.sample(&net).unwrap()[PRIZE], 1, "seed {seed}");
    }
}

// ============================================================================
// Learning
// ============================================================================

#[test]
fn learning_recovers_generating_parameters() {
    let truth = {
        let mut net = wet_grass();
        net.clear_all_evidence();
        net
    };
    let mut sampler = RejectionSampler::seeded(41);
    let rows = sampler.accumulate(&truth, 40_000).unwrap();
    let data = Dataset::from_rows(rows);

    let mut blank = wet_grass();
    for node in 0..4 {
        blank.node_mut(node).unwrap().cpt_mut().reset_probabilities(1.0);
    }
    blank.normalize_probabilities().unwrap();

    let learned = MaximumLikelihoodLearner::default().fit(&blank, &data).unwrap();
    for node in 0..4 {
        let want = truth.node(node).unwrap().cpt();
        let got = learned.node(node).unwrap().cpt();
        for (w, g) in want.rows().zip(got.rows()) {
            assert_close(g.probabilities, w.probabilities, 0.03, "learned cpt");
        }
    }
}
