//! Expansion of connectivity rules into synapses

use rand::Rng;

use crate::{
    connectivity::{ConnectRule, Pattern},
    topology::Grid3D,
};

/// Decay of the Gaussian kernel; weight falls to 10% at the receptive field edge
const GAUSS_DECAY: f32 = 2.3026;

/// Pairs whose kernel value falls below this are not connected
const GAUSS_CUTOFF: f32 = 0.1;

/// Synapse produced by a rule, before it is placed in engine storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SynapseDraft {
    pub pre: u32,
    pub post: u32,
    pub weight: f32,
    pub delay: u8,
}

/// Expand `rule` between two lattices
///
/// Pairs are visited pre-major, post-minor, so for a fixed RNG state the
/// result is fully determined by the rule and the two grids.
pub(crate) fn expand<R: Rng + ?Sized>(
    rule: &ConnectRule,
    src: &Grid3D,
    dst: &Grid3D,
    same_group: bool,
    rng: &mut R,
) -> Vec<SynapseDraft> {
    let pre_positions: Vec<_> = (0..src.num_neurons()).filter_map(|i| src.position(i)).collect();
    let post_positions: Vec<_> = (0..dst.num_neurons()).filter_map(|i| dst.position(i)).collect();
    let mut drafts = Vec::new();

    for (pre, &pre_pos) in pre_positions.iter().enumerate() {
        let candidates = match rule.pattern {
            Pattern::OneToOne => pre..pre + 1,
            _ => 0..post_positions.len(),
        };

        for post in candidates {
            let Some(&post_pos) = post_positions.get(post) else {
                continue;
            };
            if rule.pattern == Pattern::FullNoDirect && same_group && pre == post {
                continue;
            }
            let Some(dist) = rule.radius.normalized_distance(pre_pos, post_pos) else {
                continue;
            };

            let mut weight = rule.weight.init;
            if rule.pattern == Pattern::Gaussian {
                let gauss = (-GAUSS_DECAY * dist).exp();
                if gauss < GAUSS_CUTOFF {
                    continue;
                }
                weight *= gauss;
            }
            if rule.pattern.is_probabilistic() && rng.gen::<f32>() >= rule.probability {
                continue;
            }

            let delay = if rule.delay.min == rule.delay.max {
                rule.delay.min
            } else {
                rng.gen_range(rule.delay.min..=rule.delay.max)
            };

            drafts.push(SynapseDraft {
                pre: pre as u32,
                post: post as u32,
                weight,
                delay,
            });
        }
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{RadiusRF, RangeDelay, RangeWeight};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid(w: u32, h: u32) -> Grid3D {
        Grid3D::new(w, h, 1).unwrap()
    }

    #[test]
    fn test_full_and_no_direct() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let g = grid(3, 1);
        let full = expand(&ConnectRule::new(Pattern::Full), &g, &g, true, &mut rng);
        assert_eq!(full.len(), 9);
        let no_direct = expand(&ConnectRule::new(Pattern::FullNoDirect), &g, &g, true, &mut rng);
        assert_eq!(no_direct.len(), 6);
        assert!(no_direct.iter().all(|s| s.pre != s.post));
    }

    #[test]
    fn test_no_direct_keeps_diagonal_across_groups() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let g = grid(3, 1);
        let drafts = expand(&ConnectRule::new(Pattern::FullNoDirect), &g, &g, false, &mut rng);
        assert_eq!(drafts.len(), 9);
        assert_eq!(drafts.iter().filter(|s| s.pre == s.post).count(), 3);
    }

    #[test]
    fn test_one_to_one() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let g = grid(4, 2);
        let drafts = expand(&ConnectRule::new(Pattern::OneToOne), &g, &g, false, &mut rng);
        assert_eq!(drafts.len(), 8);
        assert!(drafts.iter().all(|s| s.pre == s.post));
    }

    #[test]
    fn test_random_probability_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let g = grid(10, 10);
        let none = expand(&ConnectRule::new(Pattern::Random).with_probability(0.0), &g, &g, false, &mut rng);
        assert!(none.is_empty());
        let all = expand(&ConnectRule::new(Pattern::Random).with_probability(1.0), &g, &g, false, &mut rng);
        assert_eq!(all.len(), 10_000);
        let some = expand(&ConnectRule::new(Pattern::Random).with_probability(0.5), &g, &g, false, &mut rng);
        assert!(some.len() > 4_000 && some.len() < 6_000);
    }

    #[test]
    fn test_gaussian_weights_fall_off() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let src = grid(13, 9);
        let dst = grid(3, 3);
        let rule = ConnectRule::new(Pattern::Gaussian)
            .with_weight(RangeWeight::fixed(0.05))
            .with_delay(RangeDelay::fixed(1))
            .with_radius(RadiusRF::new(3.0, 3.0, 1.0));
        let drafts = expand(&rule, &src, &dst, false, &mut rng);
        assert!(!drafts.is_empty());
        assert!(drafts.iter().all(|s| s.weight > 0.0 && s.weight <= 0.05));
        assert!(drafts.iter().all(|s| s.delay == 1));

        // The pre neuron at the centre of the input lattice sits on top of
        // the centre output neuron and gets the full weight
        let centre_pre = 4 * 13 + 6;
        let centre = drafts.iter().find(|s| s.pre == centre_pre && s.post == 4).unwrap();
        assert!((centre.weight - 0.05).abs() < 1e-6);

        // Corner input neurons lie outside every receptive field
        assert!(drafts.iter().all(|s| s.pre != 0));
    }

    #[test]
    fn test_gaussian_probability_thins_receptive_field() {
        let src = grid(13, 9);
        let dst = grid(3, 3);
        let rule = |p: f32| {
            ConnectRule::new(Pattern::Gaussian)
                .with_weight(RangeWeight::fixed(0.05))
                .with_probability(p)
                .with_radius(RadiusRF::new(3.0, 3.0, 1.0))
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let all = expand(&rule(1.0), &src, &dst, false, &mut rng);
        let none = expand(&rule(0.0), &src, &dst, false, &mut rng);
        let half = expand(&rule(0.5), &src, &dst, false, &mut rng);

        assert!(!all.is_empty());
        assert!(none.is_empty());
        let ratio = half.len() as f32 / all.len() as f32;
        assert!(ratio > 0.35 && ratio < 0.65, "kept {} of {}", half.len(), all.len());

        // Thinning drops pairs but leaves the kernel-scaled weight intact
        for s in &half {
            let full = all.iter().find(|f| f.pre == s.pre && f.post == s.post).unwrap();
            assert!((s.weight - full.weight).abs() < 1e-7);
        }
    }

    #[test]
    fn test_delay_range_sampled() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let g = grid(5, 5);
        let rule = ConnectRule::new(Pattern::Full).with_delay(RangeDelay::new(2, 6));
        let drafts = expand(&rule, &g, &g, false, &mut rng);
        assert!(drafts.iter().all(|s| (2..=6).contains(&s.delay)));
        assert!(drafts.iter().any(|s| s.delay != drafts[0].delay));
    }

    #[test]
    fn test_same_seed_same_synapses() {
        let g = grid(6, 6);
        let rule = ConnectRule::new(Pattern::Random).with_probability(0.3).with_delay(RangeDelay::new(1, 5));
        let a = expand(&rule, &g, &g, false, &mut ChaCha8Rng::seed_from_u64(77));
        let b = expand(&rule, &g, &g, false, &mut ChaCha8Rng::seed_from_u64(77));
        assert_eq!(a, b);
    }
}
