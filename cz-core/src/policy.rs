//! Legal masks over the flat policy space and move sampling.

use chess::ChessMove;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::action::{move_from_policy_index, move_to_policy_index, CodecError, POLICY_SIZE};
use crate::position::Position;

/// `true` at every flat index some legal move of `position` encodes to.
pub fn legal_policy_mask(position: &Position) -> Result<Vec<bool>, CodecError> {
    let mut mask = vec![false; POLICY_SIZE];
    for mv in position.legal_moves() {
        mask[move_to_policy_index(mv)?] = true;
    }
    Ok(mask)
}

/// Zeroes illegal entries and renormalizes to 1.
///
/// Falls back to uniform over the legal indices when no legal mass remains.
pub fn mask_policy(policy: &mut [f32], position: &Position) -> Result<(), CodecError> {
    if policy.len() != POLICY_SIZE {
        return Err(CodecError::PolicyLength {
            len: policy.len(),
            expected: POLICY_SIZE,
        });
    }
    let mask = legal_policy_mask(position)?;
    let mut sum = 0.0f32;
    for (p, &legal) in policy.iter_mut().zip(mask.iter()) {
        if !legal || !p.is_finite() || *p < 0.0 {
            *p = 0.0;
        }
        sum += *p;
    }
    if sum > 0.0 {
        for p in policy.iter_mut() {
            *p /= sum;
        }
        return Ok(());
    }
    let legal = mask.iter().filter(|&&m| m).count();
    if legal > 0 {
        let u = 1.0 / legal as f32;
        for (p, &m) in policy.iter_mut().zip(mask.iter()) {
            if m {
                *p = u;
            }
        }
    }
    Ok(())
}

/// Samples a flat index proportionally to `policy` and decodes it in `position`.
///
/// Returns `None` when the policy carries no positive mass.
pub fn sample_move<R: Rng + ?Sized>(
    policy: &[f32],
    position: &Position,
    rng: &mut R,
) -> Result<Option<ChessMove>, CodecError> {
    if policy.len() != POLICY_SIZE {
        return Err(CodecError::PolicyLength {
            len: policy.len(),
            expected: POLICY_SIZE,
        });
    }
    let weights = policy
        .iter()
        .map(|&p| if p.is_finite() && p > 0.0 { p } else { 0.0 });
    let dist = match WeightedIndex::new(weights) {
        Ok(d) => d,
        Err(_) => return Ok(None),
    };
    let flat = dist.sample(rng);
    Ok(Some(move_from_policy_index(position, flat)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn startpos_mask_has_twenty_moves() {
        let mask = legal_policy_mask(&Position::startpos()).unwrap();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 20);
    }

    #[test]
    fn mask_policy_zeroes_illegal_and_sums_to_one() {
        let pos = Position::startpos();
        let mut policy = vec![1.0f32; POLICY_SIZE];
        mask_policy(&mut policy, &pos).unwrap();
        let mask = legal_policy_mask(&pos).unwrap();

        let sum: f32 = policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for (p, m) in policy.iter().zip(mask.iter()) {
            if *m {
                assert!((p - 0.05).abs() < 1e-6);
            } else {
                assert_eq!(*p, 0.0);
            }
        }
    }

    #[test]
    fn mask_policy_with_no_legal_mass_is_uniform() {
        let pos = Position::startpos();
        let mut policy = vec![0.0f32; POLICY_SIZE];
        mask_policy(&mut policy, &pos).unwrap();
        let sum: f32 = policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mask_policy_rejects_wrong_length() {
        let mut policy = vec![0.0f32; 10];
        let err = mask_policy(&mut policy, &Position::startpos()).unwrap_err();
        assert!(matches!(err, CodecError::PolicyLength { len: 10, .. }));
    }

    #[test]
    fn sample_move_returns_legal_moves() {
        let pos = Position::startpos();
        let mut policy = vec![1.0f32; POLICY_SIZE];
        mask_policy(&mut policy, &pos).unwrap();
        let legal = pos.legal_moves();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mv = sample_move(&policy, &pos, &mut rng).unwrap().unwrap();
            assert!(legal.contains(&mv));
        }
    }

    #[test]
    fn sample_move_on_empty_policy_is_none() {
        let policy = vec![0.0f32; POLICY_SIZE];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(sample_move(&policy, &Position::startpos(), &mut rng)
            .unwrap()
            .is_none());
    }
}
