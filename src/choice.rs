// This file is part of Mesonet.
// Copyright © 2022, 2023, 2024, 2025 André de Palma, Lucas Javaudin
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Weighted random choice between a finite number of alternatives.
use rand::Rng;

/// Selects an item from a slice with probability proportional to the given weights.
///
/// Returns `None` if the slice is empty or if the number of weights does not match the
/// number of items.
///
/// If the weights sum to a non-positive value, the item is chosen with uniform
/// probabilities.
///
/// The draw is deterministic for a fixed generator state and a fixed traversal order of
/// the inputs.
pub fn random_choice<'a, T, R: Rng>(
    items: &'a [T],
    weights: &[f64],
    rng: &mut R,
) -> Option<&'a T> {
    if items.is_empty() || items.len() != weights.len() {
        return None;
    }
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return Some(&items[rng.gen_range(0..items.len())]);
    }
    let r = rng.gen_range(0.0..weight_sum);
    let mut accum = 0.0;
    for (item, weight) in items.iter().zip(weights.iter()) {
        accum += weight;
        if r <= accum {
            return Some(item);
        }
    }
    // Floating-point residue can leave `r` above the last cumulative weight.
    items.last()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::*;

    fn get_rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(42)
    }

    #[test]
    fn invalid_input_test() {
        let mut rng = get_rng();
        let empty: [u32; 0] = [];
        assert_eq!(random_choice(&empty, &[], &mut rng), None);
        assert_eq!(random_choice(&[1, 2], &[1.0], &mut rng), None);
        assert_eq!(random_choice(&[1], &[0.5, 0.5], &mut rng), None);
    }

    #[test]
    fn degenerate_weights_test() {
        let mut rng = get_rng();
        // A single item with positive weight is always chosen.
        for _ in 0..10 {
            assert_eq!(random_choice(&['a'], &[3.0], &mut rng), Some(&'a'));
        }
        // An item with all the mass is always chosen.
        for _ in 0..100 {
            assert_eq!(
                random_choice(&['a', 'b', 'c'], &[0.0, 2.5, 0.0], &mut rng),
                Some(&'b')
            );
        }
    }

    #[test]
    fn uniform_fallback_test() {
        // With zero weights, all items must remain reachable.
        let mut rng = get_rng();
        let items = [0usize, 1, 2];
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let i = *random_choice(&items, &[0.0, 0.0, 0.0], &mut rng).unwrap();
            counts[i] += 1;
        }
        for &c in &counts {
            assert!(c > 800, "biased uniform fallback: {counts:?}");
        }
    }

    #[test]
    fn proportionality_test() {
        let mut rng = get_rng();
        let items = [0usize, 1];
        let mut counts = [0usize; 2];
        for _ in 0..10000 {
            let i = *random_choice(&items, &[1.0, 3.0], &mut rng).unwrap();
            counts[i] += 1;
        }
        // Expected shares are 1/4 and 3/4.
        assert!(counts[0] > 2000 && counts[0] < 3000, "{counts:?}");
        assert!(counts[1] > 7000 && counts[1] < 8000, "{counts:?}");
    }

    #[test]
    fn determinism_test() {
        let items = ['a', 'b', 'c', 'd'];
        let weights = [1.0, 2.0, 3.0, 4.0];
        let mut rng1 = get_rng();
        let mut rng2 = get_rng();
        for _ in 0..1000 {
            assert_eq!(
                random_choice(&items, &weights, &mut rng1),
                random_choice(&items, &weights, &mut rng2)
            );
        }
    }
}
