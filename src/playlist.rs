use rand::Rng;

use crate::similarity::Neighbor;

/// Diversity below this keeps the playlist purely top-ranked.
const RANDOM_MIX_THRESHOLD: f64 = 0.3;

/// One slot of a generated playlist, referencing a store row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaylistSlot {
    pub index: usize,
    /// Similarity to the seed; `None` for the seed itself.
    pub score: Option<f64>,
    pub is_seed: bool,
}

/// Assemble a playlist of up to `length` slots from a ranked neighbor
/// list. The seed always takes position 1.
///
/// `diversity` is clamped to [0, 1]. Below 0.3 the remaining slots are
/// the ranked top, in order. At or above it, a top block of
/// `max(2, round((1 - diversity) * length))` entries (capped at the
/// remaining slots) keeps the closest matches, and the rest are drawn
/// uniformly without replacement from the candidates beyond the block,
/// appended in their original rank order. A short candidate list just
/// yields a short playlist.
pub fn sample<R: Rng>(
    seed: usize,
    neighbors: &[Neighbor],
    length: usize,
    diversity: f64,
    rng: &mut R,
) -> Vec<PlaylistSlot> {
    // The result never exceeds the seed plus every candidate
    let mut slots = Vec::with_capacity(length.min(neighbors.len() + 1));
    if length == 0 {
        return slots;
    }
    slots.push(PlaylistSlot {
        index: seed,
        score: None,
        is_seed: true,
    });

    let want = length - 1;
    let diversity = diversity.clamp(0.0, 1.0);

    let top_count = if diversity < RANDOM_MIX_THRESHOLD {
        want
    } else {
        (((1.0 - diversity) * length as f64).round() as usize)
            .max(2)
            .min(want)
    };

    for n in neighbors.iter().take(top_count) {
        slots.push(PlaylistSlot {
            index: n.index,
            score: Some(n.score),
            is_seed: false,
        });
    }

    let random_count = want - top_count;
    let pool = &neighbors[top_count.min(neighbors.len())..];
    if random_count > 0 && !pool.is_empty() {
        let mut picked =
            rand::seq::index::sample(rng, pool.len(), random_count.min(pool.len())).into_vec();
        // Keep the random picks in rank order, not draw order
        picked.sort_unstable();
        for i in picked {
            slots.push(PlaylistSlot {
                index: pool[i].index,
                score: Some(pool[i].score),
                is_seed: false,
            });
        }
    }

    slots
}
