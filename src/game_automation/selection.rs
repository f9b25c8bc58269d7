// Card selection policy
use crate::config::CardWeights;
use rand::Rng;

/// Pick the card to tap.
///
/// The left-most card with the highest known positive weight wins. When no
/// remaining card has one, a random remaining index is chosen. `exclude`
/// removes an already-picked slot; if it was the only slot, it is eligible
/// again rather than returning nothing.
pub fn select_best_card<R: Rng + ?Sized>(
    ids: &[Option<String>],
    weights: &CardWeights,
    exclude: Option<usize>,
    rng: &mut R,
) -> usize {
    let candidates: Vec<usize> = (0..ids.len()).filter(|&i| Some(i) != exclude).collect();

    let mut best: Option<(usize, i64)> = None;
    for &index in &candidates {
        if let Some(id) = &ids[index]
            && let Some(weight) = weights.get(id)
            && weight > 0
            && best.is_none_or(|(_, w)| weight > w)
        {
            best = Some((index, weight));
        }
    }
    if let Some((index, weight)) = best {
        log::debug!("🃏 Card {} chosen by weight {}", index, weight);
        return index;
    }

    let pool: Vec<usize> = if candidates.is_empty() {
        (0..ids.len()).collect()
    } else {
        candidates
    };
    if pool.is_empty() {
        return 0;
    }
    let index = pool[rng.gen_range(0..pool.len())];
    log::debug!("🎲 Card {} chosen at random", index);
    index
}
