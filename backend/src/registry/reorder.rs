//! Lineup reordering with positional channel numbers.

use camtuner_types::{Channel, ChannelId};

/// Move the entry at `from` to position `to`.
///
/// The channel numbers of the affected span (`min(from, to)..=max(from, to)`)
/// stay with their positions: after the move, the span is relabelled with its
/// pre-move number sequence, so each slot keeps the number it showed before.
/// Entries outside the span keep their numbers and positions. Sources, audio
/// policy and mosaic membership travel with their entries.
///
/// With entries `A..E` numbered `[1, 2, 3, 4, 5]`, moving 0 to 3 yields the
/// entry order `B, C, D, A, E` and the numbers stay `[1, 2, 3, 4, 5]`.
///
/// Returns false without touching the list when an index is out of range or
/// `from == to`.
pub fn reorder_channels(channels: &mut Vec<Channel>, from: usize, to: usize) -> bool {
    let len = channels.len();
    if from >= len || to >= len || from == to {
        return false;
    }

    let (lo, hi) = if from < to { (from, to) } else { (to, from) };
    let span_ids: Vec<ChannelId> = channels[lo..=hi].iter().map(|c| c.id.clone()).collect();

    let moved = channels.remove(from);
    channels.insert(to, moved);

    for (channel, id) in channels[lo..=hi].iter_mut().zip(span_ids) {
        channel.id = id;
    }
    true
}
