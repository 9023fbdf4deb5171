use crate::types::MessageEvent;

/// Most recent user turn by timestamp.
///
/// Bot replies and metadata-only records may sit between the user turn and
/// the reply, so this scans the whole history instead of looking at the
/// previous entry.
pub fn last_user_turn(messages: &[MessageEvent]) -> Option<&MessageEvent> {
    messages
        .iter()
        .filter(|message| message.is_user)
        .max_by_key(|message| message.timestamp)
}

/// Seconds between the latest user turn in `history` and `reply`.
///
/// Returns `None` when the bot speaks before any user turn. Wall-clock
/// steps backwards clamp to zero.
pub fn response_latency(history: &[MessageEvent], reply: &MessageEvent) -> Option<f64> {
    let prompt = last_user_turn(history)?;
    let millis = (reply.timestamp - prompt.timestamp).num_milliseconds().max(0);
    Some(millis as f64 / 1000.0)
}

/// Folds `sample` into `mean`, where `slots` is the total message count
/// including the message being recorded.
///
/// Every recorded message occupies a slot in the denominator, not only the
/// replies that produced a sample.
pub fn fold_weighted_mean(mean: f64, sample: f64, slots: u64) -> f64 {
    if slots == 0 {
        return sample;
    }
    let slots = slots as f64;
    (mean * (slots - 1.0) + sample) / slots
}
