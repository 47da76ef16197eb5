use modelrelay_common::Message;

/// Canonical text of the synthetic message standing in for omitted history.
pub const TRUNCATION_MARKER: &str = "[... earlier messages omitted ...]";

/// Reduce `messages` to a bounded view.
///
/// Keeps the first and last `limit / 2` messages with a single assistant marker
/// between them. A `limit` of zero disables truncation.
pub fn truncate(messages: &[Message], limit: usize) -> Vec<Message> {
    if limit == 0 || messages.len() <= limit {
        return messages.to_vec();
    }

    let keep = limit / 2;
    let mut view = Vec::with_capacity(keep * 2 + 1);
    view.extend_from_slice(&messages[..keep]);
    view.push(Message::assistant(TRUNCATION_MARKER));
    view.extend_from_slice(&messages[messages.len() - keep..]);
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelrelay_common::Role;

    fn numbered(count: usize) -> Vec<Message> {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("m{i}"))
                } else {
                    Message::assistant(format!("m{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn short_history_is_unchanged() {
        let messages = numbered(4);
        assert_eq!(truncate(&messages, 4), messages);
        assert_eq!(truncate(&messages, 10), messages);
    }

    #[test]
    fn thousand_messages_limit_five_hundred() {
        let messages = numbered(1000);
        let view = truncate(&messages, 500);

        assert_eq!(view.len(), 501);
        assert_eq!(&view[..250], &messages[..250]);
        assert_eq!(view[250].role, Role::Assistant);
        assert_eq!(view[250].content, TRUNCATION_MARKER);
        assert_eq!(&view[251..], &messages[750..]);
    }

    #[test]
    fn odd_limit_rounds_down() {
        let messages = numbered(10);
        let view = truncate(&messages, 5);

        assert_eq!(view.len(), 5);
        assert_eq!(view[0].content, "m0");
        assert_eq!(view[1].content, "m1");
        assert_eq!(view[2].content, TRUNCATION_MARKER);
        assert_eq!(view[3].content, "m8");
        assert_eq!(view[4].content, "m9");
    }

    #[test]
    fn zero_limit_disables_truncation() {
        let messages = numbered(7);
        assert_eq!(truncate(&messages, 0), messages);
    }

    #[test]
    fn limit_one_leaves_only_marker() {
        let view = truncate(&numbered(3), 1);
        assert_eq!(view, vec![Message::assistant(TRUNCATION_MARKER)]);
    }
}
