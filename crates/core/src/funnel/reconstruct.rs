use crate::domain::snapshot::StructuredData;
use crate::domain::turn::ConversationTurn;

/// Rebuild the cumulative funnel state from the tail of the message log.
///
/// `turns` is in chronological order (oldest first), as the repository
/// returns it. Scan from the most recent turn backwards and take the first
/// snapshot found: snapshots are cumulative, so the newest one IS the state.
/// If the window holds no snapshot the state is treated as empty; a window
/// too small to reach the last snapshot silently degrades to an earlier step,
/// which is accepted.
pub fn reconstruct(turns: &[ConversationTurn]) -> StructuredData {
    turns.iter().rev().find_map(|turn| turn.snapshot.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::reconstruct;
    use crate::domain::snapshot::StructuredData;
    use crate::domain::turn::{ContactProfile, ConversationTurn, TurnKind};

    fn turn_with_snapshot(snapshot: Option<StructuredData>) -> ConversationTurn {
        ConversationTurn::outbound(
            "contact-1",
            "agent-1",
            "wa-100",
            TurnKind::Text,
            "msg",
            snapshot,
            ContactProfile::default(),
        )
    }

    fn named(name: &str) -> StructuredData {
        StructuredData { fullname: Some(name.to_owned()), ..StructuredData::default() }
    }

    #[test]
    fn most_recent_snapshot_wins() {
        let turns = vec![
            turn_with_snapshot(Some(named("A"))),
            turn_with_snapshot(None),
            turn_with_snapshot(Some(named("B"))),
            turn_with_snapshot(None),
            turn_with_snapshot(None),
        ];

        assert_eq!(reconstruct(&turns).fullname.as_deref(), Some("B"));
    }

    #[test]
    fn no_snapshot_in_window_yields_empty_state() {
        let turns = vec![turn_with_snapshot(None), turn_with_snapshot(None)];
        assert_eq!(reconstruct(&turns), StructuredData::default());
        assert_eq!(reconstruct(&[]), StructuredData::default());
    }
}
