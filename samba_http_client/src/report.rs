//! Plain text rendering of a replay, as printed by the CLI.

use samba::{
    entity::{self, Participant},
    timing::TimeEstimator,
    Chapter, Error, ReplaySession, SecurityOptions, Snapshot, Trace,
};

use crate::RemoteTrace;

/// One line naming the position of a snapshot, e.g.
/// `CORE_OF_PROTOCOL STEP_2 turn 3: Each node sends his score to Controller`.
pub fn position_line(snapshot: &Snapshot) -> String {
    let mut line = snapshot.chapter.to_string();
    if let Some(step) = snapshot.step {
        line.push_str(&format!(" {step}"));
    }
    if let Some(turn_index) = snapshot.turn_index {
        line.push_str(&format!(" turn {turn_index}"));
    }
    if !snapshot.narration.is_empty() {
        line.push_str(&format!(": {}", snapshot.narration));
    }
    line
}

/// The per-arm rewards and pulls of a snapshot, one arm per line.
pub fn display_lines(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .display
        .rewards
        .iter()
        .zip(&snapshot.display.pulls)
        .enumerate()
        .map(|(arm, (reward, pulls))| {
            format!(
                "{}: reward {}, pulls {pulls}",
                Participant::DataOwner(arm),
                samba::format_grouped(*reward)
            )
        })
        .collect()
}

/// The messages sent so far in the current chapter, seen from `focused_arm`.
pub fn message_lines(
    session: &ReplaySession,
    focused_arm: usize,
    secure: bool,
    options: SecurityOptions,
) -> Result<Vec<String>, Error> {
    let mut lines = vec![];
    for communication in session.communications(focused_arm) {
        let message =
            session.render_message(communication.step, focused_arm, secure, options)?;
        if !message.is_empty() {
            lines.push(format!(
                "{} {} -> {}: {message}",
                communication.step, communication.from, communication.to
            ));
        }
    }
    Ok(lines)
}

/// The key material of every participant, skipping those without any.
pub fn key_lines(arm_count: usize, secure: bool, options: SecurityOptions) -> Vec<String> {
    let mut participants = vec![Participant::Controller, Participant::Comp];
    participants.extend((0..arm_count).map(Participant::DataOwner));
    participants.push(Participant::DataCustomer);
    participants
        .into_iter()
        .filter_map(|participant| {
            let keys = entity::known_keys(participant, secure, options);
            if keys.is_empty() {
                None
            } else {
                Some(format!("{participant} knows {}", entity::describe_keys(&keys)))
            }
        })
        .collect()
}

/// The estimated time of the whole trace with and without the selected layers.
pub fn timing_line(trace: &Trace, options: SecurityOptions) -> String {
    let estimator = TimeEstimator::new(trace);
    format!(
        "estimated time for budget {}: {:.2}s unsecure, {:.2}s secure",
        trace.budget,
        estimator.unsecure(trace.budget),
        estimator.secure(trace.budget, options)
    )
}

/// A summary of a history entry.
pub fn history_line(entry: &RemoteTrace) -> String {
    let trace = &entry.trace;
    format!(
        "{}  {}  k={}  budget={}  reward={}  secure time={:.2}s",
        entry.id,
        trace.algorithm.display_name(),
        trace.arm_count,
        trace.budget,
        trace
            .last_turn()
            .map(|t| samba::format_grouped(t.cumulative_reward))
            .unwrap_or_default(),
        TimeEstimator::new(trace).history_secure_time()
    )
}

/// Everything shown for the current state of a session.
pub fn session_lines(
    session: &ReplaySession,
    focused_arm: usize,
    secure: bool,
    options: SecurityOptions,
) -> Result<Vec<String>, Error> {
    let snapshot = session.snapshot();
    let mut lines = vec![position_line(&snapshot)];
    lines.extend(display_lines(&snapshot));
    if snapshot.chapter != Chapter::Begin {
        let edges: Vec<String> = session
            .edges()
            .iter()
            .map(|(from, to)| format!("{from} -> {to}"))
            .collect();
        if !edges.is_empty() {
            lines.push(format!("active links: {}", edges.join(", ")));
        }
    }
    lines.extend(message_lines(session, focused_arm, secure, options)?);
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use samba::{Progress, Trace};

    fn session() -> ReplaySession {
        let trace = Trace::from_json(include_str!("../tests/fixtures/trace.json")).unwrap();
        ReplaySession::new(trace).unwrap()
    }

    #[test]
    fn test_position_line() {
        let mut session = session();
        assert_eq!(position_line(&session.snapshot()), "BEGIN");
        session.advance().unwrap();
        session.advance().unwrap();
        assert_eq!(
            position_line(&session.snapshot()),
            "CORE_OF_PROTOCOL STEP_2 turn 3: Each node sends his score to Controller"
        );
    }

    #[test]
    fn test_messages_at_the_end() {
        let mut session = session();
        while session.advance().unwrap() == Progress::Moved {}
        let lines = message_lines(&session, 1, true, SecurityOptions::all()).unwrap();
        assert_eq!(
            lines,
            vec![
                "STEP_6 DO1 -> Controller: Paillier(2)",
                "STEP_7 Controller -> DC: Paillier(4)"
            ]
        );
    }

    #[test]
    fn test_key_lines() {
        let lines = key_lines(2, true, SecurityOptions::all());
        assert_eq!(lines[0], "Controller knows Perm");
        assert_eq!(lines[1], "Comp knows AESKey");
        assert_eq!(lines[4], "DC knows PaillierPK, PaillierSK");
        assert!(key_lines(2, false, SecurityOptions::all()).is_empty());
    }
}
