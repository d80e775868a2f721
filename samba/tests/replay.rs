mod common;

use common::{random_trace, three_arm_trace};
use proptest::prelude::*;
use samba::{
    position_count, Chapter, CoreStep, CumulativeStep, Error, Position, Progress, ReplayState,
    SecurityOptions, Step,
};

fn traversal(trace: &samba::Trace) -> Result<Vec<ReplayState>, Error> {
    let mut states = vec![ReplayState::begin(trace)];
    loop {
        let current = states[states.len() - 1].clone();
        match current.advance(trace)? {
            (next, Progress::Moved) => states.push(next),
            (_, Progress::AtBoundary) => return Ok(states),
        }
    }
}

#[test]
fn full_traversal_takes_fifteen_advances() -> Result<(), Error> {
    let trace = three_arm_trace();
    let states = traversal(&trace)?;
    assert_eq!(states.len() - 1, 15);
    assert_eq!(states.len(), position_count(&trace));

    let chapters: Vec<Chapter> = states.iter().map(|s| s.chapter()).collect();
    assert_eq!(chapters[0], Chapter::Begin);
    assert_eq!(chapters[1], Chapter::InitialExploration);
    assert!(chapters[2..14].iter().all(|&c| c == Chapter::CoreOfProtocol));
    assert_eq!(states[14].step(), Some(Step::Step6));
    assert_eq!(states[15].step(), Some(Step::Step7));
    assert!(states[15].is_terminal());

    let turn_indices: Vec<Option<usize>> = states.iter().map(|s| s.turn_index(&trace)).collect();
    assert_eq!(turn_indices[2], Some(3));
    assert_eq!(turn_indices[6], Some(4));
    assert_eq!(turn_indices[13], Some(5));
    assert_eq!(turn_indices[15], Some(5));
    Ok(())
}

#[test]
fn retreat_from_aggregation_lands_on_last_step_five() -> Result<(), Error> {
    let trace = three_arm_trace();
    let state = ReplayState::at(
        Position::Cumulative {
            step: CumulativeStep::Step6,
        },
        &trace,
    )?;
    let (state, _) = state.retreat(&trace)?;
    assert_eq!(
        state.position(),
        Position::Core {
            turn_index: 5,
            step: CoreStep::Step5
        }
    );
    assert_eq!(state.current_turn(&trace), trace.last_turn());
    Ok(())
}

#[test]
fn step_three_renders_aes_wrapped_scores() -> Result<(), Error> {
    let trace = three_arm_trace();
    let state = ReplayState::at(
        Position::Core {
            turn_index: 3,
            step: CoreStep::Step3,
        },
        &trace,
    )?;
    let options = SecurityOptions {
        aes: true,
        paillier: false,
        mask: false,
        permutation: false,
    };
    let message = samba::render_message(&state, &trace, Step::Step3, 0, true, options)?;
    assert_eq!(message.values(), vec!["1.00", "2.00", "0.50"]);
    assert_eq!(message.tokens.iter().filter(|t| t.text == "AES(").count(), 3);
    assert!(message.tokens.iter().all(|t| !t.permuted && !t.mask));
    assert_eq!(message.to_string(), "AES(1.00) AES(2.00) AES(0.50)");
    Ok(())
}

#[test]
fn step_three_with_permutation_and_mask() -> Result<(), Error> {
    let trace = three_arm_trace();
    let state = ReplayState::at(
        Position::Core {
            turn_index: 3,
            step: CoreStep::Step4,
        },
        &trace,
    )?;
    let message =
        samba::render_message(&state, &trace, Step::Step3, 0, true, SecurityOptions::all())?;
    // The permutation of 3 positions seeded with 3 is [2, 1, 0]; the mask of turn 3 is 1.
    assert_eq!(message.values(), vec!["0.50", "2.00", "1.00"]);
    let permuted: Vec<bool> = message
        .tokens
        .iter()
        .filter(|t| t.kind == samba::TokenKind::Value)
        .map(|t| t.permuted)
        .collect();
    assert_eq!(permuted, vec![true, false, true]);

    let bits = samba::render_message(&state, &trace, Step::Step4, 0, true, SecurityOptions::all())?;
    assert_eq!(bits.values(), vec!["0", "1", "0"]);

    let unsent = samba::render_message(&state, &trace, Step::Step5, 0, true, SecurityOptions::all())?;
    assert!(unsent.is_empty());
    Ok(())
}

#[test]
fn masked_score_of_step_two() -> Result<(), Error> {
    let trace = three_arm_trace();
    let state = ReplayState::at(
        Position::Core {
            turn_index: 4,
            step: CoreStep::Step2,
        },
        &trace,
    )?;
    let options = SecurityOptions {
        aes: false,
        ..SecurityOptions::all()
    };
    let message = samba::render_message(&state, &trace, Step::Step2, 0, true, options)?;
    // Turn 4 masks with 1 / 2.
    assert_eq!(message.to_string(), "0.75");
    assert!(message.tokens[0].mask);

    let plain = samba::render_message(&state, &trace, Step::Step2, 0, false, options)?;
    assert_eq!(plain.to_string(), "1.50");
    Ok(())
}

#[test]
fn aggregation_messages() -> Result<(), Error> {
    let trace = three_arm_trace();
    let state = ReplayState::at(
        Position::Cumulative {
            step: CumulativeStep::Step7,
        },
        &trace,
    )?;
    let all = SecurityOptions::all();
    let partial = samba::render_message(&state, &trace, Step::Step6, 1, true, all)?;
    assert_eq!(partial.to_string(), "Paillier(2)");
    let total = samba::render_message(&state, &trace, Step::Step7, 0, false, all)?;
    assert_eq!(total.to_string(), "4");

    for step in [Step::Step2, Step::Step3, Step::Step4, Step::Step5] {
        assert!(samba::render_message(&state, &trace, step, 0, true, all)?.is_empty());
    }
    Ok(())
}

#[test]
fn unknown_arm_is_an_error() {
    let trace = three_arm_trace();
    let state = ReplayState::begin(&trace);
    assert_eq!(
        samba::render_message(&state, &trace, Step::Step2, 3, true, SecurityOptions::all()),
        Err(Error::UnknownArm {
            arm: 3,
            arm_count: 3
        })
    );
}

proptest! {
    #[test]
    fn retreat_undoes_advance(seed in any::<u64>(), arm_count in 1usize..6, extra in 0usize..8, pick in any::<prop::sample::Index>()) {
        let trace = random_trace(seed, arm_count, arm_count + extra);
        let states = traversal(&trace).map_err(|e| TestCaseError::fail(e.to_string()))?;
        // Any position except the two ends.
        let state = &states[1 + pick.index(states.len() - 2)];
        let (next, progress) = state.clone().advance(&trace).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(progress, Progress::Moved);
        let (back, _) = next.retreat(&trace).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(&back, state);
        prop_assert_eq!(back.current_turn(&trace), state.current_turn(&trace));
    }

    #[test]
    fn display_conserves_pulls_and_rewards(seed in any::<u64>(), arm_count in 1usize..6, extra in 0usize..8) {
        let trace = random_trace(seed, arm_count, arm_count + extra);
        for turn_index in arm_count..=trace.budget {
            let at = |step| ReplayState::at(Position::Core { turn_index, step }, &trace);
            let before = at(CoreStep::Step4).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let after = at(CoreStep::Step5).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let turn = trace.turn(turn_index).ok_or_else(|| TestCaseError::fail("missing turn"))?;
            for arm in 0..arm_count {
                let selected = arm == turn.selected_arm;
                prop_assert_eq!(before.display().pulls[arm] + u32::from(selected), after.display().pulls[arm]);
                let increment = if selected { turn.reward } else { 0.0 };
                prop_assert!((before.display().rewards[arm] + increment - after.display().rewards[arm]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn nothing_is_rendered_before_the_main_loop(seed in any::<u64>(), arm_count in 1usize..6, focus in 0usize..6) {
        let trace = random_trace(seed, arm_count, arm_count + 2);
        let focus = focus % arm_count;
        let begin = ReplayState::begin(&trace);
        let warm_up = ReplayState::at(Position::InitialExploration, &trace).map_err(|e| TestCaseError::fail(e.to_string()))?;
        for state in [begin, warm_up] {
            for step in Step::ALL {
                let message = samba::render_message(&state, &trace, step, focus, true, SecurityOptions::all())
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert!(message.is_empty());
            }
        }
    }
}
