use torus_core::{
    check, decode_proof, encode_proof, verify, Difficulty, Move, ReplayProof, Session,
    TickOutcome,
};

fn claim(seed: u32, difficulty: u32, time: u64, score: u64, level: u32) -> ReplayProof {
    decode_proof(&format!(
        r#"{{"version":1,"difficulty":{difficulty},"seed":{seed},"finalTime":{time},
            "finalScore":{score},"finalLevel":{level},"inputs":[]}}"#
    ))
    .expect("claim should decode")
}

/// Plays a seeded session to the end, moving on a fixed cadence.
fn recorded_run(seed: u32, difficulty: Difficulty, cadence: usize) -> ReplayProof {
    let moves = [Move::Left, Move::Down, Move::Right, Move::Up, Move::Down, Move::Right];
    let mut session = Session::new(difficulty);
    session.start_new_game(difficulty, Some(seed));

    for step in 0usize.. {
        if step % cadence == 0 {
            session.dispatch(moves[(step / cadence) % moves.len()]);
        }
        if let TickOutcome::GameOver(_) = session.tick() {
            break;
        }
    }

    session
        .replay_proof()
        .cloned()
        .expect("seeded session records a proof")
}

#[test]
fn empty_zero_tick_claim_is_trivially_accepted() {
    let result = verify(&claim(12_345, 1, 0, 0, 0));
    assert!(result.ok, "{:?}", result.reason);
    assert_eq!(result.actual.score, 0);
    assert_eq!(result.actual.level, 0);
}

#[test]
fn positive_score_on_empty_zero_tick_claim_is_rejected() {
    for score in [1, 10, 30, 9_999] {
        let result = verify(&claim(12_345, 1, 0, score, 0));
        assert!(!result.ok);
        let reason = result.reason.expect("rejections carry a reason");
        assert!(reason.starts_with("final score mismatch"), "{reason}");
        assert_eq!(result.expected.score, score);
        assert_eq!(result.actual.score, 0);
    }
}

#[test]
fn fixed_move_log_replays_identically_on_independent_oracles() {
    let json = r#"{"version":1,"difficulty":1,"seed":7,"finalTime":40,"finalScore":0,
        "finalLevel":0,"inputs":[{"time":12,"move":"down"},{"time":12,"move":"down"},
        {"time":40,"move":"up"}]}"#;

    let first = verify(&decode_proof(json).unwrap());
    let second = verify(&decode_proof(json).unwrap());
    assert_eq!(first, second);
    assert_eq!(first.actual.time, 40);
    // 40 ticks is far too short to top out a column.
    assert!(first.actual.game_on);
    assert!(!first.ok);
}

#[test]
fn recorded_runs_verify_on_every_difficulty() {
    for (seed, difficulty) in [
        (7, Difficulty::Normal),
        (12_345, Difficulty::Rotate),
        (0xFFFF_FFFF, Difficulty::Flip),
        (0, Difficulty::Normal),
    ] {
        let proof = recorded_run(seed, difficulty, 3);
        let actual = check(&proof).unwrap_or_else(|err| panic!("seed {seed}: {err}"));
        assert_eq!(actual.score, proof.final_score);
        assert_eq!(actual.time, proof.final_time);
        assert!(!actual.game_on);
    }
}

#[test]
fn proofs_survive_the_wire() {
    let proof = recorded_run(99, Difficulty::Rotate, 5);
    let decoded = decode_proof(&encode_proof(&proof).unwrap()).unwrap();
    assert_eq!(decoded, proof);
    assert!(verify(&decoded).ok);
}

#[test]
fn verification_is_idempotent() {
    let proof = recorded_run(2_024, Difficulty::Normal, 4);
    let first = verify(&proof);
    let second = verify(&proof);
    assert!(first.ok);
    assert_eq!(first, second);

    let mut tampered = proof.clone();
    tampered.final_level += 1;
    assert_eq!(verify(&tampered), verify(&tampered));
}

#[test]
fn single_field_tampering_is_rejected() {
    let proof = recorded_run(31_337, Difficulty::Normal, 3);
    assert!(verify(&proof).ok);
    assert!(proof.inputs.len() >= 2);

    let mut score = proof.clone();
    score.final_score += 1;
    assert!(!verify(&score).ok);

    let mut dropped = proof.clone();
    dropped.inputs.pop();
    let dropped_meaningful = check(&dropped).is_err();

    let mut swapped = proof.clone();
    let (a, b) = (0, swapped.inputs.len() - 1);
    let (time_a, time_b) = (swapped.inputs[a].time, swapped.inputs[b].time);
    assert!(time_a < time_b);
    swapped.inputs[a].time = time_b;
    swapped.inputs[b].time = time_a;
    assert!(!verify(&swapped).ok);

    let mut reseeded = proof.clone();
    reseeded.seed = proof.seed.wrapping_add(1);
    assert!(!verify(&reseeded).ok);

    // A trailing move can be a no-op (blocked at an edge), in which case
    // dropping it changes nothing. Dropping a run of them cannot.
    if !dropped_meaningful {
        let mut truncated = proof.clone();
        truncated.inputs.truncate(proof.inputs.len() / 2);
        assert!(!verify(&truncated).ok);
    }
}

#[test]
fn out_of_range_static_fields_are_rejected_before_replay() {
    let result = verify(&claim(1, 0, 10, 0, 0));
    assert!(!result.ok);
    assert_eq!(result.actual.time, 0);

    let result = verify(&claim(1, 1, 2_000_001, 0, 0));
    assert!(!result.ok);
    assert!(result.reason.unwrap().contains("final time out of range"));
}
