use torus_core::{Engine, Move};

/// Deterministic autoplay policy. Called once per tick while the run is live.
pub trait Bot: Send {
    fn id(&self) -> &'static str;

    fn next_move(&mut self, engine: &Engine) -> Option<Move>;
}

const ROSTER: &[(&str, &str)] = &[
    ("idle", "Never moves; the baseline every other bot should beat."),
    (
        "leveler",
        "Shovels pieces from the tallest column into the shortest one.",
    ),
    (
        "greedy",
        "One-move lookahead scoring melts, stack heights and row color runs.",
    ),
];

pub fn bot_ids() -> Vec<&'static str> {
    ROSTER.iter().map(|(id, _)| *id).collect()
}

pub fn describe_bots() -> &'static [(&'static str, &'static str)] {
    ROSTER
}

pub fn create_bot(id: &str) -> Option<Box<dyn Bot>> {
    match id {
        "idle" => Some(Box::new(Idle)),
        "leveler" => Some(Box::new(Leveler)),
        "greedy" => Some(Box::new(Greedy)),
        _ => None,
    }
}

struct Idle;

impl Bot for Idle {
    fn id(&self) -> &'static str {
        "idle"
    }

    fn next_move(&mut self, _engine: &Engine) -> Option<Move> {
        None
    }
}

fn heights(engine: &Engine) -> Vec<usize> {
    (0..engine.num_cols()).map(|col| engine.num_tori(col)).collect()
}

fn step_toward(engine: &Engine, target: usize) -> Option<Move> {
    match engine.pole_pos().cmp(&target) {
        std::cmp::Ordering::Less => Some(Move::Right),
        std::cmp::Ordering::Greater => Some(Move::Left),
        std::cmp::Ordering::Equal => None,
    }
}

struct Leveler;

impl Bot for Leveler {
    fn id(&self) -> &'static str {
        "leveler"
    }

    fn next_move(&mut self, engine: &Engine) -> Option<Move> {
        let heights = heights(engine);
        let (tallest, &max) = heights.iter().enumerate().max_by_key(|(_, h)| **h)?;
        let (shortest, &min) = heights.iter().enumerate().min_by_key(|(_, h)| **h)?;
        let held = engine.num_tori_in_pole();

        let uneven = max > min + 1;
        let deliver = held > 0 && (held >= engine.pole_height() || !uneven);
        if deliver {
            return step_toward(engine, shortest).or(Some(Move::Up));
        }
        if uneven {
            return step_toward(engine, tallest).or(Some(Move::Down));
        }
        None
    }
}

struct Greedy;

const CANDIDATES: [Option<Move>; 5] = [
    None,
    Some(Move::Down),
    Some(Move::Up),
    Some(Move::Left),
    Some(Move::Right),
];

fn evaluate(engine: &Engine) -> i64 {
    if !engine.is_running() {
        return i64::MIN;
    }
    let heights = heights(engine);
    let stack_cost: i64 = heights.iter().map(|&h| (h * h) as i64).sum();

    let mut runs = 0i64;
    for row in 0..heights.iter().copied().max().unwrap_or(0) {
        for col in 1..engine.num_cols() {
            if let (Some(a), Some(b)) = (engine.cell(row, col - 1), engine.cell(row, col)) {
                if !a.is_melted() && a.color == b.color {
                    runs += 1;
                }
            }
        }
    }

    engine.score() as i64 * 100 - stack_cost + runs * 4
}

impl Bot for Greedy {
    fn id(&self) -> &'static str {
        "greedy"
    }

    fn next_move(&mut self, engine: &Engine) -> Option<Move> {
        let mut best = (evaluate(engine), None);
        for candidate in CANDIDATES.into_iter().flatten() {
            let mut trial = engine.clone();
            if !trial.apply_move(candidate) {
                continue;
            }
            let value = evaluate(&trial);
            if value > best.0 {
                best = (value, Some(candidate));
            }
        }
        best.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use torus_core::{Difficulty, TickOutcome};

    #[test]
    fn roster_ids_all_resolve() {
        for id in bot_ids() {
            let bot = create_bot(id).expect("listed bot");
            assert_eq!(bot.id(), id);
        }
        assert!(create_bot("nope").is_none());
    }

    #[test]
    fn bots_are_deterministic() {
        for id in bot_ids() {
            let play = || {
                let mut bot = create_bot(id).unwrap();
                let mut engine = Engine::seeded(Difficulty::Normal, 11);
                engine.start();
                let mut moves = Vec::new();
                for _ in 0..600 {
                    if let Some(mv) = bot.next_move(&engine) {
                        moves.push((engine.time(), mv));
                        engine.apply_move(mv);
                    }
                    if let TickOutcome::GameOver(_) = engine.tick() {
                        break;
                    }
                }
                (moves, engine.run_state())
            };
            assert_eq!(play(), play(), "bot {id}");
        }
    }

    #[test]
    fn leveler_shovels_from_tallest_to_shortest() {
        let mut engine = Engine::seeded(Difficulty::Normal, 12_345);
        engine.start();
        while engine.num_tori(0) == 0 {
            engine.tick();
        }
        assert!(engine.apply_move(Move::Down));
        assert!(engine.apply_move(Move::Left));
        assert!(engine.apply_move(Move::Up));
        assert_eq!(heights(&engine), vec![2, 0, 1]);

        assert_eq!(Leveler.next_move(&engine), Some(Move::Down));
        assert!(engine.apply_move(Move::Down));
        assert_eq!(Leveler.next_move(&engine), Some(Move::Right));
        assert!(engine.apply_move(Move::Right));
        assert_eq!(Leveler.next_move(&engine), Some(Move::Up));
    }

    #[test]
    fn greedy_never_picks_a_worse_position() {
        let mut engine = Engine::seeded(Difficulty::Rotate, 12_345);
        engine.start();
        for _ in 0..400 {
            if let Some(mv) = Greedy.next_move(&engine) {
                let before = evaluate(&engine);
                assert!(engine.apply_move(mv));
                assert!(evaluate(&engine) > before);
            }
            engine.tick();
        }
    }
}
