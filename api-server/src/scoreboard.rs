use std::collections::HashSet;

use crate::types::{ScoreEntry, SkillUsage};

pub(crate) const GLOBAL_BOARD: &str = "global";
pub(crate) const DEFAULT_TOP_LIMIT: u32 = 10;
pub(crate) const MAX_TOP_LIMIT: u32 = 100;
pub(crate) const MAX_USER_LEN: usize = 20;
pub(crate) const MAX_SKILL_USAGE_ITEMS: usize = 20;
pub(crate) const MAX_SKILL_NAME_LEN: usize = 20;
pub(crate) const MAX_SKILL_HOTKEY_LEN: usize = 16;
pub(crate) const MAX_SKILL_COMMAND_LEN: usize = 120;
pub(crate) const MAX_CHALLENGE_ID_LEN: usize = 64;

fn clip(value: &str, max_chars: usize) -> String {
    value.trim().chars().take(max_chars).collect()
}

fn clip_optional(value: Option<String>, max_chars: usize) -> Option<String> {
    value
        .map(|value| clip(&value, max_chars))
        .filter(|value| !value.is_empty())
}

/// Returns `(error_message, error_code)` on failure.
pub(crate) fn sanitize_entry(entry: ScoreEntry) -> Result<ScoreEntry, (String, &'static str)> {
    let user = clip(&entry.user, MAX_USER_LEN);
    if user.is_empty() {
        return Err(("score entry user is empty".to_string(), "invalid_entry"));
    }

    let mut seen = HashSet::new();
    let mut skill_usage = Vec::new();
    for usage in entry.skill_usage.into_iter().take(MAX_SKILL_USAGE_ITEMS) {
        let name = clip(&usage.name, MAX_SKILL_NAME_LEN);
        if name.is_empty() {
            continue;
        }
        let usage = SkillUsage {
            name,
            hotkey: clip_optional(usage.hotkey, MAX_SKILL_HOTKEY_LEN),
            command: clip_optional(usage.command, MAX_SKILL_COMMAND_LEN),
        };
        if seen.insert(usage.clone()) {
            skill_usage.push(usage);
        }
    }

    Ok(ScoreEntry {
        user,
        score: entry.score.max(0),
        level: entry.level.max(0),
        date: entry.date.trim().to_string(),
        skill_usage,
    })
}

pub(crate) fn normalize_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(1, MAX_TOP_LIMIT)
}

/// Leaderboard order: score, then level, then date, all descending. The store
/// ranks with the same keys in SQL.
#[cfg(test)]
pub(crate) fn rank_order(a: &ScoreEntry, b: &ScoreEntry) -> std::cmp::Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.level.cmp(&a.level))
        .then_with(|| b.date.cmp(&a.date))
}

pub(crate) fn is_better(incoming: &ScoreEntry, existing: &ScoreEntry) -> bool {
    if incoming.score != existing.score {
        return incoming.score > existing.score;
    }
    incoming.level > existing.level
}

/// Maps an optional daily challenge id to the board it ranks on.
///
/// Returns `(error_message, error_code)` on failure.
pub(crate) fn board_for(challenge_id: Option<&str>) -> Result<String, (String, &'static str)> {
    let Some(raw) = challenge_id else {
        return Ok(GLOBAL_BOARD.to_string());
    };
    let id = raw.trim();
    let valid = !id.is_empty()
        && id.len() <= MAX_CHALLENGE_ID_LEN
        && id != GLOBAL_BOARD
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err((
            format!("invalid challenge_id: {raw:?}"),
            "invalid_challenge_id",
        ));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: &str, score: i64, level: i64, date: &str) -> ScoreEntry {
        ScoreEntry {
            user: user.to_string(),
            score,
            level,
            date: date.to_string(),
            skill_usage: Vec::new(),
        }
    }

    fn usage(name: &str, hotkey: Option<&str>, command: Option<&str>) -> SkillUsage {
        SkillUsage {
            name: name.to_string(),
            hotkey: hotkey.map(str::to_string),
            command: command.map(str::to_string),
        }
    }

    #[test]
    fn sanitize_trims_clips_and_clamps() {
        let mut raw = entry("  a-very-long-player-name-indeed  ", -5, -1, " 2026-10-16 ");
        raw.skill_usage = vec![
            usage(" melt ", Some(" ctrl+m "), Some("")),
            usage("melt", Some("ctrl+m"), None),
            usage("   ", Some("x"), None),
            usage("sweep", None, Some(&"c".repeat(200))),
        ];

        let clean = sanitize_entry(raw).unwrap();
        assert_eq!(clean.user, "a-very-long-player-n");
        assert_eq!(clean.user.chars().count(), MAX_USER_LEN);
        assert_eq!(clean.score, 0);
        assert_eq!(clean.level, 0);
        assert_eq!(clean.date, "2026-10-16");
        assert_eq!(clean.skill_usage.len(), 2);
        assert_eq!(clean.skill_usage[0], usage("melt", Some("ctrl+m"), None));
        assert_eq!(
            clean.skill_usage[1].command.as_deref().map(str::len),
            Some(MAX_SKILL_COMMAND_LEN)
        );
    }

    #[test]
    fn sanitize_caps_skill_usage_items() {
        let mut raw = entry("p", 1, 1, "d");
        raw.skill_usage = (0..50)
            .map(|i| usage(&format!("skill-{i}"), None, None))
            .collect();
        let clean = sanitize_entry(raw).unwrap();
        assert_eq!(clean.skill_usage.len(), MAX_SKILL_USAGE_ITEMS);
    }

    #[test]
    fn sanitize_rejects_blank_users() {
        let (_, code) = sanitize_entry(entry("   ", 1, 1, "d")).unwrap_err();
        assert_eq!(code, "invalid_entry");
    }

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_limit(None), 10);
        assert_eq!(normalize_limit(Some(0)), 1);
        assert_eq!(normalize_limit(Some(50)), 50);
        assert_eq!(normalize_limit(Some(1_000)), 100);
    }

    #[test]
    fn ranking_prefers_score_then_level_then_recency() {
        let mut entries = vec![
            entry("a", 10, 1, "2026-01-01"),
            entry("b", 30, 0, "2026-01-01"),
            entry("c", 10, 2, "2026-01-01"),
            entry("d", 10, 1, "2026-02-01"),
        ];
        entries.sort_by(rank_order);
        let users: Vec<&str> = entries.iter().map(|e| e.user.as_str()).collect();
        assert_eq!(users, ["b", "c", "d", "a"]);
    }

    #[test]
    fn better_means_higher_score_then_higher_level() {
        let base = entry("p", 20, 2, "d");
        assert!(is_better(&entry("p", 30, 0, "d"), &base));
        assert!(is_better(&entry("p", 20, 3, "d"), &base));
        assert!(!is_better(&entry("p", 20, 2, "later"), &base));
        assert!(!is_better(&entry("p", 10, 9, "d"), &base));
    }

    #[test]
    fn boards_are_global_or_a_clean_challenge_id() {
        assert_eq!(board_for(None).unwrap(), GLOBAL_BOARD);
        assert_eq!(board_for(Some(" daily-2026-10-16 ")).unwrap(), "daily-2026-10-16");
        assert!(board_for(Some("")).is_err());
        assert!(board_for(Some("global")).is_err());
        assert!(board_for(Some("drop table;")).is_err());
        assert!(board_for(Some(&"x".repeat(65))).is_err());
    }
}
