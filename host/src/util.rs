use anyhow::{anyhow, Context, Result};
use torus_core::daily_seed;

/// Accepts `12345`, `0x3039`, or `daily:<challenge-id>` (the seed the server
/// expects for that daily challenge).
pub fn parse_seed(seed: &str) -> Result<u32> {
    let s = seed.trim();
    if s.is_empty() {
        return Err(anyhow!("empty seed"));
    }
    if let Some(challenge) = s.strip_prefix("daily:") {
        if challenge.is_empty() {
            return Err(anyhow!("daily seed needs a challenge id"));
        }
        return Ok(daily_seed(challenge));
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).with_context(|| format!("invalid hex seed: {s}"));
    }
    s.parse::<u32>()
        .with_context(|| format!("invalid decimal seed: {s}"))
}

pub fn seed_to_hex(seed: u32) -> String {
    format!("0x{seed:08x}")
}

/// Comma separated seeds; `a..b` expands to the half-open range.
pub fn parse_seed_list(input: &str) -> Result<Vec<u32>> {
    let mut seeds = Vec::new();
    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once("..") {
            Some((start, end)) => {
                let (start, end) = (parse_seed(start)?, parse_seed(end)?);
                if start >= end {
                    return Err(anyhow!("empty seed range: {token}"));
                }
                seeds.extend(start..end);
            }
            None => seeds.push(parse_seed(token)?),
        }
    }
    if seeds.is_empty() {
        return Err(anyhow!("no seeds parsed from --seeds"));
    }
    Ok(seeds)
}
