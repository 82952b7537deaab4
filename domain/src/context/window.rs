//! Context window preparation.
//!
//! [`prepare_context`] fits a system prompt plus visible debate history into a
//! token budget. The stored [`DebateHistory`](crate::debate::DebateHistory)
//! is never touched; compression produces a derived view.
//!
//! The LLM-backed summarization strategy lives in the application layer. It
//! folds the oldest rounds (see [`summarization_split`]) into a synthetic
//! summary round and then calls back into [`prepare_context`] with the
//! last-n-rounds strategy.

use super::estimate::TokenCounter;
use super::strategy::{CompressionStrategy, ContextSettings};
use crate::debate::config::DebatePhase;
use crate::debate::history::Round;
use crate::util::truncate_chars_with_marker;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::LazyLock;

/// Citation-like patterns: URLs, `[1]`, DOIs, "et al.", "(2021)", "according to".
static CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://\S+|\[\d+\]|\bdoi:\S+|\bet al\.|\(\d{4}\)|\baccording to\b)")
        .expect("citation pattern is valid")
});

/// A bounded view of the history ready to be sent to a model.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContext {
    pub system_prompt: String,
    /// Kept rounds in chronological order.
    pub rounds: Vec<Round>,
    /// System prompt plus kept rounds.
    pub estimated_tokens: usize,
    pub compressed: bool,
    /// Strategy applied; `None` when the history fit unmodified.
    pub strategy: Option<CompressionStrategy>,
    /// A single oversized round was cut to fit.
    pub truncated: bool,
    /// Numbers of rounds left out of the view.
    pub dropped_rounds: Vec<u32>,
}

impl PreparedContext {
    pub fn render_history(&self) -> String {
        self.rounds
            .iter()
            .map(Round::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn round_numbers(&self) -> Vec<u32> {
        self.rounds.iter().map(|r| r.number).collect()
    }
}

/// Fit `system_prompt` plus `rounds` into `budget_tokens`.
///
/// Returns the history unmodified when it fits. Otherwise applies the
/// configured strategy. When the latest round alone exceeds the budget it
/// is truncated and returned on its own with `truncated = true`.
///
/// [`CompressionStrategy::Summarization`] needs an LLM and is handled by the
/// caller; here it degrades to last-n-rounds.
pub fn prepare_context(
    system_prompt: &str,
    rounds: &[Round],
    budget_tokens: usize,
    settings: &ContextSettings,
    count: TokenCounter<'_>,
) -> PreparedContext {
    let system_tokens = count(system_prompt);
    let costs: Vec<usize> = rounds.iter().map(|r| count(&r.render())).collect();
    let history_tokens: usize = costs.iter().sum();

    if rounds.is_empty() || system_tokens + history_tokens <= budget_tokens {
        return PreparedContext {
            system_prompt: system_prompt.to_string(),
            rounds: rounds.to_vec(),
            estimated_tokens: system_tokens + history_tokens,
            compressed: false,
            strategy: None,
            truncated: false,
            dropped_rounds: Vec::new(),
        };
    }

    let available = budget_tokens.saturating_sub(system_tokens);
    let strategy = match settings.strategy {
        CompressionStrategy::Summarization => CompressionStrategy::LastNRounds,
        s => s,
    };

    let last = rounds.len() - 1;
    if costs[last] > available {
        let truncated = truncate_round(&rounds[last], available, count);
        let tokens = count(&truncated.render());
        return PreparedContext {
            system_prompt: system_prompt.to_string(),
            rounds: vec![truncated],
            estimated_tokens: system_tokens + tokens,
            compressed: true,
            strategy: Some(strategy),
            truncated: true,
            dropped_rounds: rounds[..last].iter().map(|r| r.number).collect(),
        };
    }

    let mut kept = match strategy {
        CompressionStrategy::ExponentialDecay => exponential_decay(&costs, available, settings),
        CompressionStrategy::ImportanceWeighted => importance_weighted(rounds, &costs, available),
        _ => last_n_rounds(&costs, available, settings.preserve_first_round),
    };
    kept.sort_unstable();

    let estimated_tokens = system_tokens + kept.iter().map(|&i| costs[i]).sum::<usize>();
    let dropped_rounds = (0..rounds.len())
        .filter(|i| kept.binary_search(i).is_err())
        .map(|i| rounds[i].number)
        .collect();

    PreparedContext {
        system_prompt: system_prompt.to_string(),
        rounds: kept.iter().map(|&i| rounds[i].clone()).collect(),
        estimated_tokens,
        compressed: true,
        strategy: Some(strategy),
        truncated: false,
        dropped_rounds,
    }
}

/// Split rounds into (oldest ~`fraction` to summarize, remainder to keep).
/// At least one round stays on each side when there are two or more.
pub fn summarization_split(rounds: &[Round], fraction: f64) -> (&[Round], &[Round]) {
    if rounds.len() < 2 {
        return (&[], rounds);
    }
    let older = (rounds.len() as f64 * fraction).floor() as usize;
    rounds.split_at(older.clamp(1, rounds.len() - 1))
}

/// Heuristic importance of a round for the importance-weighted strategy.
pub fn importance_score(round: &Round, index: usize, total: usize, tokens: usize) -> f64 {
    let mut score = 10.0 * (index + 1) as f64 / total.max(1) as f64;
    if round.number == 1 || round.is_summary {
        score += 20.0;
    }
    if round.is_flagged() {
        score += 5.0;
    }
    if matches!(round.phase, Some(DebatePhase::Opening | DebatePhase::Closing)) {
        score += 5.0;
    }
    if round.responses.iter().any(|r| CITATION.is_match(&r.content)) {
        score += 3.0;
    }
    score + (tokens as f64 / 200.0).min(5.0)
}

// Strategies return indices of kept rounds. The latest round is known to fit.

fn last_n_rounds(costs: &[usize], available: usize, preserve_first: bool) -> Vec<usize> {
    let last = costs.len() - 1;
    let mut kept = vec![last];
    let mut used = costs[last];
    let mut floor = 0;

    if preserve_first && last > 0 && used + costs[0] <= available {
        kept.push(0);
        used += costs[0];
        floor = 1;
    }

    for i in (floor..last).rev() {
        if used + costs[i] > available {
            break;
        }
        used += costs[i];
        kept.push(i);
    }
    kept
}

fn exponential_decay(costs: &[usize], available: usize, settings: &ContextSettings) -> Vec<usize> {
    let n = costs.len();
    let recent = ((n as f64 * settings.recent_fraction).ceil() as usize).clamp(1, n);
    let boundary = n - recent;

    let mut kept = Vec::new();
    let mut used = 0;
    for i in (boundary..n).rev() {
        if used + costs[i] > available {
            return kept;
        }
        used += costs[i];
        kept.push(i);
    }

    let mut older_start = 0;
    if settings.preserve_first_round && boundary > 0 && used + costs[0] <= available {
        kept.push(0);
        used += costs[0];
        older_start = 1;
    }

    let mut rng = match settings.decay_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    for i in (older_start..boundary).rev() {
        let distance = (boundary - i) as f64;
        let probability = (-settings.decay_rate * distance).exp();
        if rng.r#gen::<f64>() < probability && used + costs[i] <= available {
            used += costs[i];
            kept.push(i);
        }
    }
    kept
}

fn importance_weighted(rounds: &[Round], costs: &[usize], available: usize) -> Vec<usize> {
    let n = rounds.len();
    let mut scored: Vec<(usize, f64)> = rounds
        .iter()
        .enumerate()
        .map(|(i, r)| (i, importance_score(r, i, n, costs[i])))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.cmp(&a.0)));

    let last = n - 1;
    let mut kept = vec![last];
    let mut used = costs[last];
    for (i, _) in scored {
        if i != last && used + costs[i] <= available {
            used += costs[i];
            kept.push(i);
        }
    }
    kept
}

/// Shrink every response proportionally until the round fits `max_tokens`.
fn truncate_round(round: &Round, max_tokens: usize, count: TokenCounter<'_>) -> Round {
    let mut out = round.clone();
    let current = count(&round.render()).max(1);
    let mut ratio = max_tokens as f64 / current as f64;

    for _ in 0..24 {
        for (dst, src) in out.responses.iter_mut().zip(&round.responses) {
            let cap = (src.content.chars().count() as f64 * ratio).floor() as usize;
            dst.content = truncate_chars_with_marker(&src.content, cap);
        }
        if ratio == 0.0 || count(&out.render()) <= max_tokens {
            break;
        }
        ratio = if ratio < 0.01 { 0.0 } else { ratio * 0.8 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::estimate::estimate_tokens;
    use crate::debate::assessment::{AssessmentFlags, JudgeAssessment};
    use crate::debate::config::ParticipantSpec;
    use crate::debate::history::ParticipantResponse;
    use crate::session::usage::TokenUsage;

    const SYSTEM: &str = "You are debating.";

    fn round(number: u32, content: &str) -> Round {
        let spec = ParticipantSpec::new("pro", "m", "For").with_display_name("Pro");
        Round::new(
            number,
            None,
            vec![ParticipantResponse::completed(&spec, content, TokenUsage::default(), 1)],
        )
    }

    /// Rounds whose rendering is ~1000 tokens each.
    fn big_history(n: u32) -> Vec<Round> {
        (1..=n).map(|i| round(i, &"x".repeat(3980))).collect()
    }

    fn settings(strategy: CompressionStrategy) -> ContextSettings {
        ContextSettings::default()
            .with_strategy(strategy)
            .with_decay_seed(7)
    }

    #[test]
    fn test_fits_unmodified() {
        let rounds = vec![round(1, "short"), round(2, "also short")];
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            1_000,
            &ContextSettings::default(),
            &estimate_tokens,
        );
        assert!(!ctx.compressed);
        assert_eq!(ctx.strategy, None);
        assert_eq!(ctx.rounds, rounds);
        assert!(ctx.dropped_rounds.is_empty());
    }

    #[test]
    fn test_last_n_keeps_first_and_most_recent() {
        let rounds = big_history(20);
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            4_000,
            &settings(CompressionStrategy::LastNRounds),
            &estimate_tokens,
        );
        assert!(ctx.compressed);
        assert_eq!(ctx.strategy, Some(CompressionStrategy::LastNRounds));
        assert_eq!(ctx.round_numbers(), vec![1, 19, 20]);
        assert!(ctx.estimated_tokens <= 4_000);
        assert_eq!(ctx.dropped_rounds.len(), 17);
        assert!(!ctx.truncated);
    }

    #[test]
    fn test_last_n_without_preserve_first() {
        let rounds = big_history(20);
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            4_000,
            &settings(CompressionStrategy::LastNRounds).with_preserve_first_round(false),
            &estimate_tokens,
        );
        assert_eq!(ctx.round_numbers(), vec![18, 19, 20]);
    }

    #[test]
    fn test_budget_compliance_all_strategies() {
        let rounds: Vec<Round> = (1..=15)
            .map(|i| round(i, &"word ".repeat(40 * i as usize)))
            .collect();
        for strategy in [
            CompressionStrategy::LastNRounds,
            CompressionStrategy::ExponentialDecay,
            CompressionStrategy::ImportanceWeighted,
        ] {
            for budget in [700, 1_500, 3_000, 6_000] {
                let ctx = prepare_context(SYSTEM, &rounds, budget, &settings(strategy), &estimate_tokens);
                assert!(
                    ctx.truncated || ctx.estimated_tokens <= budget,
                    "{} over budget {}: {}",
                    strategy,
                    budget,
                    ctx.estimated_tokens
                );
                let numbers = ctx.round_numbers();
                let mut sorted = numbers.clone();
                sorted.sort_unstable();
                assert_eq!(numbers, sorted, "{} not chronological", strategy);
                assert_eq!(numbers.last(), Some(&15));
            }
        }
    }

    #[test]
    fn test_oversized_latest_round_is_truncated() {
        let rounds = vec![round(1, "opening"), round(2, &"y".repeat(10_000))];
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            500,
            &ContextSettings::default(),
            &estimate_tokens,
        );
        assert!(ctx.truncated);
        assert_eq!(ctx.round_numbers(), vec![2]);
        assert!(ctx.estimated_tokens <= 500);
        assert!(ctx.rounds[0].responses[0].content.ends_with("[... truncated]"));
    }

    #[test]
    fn test_decay_is_deterministic_with_seed() {
        let rounds = big_history(20);
        let s = settings(CompressionStrategy::ExponentialDecay);
        let a = prepare_context(SYSTEM, &rounds, 9_000, &s, &estimate_tokens);
        let b = prepare_context(SYSTEM, &rounds, 9_000, &s, &estimate_tokens);
        assert_eq!(a.round_numbers(), b.round_numbers());
        // Most recent 30% (6 rounds) kept in full
        for n in 15..=20 {
            assert!(a.round_numbers().contains(&n));
        }
        assert!(a.round_numbers().contains(&1));
        assert!(a.estimated_tokens <= 9_000);
    }

    #[test]
    fn test_importance_prefers_flagged_and_cited_rounds() {
        let mut rounds: Vec<Round> = (1..=10).map(|i| round(i, &"z".repeat(800))).collect();
        rounds[3].responses[0].content = format!("{} according to Smith et al. (2021)", "z".repeat(760));
        rounds[4].assessment = Some(JudgeAssessment {
            scores: vec![],
            summary: String::new(),
            should_continue: true,
            flags: AssessmentFlags {
                topic_drift: true,
                ..Default::default()
            },
            fallback: false,
        });
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            1_000,
            &settings(CompressionStrategy::ImportanceWeighted),
            &estimate_tokens,
        );
        let kept = ctx.round_numbers();
        assert!(kept.contains(&1));
        assert!(kept.contains(&10));
        assert!(ctx.estimated_tokens <= 1_000);
    }

    #[test]
    fn test_importance_score_bonuses() {
        let plain = round(5, "plain");
        let cited = round(5, "see https://example.org");
        assert!(importance_score(&cited, 4, 10, 10) > importance_score(&plain, 4, 10, 10));
        let first = round(1, "plain");
        assert!(importance_score(&first, 0, 10, 10) > importance_score(&plain, 9, 10, 10));
    }

    #[test]
    fn test_summarization_split() {
        let rounds = big_history(10);
        let (older, recent) = summarization_split(&rounds, 0.7);
        assert_eq!(older.len(), 7);
        assert_eq!(recent.len(), 3);
        let one = big_history(1);
        let (older, recent) = summarization_split(&one, 0.7);
        assert!(older.is_empty());
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_summarization_degrades_to_last_n() {
        let rounds = big_history(6);
        let ctx = prepare_context(
            SYSTEM,
            &rounds,
            2_500,
            &settings(CompressionStrategy::Summarization),
            &estimate_tokens,
        );
        assert_eq!(ctx.strategy, Some(CompressionStrategy::LastNRounds));
        assert_eq!(ctx.round_numbers(), vec![1, 6]);
    }
}
