//! Stop guards evaluated after every assessed round.

use super::assessment::JudgeAssessment;
use super::config::{DebateConfiguration, DebateFormat};
use serde::{Deserialize, Serialize};

/// Why a debate stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CostLimit,
    RoundLimit,
    Repetition,
    Convergence,
    JudgeDecision,
    UserRequested,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::CostLimit => "cost_limit",
            StopReason::RoundLimit => "round_limit",
            StopReason::Repetition => "repetition",
            StopReason::Convergence => "convergence",
            StopReason::JudgeDecision => "judge_decision",
            StopReason::UserRequested => "user_requested",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs to [`evaluate_stop_guards`] for the round that just finished.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub config: &'a DebateConfiguration,
    /// Number of the round just completed.
    pub round_number: u32,
    pub assessment: Option<&'a JudgeAssessment>,
    /// Hard cost limit (or critical tier with auto-stop) reached.
    pub cost_limit_breached: bool,
    pub stop_requested: bool,
}

/// Evaluate the stop guards. First match wins:
///
/// 1. cost limit breached → `cost_limit`
/// 2. round-limited and round ≥ max rounds → `round_limit`
/// 3. repetition or diminishing returns flagged → `repetition`
/// 4. convergence-seeking and convergence flagged → `convergence`
/// 5. judge says stop, or structured phases exhausted → `judge_decision`
/// 6. stop requested by the user → `user_requested`
/// 7. safety round cap reached → `round_limit`
///
/// Flags are ignored when the matching judge sensitivity is `0.0`. In
/// round-limited debates the configured round count is authoritative, so
/// `should_continue = false` alone does not stop them.
pub fn evaluate_stop_guards(ctx: &GuardContext<'_>) -> Option<StopReason> {
    let config = ctx.config;
    let sensitivity = &config.judge.sensitivity;

    if ctx.cost_limit_breached {
        return Some(StopReason::CostLimit);
    }

    if config.format == DebateFormat::RoundLimited
        && config
            .limits
            .max_rounds
            .is_some_and(|max| ctx.round_number >= max)
    {
        return Some(StopReason::RoundLimit);
    }

    if let Some(assessment) = ctx.assessment {
        let flags = &assessment.flags;
        if sensitivity.repetition > 0.0 && (flags.repetition_detected || flags.diminishing_returns)
        {
            return Some(StopReason::Repetition);
        }
        if config.format == DebateFormat::ConvergenceSeeking
            && sensitivity.convergence > 0.0
            && flags.convergence_reached
        {
            return Some(StopReason::Convergence);
        }
        if !assessment.should_continue && config.format != DebateFormat::RoundLimited {
            return Some(StopReason::JudgeDecision);
        }
    }

    if config.phases_exhausted(ctx.round_number) {
        return Some(StopReason::JudgeDecision);
    }

    if ctx.stop_requested {
        return Some(StopReason::UserRequested);
    }

    if ctx.round_number >= config.round_cap() {
        return Some(StopReason::RoundLimit);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::assessment::AssessmentFlags;
    use crate::debate::config::{JudgeSpec, ParticipantSpec};

    fn config(format: DebateFormat) -> DebateConfiguration {
        DebateConfiguration::new(
            "Topic",
            vec![
                ParticipantSpec::new("a", "m1", "For"),
                ParticipantSpec::new("b", "m2", "Against"),
            ],
            JudgeSpec::new("judge"),
        )
        .with_format(format)
    }

    fn assessment(should_continue: bool, flags: AssessmentFlags) -> JudgeAssessment {
        JudgeAssessment {
            scores: vec![],
            summary: String::new(),
            should_continue,
            flags,
            fallback: false,
        }
    }

    fn ctx<'a>(
        config: &'a DebateConfiguration,
        round_number: u32,
        assessment: Option<&'a JudgeAssessment>,
    ) -> GuardContext<'a> {
        GuardContext {
            config,
            round_number,
            assessment,
            cost_limit_breached: false,
            stop_requested: false,
        }
    }

    #[test]
    fn test_cost_limit_beats_round_limit() {
        let c = config(DebateFormat::RoundLimited).with_max_rounds(2);
        let mut g = ctx(&c, 2, None);
        g.cost_limit_breached = true;
        assert_eq!(evaluate_stop_guards(&g), Some(StopReason::CostLimit));
    }

    #[test]
    fn test_round_limit() {
        let c = config(DebateFormat::RoundLimited).with_max_rounds(2);
        let a = assessment(true, AssessmentFlags::default());
        assert_eq!(evaluate_stop_guards(&ctx(&c, 1, Some(&a))), None);
        assert_eq!(
            evaluate_stop_guards(&ctx(&c, 2, Some(&a))),
            Some(StopReason::RoundLimit)
        );
    }

    #[test]
    fn test_repetition_beats_convergence() {
        let c = config(DebateFormat::ConvergenceSeeking);
        let a = assessment(
            false,
            AssessmentFlags {
                diminishing_returns: true,
                convergence_reached: true,
                ..Default::default()
            },
        );
        assert_eq!(
            evaluate_stop_guards(&ctx(&c, 2, Some(&a))),
            Some(StopReason::Repetition)
        );
    }

    #[test]
    fn test_convergence_only_in_convergence_format() {
        let flags = AssessmentFlags {
            convergence_reached: true,
            ..Default::default()
        };
        let a = assessment(false, flags);
        let seeking = config(DebateFormat::ConvergenceSeeking);
        assert_eq!(
            evaluate_stop_guards(&ctx(&seeking, 2, Some(&a))),
            Some(StopReason::Convergence)
        );
        let free = config(DebateFormat::FreeForm);
        assert_eq!(
            evaluate_stop_guards(&ctx(&free, 2, Some(&a))),
            Some(StopReason::JudgeDecision)
        );
    }

    #[test]
    fn test_zero_sensitivity_ignores_flag() {
        let mut c = config(DebateFormat::FreeForm).with_max_rounds(10);
        c.judge.sensitivity.repetition = 0.0;
        let a = assessment(
            true,
            AssessmentFlags {
                repetition_detected: true,
                ..Default::default()
            },
        );
        assert_eq!(evaluate_stop_guards(&ctx(&c, 1, Some(&a))), None);
    }

    #[test]
    fn test_round_limited_ignores_should_continue() {
        let c = config(DebateFormat::RoundLimited).with_max_rounds(3);
        let a = assessment(false, AssessmentFlags::default());
        assert_eq!(evaluate_stop_guards(&ctx(&c, 1, Some(&a))), None);
    }

    #[test]
    fn test_structured_phases_exhausted() {
        let c = config(DebateFormat::StructuredRounds);
        let a = assessment(true, AssessmentFlags::default());
        assert_eq!(evaluate_stop_guards(&ctx(&c, 2, Some(&a))), None);
        assert_eq!(
            evaluate_stop_guards(&ctx(&c, 3, Some(&a))),
            Some(StopReason::JudgeDecision)
        );
    }

    #[test]
    fn test_user_request_and_safety_cap() {
        let c = config(DebateFormat::FreeForm);
        let a = assessment(true, AssessmentFlags::default());
        let mut g = ctx(&c, 1, Some(&a));
        g.stop_requested = true;
        assert_eq!(evaluate_stop_guards(&g), Some(StopReason::UserRequested));

        let capped = c.clone().with_max_rounds(4);
        assert_eq!(
            evaluate_stop_guards(&ctx(&capped, 4, Some(&a))),
            Some(StopReason::RoundLimit)
        );
    }
}
