use super::checks::{Candidate, CheckKind, CheckResult, ContentCheck, LlmCheck, Verdict};
use super::heuristics::{HeuristicAlignment, HeuristicConsistency, HeuristicSafety};
use super::policy::{ValidationLevel, ValidationPolicy};
use super::refiner::{Refinement, Refiner};
use crate::audit::{AuditCategory, AuditEntry, AuditLevel, SharedAudit};
use crate::context::CognitiveMode;
use crate::generation::GenerationService;
use crate::observability::{NoopObserver, Observer, ObserverEvent, ObserverMetric};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Sub-results for the text the gate finally returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub level: ValidationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety: Option<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency: Option<CheckResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<Refinement>,
}

impl ValidationOutcome {
    fn skipped() -> Self {
        Self {
            level: ValidationLevel::None,
            safety: None,
            alignment: None,
            consistency: None,
            refinement: None,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &CheckResult> {
        [&self.safety, &self.alignment, &self.consistency]
            .into_iter()
            .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub passed: bool,
    pub final_text: String,
    pub refined: bool,
    pub validation: ValidationOutcome,
}

/// One implementation per check kind.
#[derive(Clone)]
pub struct CheckSet {
    pub safety: Arc<dyn ContentCheck>,
    pub alignment: Arc<dyn ContentCheck>,
    pub consistency: Arc<dyn ContentCheck>,
}

impl CheckSet {
    pub fn llm(generation: &Arc<dyn GenerationService>) -> Self {
        Self {
            safety: Arc::new(LlmCheck::new(CheckKind::Safety, Arc::clone(generation))),
            alignment: Arc::new(LlmCheck::new(CheckKind::Alignment, Arc::clone(generation))),
            consistency: Arc::new(LlmCheck::new(CheckKind::Consistency, Arc::clone(generation))),
        }
    }

    pub fn heuristic(forbidden_phrases: &[String]) -> Self {
        Self {
            safety: Arc::new(HeuristicSafety),
            alignment: Arc::new(HeuristicAlignment::new(forbidden_phrases.to_vec())),
            consistency: Arc::new(HeuristicConsistency),
        }
    }
}

fn threshold(policy: &ValidationPolicy, kind: CheckKind) -> f64 {
    match kind {
        CheckKind::Safety => policy.safety_threshold,
        CheckKind::Alignment => policy.alignment_threshold,
        CheckKind::Consistency => policy.consistency_threshold,
    }
}

/// A check that cannot run counts as failed.
async fn run_check(
    check: &dyn ContentCheck,
    candidate: &Candidate,
    policy: &ValidationPolicy,
    mode: CognitiveMode,
) -> CheckResult {
    let kind = check.kind();
    let verdict = match check.check(candidate, mode).await {
        Ok(verdict) => verdict,
        Err(error) => {
            let message = format!("{error:#}");
            tracing::warn!(check = %kind, error = %message, "safety.check_failed");
            Verdict::new(0.0, vec![format!("{kind} check could not run: {message}")])
        }
    };
    CheckResult::judge(kind, verdict, threshold(policy, kind))
}

/// Fan out all three checks over the same candidate and join.
async fn run_all(
    checks: &CheckSet,
    candidate: &Candidate,
    policy: &ValidationPolicy,
    mode: CognitiveMode,
) -> (CheckResult, CheckResult, CheckResult) {
    tokio::join!(
        run_check(checks.safety.as_ref(), candidate, policy, mode),
        run_check(checks.alignment.as_ref(), candidate, policy, mode),
        run_check(checks.consistency.as_ref(), candidate, policy, mode),
    )
}

/// Gate rule: safety must pass unless overridden; alignment and consistency
/// only count when the policy requires them.
pub fn decide(policy: &ValidationPolicy, outcome: &ValidationOutcome) -> bool {
    let passed = |result: &Option<CheckResult>| result.as_ref().is_none_or(|r| r.passed);
    (passed(&outcome.safety) || policy.allow_unsafe)
        && (!policy.require_alignment || passed(&outcome.alignment))
        && (!policy.require_consistency || passed(&outcome.consistency))
}

/// Issues from the checks that made the gate fail, prefixed by check kind.
fn blocking_issues(policy: &ValidationPolicy, outcome: &ValidationOutcome) -> Vec<String> {
    outcome
        .results()
        .filter(|result| !result.passed)
        .filter(|result| match result.kind {
            CheckKind::Safety => !policy.allow_unsafe,
            CheckKind::Alignment => policy.require_alignment,
            CheckKind::Consistency => policy.require_consistency,
        })
        .flat_map(|result| {
            let kind = result.kind;
            if result.issues.is_empty() {
                vec![format!("{kind}: score {:.2} below threshold", result.score)]
            } else {
                result
                    .issues
                    .iter()
                    .map(|issue| format!("{kind}: {issue}"))
                    .collect()
            }
        })
        .collect()
}

/// Multi-check validation gate with refinement.
pub struct SafetyGate {
    checks: CheckSet,
    refiner: Refiner,
    audit: SharedAudit,
    observer: Arc<dyn Observer>,
}

impl SafetyGate {
    pub fn new(generation: Arc<dyn GenerationService>) -> Self {
        Self {
            checks: CheckSet::llm(&generation),
            refiner: Refiner::new(generation),
            audit: SharedAudit::in_memory(),
            observer: Arc::new(NoopObserver),
        }
    }

    #[must_use]
    pub fn with_checks(mut self, checks: CheckSet) -> Self {
        self.checks = checks;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: SharedAudit) -> Self {
        self.audit = audit;
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub async fn evaluate(
        &self,
        candidate: &Candidate,
        policy: &ValidationPolicy,
        mode: CognitiveMode,
    ) -> GateOutcome {
        let outcome = match policy.level {
            ValidationLevel::None => GateOutcome {
                passed: true,
                final_text: candidate.text.clone(),
                refined: false,
                validation: ValidationOutcome::skipped(),
            },
            ValidationLevel::SafetyOnly => {
                let safety =
                    run_check(self.checks.safety.as_ref(), candidate, policy, mode).await;
                self.conclude(
                    candidate,
                    policy,
                    ValidationLevel::SafetyOnly,
                    Some(safety),
                    None,
                    None,
                )
            }
            ValidationLevel::Quick => {
                let checks = CheckSet::heuristic(&policy.forbidden_phrases);
                let (safety, alignment, consistency) =
                    run_all(&checks, candidate, policy, mode).await;
                self.conclude(
                    candidate,
                    policy,
                    ValidationLevel::Quick,
                    Some(safety),
                    Some(alignment),
                    Some(consistency),
                )
            }
            ValidationLevel::Full => self.evaluate_full(candidate, policy, mode).await,
        };

        self.report(&outcome, policy, mode).await;
        outcome
    }

    fn conclude(
        &self,
        candidate: &Candidate,
        policy: &ValidationPolicy,
        level: ValidationLevel,
        safety: Option<CheckResult>,
        alignment: Option<CheckResult>,
        consistency: Option<CheckResult>,
    ) -> GateOutcome {
        let validation = ValidationOutcome {
            level,
            safety,
            alignment,
            consistency,
            refinement: None,
        };
        self.record_failures(&validation);
        GateOutcome {
            passed: decide(policy, &validation),
            final_text: candidate.text.clone(),
            refined: false,
            validation,
        }
    }

    async fn evaluate_full(
        &self,
        candidate: &Candidate,
        policy: &ValidationPolicy,
        mode: CognitiveMode,
    ) -> GateOutcome {
        let (safety, alignment, consistency) = run_all(&self.checks, candidate, policy, mode).await;
        let mut outcome = self.conclude(
            candidate,
            policy,
            ValidationLevel::Full,
            Some(safety),
            Some(alignment),
            Some(consistency),
        );
        if outcome.passed {
            return outcome;
        }

        let issues = blocking_issues(policy, &outcome.validation);
        let refinement = self.refiner.refine(&candidate.text, &issues, mode).await;
        self.observer.record_metric(&ObserverMetric::RefinementOutcome {
            changed: refinement.changed,
        });

        if !refinement.changed {
            tracing::info!(mode = %mode, "safety.refine_unchanged");
            outcome.validation.refinement = Some(refinement);
            return outcome;
        }

        // One re-check of the rewrite; no second refinement.
        let rewritten = Candidate {
            text: refinement.text.clone(),
            ..candidate.clone()
        };
        let (safety, alignment, consistency) =
            run_all(&self.checks, &rewritten, policy, mode).await;
        let validation = ValidationOutcome {
            level: ValidationLevel::Full,
            safety: Some(safety),
            alignment: Some(alignment),
            consistency: Some(consistency),
            refinement: Some(refinement),
        };
        GateOutcome {
            passed: decide(policy, &validation),
            final_text: rewritten.text,
            refined: true,
            validation,
        }
    }

    fn record_failures(&self, validation: &ValidationOutcome) {
        for result in validation.results().filter(|result| !result.passed) {
            self.observer.record_metric(&ObserverMetric::ValidationFailure {
                check: result.kind.to_string(),
                score: result.score,
            });
        }
    }

    async fn report(&self, outcome: &GateOutcome, policy: &ValidationPolicy, mode: CognitiveMode) {
        self.observer.record_event(&ObserverEvent::GateDecision {
            passed: outcome.passed,
            refined: outcome.refined,
        });
        if outcome.validation.level == ValidationLevel::None {
            return;
        }

        let level = if outcome.passed {
            AuditLevel::Info
        } else {
            AuditLevel::Warn
        };
        self.audit
            .audit(
                AuditEntry::new(
                    AuditCategory::Validation,
                    "safety.gate",
                    json!({
                        "mode": mode,
                        "passed": outcome.passed,
                        "refined": outcome.refined,
                        "allow_unsafe": policy.allow_unsafe,
                        "validation": outcome.validation,
                    }),
                )
                .with_level(level)
                .with_actor("safety_gate"),
            )
            .await;
    }
}
