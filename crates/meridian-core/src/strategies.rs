// Planning strategies (spec.md §4.9). Each composes the same loop
// primitives differently; all four honor the loop's invariants (§4.8) and
// route every LLM/tool call through the core components.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use meridian_contracts::{JudgeDecision, Mission, Plan, PlanItemStatus, PlanningStrategyTag};

use crate::error::Result;
use crate::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};

/// What the loop should do once a turn produced content with no tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyAction {
    /// This is the final answer; terminate with `terminal-completed`.
    Complete,
    /// Per-step done; advance the plan and keep looping.
    Continue,
    /// Discard the current plan and let the next turn create a new one.
    Replan,
}

/// Everything a strategy needs to decide what a completed turn means.
pub struct StrategyContext<'a> {
    pub mission: &'a Mission,
    pub plan: Option<&'a Plan>,
    pub final_text: &'a str,
    pub llm_provider: &'a dyn LlmProvider,
    pub reflection_model: Option<&'a str>,
}

#[async_trait]
pub trait PlanningStrategy: Send + Sync {
    fn tag(&self) -> PlanningStrategyTag;

    /// Augments the base system prompt; interleaved and SPAR bias the model
    /// toward keeping a plan current or toward the current sub-phase.
    fn augment_system_prompt(&self, base: &str) -> String {
        base.to_string()
    }

    /// `plan-then-execute` forces a dedicated planning turn before the main
    /// loop begins; the other strategies let the model create or skip a plan
    /// on its own.
    fn wants_initial_plan(&self) -> bool {
        false
    }

    async fn decide_after_final_answer(&self, ctx: &StrategyContext<'_>) -> Result<StrategyAction>;

    /// Per-step plan advancement (spec.md §4.9 item 2): mark the item that
    /// was in progress as completed, then promote the next actionable item.
    fn advance_plan(&self, plan: &mut Plan) {
        if let Some(in_progress) = plan
            .items
            .iter()
            .find(|i| i.status == PlanItemStatus::InProgress)
            .map(|i| i.position)
        {
            let _ = plan.update_status(in_progress, PlanItemStatus::Completed);
        }
        if let Some(next) = plan.next_actionable().map(|i| i.position) {
            let _ = plan.update_status(next, PlanItemStatus::InProgress);
        }
    }
}

fn plan_is_done(plan: Option<&Plan>) -> bool {
    plan.map(|p| p.all_finished()).unwrap_or(true)
}

/// No separate plan phase; each turn is a reason/act step. Terminates on the
/// first content-only response.
pub struct DirectReactive;

#[async_trait]
impl PlanningStrategy for DirectReactive {
    fn tag(&self) -> PlanningStrategyTag {
        PlanningStrategyTag::DirectReactive
    }

    async fn decide_after_final_answer(&self, _ctx: &StrategyContext<'_>) -> Result<StrategyAction> {
        Ok(StrategyAction::Complete)
    }
}

/// An initial planning call produces a plan via the planner tool; the main
/// loop then runs until every item is finished.
pub struct PlanThenExecute;

#[async_trait]
impl PlanningStrategy for PlanThenExecute {
    fn tag(&self) -> PlanningStrategyTag {
        PlanningStrategyTag::PlanThenExecute
    }

    fn wants_initial_plan(&self) -> bool {
        true
    }

    async fn decide_after_final_answer(&self, ctx: &StrategyContext<'_>) -> Result<StrategyAction> {
        if plan_is_done(ctx.plan) {
            Ok(StrategyAction::Complete)
        } else {
            Ok(StrategyAction::Continue)
        }
    }
}

/// Same turn structure as direct-reactive, but the first turn is biased
/// toward plan creation and the system prompt keeps nudging the model to
/// keep the plan current.
pub struct InterleavedPlanAndAct;

#[async_trait]
impl PlanningStrategy for InterleavedPlanAndAct {
    fn tag(&self) -> PlanningStrategyTag {
        PlanningStrategyTag::InterleavedPlanAndAct
    }

    fn augment_system_prompt(&self, base: &str) -> String {
        format!(
            "{base}\n\nBefore acting, create or update a plan with the `planner` tool, \
             and keep it current as your understanding of the task changes."
        )
    }

    async fn decide_after_final_answer(&self, ctx: &StrategyContext<'_>) -> Result<StrategyAction> {
        if plan_is_done(ctx.plan) {
            Ok(StrategyAction::Complete)
        } else {
            Ok(StrategyAction::Continue)
        }
    }
}

/// Four sub-phases per outer iteration (sense, plan, act, reflect). The
/// reflect phase calls a dedicated reflection model and decides to continue,
/// replan, or complete, up to `max_outer_iterations`.
pub struct SensePlanActReflect {
    pub max_outer_iterations: u32,
    outer_iteration: AtomicU32,
}

impl SensePlanActReflect {
    pub fn new(max_outer_iterations: u32) -> Self {
        Self {
            max_outer_iterations,
            outer_iteration: AtomicU32::new(0),
        }
    }
}

impl Default for SensePlanActReflect {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl PlanningStrategy for SensePlanActReflect {
    fn tag(&self) -> PlanningStrategyTag {
        PlanningStrategyTag::SensePlanActReflect
    }

    fn augment_system_prompt(&self, base: &str) -> String {
        format!(
            "{base}\n\nWork in sense / plan / act / reflect cycles. Sense the current \
             state, maintain a plan via the `planner` tool, act on the next item, and \
             periodically reflect on whether to continue, replan, or complete."
        )
    }

    async fn decide_after_final_answer(&self, ctx: &StrategyContext<'_>) -> Result<StrategyAction> {
        let iteration = self.outer_iteration.fetch_add(1, Ordering::SeqCst) + 1;
        if iteration >= self.max_outer_iterations {
            return Ok(StrategyAction::Complete);
        }
        if plan_is_done(ctx.plan) {
            return Ok(StrategyAction::Complete);
        }

        let reflection_model = ctx.reflection_model.unwrap_or("default").to_string();
        let prompt = format!(
            "Mission: {}\nLatest answer: {}\nReply with exactly one of: CONTINUE, FRESH_START, COMPLETE.",
            ctx.mission, ctx.final_text
        );
        let response = ctx
            .llm_provider
            .chat_completion(
                vec![LlmMessage {
                    role: LlmMessageRole::User,
                    content: prompt,
                    tool_calls: None,
                    tool_call_id: None,
                }],
                &LlmCallConfig::new(reflection_model),
            )
            .await?;

        Ok(match JudgeDecision::parse_loose(&response.text) {
            JudgeDecision::Complete => StrategyAction::Complete,
            JudgeDecision::FreshStart => StrategyAction::Replan,
            JudgeDecision::Continue => StrategyAction::Continue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_contracts::PlanItem;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat_completion(
            &self,
            _messages: Vec<LlmMessage>,
            _config: &LlmCallConfig,
        ) -> Result<crate::traits::LlmResponse> {
            Ok(crate::traits::LlmResponse {
                text: "COMPLETE".to_string(),
                tool_calls: Vec::new(),
                token_usage: Default::default(),
                finish_reason: None,
            })
        }
    }

    #[tokio::test]
    async fn direct_reactive_always_completes() {
        let strategy = DirectReactive;
        let mission = Mission::new("test");
        let provider = StubProvider;
        let ctx = StrategyContext {
            mission: &mission,
            plan: None,
            final_text: "done",
            llm_provider: &provider,
            reflection_model: None,
        };
        assert_eq!(
            strategy.decide_after_final_answer(&ctx).await.unwrap(),
            StrategyAction::Complete
        );
    }

    #[tokio::test]
    async fn plan_then_execute_continues_until_plan_is_done() {
        let strategy = PlanThenExecute;
        let mission = Mission::new("test");
        let provider = StubProvider;
        let mut plan = Plan::new(vec![PlanItem::new(0, "a")]);
        let ctx = StrategyContext {
            mission: &mission,
            plan: Some(&plan),
            final_text: "done",
            llm_provider: &provider,
            reflection_model: None,
        };
        assert_eq!(
            strategy.decide_after_final_answer(&ctx).await.unwrap(),
            StrategyAction::Continue
        );
        plan.update_status(0, PlanItemStatus::Completed).unwrap();
        let ctx = StrategyContext {
            mission: &mission,
            plan: Some(&plan),
            final_text: "done",
            llm_provider: &provider,
            reflection_model: None,
        };
        assert_eq!(
            strategy.decide_after_final_answer(&ctx).await.unwrap(),
            StrategyAction::Complete
        );
    }

    #[test]
    fn advance_plan_completes_in_progress_and_promotes_next() {
        let strategy = DirectReactive;
        let mut plan = Plan::new(vec![
            PlanItem::new(0, "a"),
            PlanItem::new(1, "b").with_dependencies(vec![0]),
        ]);
        plan.update_status(0, PlanItemStatus::InProgress).unwrap();
        strategy.advance_plan(&mut plan);
        assert_eq!(plan.get(0).unwrap().status, PlanItemStatus::Completed);
        assert_eq!(plan.get(1).unwrap().status, PlanItemStatus::InProgress);
    }
}
