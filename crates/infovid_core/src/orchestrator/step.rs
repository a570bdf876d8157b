//! Pipeline step trait definition.
//!
//! All pipeline steps implement this trait, providing a consistent
//! interface for validation and execution.

use async_trait::async_trait;

use super::errors::StepResult;
use super::types::{StepContext, StepOutput};
use crate::workflow::StepKind;

/// Trait for pipeline steps.
///
/// The registry calls these methods in order for every job:
///
/// 1. `validate_input` - Check that earlier steps left what this one needs
/// 2. `execute` - Perform the step's work, reporting progress
/// 3. `validate_output` - Verify the step produced valid output
///
/// # Example
///
/// ```ignore
/// struct SubtitlesStep;
///
/// #[async_trait]
/// impl PipelineStep for SubtitlesStep {
///     fn kind(&self) -> StepKind { StepKind::GenerateSubtitles }
///
///     fn validate_input(&self, ctx: &StepContext) -> StepResult<()> {
///         ctx.require_script(self.kind()).map(|_| ())
///     }
///
///     async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput> {
///         // build and write the track...
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Which plan entry this step serves.
    fn kind(&self) -> StepKind;

    /// Step name for logging and error context.
    fn name(&self) -> &str {
        self.kind().display_name()
    }

    /// Validate inputs before execution.
    fn validate_input(&self, _ctx: &StepContext) -> StepResult<()> {
        Ok(())
    }

    /// Execute the step's main work.
    async fn execute(&self, ctx: &StepContext) -> StepResult<StepOutput>;

    /// Validate outputs after execution.
    fn validate_output(&self, _ctx: &StepContext, _output: &StepOutput) -> StepResult<()> {
        Ok(())
    }
}
