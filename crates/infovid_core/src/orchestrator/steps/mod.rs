//! Pipeline step implementations.
//!
//! Each step handles one phase of the video pipeline.

mod infographics;
mod script;
mod subtitles;
mod synthesize;
mod upload;

pub use infographics::CreateInfographicsStep;
pub use script::GenerateScriptStep;
pub use subtitles::GenerateSubtitlesStep;
pub use synthesize::SynthesizeVideoStep;
pub use upload::UploadVideoStep;

use std::sync::Arc;

use super::registry::StepRegistry;
use crate::config::Settings;
use crate::script::ScenarioService;
use crate::upload::{PublishDirUploader, Uploader};

/// Registry with the production step for every kind.
pub fn default_registry(
    settings: Arc<Settings>,
    scenarios: Option<Arc<dyn ScenarioService>>,
) -> StepRegistry {
    let mut script = GenerateScriptStep::new(settings.script.clone());
    if let Some(service) = scenarios {
        script = script.with_scenario_service(service);
    }
    let uploader: Arc<dyn Uploader> =
        Arc::new(PublishDirUploader::new(settings.paths.publish_dir()));

    StepRegistry::new(Arc::clone(&settings))
        .with_step(script)
        .with_step(CreateInfographicsStep::new())
        .with_step(GenerateSubtitlesStep::new(settings.subtitles.clone()))
        .with_step(SynthesizeVideoStep::new(settings.video.clone()))
        .with_step(UploadVideoStep::new(uploader))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepKind;

    #[test]
    fn default_registry_covers_every_kind() {
        let registry = default_registry(Arc::new(Settings::default()), None);
        assert_eq!(
            registry.kinds(),
            vec![
                StepKind::GenerateScript,
                StepKind::CreateInfographics,
                StepKind::GenerateSubtitles,
                StepKind::SynthesizeVideo,
                StepKind::UploadVideo,
            ]
        );
    }
}
