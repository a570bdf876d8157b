//! Script generation from a scenario or the built-in template.

use super::error::ScriptError;
use crate::config::ScriptSettings;
use crate::models::{GenerationRequest, Scenario, Scene, Script, Section, VisualType};

/// Shortest request the built-in template can fill.
pub const TEMPLATE_MIN_DURATION_SECS: f64 = 100.0;

const OVERVIEW_SHARE: f64 = 0.15;
const OVERVIEW_MIN: f64 = 20.0;
const FEATURES_SHARE: f64 = 0.30;
const FEATURES_MIN: f64 = 30.0;
const WRAP_UP_SHARE: f64 = 0.10;
const WRAP_UP_MIN: f64 = 15.0;
const HANDS_ON_MIN: f64 = 15.0;
const QUIZ_SECS: f64 = 15.0;

/// Turns requests (and optional scenarios) into timed scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptGenerator {
    settings: ScriptSettings,
}

impl ScriptGenerator {
    pub fn new(settings: ScriptSettings) -> Self {
        Self { settings }
    }

    /// Map scenes 1:1 onto sections.
    ///
    /// Section durations are rescaled proportionally when the resulting
    /// script would miss the requested duration by more than the tolerance.
    pub fn from_scenario(
        &self,
        request: &GenerationRequest,
        scenario: &Scenario,
    ) -> Result<Script, ScriptError> {
        let scene_total = scenario.total_duration_secs();
        if scenario.scenes.is_empty() || scene_total <= 0.0 {
            return Err(ScriptError::EmptyScenario(scenario.id.clone()));
        }

        let intro = self.settings.intro_secs;
        let outro = self.settings.conclusion_secs;
        let requested = request.duration_secs as f64;
        let budget = requested - intro - outro;
        if budget <= 0.0 {
            return Err(ScriptError::DurationTooShort {
                requested,
                minimum: intro + outro + 1.0,
            });
        }

        let drift = (intro + scene_total + outro - requested).abs();
        let scale = if drift > self.settings.duration_tolerance_secs {
            tracing::debug!(
                "Rescaling scenes from {:.1}s to {:.1}s",
                scene_total,
                budget
            );
            budget / scene_total
        } else {
            1.0
        };

        let title = non_blank(&scenario.title)
            .or_else(|| request.topic())
            .unwrap_or("Untitled")
            .to_string();

        let sections = scenario
            .scenes
            .iter()
            .map(|scene| self.scene_to_section(request, scene, scale))
            .collect();

        let introduction = scenario
            .introduction
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string)
            .unwrap_or_else(|| default_introduction(&title, request));
        let conclusion = scenario
            .conclusion
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string)
            .unwrap_or_else(|| default_conclusion(&title));

        Ok(self.assemble(title, introduction, sections, conclusion, request))
    }

    fn scene_to_section(&self, request: &GenerationRequest, scene: &Scene, scale: f64) -> Section {
        let suggestion = match non_blank(&scene.visual_prompt) {
            Some(prompt) => format!("{}: {}", scene.visual_type.label(), prompt),
            None => format!("{}: {}", scene.visual_type.label(), scene.title),
        };

        let code_examples = if request.options.include_code_examples {
            scene.code_example.iter().cloned().collect()
        } else {
            Vec::new()
        };

        Section {
            title: scene.title.clone(),
            content: scene.content.clone(),
            duration_secs: scene.duration_secs * scale,
            visual_suggestions: vec![suggestion],
            code_examples,
        }
    }

    /// Fixed four-part template: overview, key features, hands-on, wrap-up.
    ///
    /// Hands-on absorbs whatever the other parts leave over.
    pub fn from_template(&self, request: &GenerationRequest) -> Result<Script, ScriptError> {
        let requested = request.duration_secs as f64;
        let intro = self.settings.intro_secs;
        let outro = self.settings.conclusion_secs;

        let overview = (requested * OVERVIEW_SHARE).max(OVERVIEW_MIN);
        let features = (requested * FEATURES_SHARE).max(FEATURES_MIN);
        let wrap_up = (requested * WRAP_UP_SHARE).max(WRAP_UP_MIN);
        let mut hands_on = requested - intro - outro - overview - features - wrap_up;

        let minimum = TEMPLATE_MIN_DURATION_SECS.max(
            intro + outro + OVERVIEW_MIN + FEATURES_MIN + WRAP_UP_MIN + HANDS_ON_MIN,
        );
        if requested < minimum || hands_on < HANDS_ON_MIN {
            return Err(ScriptError::DurationTooShort { requested, minimum });
        }

        let topic = request.topic().unwrap_or("this topic").to_string();
        let audience = request.target_audience.as_str();
        let keywords = keywords_for(request, &topic);

        let quiz = if request.options.include_quiz && hands_on - QUIZ_SECS >= HANDS_ON_MIN {
            hands_on -= QUIZ_SECS;
            Some(QUIZ_SECS)
        } else {
            None
        };

        let mut feature_visuals: Vec<String> = keywords
            .iter()
            .take(4)
            .map(|k| format!("{}: {}", VisualType::Infographic.label(), k))
            .collect();
        if feature_visuals.is_empty() {
            feature_visuals.push(format!("{}: key features", VisualType::Diagram.label()));
        }

        let mut hands_on_visuals = vec![format!("{}: step by step", VisualType::Diagram.label())];
        if request.options.include_code_examples {
            hands_on_visuals.push(format!("{}: {}", VisualType::Code.label(), topic));
        }

        let mut sections = vec![
            Section {
                title: format!("What is {}?", topic),
                content: format!(
                    "{} at a glance. We look at what it is and the problem it solves, pitched at a {} level.",
                    topic, audience
                ),
                duration_secs: overview,
                visual_suggestions: vec![format!(
                    "{}: {} overview",
                    VisualType::Infographic.label(),
                    topic
                )],
                code_examples: Vec::new(),
            },
            Section {
                title: "Key features".to_string(),
                content: format!(
                    "The ideas that make {} worth learning: {}.",
                    topic,
                    keywords.join(", ")
                ),
                duration_secs: features,
                visual_suggestions: feature_visuals,
                code_examples: Vec::new(),
            },
            Section {
                title: "Hands-on".to_string(),
                content: format!(
                    "Now we put {} to work with a small example you can follow along with.",
                    topic
                ),
                duration_secs: hands_on,
                visual_suggestions: hands_on_visuals,
                code_examples: Vec::new(),
            },
        ];

        if let Some(quiz_secs) = quiz {
            sections.push(Section {
                title: "Quick quiz".to_string(),
                content: format!(
                    "Pause and check yourself. Which of the features of {} would you reach for first, and why?",
                    topic
                ),
                duration_secs: quiz_secs,
                visual_suggestions: vec![format!("{}: quiz question", VisualType::Text.label())],
                code_examples: Vec::new(),
            });
        }

        sections.push(Section {
            title: "Wrap-up".to_string(),
            content: format!(
                "A recap of {} and the key points to remember before you go further.",
                topic
            ),
            duration_secs: wrap_up,
            visual_suggestions: vec![format!("{}: summary", VisualType::Text.label())],
            code_examples: Vec::new(),
        });

        let title = format!("{} explained", topic);
        let introduction = default_introduction(&title, request);
        let conclusion = default_conclusion(&title);
        Ok(self.assemble(title, introduction, sections, conclusion, request))
    }

    fn assemble(
        &self,
        title: String,
        introduction: String,
        sections: Vec<Section>,
        conclusion: String,
        request: &GenerationRequest,
    ) -> Script {
        let keywords = keywords_for(request, &title);
        let mut script = Script {
            title,
            introduction,
            intro_duration_secs: self.settings.intro_secs,
            sections,
            conclusion,
            conclusion_duration_secs: self.settings.conclusion_secs,
            keywords,
            total_duration_secs: 0.0,
        };
        script.total_duration_secs = script.computed_duration_secs();
        script
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn keywords_for(request: &GenerationRequest, fallback: &str) -> Vec<String> {
    let keywords: Vec<String> = request
        .keywords
        .iter()
        .filter_map(|k| non_blank(k))
        .map(str::to_string)
        .collect();
    if keywords.is_empty() {
        vec![request.topic().unwrap_or(fallback).to_string()]
    } else {
        keywords
    }
}

fn default_introduction(title: &str, request: &GenerationRequest) -> String {
    format!(
        "Welcome! This {} minute video covers {}.",
        (request.duration_secs as f64 / 60.0).ceil() as u32,
        title
    )
}

fn default_conclusion(title: &str) -> String {
    format!("That wraps up {}. Thanks for watching!", title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> ScriptGenerator {
        ScriptGenerator::default()
    }

    fn scene(title: &str, secs: f64) -> Scene {
        Scene {
            title: title.to_string(),
            content: format!("{} narration", title),
            duration_secs: secs,
            visual_type: VisualType::Diagram,
            visual_prompt: format!("{} picture", title),
            code_example: Some("docker ps".to_string()),
        }
    }

    fn scenario(scenes: Vec<Scene>) -> Scenario {
        Scenario {
            id: "sc".into(),
            title: "Docker deep dive".into(),
            description: None,
            introduction: Some("Hello there".into()),
            conclusion: None,
            scenes,
        }
    }

    #[test]
    fn template_durations_sum_to_request() {
        let request = GenerationRequest::for_topic("Docker", 120);
        let script = generator().from_template(&request).unwrap();

        assert_eq!(script.sections.len(), 4);
        assert!((script.total_duration_secs - 120.0).abs() < 1e-6);
        assert_eq!(script.sections[0].duration_secs, 20.0);
        assert_eq!(script.sections[1].duration_secs, 36.0);
        assert_eq!(script.sections[3].duration_secs, 15.0);
        assert!((script.sections[2].duration_secs - 29.0).abs() < 1e-6);
    }

    #[test]
    fn template_at_minimum_duration() {
        let script = generator()
            .from_template(&GenerationRequest::for_topic("Git", 100))
            .unwrap();
        assert!((script.sections[2].duration_secs - 15.0).abs() < 1e-6);
    }

    #[test]
    fn template_rejects_short_requests() {
        let err = generator()
            .from_template(&GenerationRequest::for_topic("Git", 90))
            .unwrap_err();
        assert_eq!(
            err,
            ScriptError::DurationTooShort {
                requested: 90.0,
                minimum: 100.0
            }
        );
    }

    #[test]
    fn quiz_is_carved_from_hands_on() {
        let mut request = GenerationRequest::for_topic("Docker", 300);
        request.options.include_quiz = true;
        let script = generator().from_template(&request).unwrap();

        assert_eq!(script.sections.len(), 5);
        assert_eq!(script.sections[3].title, "Quick quiz");
        assert!((script.total_duration_secs - 300.0).abs() < 1e-6);
    }

    #[test]
    fn quiz_skipped_when_budget_is_tight() {
        let mut request = GenerationRequest::for_topic("Docker", 100);
        request.options.include_quiz = true;
        let script = generator().from_template(&request).unwrap();
        assert_eq!(script.sections.len(), 4);
    }

    #[test]
    fn scenario_maps_scenes_to_sections() {
        let request = GenerationRequest::for_topic("Docker", 120);
        let script = generator()
            .from_scenario(&request, &scenario(vec![scene("Images", 50.0), scene("Run", 50.0)]))
            .unwrap();

        assert_eq!(script.title, "Docker deep dive");
        assert_eq!(script.introduction, "Hello there");
        assert!(script.conclusion.contains("Docker deep dive"));
        assert_eq!(script.sections.len(), 2);
        assert_eq!(script.sections[0].duration_secs, 50.0);
        assert_eq!(script.sections[0].visual_suggestions, vec!["Diagram: Images picture"]);
        // Code examples dropped unless requested
        assert!(script.sections[0].code_examples.is_empty());
    }

    #[test]
    fn scenario_durations_rescaled_outside_tolerance() {
        let mut request = GenerationRequest::for_topic("Docker", 130);
        request.options.include_code_examples = true;
        let script = generator()
            .from_scenario(&request, &scenario(vec![scene("A", 20.0), scene("B", 60.0)]))
            .unwrap();

        assert!((script.total_duration_secs - 130.0).abs() < 1e-6);
        assert!((script.sections[0].duration_secs - 27.5).abs() < 1e-6);
        assert!((script.sections[1].duration_secs - 82.5).abs() < 1e-6);
        assert_eq!(script.sections[1].code_examples, vec!["docker ps"]);
    }

    #[test]
    fn scenario_within_tolerance_is_kept() {
        let request = GenerationRequest::for_topic("Docker", 120);
        let script = generator()
            .from_scenario(&request, &scenario(vec![scene("A", 48.0), scene("B", 48.0)]))
            .unwrap();
        assert_eq!(script.sections[0].duration_secs, 48.0);
        assert!((script.total_duration_secs - 116.0).abs() < 1e-6);
    }

    #[test]
    fn empty_scenario_is_rejected() {
        let request = GenerationRequest::for_topic("Docker", 120);
        let err = generator()
            .from_scenario(&request, &scenario(Vec::new()))
            .unwrap_err();
        assert_eq!(err, ScriptError::EmptyScenario("sc".into()));
    }
}
