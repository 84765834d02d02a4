//! Story catalogue for the image card.

use std::time::Duration;

use load_waiter::PollingStrategy;
use network_intercept::{InterceptError, InterceptRule, MockAsset};
use storygate_core_types::StoryId;

use crate::component::ImageCard;
use crate::config::HarnessConfig;

pub const TITLE: &str = "Example/Image";

/// URL pattern the interception story substitutes.
pub const MOCKED_IMAGES: &str = "https://wallpaperaccess.com/full/*.jpg";

static MOCK_IMAGE: &[u8] = include_bytes!("../assets/image.png");

const POLLING_DESCRIPTION: &str = "This method uses the play function to wait for all images to load, \
and the interaction panel will show an error if it takes too long to load them. \
Be aware that if the images take too long to load, you're better off with the \
request interception approach (visit the next story).";

const INTERCEPTION_DESCRIPTION: &str = "This method uses a local image and a request interception \
handler to answer the image request with a mocked image instead, making it really fast to load the image.";

/// Step run after the component mounts.
#[derive(Clone, Debug)]
pub enum PlayStep {
    /// Wait until every image in the document has loaded, bounded by a timeout.
    WaitForImages(PollingStrategy),
}

/// `GET` interception installed before a story mounts.
#[derive(Clone, Debug)]
pub struct InterceptSpec {
    pub pattern: &'static str,
    pub asset: MockAsset,
}

impl InterceptSpec {
    pub fn rule(&self) -> Result<InterceptRule, InterceptError> {
        InterceptRule::get(self.pattern, self.asset.clone())
    }
}

#[derive(Clone, Debug)]
pub struct Story {
    pub export_name: &'static str,
    pub id: StoryId,
    pub args: ImageCard,
    pub play: Option<PlayStep>,
    pub intercepts: Vec<InterceptSpec>,
}

impl Story {
    fn new(export_name: &'static str, args: ImageCard) -> Self {
        Self {
            export_name,
            id: StoryId::from_parts(TITLE, export_name),
            args,
            play: None,
            intercepts: Vec::new(),
        }
    }

    fn with_play(mut self, play: PlayStep) -> Self {
        self.play = Some(play);
        self
    }

    fn with_intercept(mut self, spec: InterceptSpec) -> Self {
        self.intercepts.push(spec);
        self
    }
}

/// The bundled replacement image.
pub fn mock_image() -> MockAsset {
    MockAsset::from_bytes(MOCK_IMAGE.to_vec()).with_content_type("image/png")
}

/// All stories of the image card, in declaration order.
pub fn catalogue(config: &HarnessConfig) -> Vec<Story> {
    let polling = PollingStrategy::new(Duration::from_millis(config.play_timeout_ms))
        .with_failure_policy(config.failure_policy);

    vec![
        Story::new("Default", ImageCard::default()),
        Story::new("WaitForImagesInPlayFunction", ImageCard::new(POLLING_DESCRIPTION))
            .with_play(PlayStep::WaitForImages(polling)),
        Story::new("MockImagesWithMSW", ImageCard::new(INTERCEPTION_DESCRIPTION)).with_intercept(
            InterceptSpec {
                pattern: MOCKED_IMAGES,
                asset: mock_image(),
            },
        ),
    ]
}

/// Stories whose id is in `ids`; every story when `ids` is empty.
pub fn select<'a>(stories: &'a [Story], ids: &[String]) -> Result<Vec<&'a Story>, String> {
    if ids.is_empty() {
        return Ok(stories.iter().collect());
    }
    ids.iter()
        .map(|id| {
            stories
                .iter()
                .find(|story| story.id.as_str() == id)
                .ok_or_else(|| id.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use network_intercept::Request;

    #[test]
    fn catalogue_ids() {
        let stories = catalogue(&HarnessConfig::default());
        let ids: Vec<_> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "example-image--default",
                "example-image--wait-for-images-in-play-function",
                "example-image--mock-images-with-msw",
            ]
        );
    }

    #[test]
    fn polling_story_uses_configured_timeout() {
        let mut config = HarnessConfig::default();
        config.play_timeout_ms = 1234;
        let stories = catalogue(&config);
        match &stories[1].play {
            Some(PlayStep::WaitForImages(strategy)) => assert_eq!(strategy.timeout_ms, 1234),
            None => panic!("polling story has no play step"),
        }
        assert!(stories[0].play.is_none());
        assert!(stories[2].play.is_none());
    }

    #[test]
    fn interception_rule_matches_component_image() {
        let stories = catalogue(&HarnessConfig::default());
        let rule = stories[2].intercepts[0].rule().unwrap();
        assert!(rule.matches(&Request::get(crate::component::IMAGE_URL)));

        let response = rule.respond(200);
        assert_eq!(response.header("Content-Type"), Some("image/png"));
        assert_eq!(
            response.header("Content-Length"),
            Some(MOCK_IMAGE.len().to_string().as_str())
        );
    }

    #[test]
    fn bundled_image_decodes() {
        let img = image::load_from_memory(mock_image().bytes()).unwrap();
        assert!(img.width() > 0);
    }

    #[test]
    fn select_reports_unknown_ids() {
        let stories = catalogue(&HarnessConfig::default());
        assert_eq!(select(&stories, &[]).unwrap().len(), 3);
        let picked = select(&stories, &["example-image--default".to_string()]).unwrap();
        assert_eq!(picked[0].export_name, "Default");
        assert_eq!(
            select(&stories, &["nope".to_string()]).unwrap_err(),
            "nope"
        );
    }
}
