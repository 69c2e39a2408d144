//! Voice keywords spotted in recognized speech
//!
//! The recognizer delivers partial and final transcripts; both are searched
//! for the configured keywords. A keyword fires its pulse at most once per
//! cooldown, so the partial and final transcript of the same utterance
//! trigger only once.

use crate::command::Button;
use crate::controller::pulse::PulseScheduler;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Keyword to pulsed button, matched case-insensitively
    pub keywords: HashMap<String, Button>,
    pub cooldown_ms: u64,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            keywords: HashMap::from([("fire".to_string(), Button::Fire)]),
            cooldown_ms: 2000,
        }
    }
}

struct Keyword {
    word: String,
    button: Button,
    last_detection: Option<Instant>,
}

pub struct VoiceSource {
    keywords: Vec<Keyword>,
    cooldown: Duration,
    pulses: PulseScheduler,
}

impl VoiceSource {
    pub fn new(settings: &VoiceSettings, pulses: PulseScheduler) -> Self {
        let mut keywords: Vec<Keyword> = settings
            .keywords
            .iter()
            .map(|(word, button)| Keyword {
                word: word.to_lowercase(),
                button: *button,
                last_detection: None,
            })
            .filter(|keyword| !keyword.word.is_empty())
            .collect();
        keywords.sort_by(|a, b| a.word.cmp(&b.word));

        info!("Voice source listening for {} keywords", keywords.len());
        Self {
            keywords,
            cooldown: Duration::from_millis(settings.cooldown_ms),
            pulses,
        }
    }

    /// Feeds a transcript, partial or final
    pub fn on_text(&mut self, text: &str, is_partial: bool) {
        self.on_text_at(text, is_partial, Instant::now());
    }

    pub fn on_text_at(&mut self, text: &str, is_partial: bool, now: Instant) {
        let text = text.to_lowercase();
        for keyword in &mut self.keywords {
            if !text.contains(&keyword.word) {
                continue;
            }
            let cooled = keyword
                .last_detection
                .map_or(true, |last| now.saturating_duration_since(last) >= self.cooldown);
            if !cooled {
                debug!("Keyword {:?} still cooling down", keyword.word);
                continue;
            }

            info!(
                "Keyword detected: {:?} ({} transcript)",
                keyword.word,
                if is_partial { "partial" } else { "final" }
            );
            keyword.last_detection = Some(now);
            self.pulses.fire(keyword.button);
        }
    }
}
