pub mod composer;

pub use composer::{AudioResult, Composer, SongReport};

use crate::error::{Error, Result};

/// What the user asked for. Consumed once to build both prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    topic: String,
    genre: String,
    vocal: String,
    tempo: String,
    title: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        topic: &str,
        genre: &str,
        vocal: &str,
        tempo: &str,
        title: Option<&str>,
    ) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::InvalidRequest("song topic is empty".into()));
        }
        Ok(Self {
            topic: topic.to_string(),
            genre: genre.trim().to_string(),
            vocal: vocal.trim().to_string(),
            tempo: tempo.trim().to_string(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn lyrics_prompt(&self, language: &str) -> String {
        let mut prompt = String::from("Act as a professional Songwriter.\n");
        prompt.push_str(&format!("Topic: {}\n", self.topic));
        prompt.push_str(&format!("Style: {}\n", self.genre));
        prompt.push_str(&format!("Vocals: {}\n", self.vocal));
        prompt.push_str(&format!("Tempo: {}\n", self.tempo));
        if let Some(title) = &self.title {
            prompt.push_str(&format!("Title: {title}\n"));
        }
        prompt.push_str(&format!("Language: {language}\n"));
        prompt.push_str("Structure: [Verse], [Chorus], [Bridge], [Outro].\n");
        prompt.push_str("Output: Only lyrics and tags.");
        prompt
    }

    /// Style tags for the music backends.
    pub fn audio_prompt(&self) -> String {
        let mut tags = Vec::new();
        if !self.genre.is_empty() {
            tags.push(self.genre.clone());
        }
        if !self.vocal.is_empty() {
            tags.push(format!("{} vocals", self.vocal));
        }
        if !self.tempo.is_empty() {
            tags.push(format!("{} tempo", self.tempo));
        }
        tags.push(format!("about {}", self.topic));
        tags.join(", ")
    }

    /// File-name stem from the title, else the topic.
    pub fn slug(&self) -> String {
        let source = self.title.as_deref().unwrap_or(&self.topic);
        let mut slug = String::new();
        for c in source.chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            "song".to_string()
        } else {
            slug.chars().take(60).collect()
        }
    }
}
