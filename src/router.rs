use std::sync::Arc;

/// An inline button attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Opens a URL.
    Url { label: String, url: String },
    /// Sends `data` back to the bot as a callback action.
    Callback { label: String, data: String },
}

impl Control {
    pub fn url(label: &str, url: &str) -> Self {
        Control::Url {
            label: label.to_string(),
            url: url.to_string(),
        }
    }

    pub fn callback(label: &str, data: &str) -> Self {
        Control::Callback {
            label: label.to_string(),
            data: data.to_string(),
        }
    }
}

/// Canned HTML reply with optional rows of buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponsePayload {
    pub text: String,
    pub controls: Vec<Vec<Control>>,
}

impl ResponsePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Vec::new(),
        }
    }

    pub fn with_controls(mut self, controls: Vec<Vec<Control>>) -> Self {
        self.controls = controls;
        self
    }
}

/// Ordered keyword → response table, immutable once built.
///
/// Several keywords may point at the same `Arc<ResponsePayload>`; aliasing
/// shares the response, it never copies its text.
#[derive(Debug, Clone, Default)]
pub struct KeywordTable {
    entries: Vec<(String, Arc<ResponsePayload>)>,
}

impl KeywordTable {
    pub fn builder() -> KeywordTableBuilder {
        KeywordTableBuilder::default()
    }

    /// First registered keyword contained in the lower-cased text wins,
    /// regardless of where in the text each keyword appears.
    pub fn route(&self, text: &str) -> Option<Arc<ResponsePayload>> {
        let normalized = text.to_lowercase();
        self.entries
            .iter()
            .find(|(keyword, _)| normalized.contains(keyword.as_str()))
            .map(|(_, payload)| Arc::clone(payload))
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct KeywordTableBuilder {
    entries: Vec<(String, Arc<ResponsePayload>)>,
}

impl KeywordTableBuilder {
    /// Register `keyword`. Keywords are stored lower-cased; a keyword that is
    /// already registered keeps its original position and response.
    pub fn keyword(mut self, keyword: &str, payload: &Arc<ResponsePayload>) -> Self {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() || self.entries.iter().any(|(k, _)| *k == keyword) {
            return self;
        }
        self.entries.push((keyword, Arc::clone(payload)));
        self
    }

    /// Register several keywords that share one response.
    pub fn aliases(self, keywords: &[&str], payload: &Arc<ResponsePayload>) -> Self {
        keywords
            .iter()
            .fold(self, |builder, keyword| builder.keyword(keyword, payload))
    }

    pub fn build(self) -> KeywordTable {
        KeywordTable {
            entries: self.entries,
        }
    }
}
