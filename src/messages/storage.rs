use super::types::SpokenUtterance;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct UtteranceLog {
    utterances: Arc<RwLock<Vec<SpokenUtterance>>>,
}

impl UtteranceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, utterance: SpokenUtterance) {
        self.utterances.write().push(utterance);
    }

    pub fn get_all(&self) -> Vec<SpokenUtterance> {
        self.utterances.read().clone()
    }

    pub fn failures(&self) -> usize {
        self.utterances.read().iter().filter(|u| !u.is_delivered()).count()
    }

    pub fn len(&self) -> usize {
        self.utterances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.read().is_empty()
    }
}
