use chrono::Utc;
use mos_core::insight::{
    encode_insight, extract_payload_line, wrap_share_message, InsightPayload, PayloadError,
    SHARE_BANNER,
};
use mos_core::ReflectionEntry;
use mos_storage::{StorageError, StudyStore};
use thiserror::Error;

pub const MSG_INVALID_FORMAT: &str = "Invalid format. Paste the full message.";
pub const MSG_INVALID_NUMBERS: &str = "Invalid timestamp or chapter.";
pub const MSG_EMPTY_TEXT: &str = "Empty reflection text.";
pub const MSG_DUPLICATE: &str = "Already imported this insight.";
pub const MSG_SUCCESS: &str = "Peer insight added successfully!";
pub const MSG_UNPARSEABLE: &str = "Failed to parse. Share via WhatsApp exactly as sent.";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub banner: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            banner: SHARE_BANNER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub success: bool,
    pub message: String,
}

impl ImportReport {
    fn accepted(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }

    fn rejected(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

pub struct InsightExchange {
    config: ExchangeConfig,
}

impl InsightExchange {
    pub fn new(config: ExchangeConfig) -> Self {
        Self { config }
    }

    /// `Ok(None)` means incomplete setup: no group, no display name, or no draft.
    pub fn export_insight(
        &self,
        store: &StudyStore,
        lesson: u32,
        mastered: bool,
    ) -> Result<Option<String>, ExchangeError> {
        let Some(group) = store.active_group()? else {
            return Ok(None);
        };
        let Some(student) = store.display_name()? else {
            return Ok(None);
        };
        let Some(text) = store.draft(lesson)? else {
            return Ok(None);
        };

        let payload = encode_insight(
            &group,
            lesson,
            Utc::now().timestamp_millis(),
            &text,
            &student,
            mastered,
        );
        Ok(Some(payload))
    }

    pub fn share_message(&self, payload: &str) -> String {
        wrap_share_message(&self.config.banner, payload)
    }

    /// Gates run in fixed order; the first failure decides the message and nothing is written.
    pub fn import_insight(
        &self,
        store: &StudyStore,
        pasted: &str,
        importing_lesson: u32,
    ) -> Result<ImportReport, ExchangeError> {
        let line = extract_payload_line(pasted, &self.config.banner);
        let payload = match InsightPayload::parse(line) {
            Ok(payload) => payload,
            Err(err) => return Ok(ImportReport::rejected(parse_failure_message(&err))),
        };

        let Some(own_group) = store.active_group()? else {
            return Ok(ImportReport::rejected(group_mismatch_message(&payload.group, "")));
        };
        if payload.group != own_group {
            return Ok(ImportReport::rejected(group_mismatch_message(&payload.group, &own_group)));
        }

        if payload.lesson != importing_lesson {
            return Ok(ImportReport::rejected(format!(
                "This insight is for chapter {} but you are viewing chapter {}.",
                u64::from(payload.lesson) + 1,
                u64::from(importing_lesson) + 1
            )));
        }

        let text = match payload.decoded_text() {
            Ok(text) => text.trim().to_string(),
            Err(_) => return Ok(ImportReport::rejected(MSG_UNPARSEABLE.to_string())),
        };
        if text.is_empty() {
            return Ok(ImportReport::rejected(MSG_EMPTY_TEXT.to_string()));
        }

        let entry = ReflectionEntry {
            text,
            timestamp: payload.timestamp,
            student: payload.student.clone(),
            mastery: Some(payload.mastery.is_demonstrated()),
        };
        if store.append_entry(&own_group, importing_lesson, &entry)? {
            Ok(ImportReport::accepted(MSG_SUCCESS))
        } else {
            Ok(ImportReport::rejected(MSG_DUPLICATE.to_string()))
        }
    }
}

fn parse_failure_message(err: &PayloadError) -> String {
    match err {
        PayloadError::Structure { .. } => MSG_INVALID_FORMAT.to_string(),
        PayloadError::Numeric { .. } => MSG_INVALID_NUMBERS.to_string(),
        PayloadError::Encoding { .. } => MSG_UNPARSEABLE.to_string(),
    }
}

fn group_mismatch_message(payload_group: &str, own_group: &str) -> String {
    format!("This insight is for group \"{payload_group}\" but you are in group \"{own_group}\".")
}
