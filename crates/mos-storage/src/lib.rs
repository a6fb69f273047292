use chrono::Utc;
use mos_core::quiz::QuizReport;
use mos_core::{ReflectionEntry, Role, ANONYMOUS_STUDENT};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

pub const STUDY_SCHEMA_VERSION: i64 = 1;

pub const GROUP_SLOT: &str = "group";
pub const NAME_SLOT: &str = "name";
pub const ROLE_SLOT: &str = "role";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("role parse error: {0}")]
    Role(String),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

// Precondition misses are not errors: nothing is written and the variant says why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Duplicate,
    NoActiveGroup,
    EmptyText,
}

pub struct StudyStore {
    conn: Connection,
}

impl StudyStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StorageError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StorageError> {
        let current = self.schema_version()?;
        if current > STUDY_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchemaVersion {
                found: current,
                supported: STUDY_SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!("../migrations/0001_study_schema.sql");
            self.conn.execute_batch(sql)?;
            self.conn
                .execute("PRAGMA user_version = 1", [])
                .map(|_| ())?;
        }

        Ok(())
    }

    pub fn get_value(&self, slot: &str) -> Result<Option<String>, StorageError> {
        let row = self
            .conn
            .query_row("SELECT value FROM kv_slots WHERE slot = ?1", [slot], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(row)
    }

    pub fn set_value(&self, slot: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "
            INSERT INTO kv_slots (slot, value) VALUES (?1, ?2)
            ON CONFLICT(slot) DO UPDATE SET value=excluded.value
            ",
            params![slot, value],
        )?;
        Ok(())
    }

    pub fn active_group(&self) -> Result<Option<String>, StorageError> {
        self.get_value(GROUP_SLOT)
    }

    pub fn set_active_group(&self, name: &str) -> Result<bool, StorageError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }
        self.set_value(GROUP_SLOT, trimmed)?;
        Ok(true)
    }

    pub fn display_name(&self) -> Result<Option<String>, StorageError> {
        self.get_value(NAME_SLOT)
    }

    pub fn set_display_name(&self, name: &str) -> Result<bool, StorageError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }
        self.set_value(NAME_SLOT, trimmed)?;
        Ok(true)
    }

    pub fn role(&self) -> Result<Option<Role>, StorageError> {
        match self.get_value(ROLE_SLOT)? {
            Some(raw) => raw.parse::<Role>().map(Some).map_err(StorageError::Role),
            None => Ok(None),
        }
    }

    pub fn set_role(&self, role: Role) -> Result<(), StorageError> {
        self.set_value(ROLE_SLOT, role.as_str())
    }

    /// The student's own latest text per lesson, separate from the bucket copy.
    pub fn draft(&self, lesson: u32) -> Result<Option<String>, StorageError> {
        self.get_value(&draft_slot(lesson))
    }

    pub fn set_draft(&self, lesson: u32, text: &str) -> Result<bool, StorageError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }
        self.set_value(&draft_slot(lesson), trimmed)?;
        Ok(true)
    }

    pub fn quiz_report(&self, lesson: u32) -> Result<Option<QuizReport>, StorageError> {
        match self.get_value(&quiz_slot(lesson))? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            None => Ok(None),
        }
    }

    pub fn set_quiz_report(&self, lesson: u32, report: &QuizReport) -> Result<(), StorageError> {
        let json = serde_json::to_string(report)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.set_value(&quiz_slot(lesson), &json)
    }

    pub fn bucket_entries(
        &self,
        group: &str,
        lesson: u32,
    ) -> Result<Vec<ReflectionEntry>, StorageError> {
        match self.get_value(&bucket_slot(group, lesson))? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| StorageError::Serialization(err.to_string())),
            None => Ok(Vec::new()),
        }
    }

    pub fn append_entry(
        &self,
        group: &str,
        lesson: u32,
        entry: &ReflectionEntry,
    ) -> Result<bool, StorageError> {
        let mut bucket = self.bucket_entries(group, lesson)?;
        if bucket
            .iter()
            .any(|existing| existing.same_identity(&entry.student, &entry.text))
        {
            return Ok(false);
        }

        bucket.push(entry.clone());
        let json = serde_json::to_string(&bucket)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        self.set_value(&bucket_slot(group, lesson), &json)?;
        Ok(true)
    }

    pub fn save_reflection(&self, lesson: u32, text: &str) -> Result<SaveOutcome, StorageError> {
        let Some(group) = self.active_group()? else {
            return Ok(SaveOutcome::NoActiveGroup);
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(SaveOutcome::EmptyText);
        }

        let student = self
            .display_name()?
            .unwrap_or_else(|| ANONYMOUS_STUDENT.to_string());
        let entry = ReflectionEntry {
            text: trimmed.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            student,
            mastery: None,
        };

        if self.append_entry(&group, lesson, &entry)? {
            Ok(SaveOutcome::Saved)
        } else {
            Ok(SaveOutcome::Duplicate)
        }
    }

    pub fn peer_reflections(&self, lesson: u32) -> Result<Vec<ReflectionEntry>, StorageError> {
        let Some(group) = self.active_group()? else {
            return Ok(Vec::new());
        };
        let own_name = self.display_name()?;
        let entries = self.bucket_entries(&group, lesson)?;
        Ok(entries
            .into_iter()
            .filter(|entry| own_name.as_deref() != Some(entry.student.as_str()))
            .collect())
    }
}

// the group segment is percent-encoded so it can never contain ':'
fn bucket_slot(group: &str, lesson: u32) -> String {
    format!("bucket:{}:{lesson}", urlencoding::encode(group))
}

fn draft_slot(lesson: u32) -> String {
    format!("draft:{lesson}")
}

fn quiz_slot(lesson: u32) -> String {
    format!("quiz:{lesson}")
}
