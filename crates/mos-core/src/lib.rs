use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod insight;
pub mod quiz;

pub const ANONYMOUS_STUDENT: &str = "Anonymous";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReflectionEntry {
    pub text: String,
    pub timestamp: i64,
    pub student: String,
    // set only on entries that arrived through an import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery: Option<bool>,
}

impl ReflectionEntry {
    pub fn same_identity(&self, student: &str, text: &str) -> bool {
        self.student == student && self.text == text
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Default for Role {
    fn default() -> Self {
        Self::Student
    }
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "student" => Ok(Role::Student),
            "instructor" | "teacher" => Ok(Role::Instructor),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}
