use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// Wire layout, six fields joined by '|':
//   group | lesson | timestamp_ms | text | student | mastery flag
// Free-text fields are percent-encoded; extra trailing fields are ignored.
pub const INSIGHT_FIELD_COUNT: usize = 6;
pub const INSIGHT_DELIMITER: char = '|';
pub const SHARE_BANNER: &str = "*Mini OpenStax — Group Insight*";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("expected at least 6 fields, found {found}")]
    Structure { found: usize },
    #[error("field {field} is not numeric: {value}")]
    Numeric { field: &'static str, value: String },
    #[error("field {field} is not valid percent encoding: {reason}")]
    Encoding { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryFlag {
    Demonstrated,
    NotDemonstrated,
}

impl MasteryFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryFlag::Demonstrated => "M",
            MasteryFlag::NotDemonstrated => "N",
        }
    }

    /// Only the exact flag `M` marks mastery; anything else reads as not demonstrated.
    pub fn from_wire(field: &str) -> Self {
        if field == "M" {
            Self::Demonstrated
        } else {
            Self::NotDemonstrated
        }
    }

    pub fn is_demonstrated(&self) -> bool {
        matches!(self, MasteryFlag::Demonstrated)
    }
}

impl From<bool> for MasteryFlag {
    fn from(mastered: bool) -> Self {
        if mastered {
            Self::Demonstrated
        } else {
            Self::NotDemonstrated
        }
    }
}

impl fmt::Display for MasteryFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightPayload {
    pub group: String,
    pub lesson: u32,
    pub timestamp: i64,
    pub encoded_text: String,
    pub student: String,
    pub mastery: MasteryFlag,
}

impl InsightPayload {
    pub fn parse(line: &str) -> Result<Self, PayloadError> {
        let fields: Vec<&str> = line.split(INSIGHT_DELIMITER).collect();
        if fields.len() < INSIGHT_FIELD_COUNT {
            return Err(PayloadError::Structure {
                found: fields.len(),
            });
        }

        let lesson = parse_numeric::<u32>(fields[1], "lesson")?;
        let timestamp = parse_numeric::<i64>(fields[2], "timestamp")?;
        let group = decode_field(fields[0], "group")?;
        let student = decode_field(fields[4], "student")?;

        Ok(Self {
            group,
            lesson,
            timestamp,
            encoded_text: fields[3].to_string(),
            student,
            mastery: MasteryFlag::from_wire(fields[5]),
        })
    }

    pub fn decoded_text(&self) -> Result<String, PayloadError> {
        decode_field(&self.encoded_text, "text")
    }
}

pub fn encode_insight(
    group: &str,
    lesson: u32,
    timestamp: i64,
    text: &str,
    student: &str,
    mastered: bool,
) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        urlencoding::encode(group),
        lesson,
        timestamp,
        urlencoding::encode(text),
        urlencoding::encode(student),
        MasteryFlag::from(mastered)
    )
}

pub fn wrap_share_message(banner: &str, payload: &str) -> String {
    format!("{banner}\n\n{payload}")
}

/// First non-empty line after the banner, or the whole paste trimmed when it is absent.
pub fn extract_payload_line<'a>(pasted: &'a str, banner: &str) -> &'a str {
    let mut after_banner = false;
    for line in pasted.lines() {
        let trimmed = line.trim();
        if after_banner {
            if !trimmed.is_empty() {
                return trimmed;
            }
        } else if trimmed == banner {
            after_banner = true;
        }
    }
    pasted.trim()
}

fn parse_numeric<T: FromStr>(raw: &str, field: &'static str) -> Result<T, PayloadError> {
    raw.trim().parse().map_err(|_| PayloadError::Numeric {
        field,
        value: raw.to_string(),
    })
}

fn decode_field(raw: &str, field: &'static str) -> Result<String, PayloadError> {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .map_err(|err| PayloadError::Encoding {
            field,
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_payload_parses_back_to_the_same_fields() {
        let line = encode_insight(
            "8B",
            3,
            1_708_995_600_000,
            "Hello, it's great!",
            "Priya",
            true,
        );
        let payload = InsightPayload::parse(&line).expect("parse payload");

        assert_eq!(payload.group, "8B");
        assert_eq!(payload.lesson, 3);
        assert_eq!(payload.timestamp, 1_708_995_600_000);
        assert_eq!(payload.student, "Priya");
        assert_eq!(payload.mastery, MasteryFlag::Demonstrated);
        assert_eq!(
            payload.decoded_text().expect("decode text"),
            "Hello, it's great!"
        );
    }

    #[test]
    fn short_payload_reports_structure_error() {
        let err = InsightPayload::parse("8B|2|123").expect_err("too few fields");
        assert!(matches!(err, PayloadError::Structure { found: 3 }));
    }

    #[test]
    fn non_numeric_lesson_reports_numeric_error() {
        let err = InsightPayload::parse("8B|three|123|text|Priya|M").expect_err("bad lesson");
        assert!(matches!(err, PayloadError::Numeric { field: "lesson", .. }));
    }

    #[test]
    fn non_numeric_timestamp_reports_numeric_error() {
        let err = InsightPayload::parse("8B|3|soon|text|Priya|M").expect_err("bad timestamp");
        assert!(matches!(
            err,
            PayloadError::Numeric {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn extra_trailing_fields_are_ignored() {
        let payload =
            InsightPayload::parse("8B|3|123|note|Priya|M|v2|extra").expect("parse payload");
        assert_eq!(payload.mastery, MasteryFlag::Demonstrated);
        assert_eq!(payload.encoded_text, "note");
    }

    #[test]
    fn delimiter_inside_group_and_student_survives_the_frame() {
        let line = encode_insight("8|B", 1, 42, "pipes | everywhere", "Ana|Lu", false);
        let payload = InsightPayload::parse(&line).expect("parse payload");

        assert_eq!(payload.group, "8|B");
        assert_eq!(payload.student, "Ana|Lu");
        assert_eq!(
            payload.decoded_text().expect("decode text"),
            "pipes | everywhere"
        );
    }

    #[test]
    fn unknown_mastery_flag_reads_as_not_demonstrated() {
        assert_eq!(MasteryFlag::from_wire("M"), MasteryFlag::Demonstrated);
        assert_eq!(MasteryFlag::from_wire("N"), MasteryFlag::NotDemonstrated);
        assert_eq!(MasteryFlag::from_wire("X"), MasteryFlag::NotDemonstrated);
        assert_eq!(MasteryFlag::from_wire("m"), MasteryFlag::NotDemonstrated);
    }

    #[test]
    fn malformed_percent_escape_reports_encoding_error() {
        let payload = InsightPayload::parse("8B|3|123|%FF|Priya|M").expect("parse payload");
        let err = payload.decoded_text().expect_err("invalid utf-8");
        assert!(matches!(err, PayloadError::Encoding { field: "text", .. }));
    }

    #[test]
    fn wrapped_message_strips_back_to_the_payload_line() {
        let payload = encode_insight("8B", 3, 123, "note", "Priya", false);
        let message = wrap_share_message(SHARE_BANNER, &payload);
        assert_eq!(extract_payload_line(&message, SHARE_BANNER), payload);
    }

    #[test]
    fn bannerless_paste_falls_back_to_whole_text() {
        assert_eq!(
            extract_payload_line("  8B|3|123|note|Priya|N  ", SHARE_BANNER),
            "8B|3|123|note|Priya|N"
        );
    }

    #[test]
    fn banner_with_chatter_before_and_after_still_finds_the_payload() {
        let pasted = format!(
            "fwd from Priya\n{SHARE_BANNER}\n\n8B|3|123|note|Priya|M\nsee you tomorrow"
        );
        assert_eq!(
            extract_payload_line(&pasted, SHARE_BANNER),
            "8B|3|123|note|Priya|M"
        );
    }
}
