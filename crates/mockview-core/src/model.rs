// Interview session records and the question/result types they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Parse a difficulty label, ignoring case. Returns `None` for anything
    /// that is not one of the three known levels.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One input/expected pair the client runs the candidate's function against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTest {
    /// Positional arguments passed to `functionName`.
    pub input: serde_json::Value,
    pub expected: serde_json::Value,
}

/// A fixed interview question. Immutable once picked for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub title: String,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub topic: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function_name: String,
    pub starter_code: String,
    pub tests: Vec<QuestionTest>,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Summary computed once when a session is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub passed_count: u32,
    pub total_tests: u32,
    pub passed: bool,
    pub feedback: String,
    pub complexity: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Submitted,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mock interview attempt.
///
/// Status only moves forward: `active` becomes either `submitted` or
/// `expired`, and neither of those ever changes again. `result` is `None`
/// until the session is submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub question: Question,
    pub code_submitted: Option<String>,
    pub hints_used: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Allotted countdown length.
    pub duration_sec: u64,
    /// Time actually spent, set when the session ends.
    pub elapsed_sec: Option<u64>,
    pub result: Option<SessionResult>,
}

impl InterviewSession {
    /// Create a fresh active session with a newly generated id.
    pub fn new(
        user_id: impl Into<String>,
        question: Question,
        duration_sec: u64,
        now: DateTime<Utc>,
    ) -> Self {
        InterviewSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            status: SessionStatus::Active,
            question,
            code_submitted: None,
            hints_used: 0,
            started_at: now,
            ended_at: None,
            duration_sec,
            elapsed_sec: None,
            result: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Count one more hint. Returns `false` (and changes nothing) unless the
    /// session is still active.
    pub fn record_hint(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        self.hints_used += 1;
        true
    }

    /// Freeze the session with its submitted code and result. Returns `false`
    /// if the session already ended; the stored result is never replaced.
    pub fn submit(&mut self, code: String, result: SessionResult, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.code_submitted = Some(code);
        self.result = Some(result);
        self.finish(SessionStatus::Submitted, now);
        true
    }

    /// Mark an active session as expired. No-op for ended sessions.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.finish(SessionStatus::Expired, now);
        true
    }

    fn finish(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.ended_at = Some(now);
        let elapsed = (now - self.started_at).num_seconds().max(0);
        self.elapsed_sec = Some(elapsed as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_question() -> Question {
        Question {
            title: "Two Sum".into(),
            prompt: "Find two indices.".into(),
            difficulty: Difficulty::Easy,
            topic: "DSA".into(),
            kind: "coding".into(),
            function_name: "twoSum".into(),
            starter_code: "function twoSum(nums, target) {}".into(),
            tests: vec![QuestionTest {
                input: serde_json::json!([[2, 7, 11, 15], 9]),
                expected: serde_json::json!([0, 1]),
            }],
        }
    }

    fn sample_result() -> SessionResult {
        SessionResult {
            passed_count: 1,
            total_tests: 1,
            passed: true,
            feedback: "ok".into(),
            complexity: "O(n)".into(),
        }
    }

    #[test]
    fn new_session_is_active_without_result() {
        let s = InterviewSession::new("u1", sample_question(), 1800, Utc::now());
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.result.is_none());
        assert!(s.ended_at.is_none());
        assert_eq!(s.hints_used, 0);
        assert!(!s.id.is_empty());
    }

    #[test]
    fn submit_freezes_session_once() {
        let start = Utc::now();
        let mut s = InterviewSession::new("u1", sample_question(), 1800, start);
        let end = start + Duration::seconds(90);

        assert!(s.submit("code".into(), sample_result(), end));
        assert_eq!(s.status, SessionStatus::Submitted);
        assert_eq!(s.elapsed_sec, Some(90));

        let later = end + Duration::seconds(30);
        assert!(!s.submit("other".into(), sample_result(), later));
        assert_eq!(s.code_submitted.as_deref(), Some("code"));
        assert_eq!(s.ended_at, Some(end));
        assert_eq!(s.started_at, start);
    }

    #[test]
    fn ended_sessions_reject_hints_and_expiry() {
        let mut s = InterviewSession::new("u1", sample_question(), 60, Utc::now());
        assert!(s.record_hint());
        assert!(s.expire(Utc::now()));
        assert_eq!(s.status, SessionStatus::Expired);
        assert!(!s.record_hint());
        assert_eq!(s.hints_used, 1);
        assert!(!s.submit("late".into(), sample_result(), Utc::now()));
        assert!(s.result.is_none());
    }

    #[test]
    fn serializes_with_camel_case_and_type_key() {
        let s = InterviewSession::new("u1", sample_question(), 60, Utc::now());
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["status"], "active");
        assert_eq!(v["userId"], "u1");
        assert_eq!(v["hintsUsed"], 0);
        assert_eq!(v["question"]["type"], "coding");
        assert_eq!(v["question"]["functionName"], "twoSum");
        assert_eq!(v["question"]["difficulty"], "Easy");
        assert!(v["result"].is_null());
    }

    #[test]
    fn difficulty_parse_ignores_case() {
        assert_eq!(Difficulty::parse("easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::parse(" HARD "), Some(Difficulty::Hard));
        assert_eq!(Difficulty::parse("impossible"), None);
    }
}
