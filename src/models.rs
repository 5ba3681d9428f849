use serde::Serialize;

pub type QuestionId = i64;
pub type AnswerId = i64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub description: String,
    pub category: String,
}

/// One row of the question/answer join. `id` is the question's id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerView {
    pub id: QuestionId,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Tables an existence check can be run against, with the column that
/// carries the looked-up id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Question,
    Answer,
    QuestionVote,
    AnswerVote,
}

impl ResourceKind {
    pub fn table(self) -> &'static str {
        match self {
            ResourceKind::Question => "questions",
            ResourceKind::Answer => "answers",
            ResourceKind::QuestionVote => "question_votes",
            ResourceKind::AnswerVote => "answer_votes",
        }
    }

    pub fn key_column(self) -> &'static str {
        match self {
            ResourceKind::Question | ResourceKind::Answer => "id",
            ResourceKind::QuestionVote => "question_id",
            ResourceKind::AnswerVote => "answer_id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Question,
    Answer,
}

impl VoteTarget {
    pub fn kind(self) -> ResourceKind {
        match self {
            VoteTarget::Question => ResourceKind::QuestionVote,
            VoteTarget::Answer => ResourceKind::AnswerVote,
        }
    }
}
