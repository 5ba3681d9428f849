use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::AppError,
    models::{AnswerView, DataResponse, MessageResponse, Question, QuestionId, VoteTarget},
    routes::AppState,
    search::{Predicate, SearchFilters},
    store,
    validation::{AnswerInput, INVALID_REQUEST, QuestionInput, Rejection, Validate, VoteInput},
};

const QUESTION_NOT_FOUND: &str = "Question not found.";
const ANSWER_NOT_FOUND: &str = "Answer not found.";

type Body = Result<Json<Value>, JsonRejection>;
type Data<T> = Result<Json<DataResponse<T>>, AppError>;
type Message = Result<Json<MessageResponse>, AppError>;
type Created = Result<(StatusCode, Json<MessageResponse>), AppError>;

/// A body sent without a JSON content type is read as `{}`, so the client
/// still hears which field is missing.
fn payload<T: Validate>(body: Body) -> Result<T, AppError> {
    let body = match body {
        Ok(Json(body)) => body,
        Err(JsonRejection::MissingJsonContentType(_)) => Value::Object(Default::default()),
        Err(rejection) => {
            warn!(%rejection, "unreadable request body");
            return Err(Rejection {
                field: "body",
                reason: INVALID_REQUEST,
            }
            .into());
        }
    };
    Ok(T::validate(&body)?)
}

/// Ids that do not parse as integers cannot name a row.
fn parse_id(raw: &str, not_found: &'static str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound(not_found))
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

pub async fn health() -> Json<&'static str> {
    Json("Server API is working 🚀")
}

pub async fn list_questions(State(state): State<AppState>) -> Data<Vec<Question>> {
    let questions = state
        .store
        .run(|conn| store::list_questions(conn))
        .await
        .map_err(AppError::store("Unable to fetch questions."))?;

    Ok(Json(DataResponse { data: questions }))
}

pub async fn search_questions(
    State(state): State<AppState>,
    Query(filters): Query<SearchFilters>,
) -> Data<Vec<Question>> {
    let predicate = Predicate::build(&filters);
    let questions = state
        .store
        .run(move |conn| store::search_questions(conn, &predicate))
        .await
        .map_err(AppError::store("Unable to fetch a question."))?;

    if questions.is_empty() && !filters.is_empty() {
        return Err(AppError::InvalidSearch);
    }

    Ok(Json(DataResponse { data: questions }))
}

pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Data<Question> {
    let id = parse_id(&id, QUESTION_NOT_FOUND)?;
    let question = state
        .store
        .run(move |conn| store::get_question(conn, id))
        .await
        .map_err(AppError::store("Unable to fetch questions."))?
        .ok_or(AppError::NotFound(QUESTION_NOT_FOUND))?;

    Ok(Json(DataResponse { data: question }))
}

pub async fn create_question(State(state): State<AppState>, body: Body) -> Created {
    let question: QuestionInput = payload(body)?;
    let id = state
        .store
        .run(move |conn| store::insert_question(conn, &question))
        .await
        .map_err(AppError::store("Unable to create question."))?;

    info!(id, "question created");
    Ok((StatusCode::CREATED, message("Question created successfully.")))
}

pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Message {
    let question: QuestionInput = payload(body)?;
    let id = parse_id(&id, QUESTION_NOT_FOUND)?;
    state
        .store
        .run(move |conn| store::update_question(conn, id, &question))
        .await
        .map_err(AppError::store("Unable to update questions."))?
        .ok_or(AppError::NotFound(QUESTION_NOT_FOUND))?;

    info!(id, "question updated");
    Ok(message("Question updated successfully."))
}

pub async fn delete_question(State(state): State<AppState>, Path(id): Path<String>) -> Message {
    let id = parse_id(&id, QUESTION_NOT_FOUND)?;
    state
        .store
        .run(move |conn| store::delete_question(conn, id))
        .await
        .map_err(AppError::store("Unable to delete question."))?
        .ok_or(AppError::NotFound(QUESTION_NOT_FOUND))?;

    info!(id, "question deleted");
    Ok(message("Question post has been deleted successfully."))
}

pub async fn list_answers(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Data<Vec<AnswerView>> {
    let id: QuestionId = parse_id(&id, QUESTION_NOT_FOUND)?;
    let answers = state
        .store
        .run(move |conn| store::list_answers(conn, id))
        .await
        .map_err(AppError::store("Unable to fetch answers."))?;

    if answers.is_empty() {
        return Err(AppError::NotFound(QUESTION_NOT_FOUND));
    }

    Ok(Json(DataResponse { data: answers }))
}

pub async fn create_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Created {
    let answer: AnswerInput = payload(body)?;
    let question_id = parse_id(&id, QUESTION_NOT_FOUND)?;
    let answer_id = state
        .store
        .run(move |conn| store::insert_answer(conn, question_id, &answer))
        .await
        .map_err(AppError::store("Unable to create answers."))?
        .ok_or(AppError::NotFound(QUESTION_NOT_FOUND))?;

    info!(question_id, answer_id, "answer created");
    Ok((StatusCode::CREATED, message("Answer created successfully.")))
}

struct VoteMessages {
    not_found: &'static str,
    recorded: &'static str,
    failed: &'static str,
}

const QUESTION_VOTE: VoteMessages = VoteMessages {
    not_found: QUESTION_NOT_FOUND,
    recorded: "Vote on the question has been recorded successfully.",
    failed: "Unable to vote question.",
};

const ANSWER_VOTE: VoteMessages = VoteMessages {
    not_found: ANSWER_NOT_FOUND,
    recorded: "Vote on the answer has been recorded successfully.",
    failed: "Unable to vote answer.",
};

async fn vote(
    state: AppState,
    target: VoteTarget,
    messages: &VoteMessages,
    id: &str,
    body: Body,
) -> Message {
    let VoteInput { vote } = payload(body)?;
    let id = parse_id(id, messages.not_found)?;
    state
        .store
        .run(move |conn| store::record_vote(conn, target, id, vote))
        .await
        .map_err(AppError::store(messages.failed))?
        .ok_or(AppError::NotFound(messages.not_found))?;

    info!(?target, id, vote, "vote recorded");
    Ok(message(messages.recorded))
}

pub async fn vote_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Message {
    vote(state, VoteTarget::Question, &QUESTION_VOTE, &id, body).await
}

pub async fn vote_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Body,
) -> Message {
    vote(state, VoteTarget::Answer, &ANSWER_VOTE, &id, body).await
}
