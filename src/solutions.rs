//! AI-solution cache and study aids: ad-hoc and inline (per-question) answers,
//! topic summaries and video suggestions.
//!
//! Both population paths store the same `{answer, generatedAt}` shape; the
//! ad-hoc log is append-only.

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::domain::{AdHocSolution, AiSolution};
use crate::error::{AppError, AppResult};
use crate::gemini::TextGenerator;
use crate::protocol::{
  GenerateSolutionIn, GenerateSolutionOut, QuestionSolutionOut, SummarizeIn, SummarizeOut, VideoSearchIn, VideoSearchOut,
};
use crate::state::AppState;
use crate::store::Store;
use crate::util::{fill_template, required};
use crate::youtube::clamp_max_results;

const SOLUTION_FAILED: &str = "Failed to generate AI solution. Please try again.";
const SUMMARY_FAILED: &str = "Failed to generate summary. Please try again.";
const VIDEOS_FAILED: &str = "Failed to fetch videos from YouTube";

fn generator<'a>(state: &'a AppState, message: &str) -> AppResult<&'a dyn TextGenerator> {
  state
    .ai
    .as_deref()
    .ok_or_else(|| AppError::upstream(message, "GEMINI_API_KEY is not configured"))
}

fn solution_prompt(state: &AppState, question: &str, subject: Option<&str>) -> String {
  let subject = subject.unwrap_or(state.prompts.solution_default_subject.as_str());
  fill_template(&state.prompts.solution_template, &[("subject", subject), ("question", question)])
}

#[instrument(level = "info", skip(state, body), fields(paper_id = ?body.paper_id))]
pub async fn generate_solution(state: &AppState, body: GenerateSolutionIn) -> AppResult<GenerateSolutionOut> {
  let question =
    required(body.question.as_deref()).ok_or_else(|| AppError::Validation("Question is required".into()))?;
  let ai = generator(state, SOLUTION_FAILED)?;

  let subject = required(body.subject.as_deref());
  let prompt = solution_prompt(state, &question, subject.as_deref());
  let answer = ai.generate(&prompt).await.map_err(|e| AppError::upstream(SOLUTION_FAILED, e))?;

  let mut saved_to_paper = false;
  if let Some(paper_id) = required(body.paper_id.as_deref()) {
    let entry = AdHocSolution { question: question.clone(), answer: answer.clone(), generated_at: Utc::now() };
    saved_to_paper = state.store.append_solution(&paper_id, entry).await?;
    if !saved_to_paper {
      warn!(target: "ai", %paper_id, "Paper not found; solution returned without saving");
    }
  }

  info!(target: "ai", question_len = question.len(), answer_len = answer.len(), saved_to_paper, "AI solution generated");
  Ok(GenerateSolutionOut { success: true, question, answer, is_ai_generated: true, saved_to_paper })
}

#[instrument(level = "info", skip(state))]
pub async fn saved_solutions(state: &AppState, paper_id: &str) -> AppResult<Vec<AdHocSolution>> {
  let paper = state.store.get_paper(paper_id).await?.ok_or_else(AppError::paper_not_found)?;
  Ok(paper.ai_generated_solutions)
}

#[instrument(level = "info", skip(state, body))]
pub async fn summarize(state: &AppState, body: SummarizeIn) -> AppResult<SummarizeOut> {
  let topic = required(body.topic.as_deref()).ok_or_else(|| AppError::Validation("Topic is required".into()))?;
  let ai = generator(state, SUMMARY_FAILED)?;

  let subject = required(body.subject.as_deref()).unwrap_or_default();
  let prompt = fill_template(&state.prompts.summary_template, &[("subject", subject.as_str()), ("topic", topic.as_str())]);
  let summary = ai.generate(&prompt).await.map_err(|e| AppError::upstream(SUMMARY_FAILED, e))?;

  info!(target: "ai", topic_len = topic.len(), summary_len = summary.len(), "Topic summarized");
  Ok(SummarizeOut { success: true, topic, summary })
}

/// Answer the embedded question `number` of a paper and attach the answer to it.
#[instrument(level = "info", skip(state))]
pub async fn solve_question(state: &AppState, paper_id: &str, number: u32) -> AppResult<QuestionSolutionOut> {
  let paper = state.store.get_paper(paper_id).await?.ok_or_else(AppError::paper_not_found)?;
  let question = paper
    .questions
    .iter()
    .find(|q| q.question_number == Some(number))
    .ok_or_else(|| AppError::NotFound("Question not found".into()))?;
  let ai = generator(state, SOLUTION_FAILED)?;

  let prompt = solution_prompt(state, &question.question_text, required(Some(paper.subject.as_str())).as_deref());
  let answer = ai.generate(&prompt).await.map_err(|e| AppError::upstream(SOLUTION_FAILED, e))?;

  // the paper may have been deleted while the provider was answering
  let question = state
    .store
    .attach_question_solution(paper_id, number, AiSolution::generated(answer, Utc::now()))
    .await?
    .ok_or_else(AppError::paper_not_found)?;

  info!(target: "ai", %paper_id, number, "Question solution attached");
  Ok(QuestionSolutionOut { success: true, question })
}

#[instrument(level = "info", skip(state, body), fields(max_results = ?body.max_results))]
pub async fn search_videos(state: &AppState, body: VideoSearchIn) -> AppResult<VideoSearchOut> {
  let query =
    required(body.query.as_deref()).ok_or_else(|| AppError::Validation("Search query is required".into()))?;
  let videos = state
    .videos
    .as_deref()
    .ok_or_else(|| AppError::upstream(VIDEOS_FAILED, "YOUTUBE_API_KEY is not configured"))?;

  let videos = videos
    .search(&query, clamp_max_results(body.max_results))
    .await
    .map_err(|e| AppError::upstream(VIDEOS_FAILED, e))?;
  Ok(VideoSearchOut { success: true, count: videos.len(), videos })
}
