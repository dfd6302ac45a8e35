//! Preset pipelines.
//!
//! Each preset only fixes the stage layout; the caller injects the
//! generators and validators, so the same layout runs against a live model
//! or against scripted test doubles.

pub mod prompts;

use crate::errors::ConfigurationError;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::stages::{Generator, Router, Validator};
use std::sync::Arc;

/// Story stage: outline from the user's prompt.
pub const OUTLINE: &str = "outline";
/// Story stage: gate on the outline.
pub const CHECK_OUTLINE: &str = "check_outline";
/// Story stage: the finished story.
pub const WRITE_STORY: &str = "write_story";
/// Flag the outline checker must set for the story to be written.
pub const IS_SCIFI: &str = "is_scifi";

/// News stage: raw articles.
pub const FETCH_NEWS: &str = "fetch_news";
/// News stage: edited articles.
pub const EDIT_NEWS: &str = "edit_news";

/// Translation stage: detect the language of the message.
pub const ROUTE_LANGUAGE: &str = "route_language";
/// Translation stage: answer in the detected language.
pub const RESPOND: &str = "respond";
/// Categorical flag the language router sets.
pub const LANGUAGE: &str = "language";
/// Languages the translation preset can answer in.
pub const LANGUAGES: [&str; 3] = ["french", "chinese", "english"];

/// Meal stage: the weekly plan.
pub const PLAN_MEAL: &str = "plan_meal";
/// The request the meal planner answers when none is given.
pub const MEAL_PLAN_REQUEST: &str = "Create a meal plan for a week. I'm a vegetarian. \
     This should be for someone who wants to build muscle.";

/// Weather stage: live reading and forecast for a city.
pub const LOOKUP_WEATHER: &str = "lookup_weather";
/// Weather stage: the reading turned into an answer.
pub const PRESENT_WEATHER: &str = "present_weather";

const NEWS_REQUEST_PREFIX: &str = "Get me the news about ";

/// Builds `outline -> check_outline -> write_story`.
///
/// `check_outline` passes the outline through and halts unless the checker
/// reports acceptable quality and `is_scifi`.
///
/// # Errors
///
/// Never fails for the fixed layout; the result mirrors [`PipelineBuilder::build`].
pub fn story_pipeline(
    outliner: Arc<dyn Generator>,
    checker: Arc<dyn Validator>,
    writer: Arc<dyn Generator>,
) -> Result<Pipeline, ConfigurationError> {
    PipelineBuilder::new("story")
        .transform(OUTLINE, outliner)
        .gate(CHECK_OUTLINE, checker, &[IS_SCIFI])
        .transform(WRITE_STORY, writer)
        .build()
}

/// Builds `fetch_news -> edit_news`.
///
/// # Errors
///
/// Never fails for the fixed layout; the result mirrors [`PipelineBuilder::build`].
pub fn news_pipeline(
    fetcher: Arc<dyn Generator>,
    editor: Arc<dyn Generator>,
) -> Result<Pipeline, ConfigurationError> {
    PipelineBuilder::new("news")
        .transform(FETCH_NEWS, fetcher)
        .transform(EDIT_NEWS, editor)
        .build()
}

/// Builds the news seed for `topic` in `month` (`YYYY-mm`).
#[must_use]
pub fn news_request(topic: &str, month: &str) -> String {
    format!("{NEWS_REQUEST_PREFIX}{} on {month}", topic.trim())
}

/// Turns a news seed back into a search query: `"<topic> <month>"`.
///
/// Text that is not a news seed is used as the query unchanged.
#[must_use]
pub fn news_query(request: &str) -> String {
    let request = request.trim();
    let Some(rest) = request.strip_prefix(NEWS_REQUEST_PREFIX) else {
        return request.to_string();
    };
    match rest.rsplit_once(" on ") {
        Some((topic, month)) => format!("{topic} {month}"),
        None => rest.to_string(),
    }
}

/// Builds `route_language -> respond`.
///
/// `route_language` passes the message through while the classifier sets the
/// categorical `language` flag. `respond` hands the message to the responder
/// registered for that language; an unknown language fails the run.
///
/// # Errors
///
/// Never fails for the fixed layout; the result mirrors [`PipelineBuilder::build`].
pub fn translation_pipeline(
    classifier: Arc<dyn Validator>,
    french: Arc<dyn Generator>,
    chinese: Arc<dyn Generator>,
    english: Arc<dyn Generator>,
) -> Result<Pipeline, ConfigurationError> {
    let [fr, zh, en] = LANGUAGES;
    let router = Router::new(LANGUAGE)
        .route(fr, french)
        .route(zh, chinese)
        .route(en, english);

    PipelineBuilder::new("translate")
        .gate(ROUTE_LANGUAGE, classifier, &[])
        .routed(RESPOND, router)
        .build()
}

/// Builds the single-stage `plan_meal` pipeline.
///
/// # Errors
///
/// Never fails for the fixed layout; the result mirrors [`PipelineBuilder::build`].
pub fn meal_plan_pipeline(planner: Arc<dyn Generator>) -> Result<Pipeline, ConfigurationError> {
    PipelineBuilder::new("meal_plan")
        .transform(PLAN_MEAL, planner)
        .build()
}

/// Builds `lookup_weather -> present_weather`.
///
/// The seed is a city name. `lookup` returns the formatted reading and
/// `presenter` answers from it.
///
/// # Errors
///
/// Never fails for the fixed layout; the result mirrors [`PipelineBuilder::build`].
pub fn weather_pipeline(
    lookup: Arc<dyn Generator>,
    presenter: Arc<dyn Generator>,
) -> Result<Pipeline, ConfigurationError> {
    PipelineBuilder::new("weather")
        .transform(LOOKUP_WEATHER, lookup)
        .transform(PRESENT_WEATHER, presenter)
        .build()
}
