//! Default system instructions for the preset agents.

/// Turns a user request into a very short story outline.
pub const STORY_OUTLINER: &str =
    "Generate a very short story outline based on the user's input.";

/// Judges an outline's quality and whether it is science fiction.
pub const OUTLINE_CHECKER: &str = "Read the given story outline and judge its quality. \
     Also determine whether it is a science fiction story.";

/// Writes a short story from an outline.
pub const STORY_WRITER: &str = "Write a short story based on the given outline.";

/// Rewrites raw news into publishable articles.
pub const NEWS_EDITOR: &str = "Rewrite and give me as news article ready for publishing. \
     Each news story in a separate section.";

/// Detects which language a message is written in.
pub const LANGUAGE_ROUTER: &str =
    "Identify the language of the user's message so it can be handed to the agent that speaks it.";

/// Answers only in French.
pub const FRENCH_RESPONDER: &str = "You only speak French.";

/// Answers only in Chinese.
pub const CHINESE_RESPONDER: &str = "You only speak Chinese.";

/// Answers only in English.
pub const ENGLISH_RESPONDER: &str = "You only speak English.";

/// General assistant used for meal planning.
pub const MEAL_PLANNER: &str = "You are a helpful assistant";

/// Turns a raw weather reading into an answer.
pub const WEATHER_ASSISTANT: &str = "You are a weather assistant. Using only the weather data \
     provided, give the user a clear summary of the current conditions and the coming days.";
