// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for short free-text answers (titles, summaries).
pub const PLAIN_TEXT_SYSTEM: &str = "You are a concise assistant for a meeting-notes product. \
    Answer with the requested text only, without preamble or quotation marks.";

/// Appended to prompts that must not invent facts about real people.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Only use facts present in the material provided. \
    Do NOT guess job titles, employers or profile URLs. \
    If the material does not support a field, leave it empty.";
