// Shared prompt fragments used by every LLM call.
// Feature-specific prompts live next to the feature (see interview::prompts).

/// Fixed closing instruction: every interview turn must answer with this JSON shape.
pub const JSON_REPLY_INSTRUCTION: &str = "Respond with strict JSON only, no markdown fences and \
    no commentary, in exactly this shape: \
    {\"text\": \"<your next message to the candidate>\", \"followups\": [\"<optional short follow-up question>\"]}";
