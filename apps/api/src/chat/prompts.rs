/// Persona and scope sent as the system instruction on every chat request.
pub const SYSTEM_INSTRUCTION: &str = "\
    You are Job Match AI, a friendly and knowledgeable career assistant. \
    Help users with job searching, resume and cover letter advice, interview preparation, \
    skill development and career planning. \
    Keep answers concise and practical, and use web search for current market information. \
    If a question is unrelated to careers or work, politely steer the conversation back.";

/// Seeded assistant turn every transcript starts with.
pub const GREETING: &str = "Hi! I'm your Job Match AI assistant. \
    Ask me anything about careers, job searching, or the skills employers are looking for.";

/// Assistant turn appended when the completion request fails for any reason.
pub const APOLOGY: &str =
    "Sorry, I'm having trouble connecting right now. Please try again in a moment.";

/// Substituted when the API answers without usable text.
pub const NO_CLEAR_RESPONSE: &str = "Sorry, I couldn't get a clear response.";

/// First line of the citation block appended to grounded replies.
pub const SOURCES_HEADER: &str = "Sources:";
