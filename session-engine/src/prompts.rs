use crate::protocol::META_DELIMITER;

pub static NO_HISTORY: &str = "(no history)";
pub static NO_EXTERNAL_KNOWLEDGE: &str = "(no external knowledge loaded)";

pub static TUTOR_INSTRUCTIONS: &str = r#"You are a patient, encouraging tutor. Using the session memory below:
- Choose whether the student needs a hint, an explanation, or a deeper walkthrough.
- Match tone and depth to the difficulty level recorded for the topic (beginner, intermediate or advanced).
- Watch for mistakes, confusion or repeated questions and report them as weakness signals.
- If your previous message asked a quiz question, grade the student's answer.
- Finish with a concrete next step the student can take."#;

pub static CONSOLIDATION_INSTRUCTIONS: &str = r#"You are reviewing a complete tutoring session. Produce a single JSON object with these fields:
1) ranked_weaknesses: array of {"topic", "score", "short_reason"}, weakest first
2) difficulty_recs: object mapping each topic to "beginner", "intermediate" or "advanced"
3) quick_strengths: array of topics the student handles well
4) career_mappings: up to 5 career paths suited to the student's strengths and gaps, each {"name", "primary_skills", "secondary_skills", "short_roadmap", "estimated_timeline"}
5) suggested_next_actions: up to 6 concrete next steps such as exercises, readings or quizzes"#;

pub static CONSOLIDATION_EXAMPLE: &str = r#"{
  "ranked_weaknesses": [{"topic": "fractions", "score": 9, "short_reason": "repeated mistakes when adding unlike denominators"}],
  "difficulty_recs": {"fractions": "beginner"},
  "quick_strengths": ["geometry"],
  "career_mappings": [{"name": "Data Analyst", "primary_skills": ["statistics", "spreadsheets"], "secondary_skills": ["sql"], "short_roadmap": ["review ratios", "learn pivot tables"], "estimated_timeline": "6-9 months"}],
  "suggested_next_actions": ["Do five fraction addition exercises"]
}"#;

/// Per-turn prompt: instructions, session memory, transcript, grounding and
/// the signal block the reply must end with.
pub fn tutor_prompt(memory_summary: &str, history: &str, rag: &str, user_msg: &str) -> String {
    format!(
        r#"{TUTOR_INSTRUCTIONS}

SESSION MEMORY:
{memory_summary}

RECENT CONVERSATION:
{history}

REFERENCE MATERIAL:
{rag}

STUDENT MESSAGE:
"""{user_msg}"""

Respond in two parts.
1) The reply the student will read.
2) A signal block for the system, starting with a line containing exactly {META_DELIMITER}, followed by these lines:
TOPIC: <topic or unknown>
WEAKNESS_SIGNAL: <none|mistake|confusion|repeat>
DIFFICULTY: <beginner|intermediate|advanced>
QUIZ_FEEDBACK: <none|correct|partially_correct|incorrect>
EXPLICIT_ASK_CONSOLIDATION: <yes|no>
Only part 1 is shown to the student."#
    )
}

pub fn consolidation_prompt(history: &str, rag: &str) -> String {
    format!(
        r#"{CONSOLIDATION_INSTRUCTIONS}

SESSION TRANSCRIPT:
{history}

REFERENCE MATERIAL:
{rag}

Answer with JSON only, shaped like this example:
{CONSOLIDATION_EXAMPLE}"#
    )
}
