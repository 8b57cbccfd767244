use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::models::SessionType;

/// Which tool surface the agent is provisioned with.
///
/// `SingleCall` is the current shape: the agent improvises questions, keeps
/// score internally, and reports back through one `conclude_viva` call.
/// `MultiTool` is the question-bank-driven shape where every question and
/// every evaluation round-trips through the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamProtocol {
    SingleCall,
    MultiTool,
}

impl FromStr for ExamProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_call" => Ok(ExamProtocol::SingleCall),
            "multi_tool" => Ok(ExamProtocol::MultiTool),
            other => Err(format!("unknown exam protocol: {}", other)),
        }
    }
}

/// Inputs the builder is parameterized over. Everything here is
/// client-facing session metadata; credentials never enter the contract.
#[derive(Debug, Clone)]
pub struct ContractParams {
    pub student_name: String,
    pub topic: String,
    pub class_level: i32,
    pub session_type: SessionType,
    pub voice_name: Option<String>,
    pub protocol: ExamProtocol,
    pub session_duration_minutes: i64,
}

/// A tool the agent is allowed to invoke, declared in the provider's
/// function-calling schema vocabulary (`OBJECT`/`STRING`/`INTEGER`/...).
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModalityConfig {
    pub response_modalities: Vec<&'static str>,
    pub voice_name: Option<String>,
}

/// The full behavioral contract one session is provisioned under:
/// instruction text, the declared tool surface, and modality settings.
#[derive(Debug, Clone, Serialize)]
pub struct BehavioralContract {
    pub system_instruction: String,
    pub tools: Vec<ToolDeclaration>,
    pub modality: ModalityConfig,
}

/// Build the behavioral contract for one session. Pure and deterministic:
/// the same params always produce byte-identical instruction text.
pub fn build_contract(params: &ContractParams) -> BehavioralContract {
    let tools = match params.protocol {
        ExamProtocol::SingleCall => vec![conclude_viva_tool()],
        ExamProtocol::MultiTool => vec![
            next_question_tool(),
            evaluate_and_save_tool(),
            conclude_viva_tool(),
        ],
    };

    BehavioralContract {
        system_instruction: system_instruction(params),
        tools,
        modality: ModalityConfig {
            response_modalities: vec!["AUDIO"],
            voice_name: params.voice_name.clone(),
        },
    }
}

fn system_instruction(params: &ContractParams) -> String {
    let role_line = match params.session_type {
        SessionType::Viva => "You are an expert oral examiner conducting a Viva (oral exam) for a student.",
        SessionType::Learn => "You are a patient tutor running an interactive oral practice session with a student.",
    };

    let questioning = match params.protocol {
        ExamProtocol::SingleCall => "\
2.  **Questioning**: Ask **one question at a time**.
    -   Generate questions dynamically based on the topic and class level.
    -   Start with fundamental concepts. If answered correctly, increase difficulty.
    -   If the student struggles, provide a small hint or ask a simpler follow-up.
3.  **Evaluation (internal)**: Track performance mentally.
    -   Start from a baseline score of 10/10 and deduct for factual errors,
        unclear explanations, or heavy reliance on hints.
    -   Note specific strengths and weaknesses as you go."
            .to_string(),
        ExamProtocol::MultiTool => "\
2.  **Questioning**: Ask **one question at a time**.
    -   Call the `next_question` tool BEFORE each question to fetch it from
        the question bank; read the returned question aloud verbatim.
    -   Choose a difficulty from 1 to 5; raise it after correct answers and
        lower it after mistakes.
3.  **Evaluation**: After the student answers, call the `evaluate_and_save`
    tool with the question, a transcription of the answer, your written
    evaluation, and whether it was correct. Do this once per question."
            .to_string(),
    };

    format!(
        "{role}\n\n\
**Student Name:** {name}\n\
**Topic:** {topic}\n\
**Class Level:** {level}\n\
**Session Duration:** {duration} minutes maximum\n\n\
**Your Role & Protocol:**\n\
1.  **Welcome**: Start by welcoming the student and stating the topic clearly.\n\
{questioning}\n\
4.  **Conclusion**: After 5-7 questions OR when the student asks to stop\n\
    (e.g. \"End viva\"), conclude in **two steps**:\n\
    a.  **First, speak your conclusion out loud.** Thank the student, give a\n\
        brief verbal summary of how they did, and say a warm goodbye.\n\
    b.  **Then, immediately after you finish speaking, call the\n\
        `conclude_viva` tool** exactly once with the final score and the\n\
        detailed written feedback.\n\n\
**Strict Rules:**\n\
-   **DO NOT** announce a running score between questions.\n\
-   **DO NOT** say \"Correct\" or \"Incorrect\" robotically; respond naturally.\n\
-   Make `strong_points` and `areas_of_improvement` specific to the topics\n\
    discussed, not generic advice.\n\
-   **CRITICAL:** You MUST speak your concluding remarks BEFORE calling the\n\
    `conclude_viva` tool. Never call it silently.",
        role = role_line,
        name = params.student_name,
        topic = params.topic,
        level = params.class_level,
        duration = params.session_duration_minutes,
        questioning = questioning,
    )
}

fn conclude_viva_tool() -> ToolDeclaration {
    ToolDeclaration {
        name: "conclude_viva",
        description: "Call this tool to END the viva session. You MUST provide a score, \
                      summary, strengths, and areas for improvement."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "score": {
                    "type": "INTEGER",
                    "description": "Final score out of 10 based on technical accuracy and communication.",
                },
                "summary": {
                    "type": "STRING",
                    "description": "A polite closing statement and final performance summary.",
                },
                "strong_points": {
                    "type": "ARRAY",
                    "items": {"type": "STRING"},
                    "description": "2-3 specific concepts the student demonstrated strong understanding of.",
                },
                "areas_of_improvement": {
                    "type": "ARRAY",
                    "items": {"type": "STRING"},
                    "description": "2-3 specific topics the student needs to improve.",
                },
            },
            "required": ["score", "summary", "strong_points", "areas_of_improvement"],
        }),
    }
}

fn next_question_tool() -> ToolDeclaration {
    ToolDeclaration {
        name: "next_question",
        description: "Fetch the next unasked question from the question bank for the \
                      session's topic and class level at the requested difficulty."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "topic": {"type": "STRING"},
                "class_level": {"type": "INTEGER"},
                "difficulty": {
                    "type": "INTEGER",
                    "description": "Requested difficulty from 1 (easiest) to 5 (hardest).",
                },
            },
            "required": ["topic", "class_level", "difficulty"],
        }),
    }
}

fn evaluate_and_save_tool() -> ToolDeclaration {
    ToolDeclaration {
        name: "evaluate_and_save",
        description: "Record one completed question/answer exchange with your written \
                      evaluation. Call exactly once per question, after the student answers."
            .to_string(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "question_text": {"type": "STRING"},
                "difficulty": {"type": "INTEGER"},
                "question_id": {"type": "STRING"},
                "student_answer": {"type": "STRING"},
                "evaluation": {"type": "STRING"},
                "is_correct": {"type": "BOOLEAN"},
            },
            "required": ["question_text", "difficulty", "student_answer", "evaluation", "is_correct"],
        }),
    }
}
