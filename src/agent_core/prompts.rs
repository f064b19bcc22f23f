//! Prompt builders, one per stage.
//!
//! Every builder is a pure function from typed stage inputs to an ordered
//! message list. Wording is policy: it can change freely without touching
//! the pipeline's control flow, as long as the structured stages keep asking
//! for the shapes described by the `*_SCHEMA` constants below (those same
//! descriptions are handed to the repair prompt).

use crate::inference::types::{ChatMessage, Role};

use super::types::{Intent, Plan, VerifierFeedback};

// ─── Schema Descriptions ────────────────────────────────────────────────────

pub const CLASSIFICATION_SCHEMA: &str =
    r#"{"intent_type": "simple" or "complex", "confidence": 0.0-1.0, "reasoning": "string"}"#;

pub const INTENT_SCHEMA: &str =
    r#"{"goal": string, "constraints": string | list of strings, "expected_output": string}"#;

pub const PLAN_SCHEMA: &str = r#"{"plan": ["Step description 1", "Step description 2"]}"#;

pub const FEEDBACK_SCHEMA: &str = r#"{"issues": [string], "suggested_fixes": [string]}"#;

/// Prior turns rendered into the reasoning context.
pub const HISTORY_TURNS: usize = 6;

// ─── Classifier ─────────────────────────────────────────────────────────────

pub fn classification_prompt(utterance: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You route user messages for an assistant.\n\
         Label a message \"simple\" when it is small talk, a greeting, thanks, \
         or a short factual question that needs no planning.\n\
         Label it \"complex\" when it asks for something to be built, designed, \
         analysed, or solved in several steps.\n\
         When unsure, prefer \"complex\".\n\n\
         Respond with JSON only, matching:\n{CLASSIFICATION_SCHEMA}"
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Message:\n{utterance}")),
    ]
}

// ─── Task Pipeline ──────────────────────────────────────────────────────────

pub fn intent_prompt(utterance: &str) -> Vec<ChatMessage> {
    let system = format!(
        "Extract the user's intent from their request.\n\
         - goal: what the user ultimately wants, in one sentence\n\
         - constraints: requirements or limits they stated (a string, or a list of strings)\n\
         - expected_output: the form the answer should take\n\n\
         Respond with JSON only, matching:\n{INTENT_SCHEMA}"
    );
    vec![ChatMessage::system(system), ChatMessage::user(utterance)]
}

pub fn planning_prompt(intent: &Intent) -> Vec<ChatMessage> {
    let intent_json = serde_json::to_string_pretty(intent).unwrap_or_else(|_| intent.summary());
    let system = format!(
        "Break the intent below into an ordered plan of concrete steps.\n\
         Each step must be a self-contained action of at least a few words.\n\
         Use between 3 and 8 steps.\n\n\
         Respond with JSON only, matching:\n{PLAN_SCHEMA}"
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Intent:\n{intent_json}")),
    ]
}

/// Free-text draft. `history` holds prior turns of the session, if any.
pub fn reasoning_prompt(
    intent: &Intent,
    plan: &Plan,
    history: Option<&[ChatMessage]>,
) -> Vec<ChatMessage> {
    let mut system = String::from(
        "Work through the plan step by step and produce a complete draft answer \
         that satisfies the goal and every constraint.\n\
         Be concrete: include code, figures or examples where they help.",
    );
    let recent = history.map(recent_turns).unwrap_or_default();
    if !recent.is_empty() {
        system.push_str(
            "\nThe conversation so far is included below. Stay consistent with it \
             and reuse anything the user already told you.",
        );
    }

    let mut context = intent.summary();
    context.push_str("\n\nPlan:\n");
    context.push_str(&render_list(plan.steps()));
    if !recent.is_empty() {
        context.push_str("\n\nConversation so far:\n");
        context.push_str(&recent);
    }

    vec![ChatMessage::system(system), ChatMessage::user(context)]
}

pub fn verification_prompt(draft: &str) -> Vec<ChatMessage> {
    let system = format!(
        "Review the draft for factual errors, gaps, unclear passages and \
         unmet requirements.\n\
         List each problem under \"issues\" and a matching fix under \
         \"suggested_fixes\". Use empty lists when the draft is fine.\n\n\
         Respond with JSON only, matching:\n{FEEDBACK_SCHEMA}"
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(format!("Draft:\n{draft}")),
    ]
}

pub fn refactor_prompt(draft: &str, feedback: &VerifierFeedback) -> Vec<ChatMessage> {
    let fixes = if feedback.suggested_fixes.is_empty() {
        "- (none given)".to_string()
    } else {
        render_list(&feedback.suggested_fixes)
    };
    let user = format!(
        "EXISTING DRAFT:\n{draft}\n\n\
         IDENTIFIED ISSUES:\n{}\n\n\
         SUGGESTED FIXES:\n{fixes}\n\n\
         Return the full improved draft.",
        render_list(&feedback.issues)
    );
    vec![
        ChatMessage::system(
            "Revise the draft so every identified issue is resolved. Keep everything \
             that was already correct. Output only the revised draft.",
        ),
        ChatMessage::user(user),
    ]
}

pub fn writer_prompt(draft: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "Turn the draft into the final answer for the user. Keep its substance, \
             tighten the wording, and format it with clear headings, lists and code \
             blocks where appropriate. Do not mention the drafting process.",
        ),
        ChatMessage::user(format!(
            "Draft content:\n{draft}\n\nRewrite the draft into a polished final response."
        )),
    ]
}

// ─── Simple Responder ───────────────────────────────────────────────────────

pub fn simple_system_prompt(persona: &str) -> String {
    format!(
        "You are {persona}, a friendly assistant. Reply briefly and naturally, \
         in at most a few sentences. Do not invent facts about the user."
    )
}

pub fn simple_prompt(persona: &str, utterance: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(simple_system_prompt(persona)),
        ChatMessage::user(utterance),
    ]
}

/// Use a pre-built history, adding the persona prompt and the utterance
/// only when the history does not already carry them.
pub fn simple_prompt_with_context(
    persona: &str,
    utterance: &str,
    context: &[ChatMessage],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() + 2);
    if !matches!(context.first(), Some(m) if m.role == Role::System) {
        messages.push(ChatMessage::system(simple_system_prompt(persona)));
    }
    messages.extend_from_slice(context);
    let ends_with_utterance =
        matches!(context.last(), Some(m) if m.role == Role::User && m.content == utterance);
    if !ends_with_utterance {
        messages.push(ChatMessage::user(utterance));
    }
    messages
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn render_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last `HISTORY_TURNS` non-system messages as `role: content` lines.
fn recent_turns(history: &[ChatMessage]) -> String {
    let turns: Vec<&ChatMessage> = history.iter().filter(|m| m.role != Role::System).collect();
    let start = turns.len().saturating_sub(HISTORY_TURNS);
    turns[start..]
        .iter()
        .map(|m| format!("{}: {}", role_label(m.role), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}
