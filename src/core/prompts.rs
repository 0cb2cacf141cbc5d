//! Prompt templates for translation and evaluation

use crate::core::models::{EvaluationScore, TranslationAttempt, TranslationRequest};

/// System prompt for every translation call
pub const TRANSLATION_SYSTEM: &str = "You are a professional translator. Provide accurate, natural \
translations that preserve the meaning and tone of the original text.";

/// Shape the evaluator must answer with
const EVALUATION_SHAPE: &str = r#"{"accuracy": <0-10>, "fluency": <0-10>, "context_relevance": <0-10>, "explanation": "<one or two sentences>"}"#;

/// Prior attempt and its judgment, fed into the next attempt
#[derive(Debug, Clone, Copy)]
pub struct Feedback<'a> {
    pub attempt: &'a TranslationAttempt,
    pub score: &'a EvaluationScore,
}

/// First-pass translation prompt
pub fn translation_prompt(request: &TranslationRequest) -> String {
    let mut prompt = format!(
        "Translate the following text from {} to {}:\n\n{}",
        request.source_lang(),
        request.target_lang(),
        request.text()
    );

    if let Some(context) = request.context() {
        prompt.push_str(&format!(
            "\n\nContext for this translation: {}\nUse this context to ensure accurate translation \
of domain-specific terms and concepts.",
            context
        ));
    }

    prompt.push_str("\n\nProvide only the translation, nothing else.");
    prompt
}

/// Retry prompt carrying the previous translation and its scores
pub fn feedback_prompt(request: &TranslationRequest, feedback: Feedback<'_>) -> String {
    let mut prompt = translation_prompt(request);
    let score = feedback.score;

    prompt.push_str(&format!(
        "\n\nA previous translation was reviewed:\n{}\n\n\
Scores (0-10): accuracy {:.1}, fluency {:.1}, context relevance {:.1}, overall {:.1}.\n\
Reviewer notes: {}\n\n\
Write an improved translation that corrects the weaknesses identified above while \
preserving the meaning of the source text. Provide only the translation, nothing else.",
        feedback.attempt.text,
        score.accuracy,
        score.fluency,
        score.context_relevance,
        score.composite,
        score.explanation
    ));
    prompt
}

/// System prompt for the evaluation model
pub fn evaluation_system(source_lang: &str, target_lang: &str, has_reference: bool) -> String {
    let comparison = if has_reference {
        "Compare the machine translation against the reference translation."
    } else {
        "The translation should accurately reflect the meaning of the source text while using \
appropriate terminology from the provided context."
    };

    format!(
        "You are a professional translation evaluator fluent in both {source_lang} and {target_lang}.\n\
Assess the quality of the machine translation from {source_lang} to {target_lang}.\n\
{comparison}\n\n\
Score on a scale of 0-10 for:\n\
1. accuracy (meaning preservation)\n\
2. fluency (natural {target_lang} usage)\n\
3. context_relevance (appropriate use of domain-specific terminology from the context)\n\n\
Respond with only a JSON object of this shape:\n{EVALUATION_SHAPE}"
    )
}

/// Stricter system prompt used when the first answer could not be parsed
pub fn strict_evaluation_system(source_lang: &str, target_lang: &str, has_reference: bool) -> String {
    format!(
        "{}\n\nYour previous answer could not be parsed. Output exactly one JSON object and nothing \
else: no markdown, no code fences, no commentary. All three scores must be plain numbers.",
        evaluation_system(source_lang, target_lang, has_reference)
    )
}

/// User prompt for the evaluation model
pub fn evaluation_user(
    source_text: &str,
    translated_text: &str,
    source_lang: &str,
    target_lang: &str,
    context: Option<&str>,
    reference: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Source text ({}): {}\n\nMachine translation ({}): {}",
        source_lang, source_text, target_lang, translated_text
    );

    if let Some(reference) = reference {
        prompt.push_str(&format!("\n\nReference translation: {}", reference));
    }

    prompt.push_str(&format!("\n\nContext: {}", context.unwrap_or("none provided")));
    prompt
}
