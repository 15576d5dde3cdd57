use crate::vector::ScoredEntry;

pub const PASTED_TEXT_LABEL: &str = "Additional Text Content:";

/// Retrieved payloads in retrieval order, separated by blank lines, followed
/// by the pasted text under its own label.
pub fn assemble_context(retrieved: &[ScoredEntry], pasted: Option<&str>) -> String {
    let mut context = retrieved
        .iter()
        .map(|hit| hit.payload.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if let Some(text) = pasted.filter(|t| !t.trim().is_empty()) {
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(PASTED_TEXT_LABEL);
        context.push('\n');
        context.push_str(text);
    }

    context
}

pub fn system_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant who helps answer user queries based on the provided context. \
         Only answer based on the available context from the uploaded document or text. \
         If the answer cannot be found in the context, politely say so.\n\n\
         Context:\n{context}"
    )
}
