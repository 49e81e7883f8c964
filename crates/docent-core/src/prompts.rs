//! Fixed model instructions and user-facing advisory texts.

/// Rewrites a follow-up question into a standalone retrieval query.
pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can be \
understood without the chat history. Do NOT answer the question, just reformulate it if needed \
and otherwise return it as is. Keep the question in the same language it was asked in.";

/// Grounded answering instruction. `{product}` is filled from
/// configuration; `{context}` receives the retrieved documents.
pub const QA_SYSTEM_PROMPT_TEMPLATE: &str = "You are an expert assistant for {product}. \
Answer the user's question using only the documentation excerpts below.

Rules:
- If the question is not related to {product}, say politely that you can only help with {product}.
- Be concise and direct.
- Cite 2-3 of the most relevant documentation links from the excerpts, using their URL lines.
- Answer in the same language as the question.
- Put code in fenced Markdown blocks with a language tag, and use inline code for identifiers, \
file names and options.
- If the excerpts do not contain the answer, say so instead of guessing.

Documentation excerpts:
{context}";

pub const DUPLICATE_QUESTION_MESSAGE: &str = "It looks like you already asked this question \
in this conversation. Please refer to the previous answer above, or rephrase your question \
with more detail if it did not help.";

pub const EMPTY_KNOWLEDGE_BASE_MESSAGE: &str = "The knowledge base appears to be empty, so I \
cannot answer questions yet. Please try again later.";

pub const LOW_CONFIDENCE_MESSAGE: &str = "I'm sorry, I cannot provide a confident answer to \
this question based on the available documentation. Please try rephrasing it or consult the \
documentation directly.";

/// The QA instruction specialised for one product name.
pub fn qa_system_prompt(product: &str) -> String {
    QA_SYSTEM_PROMPT_TEMPLATE.replace("{product}", product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CONTEXT_PLACEHOLDER;

    #[test]
    fn qa_prompt_keeps_context_slot() {
        let prompt = qa_system_prompt("ApostropheCMS");
        assert!(prompt.starts_with("You are an expert assistant for ApostropheCMS."));
        assert!(!prompt.contains("{product}"));
        assert!(prompt.contains(CONTEXT_PLACEHOLDER));
    }
}
