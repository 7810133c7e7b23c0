//! Instruction prefix and failure markers for chunk summarisation.
//!
//! Every string a reader of the summary can see, besides the backend's own
//! output, lives here: the prefix sent ahead of each chunk and the markers
//! that stand in for chunks the backend could not summarise. Callers can
//! override the prefix via [`crate::config::DigestConfig::instruction`].

/// Default instruction placed in front of every chunk.
pub const DEFAULT_INSTRUCTION: &str = "Summarize this scientific paper:\n\n";

/// Build the request payload for one chunk.
pub fn build_prompt(instruction: &str, chunk: &str) -> String {
    let mut prompt = String::with_capacity(instruction.len() + chunk.len());
    prompt.push_str(instruction);
    prompt.push_str(chunk);
    prompt
}

/// Marker for a chunk whose backend call exceeded the timeout.
///
/// Chunk numbers in markers are 1-based, as a reader would count them.
pub fn timeout_marker(index: usize) -> String {
    format!("[Error: summarization timed out on chunk {}]", index + 1)
}

/// Marker for a chunk whose backend call failed in transport.
pub fn transport_marker(index: usize, detail: &str) -> String {
    format!(
        "[Error: summarization request failed on chunk {}: {}]",
        index + 1,
        detail
    )
}

/// Marker for a chunk whose backend reply had no `response` field.
pub fn no_response_marker(index: usize) -> String {
    format!("[Error: no response for chunk {}]", index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_prefix_then_chunk() {
        assert_eq!(
            build_prompt(DEFAULT_INSTRUCTION, "body"),
            "Summarize this scientific paper:\n\nbody"
        );
    }

    #[test]
    fn markers_name_the_chunk() {
        assert!(timeout_marker(0).contains("chunk 1"));
        assert!(transport_marker(4, "refused").contains("chunk 5: refused"));
        assert!(no_response_marker(2).contains("no response"));
    }
}
