//! Response body decoding for OpenAI-compatible chat completions.
//!
//! Streaming responses are read as a byte stream, split on SSE boundaries
//! (`data: …\n\n`), and each chunk's `delta.content` is yielded as a token.
//! Non-streaming responses are decoded from the full JSON body.

use futures::stream::{self, Stream, StreamExt};

use super::errors::InferenceError;
use super::types::{ChatCompletionChunk, ChatCompletionResponse};

// ─── SSE line parser ─────────────────────────────────────────────────────────

/// Turn an SSE byte stream into a stream of text tokens.
///
/// Generic over the byte source so the event framing can be exercised
/// without an HTTP response.
pub fn parse_sse_stream<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<String, InferenceError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        |(mut byte_stream, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                // Complete SSE event already buffered? Decode only whole
                // events; a chunk may end mid-character.
                if let Some(event_end) = find_event_end(&buffer) {
                    let event = String::from_utf8_lossy(&buffer[..event_end]).into_owned();
                    buffer.drain(..event_end + 2);

                    match process_event(&event) {
                        Ok(EventOutcome::Token(token)) => {
                            return Some((Ok(token), (byte_stream, buffer, done)))
                        }
                        Ok(EventOutcome::Skip) => continue,
                        Ok(EventOutcome::Done) => {
                            done = true;
                            continue;
                        }
                        Err(e) => return Some((Err(e), (byte_stream, buffer, done))),
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, buffer, true),
                        ));
                    }
                    None => {
                        // Stream ended without a trailing blank line
                        let rest = String::from_utf8_lossy(&std::mem::take(&mut buffer)).into_owned();
                        if rest.trim().is_empty() {
                            return None;
                        }
                        return match process_event(rest.trim()) {
                            Ok(EventOutcome::Token(token)) => {
                                Some((Ok(token), (byte_stream, buffer, true)))
                            }
                            Ok(_) => None,
                            Err(e) => Some((Err(e), (byte_stream, buffer, true))),
                        };
                    }
                }
            }
        },
    )
}

/// Offset of the first `\n\n` event boundary in `buffer`.
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Drain a token stream into the full completion text.
pub async fn collect_stream_text<S>(stream: S) -> Result<String, InferenceError>
where
    S: Stream<Item = Result<String, InferenceError>>,
{
    futures::pin_mut!(stream);
    let mut text = String::new();
    while let Some(token) = stream.next().await {
        text.push_str(&token?);
    }
    Ok(text)
}

enum EventOutcome {
    Token(String),
    Skip,
    Done,
}

/// Process a single SSE event string (may contain multiple `data:` lines).
fn process_event(event: &str) -> Result<EventOutcome, InferenceError> {
    let mut data_content = String::new();

    for line in event.lines() {
        if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
            let data = data.trim();
            if data == "[DONE]" {
                return Ok(EventOutcome::Done);
            }
            data_content.push_str(data);
        }
        // Non-data lines are comments or event names
    }

    if data_content.is_empty() {
        return Ok(EventOutcome::Skip);
    }

    let chunk: ChatCompletionChunk =
        serde_json::from_str(&data_content).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse SSE chunk: {e} (data: {data_content})"),
        })?;

    // Use only `content`; reasoning tokens are discarded.
    match chunk.choices.first().and_then(|c| c.delta.content.clone()) {
        Some(content) if !content.is_empty() => Ok(EventOutcome::Token(content)),
        _ => Ok(EventOutcome::Skip),
    }
}

// ─── Non-streaming ───────────────────────────────────────────────────────────

/// Decode a non-streaming response body into the completion text.
///
/// Empty or missing `content` becomes an empty string; the pipeline decides
/// whether an empty completion is a failure for its stage.
pub fn parse_non_streaming_response(body: &str) -> Result<String, InferenceError> {
    let resp: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse non-streaming response: {e}"),
        })?;

    let choice = resp.choices.first().ok_or(InferenceError::StreamError {
        reason: "empty choices array".into(),
    })?;

    if choice.finish_reason.as_deref() == Some("length") {
        tracing::debug!("completion truncated by max_tokens");
    }

    Ok(choice.message.content.clone().unwrap_or_default())
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Unpin {
        stream::iter(parts.into_iter().map(|p| Ok(p.as_bytes().to_vec())))
    }

    #[test]
    fn test_parse_non_streaming_with_content() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "Hello, world!"},
                "finish_reason": "stop"
            }]
        }"#;
        assert_eq!(parse_non_streaming_response(body).unwrap(), "Hello, world!");
    }

    #[test]
    fn test_parse_non_streaming_empty_choices() {
        let body = r#"{"choices": []}"#;
        assert!(parse_non_streaming_response(body).is_err());
    }

    #[test]
    fn test_parse_non_streaming_reasoning_model_uses_content() {
        let body = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "{\"plan\":[]}",
                    "reasoning": "Let me think about this task..."
                },
                "finish_reason": "stop"
            }]
        }"#;
        assert_eq!(parse_non_streaming_response(body).unwrap(), "{\"plan\":[]}");
    }

    #[test]
    fn test_parse_non_streaming_null_content_is_empty() {
        let body = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": null, "reasoning": "thinking"},
                "finish_reason": "length"
            }]
        }"#;
        assert_eq!(parse_non_streaming_response(body).unwrap(), "");
    }

    #[tokio::test]
    async fn test_sse_tokens_concatenate() {
        let parts = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "\n: keep-alive\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let text = collect_stream_text(parse_sse_stream(byte_stream(parts)))
            .await
            .unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_sse_reasoning_tokens_dropped() {
        let parts = vec![
            "data: {\"choices\":[{\"delta\":{\"reasoning\":\"hmm\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let text = collect_stream_text(parse_sse_stream(byte_stream(parts)))
            .await
            .unwrap();
        assert_eq!(text, "Hi");
    }

    #[tokio::test]
    async fn test_sse_trailing_event_without_blank_line() {
        let parts = vec!["data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}"];
        let text = collect_stream_text(parse_sse_stream(byte_stream(parts)))
            .await
            .unwrap();
        assert_eq!(text, "tail");
    }

    #[tokio::test]
    async fn test_sse_multibyte_char_split_across_chunks() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\n".as_bytes();
        // Split between the two bytes of 'é'.
        let split = event.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(event[..split].to_vec()),
            Ok(event[split..].to_vec()),
            Ok(b"data: [DONE]\n\n".to_vec()),
        ];
        let text = collect_stream_text(parse_sse_stream(stream::iter(parts)))
            .await
            .unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn test_find_event_end() {
        assert_eq!(find_event_end(b"data: x\n\nrest"), Some(7));
        assert_eq!(find_event_end(b"data: x\n"), None);
    }

    #[tokio::test]
    async fn test_sse_malformed_chunk_errors() {
        let parts = vec!["data: {not json}\n\n"];
        let result = collect_stream_text(parse_sse_stream(byte_stream(parts))).await;
        assert!(matches!(result, Err(InferenceError::StreamError { .. })));
    }
}
