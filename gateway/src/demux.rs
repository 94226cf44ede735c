//! Stream Demultiplexer (base spec §4.3): the per-token state machine that splits one
//! provider text stream into `content` / `reasoning` / `hot_code` chunks.
//!
//! Implemented as a pure function [`step`] per the base spec's Design Notes ("Pure
//! function `step(state, token) -> (state', [chunk])` is preferred"), with
//! [`Demultiplexer`] as a thin stateful wrapper for callers that just want to feed
//! tokens and collect chunks. Regex constants mirror `REASONING_PATTERN` and
//! `parse_code_interpreter_partial` from the source this spec was distilled from.

use crate::chunk::Chunk;
use once_cell::sync::Lazy;
use regex::Regex;

/// Splits on `<think>` / `</think>`, keeping the delimiters as their own segments.
static REASONING_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(<think>|</think>)").unwrap());

/// Loose, partial-JSON match for the structural beginning of a streamed
/// `{"name":"code_interpreter","arguments":{"code": ...}` call. Accepts single or
/// double quotes; captures whatever code text has arrived so far.
static CODE_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\{\s*['"]name['"]\s*:\s*['"]code_interpreter['"]\s*,\s*['"]arguments['"]\s*:\s*\{\s*['"]code['"]\s*:\s*['"]?(?P<code>.*)"#,
    )
    .unwrap()
});

/// A `code_buf` never grows beyond this many characters before being flushed as a
/// single `hot_code` chunk (base spec §8 boundary property).
const CODE_BUF_FLUSH_THRESHOLD: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemuxPhase {
    Normal,
    Reasoning,
    Code,
}

impl Default for DemuxPhase {
    fn default() -> Self {
        DemuxPhase::Normal
    }
}

/// Per-stream buffers carried across calls to [`step`].
#[derive(Clone, Debug, Default)]
pub struct DemuxState {
    pub phase: DemuxPhase,
    /// Visible assistant text (reasoning and code-interpreter preamble excluded).
    pub assistant_reply: String,
    /// Post-tag text accumulated for function-call parsing (base spec §4.4).
    pub accumulated: String,
    pub reasoning_buf: String,
    pub code_buf: String,
    /// Full code text seen since entering [`DemuxPhase::Code`], independent of
    /// `code_buf`'s line/threshold-based flushing — this is what becomes the
    /// `code_interpreter` call's `code` argument once the stream ends (base spec §4.5
    /// scenario 3).
    pub code_collected: String,
}

/// Feeds provider deltas through the demultiplexer state machine and collects chunks.
pub struct Demultiplexer {
    state: DemuxState,
    stream_reasoning: bool,
}

impl Demultiplexer {
    pub fn new(stream_reasoning: bool) -> Self {
        Self {
            state: DemuxState::default(),
            stream_reasoning,
        }
    }

    pub fn state(&self) -> &DemuxState {
        &self.state
    }

    pub fn into_state(self) -> DemuxState {
        self.state
    }

    /// Feeds `delta.content` through the tag/code-preamble parser.
    pub fn feed(&mut self, token: &str) -> Vec<Chunk> {
        let (next, chunks) = step(std::mem::take(&mut self.state), token, self.stream_reasoning);
        self.state = next;
        chunks
    }

    /// Feeds a provider-native `delta.reasoning_content` field directly, bypassing the
    /// tag parser (base spec §4.3: "Provider-side reasoning fields ... bypass the tag
    /// parser").
    pub fn feed_reasoning_field(&mut self, reasoning_content: &str) -> Vec<Chunk> {
        if reasoning_content.is_empty() {
            return Vec::new();
        }
        self.state.reasoning_buf.push_str(reasoning_content);
        if self.stream_reasoning {
            vec![Chunk::Reasoning(reasoning_content.to_string())]
        } else {
            Vec::new()
        }
    }

    /// Called once the provider stream ends: flushes any residual `code_buf` (stream
    /// end terminates the `CODE` state per base spec §4.3) without the length cap.
    pub fn finish(&mut self) -> Vec<Chunk> {
        if self.state.code_buf.is_empty() {
            return Vec::new();
        }
        let flushed = std::mem::take(&mut self.state.code_buf);
        vec![Chunk::HotCode(flushed)]
    }
}

/// Pure state transition: one provider delta in, next state and emitted chunks out.
pub fn step(mut state: DemuxState, token: &str, stream_reasoning: bool) -> (DemuxState, Vec<Chunk>) {
    let mut chunks = Vec::new();
    if token.is_empty() {
        return (state, chunks);
    }

    if state.phase == DemuxPhase::Code {
        push_code_segment(&mut state, token, &mut chunks);
        return (state, chunks);
    }

    let mut cursor = 0usize;
    let matches: Vec<_> = REASONING_SPLIT.find_iter(token).collect();
    for m in matches {
        if m.start() < cursor {
            continue;
        }
        if m.start() > cursor {
            let seg = &token[cursor..m.start()];
            handle_segment(&mut state, seg, stream_reasoning, &mut chunks);
            if state.phase == DemuxPhase::Code {
                push_code_segment(&mut state, &token[m.start()..], &mut chunks);
                return (state, chunks);
            }
        }
        let delim = m.as_str();
        state.phase = if delim == "<think>" {
            DemuxPhase::Reasoning
        } else {
            DemuxPhase::Normal
        };
        if stream_reasoning {
            state.reasoning_buf.push_str(delim);
            chunks.push(Chunk::Reasoning(delim.to_string()));
        }
        cursor = m.end();
    }
    if cursor < token.len() {
        let seg = &token[cursor..];
        handle_segment(&mut state, seg, stream_reasoning, &mut chunks);
    }
    (state, chunks)
}

fn handle_segment(state: &mut DemuxState, seg: &str, stream_reasoning: bool, chunks: &mut Vec<Chunk>) {
    if seg.is_empty() {
        return;
    }
    match state.phase {
        DemuxPhase::Reasoning => {
            state.reasoning_buf.push_str(seg);
            if stream_reasoning {
                chunks.push(Chunk::Reasoning(seg.to_string()));
            }
        }
        DemuxPhase::Normal => {
            state.assistant_reply.push_str(seg);
            state.accumulated.push_str(seg);
            if let Some(caps) = CODE_PREAMBLE.captures(&state.accumulated) {
                let whole = caps.get(0).unwrap();
                let residual = caps.name("code").map(|m| m.as_str().to_string()).unwrap_or_default();
                let match_start = whole.start();
                state.accumulated.truncate(match_start);
                state.assistant_reply.truncate(match_start);
                state.phase = DemuxPhase::Code;
                chunks.push(Chunk::HotCode("```python\n".to_string()));
                if !residual.is_empty() {
                    push_code_segment(state, &residual, chunks);
                }
            } else {
                chunks.push(Chunk::Content(seg.to_string()));
            }
        }
        DemuxPhase::Code => unreachable!("CODE phase is handled before segment dispatch"),
    }
}

fn push_code_segment(state: &mut DemuxState, seg: &str, chunks: &mut Vec<Chunk>) {
    state.code_buf.push_str(seg);
    state.code_collected.push_str(seg);
    loop {
        if let Some(pos) = state.code_buf.find('\n') {
            let line: String = state.code_buf.drain(..=pos).collect();
            chunks.push(Chunk::HotCode(line));
            continue;
        }
        if state.code_buf.len() > CODE_BUF_FLUSH_THRESHOLD {
            let flushed = std::mem::take(&mut state.code_buf);
            chunks.push(Chunk::HotCode(flushed));
        }
        break;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(chunks: &[Chunk]) -> Vec<String> {
        chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::Content(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_answer_scenario() {
        let mut demux = Demultiplexer::new(false);
        let mut all = Vec::new();
        for tok in ["He", "llo", " wo", "rld"] {
            all.extend(demux.feed(tok));
        }
        assert_eq!(contents(&all), vec!["He", "llo", " wo", "rld"]);
        assert_eq!(demux.state().assistant_reply, "Hello world");
    }

    #[test]
    fn reasoning_then_answer_scenario() {
        let mut demux = Demultiplexer::new(true);
        let chunks = demux.feed("<think>plan</think>Answer");
        let reasoning: Vec<String> = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::Reasoning(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(reasoning, vec!["<think>", "plan", "</think>"]);
        assert_eq!(contents(&chunks), vec!["Answer"]);
        assert_eq!(demux.state().assistant_reply, "Answer");
    }

    #[test]
    fn reasoning_not_streamed_when_disabled() {
        let mut demux = Demultiplexer::new(false);
        let chunks = demux.feed("<think>plan</think>Answer");
        assert!(chunks.iter().all(|c| !matches!(c, Chunk::Reasoning(_))));
        assert_eq!(contents(&chunks), vec!["Answer"]);
    }

    #[test]
    fn code_interpreter_preamble_detected_and_streamed() {
        let mut demux = Demultiplexer::new(false);
        let mut all = Vec::new();
        all.extend(demux.feed(r#"{"name":"code_interpreter","arguments":{"code":"print(1)"#));
        all.extend(demux.feed("\nprint(2)\n"));
        all.extend(demux.finish());
        let hot_code: Vec<String> = all
            .iter()
            .filter_map(|c| match c {
                Chunk::HotCode(s) => Some(s.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            hot_code,
            vec![
                "```python\n".to_string(),
                "print(1)\n".to_string(),
                "print(2)\n".to_string(),
            ]
        );
        assert!(contents(&all).is_empty());

        let state = demux.into_state();
        assert_eq!(state.phase, DemuxPhase::Code);
        assert!(state.assistant_reply.is_empty(), "preamble must not leak into the persisted reply");
        assert_eq!(state.code_collected, "print(1)\nprint(2)\n");
    }

    #[test]
    fn preamble_matched_after_visible_prose_strips_only_the_match() {
        let mut demux = Demultiplexer::new(false);
        demux.feed("Sure, running it now: ");
        demux.feed(r#"{"name":"code_interpreter","arguments":{"code":"1+1"#);
        let state = demux.into_state();
        assert_eq!(state.assistant_reply, "Sure, running it now: ");
        assert_eq!(state.code_collected, "1+1");
    }

    #[test]
    fn code_buf_flushes_past_threshold_without_newline() {
        let mut demux = Demultiplexer::new(false);
        demux.feed(r#"{"name":"code_interpreter","arguments":{"code":"#);
        let long_line = "x".repeat(150);
        let chunks = demux.feed(&long_line);
        let hot_code: Vec<&String> = chunks
            .iter()
            .filter_map(|c| match c {
                Chunk::HotCode(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(hot_code.len(), 1);
        assert_eq!(hot_code[0].len(), 150);
        assert!(hot_code[0].len() > 100);
    }

    #[test]
    fn code_phase_persists_across_tokens_ignoring_think_tags() {
        let mut demux = Demultiplexer::new(true);
        demux.feed(r#"{"name":"code_interpreter","arguments":{"code":"#);
        let chunks = demux.feed("a <think> b\n");
        assert!(chunks.iter().all(|c| !matches!(c, Chunk::Reasoning(_))));
        assert_eq!(demux.state().phase, DemuxPhase::Code);
    }
}
