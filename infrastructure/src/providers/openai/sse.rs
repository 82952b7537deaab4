//! Incremental Server-Sent Events decoding
//!
//! Network chunks split lines arbitrarily, so bytes are buffered until a
//! full line is available. Only `data:` fields are surfaced.

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    Json(String),
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every payload completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(data) = parse_line(line.trim_end_matches(['\r', '\n'])) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<SseData> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_line(String::from_utf8_lossy(&rest).trim_end())
    }
}

fn parse_line(line: &str) -> Option<SseData> {
    let data = line.strip_prefix("data:")?.trim_start();
    match data {
        "" => None,
        "[DONE]" => Some(SseData::Done),
        json => Some(SseData::Json(json.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        let out = decoder.push(b"1}\n\ndata: {\"b\":2}\r\n\n");
        assert_eq!(
            out,
            vec![
                SseData::Json("{\"a\":1}".into()),
                SseData::Json("{\"b\":2}".into())
            ]
        );
    }

    #[test]
    fn test_comments_and_done() {
        let mut decoder = SseDecoder::new();
        let out = decoder.push(b": keep-alive\nevent: message\ndata: [DONE]\n\n");
        assert_eq!(out, vec![SseData::Done]);
    }

    #[test]
    fn test_multibyte_split() {
        let mut decoder = SseDecoder::new();
        let text = "data: {\"c\":\"é\"}\n".as_bytes();
        let (head, tail) = text.split_at(text.len() - 4);
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec![SseData::Json("{\"c\":\"é\"}".into())]);
    }

    #[test]
    fn test_finish_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"d\":4}").is_empty());
        assert_eq!(decoder.finish(), Some(SseData::Json("{\"d\":4}".into())));
        assert_eq!(decoder.finish(), None);
    }
}
