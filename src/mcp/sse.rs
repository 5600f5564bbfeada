//! Minimal `text/event-stream` decoding for streamable HTTP responses.
//!
//! Only `data:` fields matter here. Each blank-line-delimited event becomes
//! one payload string with its data lines joined by `\n`.

/// Split an SSE body into the data payload of each event.
pub fn decode_events(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in body.split('\n') {
        let line = line.trim_end_matches('\r');

        if line.is_empty() {
            if !data_lines.is_empty() {
                events.push(data_lines.join("\n"));
                data_lines.clear();
            }
            continue;
        }

        // Comments (keep-alives) and non-data fields are ignored.
        if line.starts_with(':') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if !data_lines.is_empty() {
        events.push(data_lines.join("\n"));
    }

    events
}
