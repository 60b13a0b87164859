//! SDP rewriting

use std::collections::HashSet;

/// Remove codecs from an SDP by name
///
/// Payload types whose `a=rtpmap` codec name matches one of `codecs`
/// (case insensitive) are dropped from the `m=` line of their media
/// section, along with their `a=rtpmap`, `a=fmtp` and `a=rtcp-fb`
/// attributes. Payload types are scoped to their section, so a number
/// reused by another section is left alone there. An empty codec list
/// returns the SDP unchanged.
#[must_use]
pub fn strip_codecs(sdp: &str, codecs: &[String]) -> String {
    if codecs.is_empty() {
        return sdp.to_string();
    }
    let wanted: HashSet<String> = codecs.iter().map(|c| c.to_ascii_lowercase()).collect();

    let sections: Vec<(Vec<&str>, HashSet<&str>)> = media_sections(sdp)
        .into_iter()
        .map(|lines| {
            let removed = lines
                .iter()
                .copied()
                .filter_map(rtpmap)
                .filter(|(_, name)| wanted.contains(&name.to_ascii_lowercase()))
                .map(|(pt, _)| pt)
                .collect();
            (lines, removed)
        })
        .collect();

    let total: usize = sections.iter().map(|(_, removed)| removed.len()).sum();
    if total == 0 {
        return sdp.to_string();
    }
    tracing::debug!(codecs = ?codecs, payload_types = total, "Stripping codecs from SDP");

    let mut out = String::with_capacity(sdp.len());
    for (lines, removed) in &sections {
        for line in lines {
            if line.starts_with("m=") {
                out.push_str(&strip_media_line(line, removed));
            } else if attribute_payload(line).is_some_and(|pt| removed.contains(pt)) {
                continue;
            } else {
                out.push_str(line);
            }
            out.push_str("\r\n");
        }
    }
    out
}

/// Session header followed by one group per `m=` section
fn media_sections(sdp: &str) -> Vec<Vec<&str>> {
    let mut sections = Vec::new();
    let mut current = Vec::new();
    for line in sdp.lines() {
        if line.starts_with("m=") && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    sections.push(current);
    sections
}

/// `a=rtpmap:<pt> <name>/<clock>` split into payload type and codec name
fn rtpmap(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("a=rtpmap:")?;
    let (pt, encoding) = rest.split_once(' ')?;
    let name = encoding.split('/').next()?;
    Some((pt, name))
}

/// Payload type of an `a=rtpmap`, `a=fmtp` or `a=rtcp-fb` line
fn attribute_payload(line: &str) -> Option<&str> {
    let rest = ["a=rtpmap:", "a=fmtp:", "a=rtcp-fb:"]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))?;
    rest.split(' ').next()
}

/// `m=<media> <port> <proto> <fmt> ...` without the removed formats
fn strip_media_line(line: &str, removed: &HashSet<&str>) -> String {
    let mut parts = line.split(' ');
    let head: Vec<&str> = parts.by_ref().take(3).collect();
    let formats: Vec<&str> = parts.filter(|pt| !removed.contains(pt)).collect();
    head.into_iter()
        .chain(formats)
        .collect::<Vec<_>>()
        .join(" ")
}
