// `Link` header parsing
//
// Resources advertise their push hub as `Link: <https://hub/...>; rel="mercure"`.
// A header may carry several comma-separated links and the relation value
// may be quoted or bare, or list several space-separated relation types.

use url::Url;

/// Relation type that marks the push hub.
pub const HUB_REL: &str = "mercure";

/// Find the first link whose `rel` includes `mercure`.
///
/// Returns `None` for a missing, malformed or unrelated header; callers
/// degrade to "no real-time updates" rather than failing.
pub fn find_hub_link(header: &str) -> Option<Url> {
    split_links(header).find_map(|link| {
        let (target, params) = parse_link(link)?;
        let is_hub = params
            .split(';')
            .filter_map(|param| param.split_once('='))
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case("rel"))
            .any(|(_, value)| {
                value
                    .trim()
                    .trim_matches('"')
                    .split_ascii_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case(HUB_REL))
            });
        if is_hub { Url::parse(target).ok() } else { None }
    })
}

/// Split on commas that are outside `<...>`.
fn split_links(header: &str) -> impl Iterator<Item = &str> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut parts = Vec::new();
    for (i, c) in header.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&header[start..]);
    parts.into_iter()
}

/// `<target>; params` → `(target, params)`.
fn parse_link(link: &str) -> Option<(&str, &str)> {
    let link = link.trim();
    let rest = link.strip_prefix('<')?;
    let (target, params) = rest.split_once('>')?;
    Some((target.trim(), params))
}
