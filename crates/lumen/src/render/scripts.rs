// Inline scripts that carry the codec shell and resume chunks into the document.

use crate::codec::escape_for_script;

pub const DATA_SCRIPT_ID: &str = "__lumen_data";

// Registers `__lumen_resume(id)`, returning a writer that buffers chunks
// until the client codec attaches to it.
const RUNTIME: &str = "(function(w){var r=w.__lumen_writers||(w.__lumen_writers={});\
w.__lumen_resume=function(id){return r[id]||(r[id]={chunks:[],closed:false,\
write:function(c){this.chunks.push(c);this.onchunk&&this.onchunk(c)},\
close:function(){this.closed=true;this.onclose&&this.onclose()}})}})(window);";

/// Shell data block, plus the writer runtime when chunks will follow.
pub fn bootstrap_script(shell: &str, writer_id: u64, has_resume: bool) -> String {
    let mut out = format!(
        r#"<script id="{DATA_SCRIPT_ID}" type="application/json" data-writer="{writer_id}">{}</script>"#,
        escape_for_script(shell)
    );
    if has_resume {
        out.push_str("<script>");
        out.push_str(RUNTIME);
        out.push_str("</script>");
    }
    out
}

/// Writes one resume chunk and removes its own tag.
pub fn chunk_script(writer_id: u64, chunk: &str) -> String {
    let literal = serde_json::to_string(chunk).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "<script>__lumen_resume({writer_id}).write({});document.currentScript.remove();</script>",
        escape_for_script(&literal)
    )
}

/// Closes the writer after the last chunk.
pub fn close_script(writer_id: u64) -> String {
    format!("<script>__lumen_resume({writer_id}).close();document.currentScript.remove();</script>")
}

/// Pulls the embedded shell back out of a rendered document.
pub fn embedded_shell(html: &str) -> Option<String> {
    let open = format!(r#"<script id="{DATA_SCRIPT_ID}""#);
    let start = html.find(&open)?;
    let body_start = start + html[start..].find('>')? + 1;
    let body_len = html[body_start..].find("</script>")?;
    Some(html[body_start..body_start + body_len].to_string())
}

/// Writer id the bootstrap script announced.
pub fn embedded_writer(html: &str) -> Option<u64> {
    let open = format!(r#"<script id="{DATA_SCRIPT_ID}""#);
    let start = html.find(&open)?;
    let tag_end = start + html[start..].find('>')?;
    let attr = "data-writer=\"";
    let value_start = start + html[start..tag_end].find(attr)? + attr.len();
    let value_len = html[value_start..tag_end].find('"')?;
    html[value_start..value_start + value_len].parse().ok()
}

/// The chunks written by `chunk_script` for `writer_id`, in document order.
pub fn embedded_chunks(html: &str, writer_id: u64) -> Vec<String> {
    let prefix = format!("__lumen_resume({writer_id}).write(");
    html.match_indices(&prefix)
        .filter_map(|(idx, _)| {
            let rest = &html[idx + prefix.len()..];
            let end = rest.find(");document.currentScript")?;
            serde_json::from_str(&rest[..end]).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_round_trips_through_the_document() {
        let shell = r#"{"t":"j","v":"</script>"}"#;
        let html = format!("<body>{}</body>", bootstrap_script(shell, 4, false));
        let embedded = embedded_shell(&html).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&embedded).unwrap();
        assert_eq!(parsed["v"], "</script>");
        assert!(!html.contains("__lumen_resume"));
        assert_eq!(embedded_writer(&html), Some(4));
    }

    #[test]
    fn chunk_scripts_are_recoverable_and_self_removing() {
        let html = format!(
            "{}{}{}",
            chunk_script(9, r#"{"id":0,"ok":{"t":"j","v":"<b>"}}"#),
            chunk_script(8, "other writer"),
            close_script(9)
        );
        assert!(html.contains("document.currentScript.remove()"));
        assert_eq!(
            embedded_chunks(&html, 9),
            vec![r#"{"id":0,"ok":{"t":"j","v":"<b>"}}"#.to_string()]
        );
    }
}
