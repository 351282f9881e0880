//! Per-node analysis context
//!
//! Builds the four-part context for one node: its own plan, code, and
//! run-analysis texts plus the parent's prior finding. A missing parent
//! link, an unknown parent id, or a parent whose analysis is blank after
//! trimming all resolve to the [`NO_PARENT_ANALYSIS`] sentinel, so a
//! broken or partially loaded tree degrades per node instead of failing
//! the run.

use fma_core::{Node, NodeIndex};

/// Sentinel used when no usable parent finding exists
pub const NO_PARENT_ANALYSIS: &str = "No parent node";

/// Cap for run output included in prompts
pub const TERM_OUT_MAX_CHARS: usize = 4000;

const TRUNCATION_INDICATOR: &str = "[output truncated...]";

/// Transient analysis context for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContext {
    /// Plan text
    pub plan: String,
    /// Code text
    pub code: String,
    /// Run-analysis text, middle-truncated to [`TERM_OUT_MAX_CHARS`]
    pub run_analysis: String,
    /// Parent's finding, or [`NO_PARENT_ANALYSIS`]
    pub parent_analysis: String,
}

impl NodeContext {
    /// Render the user prompt with named delimiting sections
    #[must_use]
    pub fn user_prompt(&self) -> String {
        format!(
            "<plan>\n{}\n</plan>\n\n\
             <code>\n{}\n</code>\n\n\
             <run_analysis>\n{}\n</run_analysis>\n\n\
             <parent_analysis>\n{}\n</parent_analysis>\n",
            self.plan, self.code, self.run_analysis, self.parent_analysis
        )
    }
}

/// Build the analysis context for `node` against the whole-tree index
#[must_use]
pub fn build_context(node: &Node, index: &NodeIndex) -> NodeContext {
    let parent_analysis = node
        .parent_id()
        .and_then(|pid| index.get(pid))
        .map(|parent| parent.analysis.trim())
        .filter(|a| !a.is_empty())
        .map_or_else(|| NO_PARENT_ANALYSIS.to_string(), str::to_string);

    NodeContext {
        plan: node.plan.clone(),
        code: node.code.clone(),
        run_analysis: truncate_middle(&node.analysis, TERM_OUT_MAX_CHARS),
        parent_analysis,
    }
}

/// Middle-truncate `text` to at most `max_chars` characters.
///
/// Keeps the head and tail and replaces the middle with an indicator, so
/// both the start of a run log and its final error remain visible.
#[must_use]
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let indicator_len = TRUNCATION_INDICATOR.chars().count();
    if max_chars <= indicator_len {
        return TRUNCATION_INDICATOR.to_string();
    }
    let keep = max_chars - indicator_len;
    let head = keep / 2;
    let tail = keep - head;

    let head_part: String = text.chars().take(head).collect();
    let tail_part: String = text.chars().skip(total - tail).collect();
    format!("{head_part}{TRUNCATION_INDICATOR}{tail_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use fma_core::NodeTree;

    fn index_of(json: &str) -> NodeIndex {
        NodeTree::from_json_str(json).unwrap().index()
    }

    #[test]
    fn context_uses_parent_analysis_unchanged() {
        let index = index_of(
            r#"{"nodes": [
                {"id": "root", "analysis": "  root finding  "},
                {"id": "child", "parent": "root", "plan": "p", "code": "c", "analysis": "a"}
            ]}"#,
        );
        let ctx = build_context(&index["child"], &index);
        assert_eq!(ctx.parent_analysis, "root finding");
        assert_eq!(ctx.plan, "p");
    }

    #[test]
    fn context_sentinel_when_parent_missing() {
        let index = index_of(r#"{"nodes": [{"id": "solo"}]}"#);
        let ctx = build_context(&index["solo"], &index);
        assert_eq!(ctx.parent_analysis, NO_PARENT_ANALYSIS);
    }

    #[test]
    fn context_sentinel_when_parent_unknown() {
        let index = index_of(r#"{"nodes": [{"id": "orphan", "parent": "ghost"}]}"#);
        let ctx = build_context(&index["orphan"], &index);
        assert_eq!(ctx.parent_analysis, NO_PARENT_ANALYSIS);
    }

    #[test]
    fn context_sentinel_when_parent_analysis_blank() {
        let index = index_of(
            r#"{"nodes": [
                {"id": "root", "analysis": "   \n  "},
                {"id": "child", "parent": "root"}
            ]}"#,
        );
        let ctx = build_context(&index["child"], &index);
        assert_eq!(ctx.parent_analysis, NO_PARENT_ANALYSIS);
    }

    #[test]
    fn context_sentinel_when_parent_is_empty_string() {
        let index = index_of(r#"{"nodes": [{"id": "a", "parent": ""}]}"#);
        let ctx = build_context(&index["a"], &index);
        assert_eq!(ctx.parent_analysis, NO_PARENT_ANALYSIS);
    }

    #[test]
    fn user_prompt_has_named_sections() {
        let ctx = NodeContext {
            plan: "the plan".into(),
            code: "the code".into(),
            run_analysis: "the run".into(),
            parent_analysis: NO_PARENT_ANALYSIS.into(),
        };
        let prompt = ctx.user_prompt();
        assert!(prompt.contains("<plan>\nthe plan\n</plan>"));
        assert!(prompt.contains("<code>\nthe code\n</code>"));
        assert!(prompt.contains("<run_analysis>\nthe run\n</run_analysis>"));
        assert!(prompt.contains("<parent_analysis>\nNo parent node\n</parent_analysis>"));
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate_middle("short", 100), "short");
        assert_eq!(truncate_middle("", 100), "");
    }

    #[test]
    fn truncate_long_text_keeps_head_and_tail() {
        let text = "a".repeat(50) + &"b".repeat(50);
        let out = truncate_middle(&text, 60);
        assert_eq!(out.chars().count(), 60);
        assert!(out.starts_with("aaa"));
        assert!(out.ends_with("bbb"));
        assert!(out.contains(TRUNCATION_INDICATOR));
    }

    #[test]
    fn truncate_tiny_cap_is_indicator_only() {
        let out = truncate_middle(&"x".repeat(100), 5);
        assert_eq!(out, TRUNCATION_INDICATOR);
    }
}
