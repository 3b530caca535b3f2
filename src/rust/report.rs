use std::fmt::Write;

use crate::projection::{PipelineResult, WordGroup};

pub const KEYWORDS_TITLE: &str = "高频词汇";
pub const BIGRAMS_TITLE: &str = "二元词";
pub const TRIGRAMS_TITLE: &str = "三元词";
pub const METRICS_TITLE: &str = "测试结果";

/// Words per line inside a category card.
const CARD_COLUMNS: usize = 10;

/// Renders the pipeline result as plain text, section by section.
pub fn render_report(result: &PipelineResult) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "[{}] 共有 {} 个类别", KEYWORDS_TITLE, result.categories.len());
    for group in &result.categories {
        render_card(&mut out, group);
    }

    render_word_set(&mut out, BIGRAMS_TITLE, &result.bigrams);
    render_word_set(&mut out, TRIGRAMS_TITLE, &result.trigrams);

    let _ = writeln!(out, "[{}]", METRICS_TITLE);
    for (label, value) in result.test_metrics.display_rows() {
        let _ = writeln!(out, "  {}: {}", label, value);
    }

    out
}

fn render_card(out: &mut String, group: &WordGroup) {
    let _ = writeln!(out, "  {} ({})", group.name, group.words.len());
    for line in group.words.chunks(CARD_COLUMNS) {
        let _ = writeln!(out, "    {}", line.join("  "));
    }
}

fn render_word_set(out: &mut String, title: &str, words: &[String]) {
    let _ = writeln!(out, "[{}]", title);
    if !words.is_empty() {
        let _ = writeln!(out, "  {}", words.join(" | "));
    }
}
