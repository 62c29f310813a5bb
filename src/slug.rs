//! 查询到文档名的推断
//!
//! 把用户查询规整为文档 slug（小写、非字母数字折叠为下划线），
//! 并在候选文件名里按字符二元组相似度挑最接近的一个。

use regex::Regex;
use std::sync::OnceLock;

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-z0-9]+").expect("valid regex"))
}

/// 文本转 slug：小写后非 [a-z0-9] 连续段折叠为单个下划线
pub fn slugify(text: &str) -> String {
    slug_re()
        .replace_all(&text.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// 从查询推断文档 slug：出现 "proyek" 时取其后的部分，否则整句
pub fn infer_document_slug(query: &str) -> Option<String> {
    let q = query.to_lowercase();
    let relevant = match q.split_once("proyek") {
        Some((_, after)) => after,
        None => q.as_str(),
    };
    let slug = slugify(relevant);
    (!slug.is_empty()).then_some(slug)
}

/// 在候选中选与 query_slug 最相似的一个（Dice 二元组系数，低于 cutoff 返回 None）
pub fn best_match(candidates: &[String], query_slug: &str, cutoff: f64) -> Option<String> {
    candidates
        .iter()
        .map(|c| (bigram_similarity(query_slug, c), c))
        .filter(|(sim, _)| *sim >= cutoff)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.clone())
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = s.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

fn bigram_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (ba, bb) = (bigrams(a), bigrams(b));
    if ba.is_empty() || bb.is_empty() {
        return 0.0;
    }
    let mut pool = bb.clone();
    let mut overlap = 0usize;
    for g in &ba {
        if let Some(pos) = pool.iter().position(|h| h == g) {
            pool.swap_remove(pos);
            overlap += 1;
        }
    }
    2.0 * overlap as f64 / (ba.len() + bb.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Bank Sumsel Babel!"), "bank_sumsel_babel");
        assert_eq!(slugify("  --  "), "");
    }

    #[test]
    fn test_infer_document_slug_takes_tail_after_proyek() {
        assert_eq!(
            infer_document_slug("Analisa proyek Bank Sumsel Babel"),
            Some("bank_sumsel_babel".to_string())
        );
    }

    #[test]
    fn test_infer_document_slug_whole_query() {
        assert_eq!(
            infer_document_slug("Switch Core Implementation"),
            Some("switch_core_implementation".to_string())
        );
        assert_eq!(infer_document_slug("!!!"), None);
    }

    #[test]
    fn test_best_match_picks_closest() {
        let candidates = vec![
            "bank_sumsel_babel".to_string(),
            "switch_core".to_string(),
        ];
        assert_eq!(
            best_match(&candidates, "bank_sumsel", 0.5),
            Some("bank_sumsel_babel".to_string())
        );
        assert_eq!(best_match(&candidates, "zzzz", 0.5), None);
    }
}
