//! LLM 客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockChatClient;
pub use openai::OpenAiChatClient;
pub use traits::{AssistantTurn, ChatClient, ToolChoice};

/// 从 LLM 文本输出中提取 JSON 对象（```json 围栏或首个 { 到末个 }）
pub fn extract_json_object(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(inner.trim());
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json_object(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_fenced_object() {
        let text = "berikut konteksnya:\n```json\n{\"a\":1}\n```";
        assert_eq!(extract_json_object(text), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_embedded_object() {
        assert_eq!(extract_json_object("hasil: {\"a\":1} selesai"), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_extract_none_for_plain_text() {
        assert_eq!(extract_json_object("tidak ada json"), None);
    }
}
