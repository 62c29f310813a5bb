//! Prompt 加载
//!
//! 优先读 <base_path>/<name>.txt（名字自动去路径与扩展名），
//! 文件不存在时退回内置 prompt；内容语言随业务域（印尼语）。

use std::path::{Path, PathBuf};

/// KAK/TOR 分析流水线的 prompt 名（也作为 payload 工具的缺省 instruction 名）
pub const KAK_ANALYZER: &str = "kak_analyzer";
/// 提案生成流水线的 prompt 名
pub const DOCUMENT_GENERATOR: &str = "document_generator";
/// 通用问答的 prompt 名
pub const GENERIC_CHAT: &str = "generic_chat";

const KAK_ANALYZER_FALLBACK: &str = "Anda adalah \"ProjectWise\", asisten virtual untuk tim Presales & Project Manager. \
Tugas Anda adalah menganalisis dokumen KAK/TOR tender dan merangkum poin-poin \
penting ke dalam format JSON terstruktur. Ikuti prosedur di bawah TANPA \
menyimpang, dan gunakan SELALU bahasa Indonesia.";

const DOCUMENT_GENERATOR_FALLBACK: &str = "Anda adalah \"ProjectWise\", asisten virtual untuk tim Presales & \
Project Manager. Tugas Anda adalah generate document docx berdasarkan \
proposal template yang sudah ada dan merangkum isi context sesuai \
dengan context proyek yang diberikan. Ikuti DOCUMENT_GENERATOR_WORKFLOW.";

const GENERIC_CHAT_FALLBACK: &str = "Anda adalah ProjectWise, asisten AI untuk presales dan project manager.\n\
Jawab berdasarkan konteks user dan memori historis.";

/// Prompt 库：可选覆盖目录 + 内置回退
pub struct PromptLibrary {
    base_path: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn new(base_path: Option<PathBuf>) -> Self {
        Self { base_path }
    }

    /// 取 prompt：覆盖目录、config/prompts、../config/prompts 依序查找，都没有则用内置
    pub fn get(&self, name: &str) -> String {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        let file = format!("{stem}.txt");

        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(base) = &self.base_path {
            candidates.push(base.join(&file));
        }
        candidates.push(PathBuf::from("config/prompts").join(&file));
        candidates.push(PathBuf::from("../config/prompts").join(&file));

        candidates
            .into_iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| builtin(stem).to_string())
    }
}

fn builtin(stem: &str) -> &'static str {
    match stem {
        KAK_ANALYZER => KAK_ANALYZER_FALLBACK,
        DOCUMENT_GENERATOR => DOCUMENT_GENERATOR_FALLBACK,
        _ => GENERIC_CHAT_FALLBACK,
    }
}
