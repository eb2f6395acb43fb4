//! # 设置错误模型
//!
//! 解析失败与校验失败分开表达：前者说明文件本身损坏，后者说明内容越界。
//! 两者在加载阶段都会触发"备份 + 回退默认值"，在保存阶段则直接拒绝写入。

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("设置文件解析失败：{0}")]
    Parse(String),

    #[error("设置校验失败：{0}")]
    Invalid(String),

    #[error("设置序列化失败：{0}")]
    Serialize(String),

    #[error("设置文件读写失败：{0}")]
    Io(#[from] std::io::Error),
}

impl SettingsError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
