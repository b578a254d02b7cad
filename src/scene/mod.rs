mod parser;

pub use parser::parse_script;

/// 表示一个场景/分镜
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    /// 1-based position in the generated script, independent of the model's own numbering
    pub index: usize,
    /// Short description of what happens in the scene
    pub description: String,
}

impl Scene {
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
        }
    }
}

/// The overall idea and its scenes, in the order the model wrote them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub idea: String,
    pub scenes: Vec<Scene>,
}
