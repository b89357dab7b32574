use crate::utils::error::ClassifyError;
use crate::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 模型元数据，与 TF.js 导出的 userDefinedMetadata 字段名保持一致
#[derive(Debug, Deserialize)]
struct ModelMetadata {
    #[serde(rename = "classNames")]
    class_names: Vec<String>,
}

/// 按输出位置索引的类别名称
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// 优先读取 metadata.json，不存在时回退到 labels.txt
    pub fn load(metadata_path: &Path, labels_path: &Path) -> Result<Self> {
        if metadata_path.exists() {
            tracing::info!("Loading class names from: {}", metadata_path.display());
            let content = fs::read_to_string(metadata_path)?;
            return Self::from_metadata_json(&content);
        }

        if labels_path.exists() {
            tracing::info!("Loading class names from: {}", labels_path.display());
            let content = fs::read_to_string(labels_path)?;
            return Ok(Self::from_lines(&content));
        }

        Err(ClassifyError::ModelLoad(format!(
            "No class names found, expected {} or {}",
            metadata_path.display(),
            labels_path.display()
        )))
    }

    pub fn from_metadata_json(content: &str) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_str(content)?;
        if metadata.class_names.is_empty() {
            return Err(ClassifyError::ModelLoad("classNames is empty".to_string()));
        }
        Ok(Self::new(metadata.class_names))
    }

    /// 每行一个标签，行号即类别下标，空行保留为空标签以免错位
    pub fn from_lines(content: &str) -> Self {
        let names = content
            .lines()
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>();
        Self::new(names)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    /// 缺失的下标渲染为 class_<index>
    pub fn label_for(&self, index: usize) -> String {
        self.get(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class_{}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_json() {
        let labels =
            ClassLabels::from_metadata_json(r#"{"classNames": ["background", "tench", "goldfish"]}"#)
                .unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.label_for(1), "tench");
    }

    #[test]
    fn test_metadata_json_without_names() {
        assert!(ClassLabels::from_metadata_json(r#"{"classNames": []}"#).is_err());
        assert!(ClassLabels::from_metadata_json(r#"{"labels": ["a"]}"#).is_err());
    }

    #[test]
    fn test_lines_keep_positions() {
        let labels = ClassLabels::from_lines("cat\n\ndog\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.label_for(0), "cat");
        assert_eq!(labels.label_for(1), "class_1");
        assert_eq!(labels.label_for(2), "dog");
    }

    #[test]
    fn test_missing_index() {
        let labels = ClassLabels::new(vec!["a".to_string()]);
        assert_eq!(labels.label_for(5), "class_5");
    }

    #[test]
    fn test_load_missing_files() {
        let dir = std::env::temp_dir().join(format!("labels-{}", uuid::Uuid::new_v4()));
        let result = ClassLabels::load(&dir.join("metadata.json"), &dir.join("labels.txt"));
        assert!(matches!(result, Err(ClassifyError::ModelLoad(_))));
    }

    #[test]
    fn test_load_prefers_metadata() {
        let dir = std::env::temp_dir().join(format!("labels-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), r#"{"classNames": ["from-json"]}"#).unwrap();
        fs::write(dir.join("labels.txt"), "from-txt\n").unwrap();

        let labels = ClassLabels::load(&dir.join("metadata.json"), &dir.join("labels.txt")).unwrap();
        assert_eq!(labels.label_for(0), "from-json");

        fs::remove_dir_all(&dir).unwrap();
    }
}
