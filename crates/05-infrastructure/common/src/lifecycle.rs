//! 作用域与生命周期

use serde::Serialize;

/// 模块作用域
///
/// 每个作用域拥有自己构建的模块，释放时只销毁这些模块。
#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub id: uuid::Uuid,
    pub name: String,
    pub parent: Option<uuid::Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Scope {
    /// 创建新作用域
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            parent: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// 创建根作用域
    pub fn root() -> Self {
        Self::new("root")
    }

    /// 创建子作用域
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            parent: Some(self.id),
            ..Self::new(format!("{}.{}", self.name, name.into()))
        }
    }

    /// 是否为根作用域
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_scope_links_parent() {
        let root = Scope::root();
        let child = root.child("plugins");

        assert!(root.is_root());
        assert_eq!(child.parent, Some(root.id));
        assert_eq!(child.name, "root.plugins");
        assert_ne!(child.id, root.id);
    }
}
