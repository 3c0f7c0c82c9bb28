//! 解析上下文
//!
//! 记录当前正在构建的模块链，用于检测循环依赖

use configurator_common::{DependencyError, DependencyResult};

/// 解析上下文
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// 当前解析链，用于检测循环依赖
    resolution_chain: Vec<String>,
}

impl ResolveContext {
    /// 创建新的解析上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加标识到解析链
    pub fn push_identity(&mut self, identity: &str) -> DependencyResult<()> {
        if self.contains(identity) {
            return Err(DependencyError::CircularDependency {
                dependency_chain: format!("{} -> {}", self.resolution_chain.join(" -> "), identity),
            });
        }
        self.resolution_chain.push(identity.to_string());
        Ok(())
    }

    /// 从解析链中移除最后一个标识
    pub fn pop_identity(&mut self) -> Option<String> {
        self.resolution_chain.pop()
    }

    /// 标识是否在解析链中
    pub fn contains(&self, identity: &str) -> bool {
        self.resolution_chain.iter().any(|i| i == identity)
    }

    /// 当前解析深度
    pub fn depth(&self) -> usize {
        self.resolution_chain.len()
    }

    /// 当前解析链
    pub fn chain(&self) -> &[String] {
        &self.resolution_chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_detection() {
        let mut ctx = ResolveContext::new();
        ctx.push_identity("a").unwrap();
        ctx.push_identity("b").unwrap();

        let err = ctx.push_identity("a").unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(ctx.depth(), 2);

        assert_eq!(ctx.pop_identity().as_deref(), Some("b"));
        ctx.push_identity("c").unwrap();
        assert_eq!(ctx.chain(), ["a".to_string(), "c".to_string()]);
    }
}
