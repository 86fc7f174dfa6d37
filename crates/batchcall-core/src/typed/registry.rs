//! FunctionRegistry - RemoteFn の登録と名前解決
//!
//! 呼び出し側とワーカー側は同じ registry を組み立てます
//! （通常は同じバイナリなので自動的に一致する）。
//!
//! # 学習ポイント
//! - HashMap での型消去された trait object の管理
//! - Generic methods での登録と型安全性
//! - Arc による共有所有権

use super::function::RemoteFn;
use super::handler::{DynFunction, TypedFunction};
use std::collections::HashMap;
use std::sync::Arc;

/// # 使用例
/// ```ignore
/// let mut registry = FunctionRegistry::new();
/// registry.register(Add)?;
///
/// let f = registry.get("add").unwrap();
/// ```
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn DynFunction>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("function '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register<F: RemoteFn>(&mut self, function: F) -> Result<(), RegistryError> {
        let name = F::NAME.to_string();
        if self.functions.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.functions
            .insert(name, Arc::new(TypedFunction::new(function)));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::handler::fixtures::{Add, Fail};

    #[test]
    fn test_register_and_get() {
        let mut registry = FunctionRegistry::new();
        registry.register(Add).unwrap();

        let retrieved = registry.get("add");
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "add");
        assert!(registry.get("sub").is_none());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = FunctionRegistry::new();
        registry.register(Add).unwrap();
        let result = registry.register(Add);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "add"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = FunctionRegistry::new();
        registry.register(Fail).unwrap();
        registry.register(Add).unwrap();
        assert_eq!(registry.names(), vec!["add".to_string(), "fail".to_string()]);
        assert!(registry.contains("fail"));
    }
}
