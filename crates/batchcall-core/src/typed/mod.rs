//! Typed - 名前付き関数 API
//!
//! このモジュールは関数名の typo を型で排除し、
//! 呼び出し側とワーカー側の対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `RemoteFn` trait - 型安全
//! - **内部（Dyn）**: `DynFunction` trait - object-safe, type erasure

pub mod codec;
pub mod function;
pub mod handler;
pub mod registry;

pub use self::function::{CallArgs, RemoteError, RemoteFn};
pub use self::handler::{DynFunction, TypedFunction};
pub use self::registry::{FunctionRegistry, RegistryError};
