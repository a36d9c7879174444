//! Compile-time call forwarding.
//!
//! `forward_to_current!` implements a trait for a handle type by calling
//! the same method on whatever instance the handle currently holds. Each
//! call reads the current instance afresh, so callers keeping the handle
//! always reach the newest published instance.
//!
//! ```
//! use reloader::forward_to_current;
//! use reloader::ServiceHandle;
//!
//! pub trait Greeter {
//!     fn greet(&self, name: &str) -> String;
//!     fn reset(&self);
//! }
//!
//! pub struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self, name: &str) -> String {
//!         format!("hello {name}")
//!     }
//!     fn reset(&self) {}
//! }
//!
//! forward_to_current! {
//!     impl Greeter for ServiceHandle<English> {
//!         fn greet(&self, name: &str) -> String;
//!         fn reset(&self);
//!     }
//! }
//! ```
//!
//! Any type with a `current_instance()` method returning a smart pointer to
//! an implementor can be the forwarding side.

#[macro_export]
macro_rules! forward_to_current {
    (
        impl $trait:ident for $handle:ty {
            $(
                fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
            )*
        }
    ) => {
        impl $trait for $handle {
            $(
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                    $trait::$method(&*self.current_instance() $(, $arg)*)
                }
            )*
        }
    };
}
