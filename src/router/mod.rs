//! # Router Module
//!
//! Path matching for the engine. Each HTTP method owns one [`Tree`], a
//! compressed prefix tree whose edges hold static path text and whose nodes
//! may carry a single parameter (`:name`) or catch-all (`*name`) child.
//!
//! ## Matching rules
//!
//! - Static text must match byte for byte.
//! - `:name` matches one non-empty path segment (up to the next `/`).
//! - `*name` matches the remainder of the path and must end the pattern.
//! - Static children are tried before the wildcard child; the first descent
//!   that reaches a handler wins.
//!
//! When nothing matches, the lookup reports whether adding or removing a
//! trailing slash would have matched, and [`Tree::find_case_insensitive_path`]
//! can recover a canonical spelling. The engine turns both into redirects.
//!
//! ## Example
//!
//! ```rust
//! use whisk::router::Tree;
//!
//! let mut tree = Tree::new();
//! tree.add_route("/users/:id", "user").unwrap();
//! tree.add_route("/files/*path", "files").unwrap();
//!
//! let hit = tree.get_value("/users/42");
//! assert_eq!(hit.value, Some(&"user"));
//! assert_eq!(hit.params.by_name("id"), Some("42"));
//!
//! let hit = tree.get_value("/files/css/site.css");
//! assert_eq!(hit.params.by_name("path"), Some("/css/site.css"));
//!
//! assert!(tree.get_value("/users/42/").tsr);
//! ```

mod params;
mod path;
mod tree;

pub use params::{Param, Params};
pub use path::clean_path;
pub use tree::{Lookup, Tree};
