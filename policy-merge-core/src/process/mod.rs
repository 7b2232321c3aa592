//! Process-execution trees.
//!
//! A process policy is a forest of [`ProcessNode`]s owned by a
//! [`ProcessNodeList`]. Merging two lists folds matching nodes together and
//! grafts the rest, recording on every incoming node the id it ended up as
//! so network rules that reference it can be re-targeted.

mod list;
mod node;

pub use list::ProcessNodeList;
pub use node::ProcessNode;
