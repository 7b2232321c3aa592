//! Structural merge and diff of security-policy documents.
//!
//! Documents are YAML (or JSON) mappings holding process-execution trees and
//! network ingress/egress rules. A [`MergeObject`] widens one document with
//! others, driven by a table of [`MergeSchema`]s, and renders a line-anchored
//! diff against the document's original text.

pub mod diff;
pub mod document;
pub mod error;
pub mod format;
pub mod network;
pub mod object;
pub mod process;
pub mod schema;
pub mod stats;
mod value;
pub mod wildcard;

pub use diff::{diff_lines, DiffLine};
pub use document::{load_file, load_str, AcceptAll, Document, LoadError, Validator};
pub use error::{BuildError, MergeError};
pub use format::{format_diff, format_json, format_summary, DiffSummary};
pub use network::{Direction, IpBlock, NetworkNode, NetworkNodeList, PortRange};
pub use object::{MergeData, MergeObject};
pub use process::{ProcessNode, ProcessNodeList};
pub use schema::{default_schemas, MergeContext, MergeFunction, MergeSchema};
pub use stats::MergeStats;
pub use wildcard::{fnmatch, generalize};
