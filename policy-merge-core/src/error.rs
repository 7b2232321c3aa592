use thiserror::Error;

/// Malformed process or network policy data.
///
/// Raised while turning document values into process trees or network
/// rules; fatal to constructing that one node or tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Two process nodes in one tree share an id.
    #[error("duplicate process id '{0}'")]
    DuplicateId(String),
    /// A required field is absent.
    #[error("{context} is missing required field '{field}'")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },
    /// A field holds a value of the wrong shape.
    #[error("{context} field '{field}' has an invalid value: {detail}")]
    InvalidField {
        context: &'static str,
        field: &'static str,
        detail: String,
    },
    /// A root process node has no effective user.
    #[error("root process '{0}' has no euser")]
    MissingEuser(String),
    /// A CIDR string could not be parsed.
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),
    /// An except network is not strictly inside its block's network.
    #[error("except network {except} is not a subnet of {network}")]
    ExceptNotSubnet { network: String, except: String },
    /// A port range ends before it starts.
    #[error("invalid port range {port}-{endport}")]
    InvalidPortRange { port: u16, endport: u16 },
}

/// Errors returned by merge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// One of the documents holds malformed policy data.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// An internal precondition did not hold. Indicates a bug, not bad input.
    #[error("merge invariant violated: {0}")]
    Invariant(String),
}

impl MergeError {
    /// Return `true` for errors that indicate a logic bug rather than bad input.
    pub fn is_bug(&self) -> bool {
        matches!(self, MergeError::Invariant(_))
    }
}
