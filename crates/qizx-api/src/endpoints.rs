//! Request parameter builders
//!
//! Every Qizx call targets the same service URL; the operation and its
//! arguments travel as query or form parameters.

/// Operations of the Qizx REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Info,
    Eval,
    Get,
    Put,
    PutNonXml,
    Mkcol,
    Move,
    Copy,
    Delete,
    GetProp,
    SetProp,
    ListLib,
    Server,
    MkLib,
    DelLib,
    Reindex,
    Optimize,
    QueryProp,
    Backup,
    Progress,
    GetIndexing,
    SetIndexing,
    GetAcl,
    SetAcl,
    GetConfig,
    ChangeConfig,
    GetStats,
    ListTasks,
    ListQueries,
    CancelQuery,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Info => "info",
            Op::Eval => "eval",
            Op::Get => "get",
            Op::Put => "put",
            Op::PutNonXml => "putnonxml",
            Op::Mkcol => "mkcol",
            Op::Move => "move",
            Op::Copy => "copy",
            Op::Delete => "delete",
            Op::GetProp => "getprop",
            Op::SetProp => "setprop",
            Op::ListLib => "listlib",
            Op::Server => "server",
            Op::MkLib => "mklib",
            Op::DelLib => "dellib",
            Op::Reindex => "reindex",
            Op::Optimize => "optimize",
            Op::QueryProp => "queryprop",
            Op::Backup => "backup",
            Op::Progress => "progress",
            Op::GetIndexing => "getindexing",
            Op::SetIndexing => "setindexing",
            Op::GetAcl => "getacl",
            Op::SetAcl => "setacl",
            Op::GetConfig => "getconfig",
            Op::ChangeConfig => "changeconfig",
            Op::GetStats => "getstats",
            Op::ListTasks => "listtasks",
            Op::ListQueries => "listqueries",
            Op::CancelQuery => "cancelquery",
        }
    }
}

/// Name of the `index`-th repeated parameter: `path`, `path2`, `path3`, ...
pub fn numbered(name: &str, index: usize) -> String {
    if index == 0 {
        name.to_string()
    } else {
        format!("{}{}", name, index + 1)
    }
}

/// Ordered request parameters; absent optional values are left out entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn op(op: Op) -> Self {
        Self(vec![("op".to_string(), op.as_str().to_string())])
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((name.into(), value.to_string()));
        self
    }

    pub fn with_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Add the `library` parameter, falling back to the client's default.
    pub fn library(self, explicit: Option<&str>, default: Option<&str>) -> Self {
        self.with_opt("library", explicit.or(default))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<(String, String)> {
        self.0
    }
}
