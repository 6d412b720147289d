use crate::error::PatchError;
use burrow_executor::ProcessExecutor;
use std::path::Path;

/// Link-metadata rewrites supported by the external patch tool. Together they
/// cover the mutations needed to make an executable resolve its interpreter
/// and shared libraries from inside a sandbox: the interpreter path, the
/// object's own name, the runtime search path, and the dependency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    SetInterpreter,
    SetSoname,
    SetRpath,
    AddNeeded,
    RemoveRpath,
    RemoveNeeded,
    ReplaceNeeded,
}

impl PatchOp {
    pub fn flag(&self) -> &'static str {
        match self {
            PatchOp::SetInterpreter => "--set-interpreter",
            PatchOp::SetSoname => "--set-soname",
            PatchOp::SetRpath => "--set-rpath",
            PatchOp::AddNeeded => "--add-needed",
            PatchOp::RemoveRpath => "--remove-rpath",
            PatchOp::RemoveNeeded => "--remove-needed",
            PatchOp::ReplaceNeeded => "--replace-needed",
        }
    }
}

/// Drives the external binary-rewriting tool. Stateless: the caller chooses
/// the operation and the target file, this type only shells out.
#[derive(Debug, Clone, Default)]
pub struct Patcher {
    executor: ProcessExecutor,
}

impl Patcher {
    pub fn new() -> Self {
        Self {
            executor: ProcessExecutor::new(),
        }
    }

    /// Invokes `tool` with one operation flag and the caller-supplied
    /// operands, returning the tool's stdout verbatim. No environment
    /// overrides are applied.
    pub async fn patch(
        &self,
        op: PatchOp,
        tool: &Path,
        extra_args: &[String],
    ) -> Result<String, PatchError> {
        let mut args = Vec::with_capacity(extra_args.len() + 1);
        args.push(op.flag().to_string());
        args.extend_from_slice(extra_args);

        tracing::debug!(tool = %tool.display(), op = op.flag(), "invoking patch tool");
        Ok(self.executor.run(tool, &args).await?)
    }
}
