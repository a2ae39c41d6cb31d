//! Chunk serialization.
//!
//! Every module is wrapped in a registration call against the runtime
//! registry:
//!
//! ```text
//! __strata_define__("src/util.js", function (module, exports, require) {
//! ...module source...
//! });
//! ```
//!
//! Entry chunks end with `__strata_require__("<bootstrap module>");`.
//! Development output starts with a readable header; production output is
//! minified by trimming every line and dropping blank ones.

use strata_graph::{ModuleGraph, ModuleId};

use crate::build::BuildMode;
use crate::chunk::{Chunk, ChunkRole};
use crate::hash::ChunkIdentity;
use crate::{Error, Result};

/// Source of the runtime chunk. Loaded before any entry chunk.
pub const RUNTIME_SOURCE: &str = r#"(function (global) {
  var registry = global.__strata_modules__ || (global.__strata_modules__ = {});
  var instances = {};
  global.__strata_define__ = function (id, factory) {
    if (!(id in registry)) {
      registry[id] = factory;
    }
  };
  global.__strata_require__ = function (id) {
    if (id in instances) {
      return instances[id].exports;
    }
    var factory = registry[id];
    if (!factory) {
      throw new Error("strata: module '" + id + "' has not been loaded");
    }
    var module = (instances[id] = { id: id, exports: {} });
    factory.call(module.exports, module, module.exports, global.__strata_require__);
    return module.exports;
  };
})(typeof globalThis !== "undefined" ? globalThis : this);
"#;

/// Turns chunks into bytes for one build mode.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSerializer<'g> {
    graph: &'g ModuleGraph,
    mode: BuildMode,
}

impl<'g> ChunkSerializer<'g> {
    pub fn new(graph: &'g ModuleGraph, mode: BuildMode) -> Self {
        Self { graph, mode }
    }

    /// Serialize `chunk`.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] when a module id cannot be encoded as a
    /// string literal or a module listed in the chunk is missing.
    pub fn serialize(&self, chunk: &Chunk, identity: &ChunkIdentity) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.estimate(chunk));

        if self.mode == BuildMode::Development {
            out.extend_from_slice(header(chunk.role(), identity).as_bytes());
        }

        for id in chunk.modules() {
            let module = self.graph.module(id).ok_or_else(|| Error::Serialization {
                chunk: chunk.name().to_string(),
                message: format!("module '{id}' is not in the graph"),
            })?;
            let literal = string_literal(chunk, id)?;

            out.extend_from_slice(b"__strata_define__(");
            out.extend_from_slice(literal.as_bytes());
            out.extend_from_slice(b", function (module, exports, require) {\n");
            out.extend_from_slice(module.content());
            if !module.content().ends_with(b"\n") {
                out.push(b'\n');
            }
            out.extend_from_slice(b"});\n");
        }

        if let Some(bootstrap) = chunk.kind().bootstrap() {
            let literal = string_literal(chunk, bootstrap)?;
            out.extend_from_slice(b"__strata_require__(");
            out.extend_from_slice(literal.as_bytes());
            out.extend_from_slice(b");\n");
        }

        Ok(self.finish(out))
    }

    /// Serialize the runtime chunk.
    pub fn runtime(&self, identity: &ChunkIdentity) -> Vec<u8> {
        let mut out = Vec::with_capacity(RUNTIME_SOURCE.len() + 96);
        if self.mode == BuildMode::Development {
            out.extend_from_slice(header(ChunkRole::Runtime, identity).as_bytes());
        }
        out.extend_from_slice(RUNTIME_SOURCE.as_bytes());
        self.finish(out)
    }

    fn finish(&self, out: Vec<u8>) -> Vec<u8> {
        match self.mode {
            BuildMode::Development => out,
            BuildMode::Production => minify(&out),
        }
    }

    fn estimate(&self, chunk: &Chunk) -> usize {
        chunk
            .modules()
            .iter()
            .filter_map(|id| self.graph.module(id))
            .map(|m| m.size() + m.id().as_str().len() + 64)
            .sum::<usize>()
            + 128
    }
}

fn header(role: ChunkRole, identity: &ChunkIdentity) -> String {
    format!("/* strata {role} chunk {identity} */\n")
}

fn string_literal(chunk: &Chunk, id: &ModuleId) -> Result<String> {
    serde_json::to_string(id.as_str()).map_err(|err| Error::Serialization {
        chunk: chunk.name().to_string(),
        message: format!("cannot encode module id '{id}': {err}"),
    })
}

/// Trim every line and drop blank lines.
pub fn minify(source: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len());
    for line in source.split(|b| *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}
